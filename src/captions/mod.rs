use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::utils::extract_json_payload;
use crate::Result;

/// A caption track advertised by the player for one video.
#[derive(Debug, Clone)]
pub struct CaptionTrack {
    /// Language code the track is tagged with (e.g. "id", "en-US")
    pub language_code: String,

    /// True for auto-generated (ASR) tracks
    pub is_generated: bool,

    /// Fetch URL for the track's cue data
    pub base_url: String,
}

/// One caption cue: start offset in seconds plus its text.
#[derive(Debug, Clone)]
pub struct CaptionCue {
    pub start: f64,
    pub text: String,
}

/// Caption availability for a video.
#[derive(Debug, Clone)]
pub enum TrackListing {
    Tracks(Vec<CaptionTrack>),
    /// The owner has disabled captions entirely
    Disabled,
}

/// Boundary to the platform's caption surface.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// Enumerate the caption tracks available for a video.
    async fn list_tracks(&self, video_id: &str) -> Result<TrackListing>;

    /// Fetch the cue entries for one track.
    async fn fetch_cues(&self, track: &CaptionTrack) -> Result<Vec<CaptionCue>>;
}

/// Join cue texts into a single transcript string.
pub fn joined_text(cues: &[CaptionCue]) -> String {
    cues.iter()
        .map(|cue| cue.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Timedtext payload returned with `fmt=json3`.
#[derive(Debug, Deserialize)]
struct TimedTextPayload {
    #[serde(default)]
    events: Vec<TimedTextEvent>,
}

#[derive(Debug, Deserialize)]
struct TimedTextEvent {
    #[serde(rename = "tStartMs")]
    start_ms: Option<u64>,
    segs: Option<Vec<TimedTextSegment>>,
}

#[derive(Debug, Deserialize)]
struct TimedTextSegment {
    #[serde(default)]
    utf8: String,
}

/// Caption client reading track metadata from the watch page's
/// `ytInitialPlayerResponse` payload and cue data from the timedtext
/// endpoint it points at.
pub struct YoutubeCaptions {
    client: Client,
    endpoint: String,
}

impl YoutubeCaptions {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CaptionProvider for YoutubeCaptions {
    async fn list_tracks(&self, video_id: &str) -> Result<TrackListing> {
        let url = format!(
            "{}/watch?v={}",
            self.endpoint,
            urlencoding::encode(video_id)
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Watch page request failed: HTTP {}", response.status());
        }

        let html = response.text().await?;
        let player = extract_json_payload(&html, "var ytInitialPlayerResponse =")?;

        Ok(parse_track_listing(&player))
    }

    async fn fetch_cues(&self, track: &CaptionTrack) -> Result<Vec<CaptionCue>> {
        let url = format!("{}&fmt=json3", track.base_url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Caption track request failed: HTTP {}", response.status());
        }

        let payload: TimedTextPayload = response.json().await?;
        Ok(cues_from_payload(payload))
    }
}

/// The page omits the tracklist renderer when captions are turned off for
/// the video; an empty track array means captions are on but none exist.
fn parse_track_listing(player: &Value) -> TrackListing {
    let Some(raw_tracks) = player
        .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")
        .and_then(Value::as_array)
    else {
        return TrackListing::Disabled;
    };

    let tracks = raw_tracks
        .iter()
        .filter_map(|raw| {
            let base_url = raw.get("baseUrl").and_then(Value::as_str)?;
            let language_code = raw.get("languageCode").and_then(Value::as_str)?;
            let is_generated = raw.get("kind").and_then(Value::as_str) == Some("asr");
            Some(CaptionTrack {
                language_code: language_code.to_string(),
                is_generated,
                base_url: base_url.to_string(),
            })
        })
        .collect();

    TrackListing::Tracks(tracks)
}

fn cues_from_payload(payload: TimedTextPayload) -> Vec<CaptionCue> {
    payload
        .events
        .into_iter()
        .filter_map(|event| {
            let segs = event.segs?;
            let text: String = segs.into_iter().map(|seg| seg.utf8).collect();
            let text = text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(CaptionCue {
                start: event.start_ms.unwrap_or(0) as f64 / 1000.0,
                text,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_tracklist_renderer_means_disabled() {
        let player = json!({ "videoDetails": { "videoId": "v1" } });
        assert!(matches!(
            parse_track_listing(&player),
            TrackListing::Disabled
        ));
    }

    #[test]
    fn parses_tracks_with_generated_flag() {
        let player = json!({
            "captions": {
                "playerCaptionsTracklistRenderer": {
                    "captionTracks": [
                        { "baseUrl": "https://example.com/t1", "languageCode": "id" },
                        { "baseUrl": "https://example.com/t2", "languageCode": "en", "kind": "asr" }
                    ]
                }
            }
        });

        let TrackListing::Tracks(tracks) = parse_track_listing(&player) else {
            panic!("expected tracks");
        };
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].language_code, "id");
        assert!(!tracks[0].is_generated);
        assert!(tracks[1].is_generated);
    }

    #[test]
    fn cues_skip_events_without_text() {
        let payload: TimedTextPayload = serde_json::from_value(json!({
            "events": [
                { "tStartMs": 0, "segs": [{ "utf8": "halo " }, { "utf8": "semua" }] },
                { "tStartMs": 1500 },
                { "tStartMs": 3000, "segs": [{ "utf8": "\n" }] },
                { "tStartMs": 4200, "segs": [{ "utf8": "apa kabar" }] }
            ]
        }))
        .unwrap();

        let cues = cues_from_payload(payload);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "halo semua");
        assert_eq!(cues[0].start, 0.0);
        assert_eq!(cues[1].text, "apa kabar");
        assert_eq!(cues[1].start, 4.2);
    }

    #[test]
    fn joins_cue_texts_with_spaces() {
        let cues = vec![
            CaptionCue { start: 0.0, text: "halo".into() },
            CaptionCue { start: 1.0, text: "semua".into() },
        ];
        assert_eq!(joined_text(&cues), "halo semua");
    }
}

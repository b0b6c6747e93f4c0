use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::captions::{joined_text, CaptionProvider, CaptionTrack, TrackListing};
use crate::normalize::{TextNormalizer, Verdict};
use crate::transcription::{AudioDownloader, LocalTranscriber, SpeechModel};

/// Final transcript produced by the fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    /// Cleaned transcript text, never empty
    pub text: String,

    /// Language the transcript is tagged with
    pub language_code: String,

    /// True when a caption track produced the text, generated or not;
    /// false when the local speech model did
    pub is_native_caption: bool,
}

/// Outcome of a full resolution.
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(TranscriptResult),
    /// No tier produced usable text; terminal for this video.
    Unavailable,
}

/// Bounded retry for the local transcription tier.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// The fallback tiers, tried in order. The first tier that produces text
/// ends the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    NativeCaption,
    GeneratedCaption,
    LocalTranscription,
}

const TIERS: [Tier; 3] = [
    Tier::NativeCaption,
    Tier::GeneratedCaption,
    Tier::LocalTranscription,
];

/// Text produced by one tier, before normalization.
struct TierTranscript {
    text: String,
    language_code: String,
    is_native_caption: bool,
}

enum TierOutcome {
    Produced(TierTranscript),
    Exhausted,
}

/// Resolves a transcript for a video through the caption and local
/// transcription tiers.
pub struct TranscriptResolver<C, D, M> {
    captions: C,
    local: LocalTranscriber<D, M>,
    normalizer: TextNormalizer,
    retry: RetryPolicy,
}

impl<C, D, M> TranscriptResolver<C, D, M>
where
    C: CaptionProvider,
    D: AudioDownloader,
    M: SpeechModel,
{
    pub fn new(
        captions: C,
        local: LocalTranscriber<D, M>,
        normalizer: TextNormalizer,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            captions,
            local,
            normalizer,
            retry,
        }
    }

    /// Resolve a transcript for one video. Never fails: every tier error is
    /// logged and the chain moves on; an exhausted chain is `Unavailable`.
    pub async fn resolve(&self, video_id: &str, preferred_languages: &[String]) -> Resolution {
        for tier in TIERS {
            let outcome = match tier {
                Tier::NativeCaption => self.native_caption(video_id, preferred_languages).await,
                Tier::GeneratedCaption => self.generated_caption(video_id).await,
                Tier::LocalTranscription => self.local_transcription(video_id).await,
            };

            let produced = match outcome {
                TierOutcome::Produced(produced) => produced,
                TierOutcome::Exhausted => continue,
            };

            // The first tier that yields text ends the chain: a normalizer
            // rejection means "no usable transcript", not "try the next tier".
            return match self.normalizer.normalize(&produced.text) {
                Verdict::Accepted(text) => Resolution::Resolved(TranscriptResult {
                    text,
                    language_code: produced.language_code,
                    is_native_caption: produced.is_native_caption,
                }),
                Verdict::Rejected => {
                    debug!("Transcript for {video_id} rejected by quality filter ({tier:?})");
                    Resolution::Unavailable
                }
            };
        }

        Resolution::Unavailable
    }

    async fn native_caption(
        &self,
        video_id: &str,
        preferred_languages: &[String],
    ) -> TierOutcome {
        let tracks = match self.captions.list_tracks(video_id).await {
            Ok(TrackListing::Tracks(tracks)) => tracks,
            Ok(TrackListing::Disabled) => {
                debug!("Captions disabled for {video_id}");
                return TierOutcome::Exhausted;
            }
            Err(e) => {
                warn!("Caption listing failed for {video_id}: {e:#}");
                return TierOutcome::Exhausted;
            }
        };

        let Some(track) = pick_native_track(&tracks, preferred_languages) else {
            debug!("No native caption track for {video_id}");
            return TierOutcome::Exhausted;
        };

        self.fetch_track(video_id, track).await
    }

    async fn generated_caption(&self, video_id: &str) -> TierOutcome {
        let tracks = match self.captions.list_tracks(video_id).await {
            Ok(TrackListing::Tracks(tracks)) => tracks,
            Ok(TrackListing::Disabled) => return TierOutcome::Exhausted,
            Err(e) => {
                warn!("Caption listing failed for {video_id}: {e:#}");
                return TierOutcome::Exhausted;
            }
        };

        let Some(track) = tracks.iter().find(|track| track.is_generated) else {
            debug!("No generated caption track for {video_id}");
            return TierOutcome::Exhausted;
        };

        self.fetch_track(video_id, track).await
    }

    /// Fetch one track's cues and turn them into a tier transcript. Any
    /// caption track counts as a caption, generated or not.
    async fn fetch_track(&self, video_id: &str, track: &CaptionTrack) -> TierOutcome {
        match self.captions.fetch_cues(track).await {
            Ok(cues) => {
                let text = joined_text(&cues);
                if text.trim().is_empty() {
                    debug!(
                        "Caption track {} for {video_id} has no text",
                        track.language_code
                    );
                    TierOutcome::Exhausted
                } else {
                    TierOutcome::Produced(TierTranscript {
                        text,
                        language_code: track.language_code.clone(),
                        is_native_caption: true,
                    })
                }
            }
            Err(e) => {
                warn!(
                    "Caption fetch failed for {video_id} ({}): {e:#}",
                    track.language_code
                );
                TierOutcome::Exhausted
            }
        }
    }

    async fn local_transcription(&self, video_id: &str) -> TierOutcome {
        for attempt in 1..=self.retry.max_attempts {
            match self.local.transcribe_video(video_id).await {
                Ok(raw) if !raw.text.trim().is_empty() => {
                    return TierOutcome::Produced(TierTranscript {
                        text: raw.text,
                        language_code: raw.language_code,
                        is_native_caption: false,
                    });
                }
                Ok(_) => {
                    warn!("Local transcription of {video_id} produced no text (attempt {attempt})")
                }
                Err(e) => {
                    warn!("Local transcription of {video_id} failed (attempt {attempt}): {e:#}")
                }
            }

            if attempt < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay).await;
            }
        }

        TierOutcome::Exhausted
    }
}

/// First non-generated track matching the preferred language order.
fn pick_native_track<'a>(
    tracks: &'a [CaptionTrack],
    preferred_languages: &[String],
) -> Option<&'a CaptionTrack> {
    preferred_languages.iter().find_map(|lang| {
        tracks
            .iter()
            .find(|track| !track.is_generated && matches_language(&track.language_code, lang))
    })
}

fn matches_language(track_code: &str, wanted: &str) -> bool {
    track_code == wanted || track_code.starts_with(&format!("{wanted}-"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::{CaptionCue, MockCaptionProvider};
    use crate::transcription::{MockAudioDownloader, MockSpeechModel};

    const ACCEPTED_TEXT: &str = "yang dari dengan untuk dalam pada ini itu jadi ada";

    fn track(language: &str, generated: bool) -> CaptionTrack {
        CaptionTrack {
            language_code: language.to_string(),
            is_generated: generated,
            base_url: format!("https://example.com/{language}"),
        }
    }

    fn cues(text: &str) -> Vec<CaptionCue> {
        text.split_whitespace()
            .enumerate()
            .map(|(i, word)| CaptionCue {
                start: i as f64,
                text: word.to_string(),
            })
            .collect()
    }

    fn resolver(
        captions: MockCaptionProvider,
        downloader: MockAudioDownloader,
        model: MockSpeechModel,
    ) -> TranscriptResolver<MockCaptionProvider, MockAudioDownloader, MockSpeechModel> {
        let local = LocalTranscriber::new(downloader, model, "id").unwrap();
        let retry = RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        };
        TranscriptResolver::new(captions, local, TextNormalizer::default(), retry)
    }

    fn languages() -> Vec<String> {
        vec!["id".to_string(), "en".to_string()]
    }

    #[tokio::test]
    async fn native_caption_wins_first() {
        let mut captions = MockCaptionProvider::new();
        captions
            .expect_list_tracks()
            .times(1)
            .returning(|_| Ok(TrackListing::Tracks(vec![track("id", false)])));
        captions
            .expect_fetch_cues()
            .times(1)
            .returning(|_| Ok(cues(ACCEPTED_TEXT)));

        let resolver = resolver(captions, MockAudioDownloader::new(), MockSpeechModel::new());

        match resolver.resolve("v1", &languages()).await {
            Resolution::Resolved(result) => {
                assert_eq!(result.text, ACCEPTED_TEXT);
                assert_eq!(result.language_code, "id");
                assert!(result.is_native_caption);
            }
            Resolution::Unavailable => panic!("expected a resolved transcript"),
        }
    }

    #[tokio::test]
    async fn language_preference_order_selects_track() {
        let mut captions = MockCaptionProvider::new();
        captions.expect_list_tracks().returning(|_| {
            Ok(TrackListing::Tracks(vec![
                track("en-US", false),
                track("id", false),
            ]))
        });
        captions
            .expect_fetch_cues()
            .withf(|track| track.language_code == "id")
            .returning(|_| Ok(cues(ACCEPTED_TEXT)));

        let resolver = resolver(captions, MockAudioDownloader::new(), MockSpeechModel::new());

        match resolver.resolve("v1", &languages()).await {
            Resolution::Resolved(result) => assert_eq!(result.language_code, "id"),
            Resolution::Unavailable => panic!("expected a resolved transcript"),
        }
    }

    #[tokio::test]
    async fn generated_track_used_when_no_native_match() {
        let mut captions = MockCaptionProvider::new();
        // Listed once by the native tier, once by the generated tier
        captions
            .expect_list_tracks()
            .times(2)
            .returning(|_| Ok(TrackListing::Tracks(vec![track("id", true)])));
        captions
            .expect_fetch_cues()
            .times(1)
            .returning(|_| Ok(cues(ACCEPTED_TEXT)));

        let resolver = resolver(captions, MockAudioDownloader::new(), MockSpeechModel::new());

        match resolver.resolve("v1", &languages()).await {
            Resolution::Resolved(result) => {
                // A generated track is still a caption
                assert!(result.is_native_caption);
            }
            Resolution::Unavailable => panic!("expected a resolved transcript"),
        }
    }

    #[tokio::test]
    async fn local_tier_runs_when_captions_disabled() {
        let mut captions = MockCaptionProvider::new();
        captions
            .expect_list_tracks()
            .times(2)
            .returning(|_| Ok(TrackListing::Disabled));

        let mut downloader = MockAudioDownloader::new();
        downloader.expect_download().times(1).returning(|_, dest| {
            std::fs::write(dest, b"fake audio").unwrap();
            Ok(())
        });
        let mut model = MockSpeechModel::new();
        model
            .expect_transcribe()
            .times(1)
            .returning(|_, _| Ok(ACCEPTED_TEXT.to_string()));

        let resolver = resolver(captions, downloader, model);

        match resolver.resolve("v1", &languages()).await {
            Resolution::Resolved(result) => {
                assert!(!result.is_native_caption);
                assert_eq!(result.language_code, "id");
            }
            Resolution::Unavailable => panic!("expected a resolved transcript"),
        }
    }

    #[tokio::test]
    async fn local_tier_retries_exactly_max_attempts() {
        let mut captions = MockCaptionProvider::new();
        captions
            .expect_list_tracks()
            .returning(|_| Ok(TrackListing::Tracks(vec![])));

        let mut downloader = MockAudioDownloader::new();
        downloader
            .expect_download()
            .times(3)
            .returning(|_, _| Err(anyhow::anyhow!("download timeout")));
        let model = MockSpeechModel::new();

        let resolver = resolver(captions, downloader, model);

        assert!(matches!(
            resolver.resolve("v1", &languages()).await,
            Resolution::Unavailable
        ));
    }

    #[tokio::test]
    async fn normalizer_rejection_terminates_without_fallthrough() {
        let mut captions = MockCaptionProvider::new();
        captions
            .expect_list_tracks()
            .times(1)
            .returning(|_| Ok(TrackListing::Tracks(vec![track("id", false)])));
        captions
            .expect_fetch_cues()
            .times(1)
            .returning(|_| Ok(cues("terlalu pendek")));

        // Neither the generated tier nor the local tier may run after the
        // native tier produced (rejected) text.
        let resolver = resolver(captions, MockAudioDownloader::new(), MockSpeechModel::new());

        assert!(matches!(
            resolver.resolve("v1", &languages()).await,
            Resolution::Unavailable
        ));
    }

    #[tokio::test]
    async fn listing_error_fails_open_to_next_tier() {
        let mut captions = MockCaptionProvider::new();
        let mut calls = 0;
        captions.expect_list_tracks().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(anyhow::anyhow!("malformed watch page"))
            } else {
                Ok(TrackListing::Tracks(vec![track("id", true)]))
            }
        });
        captions
            .expect_fetch_cues()
            .returning(|_| Ok(cues(ACCEPTED_TEXT)));

        let resolver = resolver(captions, MockAudioDownloader::new(), MockSpeechModel::new());

        assert!(matches!(
            resolver.resolve("v1", &languages()).await,
            Resolution::Resolved(_)
        ));
    }

    #[test]
    fn native_track_picker_ignores_generated_tracks() {
        let tracks = vec![track("id", true), track("en", false)];
        let picked = pick_native_track(&tracks, &languages()).unwrap();
        assert_eq!(picked.language_code, "en");

        let only_generated = vec![track("id", true)];
        assert!(pick_native_track(&only_generated, &languages()).is_none());
    }

    #[test]
    fn language_matching_accepts_regional_variants() {
        assert!(matches_language("id", "id"));
        assert!(matches_language("en-US", "en"));
        assert!(!matches_language("idn", "id"));
        assert!(!matches_language("en", "id"));
    }
}

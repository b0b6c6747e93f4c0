use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::captions::CaptionProvider;
use crate::resolver::{Resolution, TranscriptResolver};
use crate::search::{VideoRecord, VideoSource};
use crate::store::{ClaimOutcome, CommitOutcome, CorpusEntry, CorpusStore};
use crate::transcription::{AudioDownloader, SpeechModel};
use crate::Result;

/// Orchestrates search -> claim -> resolve -> commit for one query at a
/// time. Candidates are processed sequentially in source order.
pub struct IngestionPipeline<S, C, D, M> {
    source: S,
    resolver: TranscriptResolver<C, D, M>,
    store: CorpusStore,
    preferred_languages: Vec<String>,
    language_hint: String,
    pacing: Duration,
}

impl<S, C, D, M> IngestionPipeline<S, C, D, M>
where
    S: VideoSource,
    C: CaptionProvider,
    D: AudioDownloader,
    M: SpeechModel,
{
    pub fn new(
        source: S,
        resolver: TranscriptResolver<C, D, M>,
        store: CorpusStore,
        preferred_languages: Vec<String>,
        language_hint: String,
        pacing: Duration,
    ) -> Self {
        Self {
            source,
            resolver,
            store,
            preferred_languages,
            language_hint,
            pacing,
        }
    }

    /// Harvest one query. Returns the number of entries committed.
    ///
    /// Search and store failures propagate; everything that goes wrong with
    /// a single video is logged and skipped.
    pub async fn run(&self, query: &str, max_results: usize) -> Result<usize> {
        let videos = self
            .source
            .search(query, max_results, &self.language_hint)
            .await?;
        info!("Query {query:?}: {} candidate videos", videos.len());

        let mut processed = 0;
        for (index, video) in videos.iter().enumerate() {
            if index > 0 {
                sleep(self.pacing).await;
            }

            match self.store.try_claim(&video.id)? {
                ClaimOutcome::AlreadyProcessed => {
                    debug!("Skipping already processed video {} ({})", video.id, video.title);
                    continue;
                }
                ClaimOutcome::Claimed => {}
            }

            match self.ingest(video).await {
                Ok(true) => processed += 1,
                Ok(false) => {}
                Err(e) => error!("Failed to ingest video {}: {e:#}", video.id),
            }
        }

        info!("Query {query:?}: {processed} videos processed");
        Ok(processed)
    }

    async fn ingest(&self, video: &VideoRecord) -> Result<bool> {
        let result = match self
            .resolver
            .resolve(&video.id, &self.preferred_languages)
            .await
        {
            Resolution::Resolved(result) => result,
            Resolution::Unavailable => {
                // The claim marker stands, so this video is never retried
                debug!("No usable transcript for {} ({})", video.id, video.title);
                return Ok(false);
            }
        };

        let entry = CorpusEntry {
            video_id: video.id.clone(),
            title: video.title.clone(),
            channel: video.channel.clone(),
            published_at: video.published_at,
            transcript_text: result.text,
            language_code: result.language_code,
            has_caption: result.is_native_caption,
        };

        match self.store.commit_entry(&entry)? {
            CommitOutcome::Committed => {
                info!("Committed transcript for {} ({})", video.id, video.title);
                Ok(true)
            }
            CommitOutcome::DuplicateTranscriptText => {
                debug!("Duplicate transcript text for {}, skipping", video.id);
                Ok(false)
            }
            CommitOutcome::IdConflict => {
                debug!("Video {} was committed by another writer, skipping", video.id);
                Ok(false)
            }
        }
    }
}

//! Corpus Harvester - a Rust CLI tool for building speech-transcript corpora
//!
//! This library searches a video platform for candidate videos, resolves a
//! transcript for each one through a caption -> generated-caption -> local
//! transcription fallback chain, filters the text through a quality gate,
//! and persists deduplicated results into a SQLite corpus store.

pub mod captions;
pub mod cli;
pub mod config;
pub mod normalize;
pub mod pipeline;
pub mod resolver;
pub mod search;
pub mod store;
pub mod transcription;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use pipeline::IngestionPipeline;
pub use resolver::{Resolution, TranscriptResolver, TranscriptResult};
pub use search::{VideoRecord, VideoSource};
pub use store::CorpusStore;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the harvester
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("Audio download failed: {0}")]
    AudioDownloadFailed(String),

    #[error("Local transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Missing external dependency: {0}")]
    MissingDependency(String),
}

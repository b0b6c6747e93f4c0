use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "harvester",
    about = "Corpus Harvester - Build a speech-transcript corpus from YouTube search results",
    version,
    long_about = "Searches YouTube for a set of queries, pulls captions (native first, then auto-generated), falls back to local whisper transcription when no usable caption exists, and stores deduplicated transcripts in a SQLite corpus."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Harvest transcripts for one or more search queries
    Harvest {
        /// Search queries
        #[arg(value_name = "QUERY")]
        queries: Vec<String>,

        /// File with one query per line, combined with positional queries
        #[arg(long, value_name = "FILE")]
        queries_file: Option<PathBuf>,

        /// Maximum candidate videos per query
        #[arg(short = 'n', long, default_value = "50")]
        max_results: usize,

        /// Override the configured search language hint
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,
    },

    /// Show the current configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Print corpus statistics
    Stats,
}

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use corpus_harvester::captions::YoutubeCaptions;
use corpus_harvester::cli::{Cli, Commands};
use corpus_harvester::config::Config;
use corpus_harvester::normalize::TextNormalizer;
use corpus_harvester::pipeline::IngestionPipeline;
use corpus_harvester::resolver::TranscriptResolver;
use corpus_harvester::search::YoutubeSearch;
use corpus_harvester::store::CorpusStore;
use corpus_harvester::transcription::{LocalTranscriber, WhisperCli, YtDlpDownloader};
use corpus_harvester::utils;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "corpus_harvester=debug"
    } else {
        "corpus_harvester=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().await?;

    match cli.command {
        Commands::Harvest {
            queries,
            queries_file,
            max_results,
            language,
        } => {
            harvest(config, queries, queries_file, max_results, language).await?;
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.display();
                println!();
                println!("Edit the config file to change settings:");
                println!("  {}", Config::config_path()?.display());
            }
        }
        Commands::Stats => {
            let store = CorpusStore::open(&config.store.db_path, config.store.dedup_transcript_text)?;
            let stats = store.stats()?;
            println!("Corpus entries:    {}", stats.entries);
            println!("  with captions:   {}", stats.captioned);
            println!("  whisper-only:    {}", stats.entries - stats.captioned);
            println!("Processed markers: {}", stats.markers);
        }
    }

    Ok(())
}

async fn harvest(
    config: Config,
    queries: Vec<String>,
    queries_file: Option<PathBuf>,
    max_results: usize,
    language: Option<String>,
) -> Result<()> {
    // Check for required external tools (non-fatal: caption tiers work without them)
    let missing = utils::check_dependencies(
        &config.transcription.yt_dlp_path,
        &config.transcription.whisper_path,
    )
    .await;
    if !missing.is_empty() {
        eprintln!("Dependency check warnings:");
        for dep in missing {
            eprintln!("  - {dep}");
        }
        eprintln!("  (continuing anyway - only the local transcription fallback needs these)");
    }

    let mut all_queries = queries;
    if let Some(path) = queries_file {
        let content = fs_err::read_to_string(&path)?;
        all_queries.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(String::from),
        );
    }
    if all_queries.is_empty() {
        anyhow::bail!("No queries given; pass them as arguments or via --queries-file");
    }

    let language_hint = language.unwrap_or_else(|| config.search.language_hint.clone());

    let source = YoutubeSearch::new(&config.search.endpoint);
    let captions = YoutubeCaptions::new(&config.search.endpoint);
    let downloader = YtDlpDownloader::new(&config.transcription.yt_dlp_path);
    let model = WhisperCli::new(
        &config.transcription.whisper_path,
        &config.transcription.whisper_model,
    );
    let local = LocalTranscriber::new(downloader, model, &config.transcription.language)?;
    let resolver = TranscriptResolver::new(
        captions,
        local,
        TextNormalizer::default(),
        config.retry_policy(),
    );
    let store = CorpusStore::open(&config.store.db_path, config.store.dedup_transcript_text)?;
    let pipeline = IngestionPipeline::new(
        source,
        resolver,
        store,
        config.search.preferred_caption_languages.clone(),
        language_hint,
        config.pacing(),
    );

    let started = Instant::now();
    let mut total = 0;

    for query in &all_queries {
        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap(),
        );
        progress.set_message(format!("Harvesting {query:?}..."));
        progress.enable_steady_tick(Duration::from_millis(120));

        match pipeline.run(query, max_results).await {
            Ok(processed) => {
                progress.finish_with_message(format!("{query:?}: {processed} videos processed"));
                total += processed;
            }
            Err(e) => {
                progress.finish_with_message(format!("{query:?}: failed"));
                tracing::error!("Query {query:?} failed: {e:#}");
            }
        }
    }

    println!(
        "Processed {total} videos across {} queries in {}",
        all_queries.len(),
        utils::format_duration(started.elapsed().as_secs_f64())
    );

    Ok(())
}

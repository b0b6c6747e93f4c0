use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::resolver::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Video search settings
    pub search: SearchConfig,

    /// Local transcription fallback settings
    pub transcription: TranscriptionConfig,

    /// Corpus store settings
    pub store: StoreConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base endpoint for search and watch pages
    pub endpoint: String,

    /// Language hint sent with search requests
    pub language_hint: String,

    /// Caption languages in preference order
    pub preferred_caption_languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// yt-dlp binary used for audio downloads
    pub yt_dlp_path: String,

    /// whisper.cpp style binary used for local transcription
    pub whisper_path: String,

    /// Path to the whisper model file
    pub whisper_model: PathBuf,

    /// Language the speech model is constrained to
    pub language: String,

    /// Attempts for the local transcription tier
    pub max_attempts: u32,

    /// Pause between attempts, in seconds
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    pub db_path: PathBuf,

    /// Also skip entries whose exact transcript text is already stored
    pub dedup_transcript_text: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pause between successive candidate videos, in seconds
    pub pacing_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchConfig {
                endpoint: "https://www.youtube.com".to_string(),
                language_hint: "id".to_string(),
                preferred_caption_languages: vec!["id".to_string(), "en".to_string()],
            },
            transcription: TranscriptionConfig {
                yt_dlp_path: "yt-dlp".to_string(),
                whisper_path: "whisper-cli".to_string(),
                whisper_model: PathBuf::from("models/ggml-base.bin"),
                language: "id".to_string(),
                max_attempts: 3,
                retry_delay_secs: 1,
            },
            store: StoreConfig {
                db_path: PathBuf::from("corpus.sqlite"),
                dedup_transcript_text: false,
            },
            app: AppConfig { pacing_secs: 1 },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content =
                fs_err::read_to_string(&config_path).context("Failed to read config file")?;

            let config: Config =
                serde_yaml::from_str(&content).context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("corpus-harvester").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        Url::parse(&self.search.endpoint).context("search.endpoint must be a valid URL")?;

        if self.search.preferred_caption_languages.is_empty() {
            anyhow::bail!("At least one preferred caption language must be configured");
        }

        if self.transcription.max_attempts == 0 {
            anyhow::bail!("transcription.max_attempts must be at least 1");
        }

        Ok(())
    }

    /// Retry policy for the local transcription tier
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.transcription.max_attempts,
            delay: Duration::from_secs(self.transcription.retry_delay_secs),
        }
    }

    /// Pacing delay between candidate videos
    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.app.pacing_secs)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Search endpoint: {}", self.search.endpoint);
        println!("  Language hint: {}", self.search.language_hint);
        println!(
            "  Caption languages: {}",
            self.search.preferred_caption_languages.join(", ")
        );
        println!("  yt-dlp: {}", self.transcription.yt_dlp_path);
        println!(
            "  Whisper: {} (model {})",
            self.transcription.whisper_path,
            self.transcription.whisper_model.display()
        );
        println!("  Corpus store: {}", self.store.db_path.display());
        println!(
            "  Transcript text dedup: {}",
            self.store.dedup_transcript_text
        );
        println!("  Pacing: {}s", self.app.pacing_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_endpoint() {
        let mut config = Config::default();
        config.search.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_retry_attempts() {
        let mut config = Config::default();
        config.transcription.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.search.language_hint, "id");
        assert_eq!(parsed.transcription.max_attempts, 3);
    }
}

use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use uuid::Uuid;

use crate::{HarvestError, Result};

/// Raw output of the local speech-to-text fallback.
#[derive(Debug, Clone)]
pub struct RawTranscript {
    pub text: String,
    pub language_code: String,
}

/// Fetches the audio track of a video into a local file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioDownloader: Send + Sync {
    async fn download(&self, video_id: &str, dest: &Path) -> Result<()>;
}

/// On-device speech-to-text over a local audio file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechModel: Send + Sync {
    async fn transcribe(&self, audio: &Path, language: &str) -> Result<String>;
}

/// Audio downloader shelling out to yt-dlp.
pub struct YtDlpDownloader {
    yt_dlp_path: String,
}

impl YtDlpDownloader {
    pub fn new(yt_dlp_path: &str) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.to_string(),
        }
    }
}

#[async_trait]
impl AudioDownloader for YtDlpDownloader {
    async fn download(&self, video_id: &str, dest: &Path) -> Result<()> {
        let url = format!("https://www.youtube.com/watch?v={video_id}");
        let dest_str = dest.to_string_lossy();

        tracing::debug!("Downloading audio for {video_id} to {dest_str}");

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--output",
                &dest_str,
                // Smallest audio-only stream is plenty for transcription
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "9",
                "--format",
                "worstaudio[acodec^=mp4a]/worstaudio[ext=m4a]/worstaudio[ext=mp3]/worstaudio",
                "--no-playlist",
                "--newline",
                &url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(HarvestError::AudioDownloadFailed(error.into_owned()).into());
        }

        // yt-dlp can exit zero on an unavailable stream and leave nothing behind
        let size = fs_err::metadata(dest).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(HarvestError::AudioDownloadFailed(format!(
                "downloaded audio for {video_id} is empty or missing"
            ))
            .into());
        }

        Ok(())
    }
}

/// Speech model shelling out to a whisper.cpp style CLI.
pub struct WhisperCli {
    binary: String,
    model_path: PathBuf,
}

impl WhisperCli {
    pub fn new(binary: &str, model_path: &Path) -> Self {
        Self {
            binary: binary.to_string(),
            model_path: model_path.to_path_buf(),
        }
    }
}

#[async_trait]
impl SpeechModel for WhisperCli {
    async fn transcribe(&self, audio: &Path, language: &str) -> Result<String> {
        let model_str = self.model_path.to_string_lossy();
        let audio_str = audio.to_string_lossy();

        tracing::debug!("Transcribing {audio_str} with {}", self.binary);

        let output = Command::new(&self.binary)
            .args([
                "--model",
                &model_str,
                "--language",
                language,
                "--no-prints",
                "--no-timestamps",
                "--file",
                &audio_str,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(HarvestError::TranscriptionFailed(error.into_owned()).into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Removes the transient audio artifact when the attempt ends, whatever the
/// exit path.
struct ArtifactGuard<'a>(&'a Path);

impl Drop for ArtifactGuard<'_> {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = fs_err::remove_file(self.0) {
                tracing::warn!("Failed to remove audio artifact {}: {e}", self.0.display());
            }
        }
    }
}

/// One attempt of the local transcription fallback: download the audio into
/// a scoped temporary file, run the speech model over it, release the file.
pub struct LocalTranscriber<D, M> {
    downloader: D,
    model: M,
    language: String,
    temp_dir: TempDir,
}

impl<D: AudioDownloader, M: SpeechModel> LocalTranscriber<D, M> {
    pub fn new(downloader: D, model: M, language: &str) -> Result<Self> {
        let temp_dir = TempDir::new().context("Failed to create temporary audio directory")?;

        Ok(Self {
            downloader,
            model,
            language: language.to_string(),
            temp_dir,
        })
    }

    pub async fn transcribe_video(&self, video_id: &str) -> Result<RawTranscript> {
        let filename = format!(
            "audio_{}_{}.mp3",
            video_id,
            &Uuid::new_v4().to_string()[..8]
        );
        let audio_path = self.temp_dir.path().join(filename);
        let _artifact = ArtifactGuard(&audio_path);

        self.downloader.download(video_id, &audio_path).await?;
        let text = self.model.transcribe(&audio_path, &self.language).await?;

        Ok(RawTranscript {
            text,
            language_code: self.language.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type SeenPath = Arc<Mutex<Option<PathBuf>>>;

    /// Downloader mock that records the destination it was handed and
    /// writes a small file there.
    fn recording_downloader(seen: SeenPath) -> MockAudioDownloader {
        let mut downloader = MockAudioDownloader::new();
        downloader.expect_download().returning(move |_, dest| {
            *seen.lock().unwrap() = Some(dest.to_path_buf());
            std::fs::write(dest, b"fake audio").unwrap();
            Ok(())
        });
        downloader
    }

    #[tokio::test]
    async fn artifact_removed_after_success() {
        let seen: SeenPath = Arc::new(Mutex::new(None));
        let downloader = recording_downloader(seen.clone());

        let mut model = MockSpeechModel::new();
        model
            .expect_transcribe()
            .returning(|_, _| Ok("halo semua".to_string()));

        let local = LocalTranscriber::new(downloader, model, "id").unwrap();
        let raw = local.transcribe_video("v1").await.unwrap();

        assert_eq!(raw.text, "halo semua");
        assert_eq!(raw.language_code, "id");

        let path = seen.lock().unwrap().clone().expect("download was called");
        assert!(!path.exists(), "audio artifact should be removed");
    }

    #[tokio::test]
    async fn artifact_removed_after_model_failure() {
        let seen: SeenPath = Arc::new(Mutex::new(None));
        let downloader = recording_downloader(seen.clone());

        let mut model = MockSpeechModel::new();
        model
            .expect_transcribe()
            .returning(|_, _| Err(anyhow::anyhow!("model crashed")));

        let local = LocalTranscriber::new(downloader, model, "id").unwrap();
        assert!(local.transcribe_video("v1").await.is_err());

        let path = seen.lock().unwrap().clone().expect("download was called");
        assert!(!path.exists(), "audio artifact should be removed");
    }

    #[tokio::test]
    async fn download_failure_is_typed() {
        let mut downloader = MockAudioDownloader::new();
        downloader
            .expect_download()
            .returning(|_, _| Err(HarvestError::AudioDownloadFailed("timeout".into()).into()));

        let model = MockSpeechModel::new();

        let local = LocalTranscriber::new(downloader, model, "id").unwrap();
        let err = local.transcribe_video("v1").await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<HarvestError>(),
            Some(HarvestError::AudioDownloadFailed(_))
        ));
    }
}

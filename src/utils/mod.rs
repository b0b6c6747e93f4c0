use anyhow::Result;
use serde_json::Value;

/// Extract a JSON payload embedded in a page as `var NAME = {...};`.
///
/// `marker` is the assignment prefix (for example `"var ytInitialData ="`);
/// the payload runs from there to the closing script tag.
pub fn extract_json_payload(html: &str, marker: &str) -> Result<Value> {
    let tail = html
        .split(marker)
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Payload marker {marker:?} not found in page"))?;

    let json = tail
        .split("</script>")
        .next()
        .unwrap_or_default()
        .trim()
        .trim_end_matches(';');

    Ok(serde_json::from_str(json)?)
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Check that the external tools the pipeline shells out to are present.
pub async fn check_dependencies(yt_dlp: &str, whisper: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp).await {
        missing.push(format!("{yt_dlp} - required for audio downloads"));
    }

    if !check_command_available(whisper).await {
        missing.push(format!(
            "{whisper} - required for the local transcription fallback"
        ));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

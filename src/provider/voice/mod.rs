//! Builtin voice providers: `elevenlabs`, `openai_tts`, `azure`.
//!
//! Each synthesizes one segment's narration to an audio file under the
//! configured temp directory and reports the clip's real duration via
//! ffprobe, falling back to a word-count estimate when ffprobe is absent.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::provider::{ProviderError, Result};

mod azure;
mod elevenlabs;
mod openai_tts;

pub use azure::AzureVoice;
pub use elevenlabs::ElevenLabsVoice;
pub use openai_tts::OpenAiTtsVoice;

/// Average speech rate used when ffprobe is unavailable.
const WORDS_PER_SECOND: f64 = 2.5;

/// Measure a clip with ffprobe. `None` when ffprobe is missing or the file
/// does not parse.
pub(crate) async fn probe_duration(path: &Path) -> Option<f64> {
    let ffprobe = which::which("ffprobe")
        .map_or_else(|_| "ffprobe".to_string(), |p| p.to_string_lossy().to_string());
    let output = Command::new(ffprobe)
        .args(["-v", "error", "-show_entries", "format=duration", "-of",
            "default=noprint_wrappers=1:nokey=1"])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout).trim().parse().ok()
}

/// Word-count fallback when no probe is possible.
pub(crate) fn estimate_duration(narration: &str, speed: f64) -> f64 {
    let words = narration.split_whitespace().count() as f64;
    let speed = if speed > 0.0 { speed } else { 1.0 };
    words / (WORDS_PER_SECOND * speed)
}

/// Where a provider writes one segment's clip.
pub(crate) fn clip_path(temp_dir: &Path, provider: &str, segment_id: &str) -> PathBuf {
    temp_dir.join(format!("{provider}_{segment_id}.mp3"))
}

/// Persist synthesized audio bytes, creating the temp dir on first use.
pub(crate) async fn write_clip(provider: &str, path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            ProviderError::unavailable(provider, format!("create {}: {e}", parent.display()))
        })?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| ProviderError::unavailable(provider, format!("write {}: {e}", path.display())))
}

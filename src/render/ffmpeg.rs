//! ffmpeg-based renderer.
//!
//! Composites a solid style canvas, concatenated narration audio, optional
//! background music, and per-cue text overlays into one encode pass.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::provider::voice::probe_duration;
use crate::provider::{ProviderError, Result};
use crate::render::{RenderPlan, RenderedVideo, Renderer};

/// Overlay labels longer than this overflow a 1080p canvas.
const MAX_LABEL_CHARS: usize = 60;

pub struct FfmpegRenderer {
    ffmpeg_path: String,
}

impl FfmpegRenderer {
    pub fn new() -> Self {
        let ffmpeg_path = which::which("ffmpeg")
            .map_or_else(|_| "ffmpeg".to_string(), |p| p.to_string_lossy().to_string());
        Self { ffmpeg_path }
    }

    /// Probe for a working ffmpeg binary.
    pub async fn check_available(&self) -> bool {
        Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn build_args(&self, plan: &RenderPlan) -> Vec<String> {
        let mut args: Vec<String> = vec!["-hide_banner".into()];

        // Input 0: the style canvas.
        let canvas = format!(
            "color=c={}:s={}x{}:r={}:d={:.3}",
            plan.style.background,
            plan.style.canvas.width,
            plan.style.canvas.height,
            plan.style.fps,
            plan.total_seconds.max(0.1),
        );
        args.extend(["-f".into(), "lavfi".into(), "-i".into(), canvas]);

        // Inputs 1..=n: narration clips in order.
        for clip in &plan.clips {
            args.extend(["-i".into(), clip.to_string_lossy().to_string()]);
        }

        let music_on = plan.music.enabled && !plan.music.path.is_empty();
        if music_on {
            args.extend(["-i".into(), plan.music.path.clone()]);
        }

        args.extend(["-filter_complex".into(), self.build_filter(plan, music_on)]);
        args.extend(["-map".into(), "[v]".into(), "-map".into(), "[aud]".into()]);
        args.extend(["-c:v".into(), plan.encoder.video_codec.clone()]);
        args.extend(["-preset".into(), plan.encoder.preset.clone()]);
        args.extend(["-c:a".into(), plan.encoder.audio_codec.clone()]);
        args.extend(["-b:a".into(), plan.encoder.audio_bitrate.clone()]);
        args.extend(["-t".into(), format!("{:.3}", plan.total_seconds.max(0.1))]);
        args.extend(["-y".into(), plan.output_path.to_string_lossy().to_string()]);
        args
    }

    fn build_filter(&self, plan: &RenderPlan, music_on: bool) -> String {
        let mut graph = String::new();

        // Concatenate narration. With music enabled the last input index is
        // the music track, not a clip.
        let clip_count = plan.clips.len();
        for i in 0..clip_count {
            graph.push_str(&format!("[{}:a]", i + 1));
        }
        graph.push_str(&format!("concat=n={clip_count}:v=0:a=1[voice];"));

        if music_on {
            let music_index = clip_count + 1;
            graph.push_str(&format!(
                "[{music_index}:a]volume={:.2}[bg];[voice][bg]amix=inputs=2:duration=first[aud];",
                plan.music.volume
            ));
        } else {
            graph.push_str("[voice]anull[aud];");
        }

        // One drawtext per cue, chained over the canvas.
        let mut label = "0:v".to_string();
        for (i, cue) in plan.cues.iter().enumerate() {
            let next = if i + 1 == plan.cues.len() { "v".to_string() } else { format!("t{i}") };
            let text: String = cue.label.chars().take(MAX_LABEL_CHARS).collect();
            graph.push_str(&format!(
                "[{label}]drawtext=text='{}':font='{}':fontcolor={}:fontsize=56:\
                 x=(w-text_w)/2:y=(h-text_h)/2:enable='between(t,{:.3},{:.3})'[{next}];",
                escape_drawtext(&text),
                escape_drawtext(&plan.style.font),
                plan.style.accent,
                cue.start_seconds,
                cue.start_seconds + cue.duration_seconds,
            ));
            label = next;
        }
        if plan.cues.is_empty() {
            graph.push_str("[0:v]null[v];");
        }

        graph.trim_end_matches(';').to_string()
    }
}

impl Default for FfmpegRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// drawtext treats backslashes, colons and quotes as filter syntax.
fn escape_drawtext(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace(':', "\\:").replace('\'', "\\'")
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn render(&self, plan: &RenderPlan) -> Result<RenderedVideo> {
        if plan.clips.is_empty() {
            return Err(ProviderError::unavailable("ffmpeg", "no narration clips to render"));
        }
        if let Some(parent) = plan.output_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ProviderError::unavailable("ffmpeg", format!("create {}: {e}", parent.display()))
            })?;
        }

        let args = self.build_args(plan);
        debug!(output = %plan.output_path.display(), inputs = plan.clips.len(), "running ffmpeg");

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProviderError::unavailable("ffmpeg", format!("spawn: {e}")))?;

        let mut tail = String::new();
        if let Some(stderr) = child.stderr.take() {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.contains("Error") || line.contains("error") {
                    warn!("ffmpeg: {line}");
                }
                tail = line;
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ProviderError::unavailable("ffmpeg", format!("wait: {e}")))?;
        if !status.success() {
            return Err(ProviderError::unavailable(
                "ffmpeg",
                format!("exit {}: {tail}", status.code().unwrap_or(-1)),
            ));
        }

        let duration_seconds =
            probe_duration(&plan.output_path).await.unwrap_or(plan.total_seconds);
        Ok(RenderedVideo { path: plan.output_path.clone(), duration_seconds })
    }
}

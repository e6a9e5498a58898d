//! Video assembly.
//!
//! The pipeline hands the renderer a fully resolved [`RenderPlan`]: narration
//! clips in playback order, timed visual cues, one style, one output path.
//! The default implementation shells out to ffmpeg; tests swap in stubs.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::{MusicConfig, OutputConfig, StyleSpec, TransitionConfig};
use crate::pipeline::artifact::TimedCue;
use crate::provider::Result;

mod ffmpeg;

pub use ffmpeg::FfmpegRenderer;

/// Everything a renderer needs to produce the final file.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub title: String,
    pub output_path: PathBuf,
    pub style: StyleSpec,
    pub transition: TransitionConfig,
    /// Narration audio, segment order.
    pub clips: Vec<PathBuf>,
    pub cues: Vec<TimedCue>,
    pub total_seconds: f64,
    pub encoder: OutputConfig,
    pub music: MusicConfig,
}

/// The produced file and its measured length.
#[derive(Debug, Clone)]
pub struct RenderedVideo {
    pub path: PathBuf,
    pub duration_seconds: f64,
}

/// Turns a [`RenderPlan`] into a video file.
#[async_trait]
pub trait Renderer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn render(&self, plan: &RenderPlan) -> Result<RenderedVideo>;
}

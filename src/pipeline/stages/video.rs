//! Video stage: hand the renderer a full plan and record what came back.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::pipeline::artifact::{StagePayload, VideoArtifact};
use crate::pipeline::stage::{RunState, Stage, StageContext};
use crate::pipeline::{StageError, StageName};
use crate::render::RenderPlan;

static NON_SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

pub(crate) struct VideoStage;

#[async_trait]
impl Stage for VideoStage {
    fn name(&self) -> StageName {
        StageName::Video
    }

    async fn run(&self, state: &RunState, ctx: &StageContext) -> Result<StagePayload, StageError> {
        let script = state
            .script
            .as_ref()
            .ok_or_else(|| StageError::missing(StageName::Video, "script"))?;
        let narration = state
            .narration
            .as_ref()
            .ok_or_else(|| StageError::missing(StageName::Video, "narration"))?;
        let timeline = state
            .timeline
            .as_ref()
            .ok_or_else(|| StageError::missing(StageName::Video, "timeline"))?;

        let plan = RenderPlan {
            title: script.title.clone(),
            output_path: output_path(&ctx.cfg.output.dir, &script.title),
            style: ctx.style.clone(),
            transition: ctx.cfg.video.transitions.clone(),
            clips: narration.clips.iter().map(|c| c.path.clone()).collect(),
            cues: timeline.cues.clone(),
            total_seconds: timeline.total_seconds,
            encoder: ctx.cfg.output.clone(),
            music: ctx.cfg.video.background_music.clone(),
        };

        let rendered = ctx
            .renderer
            .render(&plan)
            .await
            .map_err(|e| StageError::provider(StageName::Video, e))?;
        info!(path = %rendered.path.display(), renderer = ctx.renderer.name(), "video rendered");

        Ok(StagePayload::Video(VideoArtifact {
            path: rendered.path,
            duration_seconds: rendered.duration_seconds,
            style: ctx.style_name.clone(),
        }))
    }
}

fn output_path(dir: &Path, title: &str) -> PathBuf {
    dir.join(format!("{}.mp4", safe_stem(title)))
}

/// Filesystem-safe stem derived from the script title.
pub(super) fn safe_stem(title: &str) -> String {
    let lowered = title.to_lowercase();
    let slug = NON_SLUG_RE.replace_all(&lowered, "_");
    let slug = slug.trim_matches('_');
    if slug.is_empty() { "video".to_string() } else { slug.to_string() }
}

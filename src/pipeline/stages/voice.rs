//! Voice stage: synthesize every segment in order.

use async_trait::async_trait;
use tracing::debug;

use crate::pipeline::artifact::{Narration, StagePayload};
use crate::pipeline::stage::{RunState, Stage, StageContext};
use crate::pipeline::{StageError, StageName};

pub(crate) struct VoiceStage;

#[async_trait]
impl Stage for VoiceStage {
    fn name(&self) -> StageName {
        StageName::Voice
    }

    async fn run(&self, state: &RunState, ctx: &StageContext) -> Result<StagePayload, StageError> {
        let script = state
            .script
            .as_ref()
            .ok_or_else(|| StageError::missing(StageName::Voice, "script"))?;

        // Clip order must match segment order, and vendors rate limit
        // parallel synthesis.
        let mut clips = Vec::with_capacity(script.segments.len());
        let mut total_seconds = 0.0;
        for segment in &script.segments {
            let clip = ctx
                .providers
                .voice
                .synthesize(segment, &ctx.profile)
                .await
                .map_err(|e| StageError::provider(StageName::Voice, e))?;
            debug!(segment = %segment.id, seconds = format!("{:.1}", clip.duration_seconds), "clip ready");
            total_seconds += clip.duration_seconds;
            clips.push(clip);
        }

        Ok(StagePayload::Voice(Narration { clips, total_seconds }))
    }
}

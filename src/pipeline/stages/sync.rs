//! Sync stage: align planned visuals against real narration timing.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::pipeline::artifact::{
    AssetSource, Narration, StagePayload, TimedCue, Timeline, VisualAsset, VisualSet,
};
use crate::pipeline::stage::{RunState, Stage, StageContext};
use crate::pipeline::{StageError, StageName};

pub(crate) struct SyncStage;

#[async_trait]
impl Stage for SyncStage {
    fn name(&self) -> StageName {
        StageName::Sync
    }

    async fn run(&self, state: &RunState, _ctx: &StageContext) -> Result<StagePayload, StageError> {
        let visuals = state
            .visuals
            .as_ref()
            .ok_or_else(|| StageError::missing(StageName::Sync, "visuals"))?;
        let narration = state
            .narration
            .as_ref()
            .ok_or_else(|| StageError::missing(StageName::Sync, "narration"))?;

        let timeline = schedule(visuals, narration);
        debug!(
            cues = timeline.cues.len(),
            seconds = format!("{:.1}", timeline.total_seconds),
            "timeline aligned"
        );
        Ok(StagePayload::Sync(timeline))
    }
}

/// Spread each segment's assets evenly across that segment's real audio
/// window. Cues inherit clip order, so the result is start-ordered.
fn schedule(visuals: &VisualSet, narration: &Narration) -> Timeline {
    let mut by_segment: HashMap<&str, Vec<&VisualAsset>> = HashMap::new();
    for asset in &visuals.assets {
        by_segment.entry(asset.segment_id.as_str()).or_default().push(asset);
    }

    let mut cues = Vec::with_capacity(visuals.assets.len());
    let mut cursor = 0.0;
    for clip in &narration.clips {
        let window = clip.duration_seconds;
        if let Some(assets) = by_segment.remove(clip.segment_id.as_str()) {
            let slot = window / assets.len() as f64;
            for (i, asset) in assets.iter().enumerate() {
                cues.push(TimedCue {
                    asset_id: asset.id.clone(),
                    segment_id: asset.segment_id.clone(),
                    start_seconds: cursor + i as f64 * slot,
                    duration_seconds: asset.display_seconds.min(slot),
                    label: label_for(&asset.source),
                });
            }
        }
        cursor += window;
    }

    for (segment_id, assets) in by_segment {
        warn!(segment = segment_id, dropped = assets.len(), "visuals without a narration clip");
    }

    Timeline { cues, total_seconds: narration.total_seconds }
}

fn label_for(source: &AssetSource) -> String {
    match source {
        AssetSource::Screenshot { url } => url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.clone()),
        AssetSource::StyleCard { text } => text.clone(),
    }
}

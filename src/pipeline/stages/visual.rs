//! Visual stage: turn script markers into a concrete asset list.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::pipeline::artifact::{
    AssetSource, ScriptDraft, StagePayload, VisualAsset, VisualMarker, VisualSet,
};
use crate::pipeline::stage::{RunState, Stage, StageContext};
use crate::pipeline::{StageError, StageName};

pub(crate) struct VisualStage;

#[async_trait]
impl Stage for VisualStage {
    fn name(&self) -> StageName {
        StageName::Visual
    }

    async fn run(&self, state: &RunState, ctx: &StageContext) -> Result<StagePayload, StageError> {
        let script = state
            .script
            .as_ref()
            .ok_or_else(|| StageError::missing(StageName::Visual, "script"))?;
        let set = plan(script, ctx.cfg.video.screenshot_seconds);
        debug!(assets = set.assets.len(), "visuals planned");
        Ok(StagePayload::Visual(set))
    }
}

fn plan(script: &ScriptDraft, screenshot_seconds: f64) -> VisualSet {
    let mut assets = Vec::new();
    for segment in &script.segments {
        // A visual never lingers past its own segment.
        let display = if segment.estimated_seconds > 0.0 {
            screenshot_seconds.min(segment.estimated_seconds)
        } else {
            screenshot_seconds
        };
        let before = assets.len();

        for marker in &segment.markers {
            let source = match marker {
                VisualMarker::Screenshot { url } => match url::Url::parse(url) {
                    Ok(_) => AssetSource::Screenshot { url: url.clone() },
                    Err(e) => {
                        warn!(segment = %segment.id, url, error = %e, "dropping unparseable screenshot url");
                        continue;
                    }
                },
                VisualMarker::Card { description } => {
                    AssetSource::StyleCard { text: description.clone() }
                }
            };
            assets.push(VisualAsset {
                id: format!("a{:02}", assets.len() + 1),
                segment_id: segment.id.clone(),
                source,
                display_seconds: display,
            });
        }

        // Every segment gets at least one visual; fall back to a title card.
        if assets.len() == before {
            assets.push(VisualAsset {
                id: format!("a{:02}", assets.len() + 1),
                segment_id: segment.id.clone(),
                source: AssetSource::StyleCard { text: segment.title.clone() },
                display_seconds: display,
            });
        }
    }
    VisualSet { assets }
}

//! Quality gates applied to stage output before the run advances.
//!
//! A gate failure consumes an attempt like any transient error, so a flaky
//! generation gets retried within the stage's normal budget.

use crate::config::RuntimeConfig;
use crate::pipeline::artifact::StagePayload;
use crate::pipeline::stage::RunState;

/// Check one stage's payload. `None` means the gate passed; `Some` carries
/// the human-readable reason it did not.
pub(crate) fn evaluate(
    payload: &StagePayload,
    state: &RunState,
    cfg: &RuntimeConfig,
) -> Option<String> {
    match payload {
        StagePayload::Research(dossier) => {
            if dossier.snippets.is_empty() {
                return Some("research produced no usable sources".to_string());
            }
            None
        }
        StagePayload::Script(draft) => {
            let bounds = &cfg.script.sections;
            let count = draft.segments.len();
            if count == 0 {
                return Some("script has no segments".to_string());
            }
            if count < bounds.min as usize || count > bounds.max as usize {
                return Some(format!(
                    "script has {count} sections, expected {}..={}",
                    bounds.min, bounds.max
                ));
            }
            let target = f64::from(cfg.script.target_minutes);
            let deviation = (draft.estimated_minutes() - target).abs() / target;
            if deviation > cfg.quality_checks.script_length_tolerance {
                return Some(format!(
                    "script runs {:.1} min against a {target:.0} min target ({:.0}% off, {:.0}% allowed)",
                    draft.estimated_minutes(),
                    deviation * 100.0,
                    cfg.quality_checks.script_length_tolerance * 100.0
                ));
            }
            None
        }
        StagePayload::Visual(set) => {
            let minimum = cfg.quality_checks.min_visual_assets as usize;
            if set.assets.len() < minimum {
                return Some(format!(
                    "only {} visual assets planned, need at least {minimum}",
                    set.assets.len()
                ));
            }
            None
        }
        StagePayload::Voice(narration) => {
            if narration.clips.is_empty() || narration.total_seconds <= 0.0 {
                return Some("narration came back empty".to_string());
            }
            None
        }
        StagePayload::Sync(timeline) => {
            if timeline.cues.is_empty() {
                return Some("timeline has no cues".to_string());
            }
            None
        }
        StagePayload::Video(video) => {
            let audio_seconds = state.narration.as_ref().map_or(0.0, |n| n.total_seconds);
            let drift = (video.duration_seconds - audio_seconds).abs();
            if drift > cfg.quality_checks.max_sync_drift_seconds {
                return Some(format!(
                    "video is {drift:.1}s out of sync with narration (allowed {:.1}s)",
                    cfg.quality_checks.max_sync_drift_seconds
                ));
            }
            None
        }
        StagePayload::Metadata(meta) => {
            if meta.title.trim().is_empty() {
                return Some("metadata is missing a title".to_string());
            }
            None
        }
    }
}

//! Script stage: persona-driven generation plus marker extraction and timing.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::pipeline::artifact::{ScriptDraft, StagePayload, VisualMarker};
use crate::pipeline::stage::{RunState, Stage, StageContext};
use crate::pipeline::{StageError, StageName};

static SCREENSHOT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[SCREENSHOT:\s*(https?://[^\]\s]+)\s*\]").unwrap());
static VISUAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[VISUAL:\s*([^\]]+)\]").unwrap());

pub(crate) struct ScriptStage;

#[async_trait]
impl Stage for ScriptStage {
    fn name(&self) -> StageName {
        StageName::Script
    }

    async fn run(&self, state: &RunState, ctx: &StageContext) -> Result<StagePayload, StageError> {
        let draft = ctx
            .providers
            .llm
            .generate_script(&state.topic, &ctx.persona, ctx.cfg.script.target_minutes)
            .await
            .map_err(|e| StageError::provider(StageName::Script, e))?;
        let draft = shape(draft, ctx.cfg.script.words_per_minute);
        debug!(
            segments = draft.segments.len(),
            minutes = format!("{:.1}", draft.estimated_minutes()),
            "script shaped"
        );
        Ok(StagePayload::Script(draft))
    }
}

/// Extract inline markers, clean the narration, and lay segments out on an
/// estimated clock.
fn shape(mut draft: ScriptDraft, words_per_minute: u32) -> ScriptDraft {
    let wpm = f64::from(words_per_minute.max(1));
    let mut cursor = 0.0;
    let mut cleaned_texts = Vec::with_capacity(draft.segments.len());

    for segment in &mut draft.segments {
        let (narration, markers) = extract_markers(&segment.narration);
        segment.narration = narration;
        segment.markers = markers;
        segment.estimated_seconds = segment.word_count() as f64 / wpm * 60.0;
        segment.start_seconds = cursor;
        cursor += segment.estimated_seconds;
        cleaned_texts.push(segment.narration.clone());
    }

    draft.full_text = cleaned_texts.join("\n\n");
    draft.estimated_seconds = cursor;
    draft
}

/// Pull `[SCREENSHOT: url]` and `[VISUAL: description]` directives out of raw
/// narration, preserving their textual order.
fn extract_markers(raw: &str) -> (String, Vec<VisualMarker>) {
    let mut found: Vec<(usize, VisualMarker)> = SCREENSHOT_RE
        .captures_iter(raw)
        .map(|c| {
            let at = c.get(0).map_or(0, |m| m.start());
            (at, VisualMarker::Screenshot { url: c[1].trim().to_string() })
        })
        .collect();
    found.extend(VISUAL_RE.captures_iter(raw).map(|c| {
        let at = c.get(0).map_or(0, |m| m.start());
        (at, VisualMarker::Card { description: c[1].trim().to_string() })
    }));
    found.sort_by_key(|(at, _)| *at);

    let stripped = SCREENSHOT_RE.replace_all(raw, " ");
    let stripped = VISUAL_RE.replace_all(&stripped, " ");
    let cleaned = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    (cleaned, found.into_iter().map(|(_, marker)| marker).collect())
}

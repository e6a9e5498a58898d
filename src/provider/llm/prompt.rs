//! Shared prompt assembly and response parsing for script generation.
//!
//! All LLM providers ask for the same JSON shape and parse it the same way;
//! only the wire format around it differs per vendor. An unparseable
//! response maps to a transient `Unavailable` so the stage budget can retry
//! with a fresh generation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::config::{Persona, SectionBounds};
use crate::pipeline::artifact::{ScriptDraft, ScriptSegment};
use crate::provider::{ProviderError, Result};

static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap()
});

pub(crate) fn system_prompt(persona: &Persona) -> String {
    format!(
        "You write narration scripts for videos.\n\
         Tone: {tone}\n\
         Audience: {audience}\n\
         Style: {style}\n\
         Opener: {opener}\n\
         Where showing a live web page would help, inline \
         [SCREENSHOT: https://full-url] into the narration. For any other \
         visual, inline [VISUAL: short description]. Respond with JSON only, \
         no prose around it.",
        tone = persona.tone,
        audience = persona.audience,
        style = persona.style,
        opener = persona.opener_hook,
    )
}

pub(crate) fn user_prompt(topic: &str, target_minutes: u32, sections: &SectionBounds) -> String {
    format!(
        "Write a narrated video script about: {topic}\n\
         Target roughly {target_minutes} minutes of spoken narration.\n\
         Use {min} to {max} sections with kinds from: {kinds}.\n\
         Return JSON shaped exactly like:\n\
         {{\"title\": \"...\", \"sections\": [{{\"kind\": \"intro\", \
         \"title\": \"...\", \"narration\": \"...\"}}]}}",
        min = sections.min,
        max = sections.max,
        kinds = sections.kinds.join(", "),
    )
}

#[derive(Debug, Deserialize)]
struct WireScript {
    title: String,
    sections: Vec<WireSection>,
}

#[derive(Debug, Deserialize)]
struct WireSection {
    #[serde(default)]
    kind: String,
    title: String,
    narration: String,
}

/// Parse a model response into a raw draft.
///
/// Strips a surrounding markdown fence if present. The returned segments
/// carry no markers or timing yet; the script stage fills those in.
pub(crate) fn parse_script(provider: &str, topic: &str, raw: &str) -> Result<ScriptDraft> {
    let json_text = FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map_or(raw, |m| m.as_str())
        .trim();
    let wire: WireScript = serde_json::from_str(json_text).map_err(|e| {
        ProviderError::unavailable(provider, format!("unparseable script response: {e}"))
    })?;
    if wire.sections.is_empty() {
        return Err(ProviderError::unavailable(provider, "script response has no sections"));
    }
    let full_text = wire
        .sections
        .iter()
        .map(|s| s.narration.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let segments = wire
        .sections
        .into_iter()
        .enumerate()
        .map(|(i, s)| ScriptSegment {
            id: format!("s{:02}", i + 1),
            kind: if s.kind.is_empty() { "main".into() } else { s.kind },
            title: s.title,
            narration: s.narration,
            markers: Vec::new(),
            estimated_seconds: 0.0,
            start_seconds: 0.0,
        })
        .collect();
    Ok(ScriptDraft {
        topic: topic.to_string(),
        title: wire.title,
        segments,
        full_text,
        estimated_seconds: 0.0,
    })
}

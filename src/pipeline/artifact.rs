//! Typed payloads flowing between stages.
//!
//! Each stage produces exactly one [`StagePayload`] variant; the orchestrator
//! records it on the run and feeds the latest success per stage to downstream
//! stages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::StageName;

/// One search hit, ranked by source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSnippet {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// 0-based rank within the engine's response.
    pub rank: usize,
}

/// Condensed research handed to the script stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchDossier {
    pub topic: String,
    pub snippets: Vec<SourceSnippet>,
    pub key_facts: Vec<String>,
    pub summary: String,
    pub relevant_urls: Vec<String>,
}

/// Inline visual directive extracted from narration text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VisualMarker {
    /// `[SCREENSHOT: https://...]`
    Screenshot { url: String },
    /// `[VISUAL: description]`
    Card { description: String },
}

/// One narration section of the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSegment {
    pub id: String,
    /// Section kind as generated (`intro`, `main`, `outro`, ...).
    pub kind: String,
    pub title: String,
    /// Clean narration text, markers stripped.
    pub narration: String,
    pub markers: Vec<VisualMarker>,
    /// Estimated speech time from word count and configured pace.
    pub estimated_seconds: f64,
    /// Cumulative offset of this segment within the script.
    pub start_seconds: f64,
}

impl ScriptSegment {
    pub fn word_count(&self) -> usize {
        self.narration.split_whitespace().count()
    }
}

/// Generated script after marker extraction and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptDraft {
    pub topic: String,
    pub title: String,
    pub segments: Vec<ScriptSegment>,
    pub full_text: String,
    pub estimated_seconds: f64,
}

impl ScriptDraft {
    pub fn estimated_minutes(&self) -> f64 {
        self.estimated_seconds / 60.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetSource {
    Screenshot { url: String },
    StyleCard { text: String },
}

/// One visual shown during playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualAsset {
    pub id: String,
    pub segment_id: String,
    pub source: AssetSource,
    pub display_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualSet {
    pub assets: Vec<VisualAsset>,
}

/// One synthesized narration clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    pub segment_id: String,
    pub path: PathBuf,
    pub duration_seconds: f64,
}

/// All narration clips for a run, in segment order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narration {
    pub clips: Vec<AudioClip>,
    pub total_seconds: f64,
}

/// A visual scheduled onto the narration timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedCue {
    pub asset_id: String,
    pub segment_id: String,
    pub start_seconds: f64,
    pub duration_seconds: f64,
    /// Short label the renderer may draw.
    pub label: String,
}

/// Visuals aligned against actual narration timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub cues: Vec<TimedCue>,
    pub total_seconds: f64,
}

/// The rendered video on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoArtifact {
    pub path: PathBuf,
    pub duration_seconds: f64,
    /// Style name the video was rendered with.
    pub style: String,
}

/// Publishing metadata derived from the finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: String,
    pub language: String,
    pub style: String,
    pub persona: String,
    pub thumbnail_suggestions: Vec<String>,
    /// Where the metadata JSON was written.
    pub metadata_path: PathBuf,
}

/// Output of one stage invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum StagePayload {
    Research(ResearchDossier),
    Script(ScriptDraft),
    Visual(VisualSet),
    Voice(Narration),
    Sync(Timeline),
    Video(VideoArtifact),
    Metadata(VideoMetadata),
}

impl StagePayload {
    /// Which stage this payload belongs to.
    pub fn stage(&self) -> StageName {
        match self {
            StagePayload::Research(_) => StageName::Research,
            StagePayload::Script(_) => StageName::Script,
            StagePayload::Visual(_) => StageName::Visual,
            StagePayload::Voice(_) => StageName::Voice,
            StagePayload::Sync(_) => StageName::Sync,
            StagePayload::Video(_) => StageName::Video,
            StagePayload::Metadata(_) => StageName::Metadata,
        }
    }
}

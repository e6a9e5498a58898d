//! Pipeline state: the fixed stage set, run records, and failure taxonomy.
//!
//! A run walks `Research → Script → Visual → Voice → Sync → Video → Metadata`
//! under the [`Orchestrator`]. Every stage invocation, retries included, is
//! recorded as a [`StageResult`]; the run ends `Completed` or `Failed` and is
//! never reused.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::provider::ProviderError;

pub mod artifact;
mod orchestrator;
mod quality;
mod stage;
mod stages;

pub use artifact::StagePayload;
pub use orchestrator::{Orchestrator, RunHandle};
pub use stage::{RunState, Stage, StageContext};

/// The seven pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Research,
    Script,
    Visual,
    Voice,
    Sync,
    Video,
    Metadata,
}

impl StageName {
    pub const ALL: [StageName; 7] = [
        StageName::Research,
        StageName::Script,
        StageName::Visual,
        StageName::Voice,
        StageName::Sync,
        StageName::Video,
        StageName::Metadata,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Research => "research",
            StageName::Script => "script",
            StageName::Visual => "visual",
            StageName::Voice => "voice",
            StageName::Sync => "sync",
            StageName::Video => "video",
            StageName::Metadata => "metadata",
        }
    }

    /// 1-based position, for `3/7`-style progress lines.
    pub fn position(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).map_or(0, |i| i + 1)
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Serialize for RunId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for RunId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// Why a stage invocation failed.
#[derive(Debug, Error)]
pub enum StageCause {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The orchestrator's per-invocation deadline elapsed.
    #[error("deadline of {0}s elapsed")]
    DeadlineElapsed(u64),
    #[error("quality gate rejected output: {0}")]
    QualityGate(String),
    /// A required earlier-stage output is absent; the fixed ordering makes
    /// this unreachable unless the stage set itself is broken.
    #[error("missing {0} output from an earlier stage")]
    MissingInput(&'static str),
    /// Provider returned something the stage cannot use (e.g. unparseable
    /// script JSON). Retried: a fresh generation usually differs.
    #[error("malformed provider output: {0}")]
    Malformed(String),
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// A stage invocation failure, tagged with the stage that raised it.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {cause}")]
pub struct StageError {
    pub stage: StageName,
    pub cause: StageCause,
}

impl StageError {
    pub fn new(stage: StageName, cause: StageCause) -> Self {
        Self { stage, cause }
    }

    pub fn provider(stage: StageName, err: ProviderError) -> Self {
        Self::new(stage, StageCause::Provider(err))
    }

    pub fn missing(stage: StageName, what: &'static str) -> Self {
        Self::new(stage, StageCause::MissingInput(what))
    }

    pub fn malformed(stage: StageName, detail: impl Into<String>) -> Self {
        Self::new(stage, StageCause::Malformed(detail.into()))
    }

    /// Whether retrying the same invocation can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match &self.cause {
            StageCause::Provider(e) => e.is_transient(),
            StageCause::DeadlineElapsed(_)
            | StageCause::QualityGate(_)
            | StageCause::Malformed(_) => true,
            StageCause::MissingInput(_) | StageCause::Io(_) => false,
        }
    }
}

/// Failure category carried on a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Provider,
    QualityGate,
    Timeout,
    MissingInput,
    Malformed,
    Io,
    Cancelled,
}

/// Structured failure record on a `Failed` run. Serializable end to end; raw
/// provider errors never cross this boundary unwrapped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageName>,
    pub kind: FailureKind,
    pub retries_exhausted: bool,
    pub message: String,
}

impl RunFailure {
    pub fn cancelled(stage: Option<StageName>) -> Self {
        Self {
            stage,
            kind: FailureKind::Cancelled,
            retries_exhausted: false,
            message: "run cancelled".into(),
        }
    }

    pub fn from_stage_error(err: &StageError, retries_exhausted: bool) -> Self {
        let kind = match &err.cause {
            StageCause::Provider(_) => FailureKind::Provider,
            StageCause::DeadlineElapsed(_) => FailureKind::Timeout,
            StageCause::QualityGate(_) => FailureKind::QualityGate,
            StageCause::MissingInput(_) => FailureKind::MissingInput,
            StageCause::Malformed(_) => FailureKind::Malformed,
            StageCause::Io(_) => FailureKind::Io,
        };
        Self { stage: Some(err.stage), kind, retries_exhausted, message: err.to_string() }
    }
}

/// Where a run currently stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running { stage: StageName },
    Retrying { stage: StageName, attempt: u32 },
    Completed,
    Failed { failure: RunFailure },
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed { .. })
    }
}

/// Outcome of one stage invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageOutcome {
    Succeeded { payload: StagePayload },
    Failed { error: String, transient: bool },
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Succeeded { .. })
    }
}

/// Record of one stage invocation. Every attempt is kept, failures included.
#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    pub stage: StageName,
    /// 1-based attempt number within the stage's budget.
    pub attempt: u32,
    pub outcome: StageOutcome,
    /// Gate verdict for designated stages, `None` when the stage is ungated
    /// or the invocation failed before the gate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_passed: Option<bool>,
    pub elapsed_ms: u64,
}

/// One generation request from acceptance to terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub id: RunId,
    pub topic: String,
    pub status: RunStatus,
    pub results: Vec<StageResult>,
    /// Human-readable progress lines, mirrored to tracing.
    pub log: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Config snapshot the run executed under.
    #[serde(skip_serializing)]
    pub config: Arc<RuntimeConfig>,
}

impl PipelineRun {
    pub(crate) fn new(id: RunId, topic: impl Into<String>, config: Arc<RuntimeConfig>) -> Self {
        Self {
            id,
            topic: topic.into(),
            status: RunStatus::Pending,
            results: Vec::new(),
            log: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            config,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }

    /// The rendered video, if the run got that far.
    pub fn video(&self) -> Option<&artifact::VideoArtifact> {
        self.results.iter().rev().find_map(|r| match &r.outcome {
            StageOutcome::Succeeded { payload: StagePayload::Video(v) } => Some(v),
            _ => None,
        })
    }

    /// The derived publishing metadata, if the run completed.
    pub fn metadata(&self) -> Option<&artifact::VideoMetadata> {
        self.results.iter().rev().find_map(|r| match &r.outcome {
            StageOutcome::Succeeded { payload: StagePayload::Metadata(m) } => Some(m),
            _ => None,
        })
    }

    pub(crate) fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_fixed() {
        let names: Vec<&str> = StageName::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            ["research", "script", "visual", "voice", "sync", "video", "metadata"]
        );
        assert_eq!(StageName::Research.position(), 1);
        assert_eq!(StageName::Metadata.position(), 7);
    }

    #[test]
    fn stage_names_round_trip_through_serde() {
        let json = serde_json::to_string(&StageName::Sync).unwrap();
        assert_eq!(json, "\"sync\"");
        let back: StageName = serde_json::from_str("\"video\"").unwrap();
        assert_eq!(back, StageName::Video);
    }

    #[test]
    fn run_ids_are_unique_and_parseable() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);
        let parsed: RunId = a.to_string().parse().unwrap();
        assert_eq!(parsed, a);
    }

    #[test]
    fn transient_classification_follows_the_taxonomy() {
        let rate = StageError::provider(StageName::Script, ProviderError::rate_limited("claude"));
        assert!(rate.is_transient());
        let deadline = StageError::new(StageName::Voice, StageCause::DeadlineElapsed(30));
        assert!(deadline.is_transient());
        let auth = StageError::provider(
            StageName::Script,
            ProviderError::AuthFailed { provider: "claude".into(), detail: "no key".into() },
        );
        assert!(!auth.is_transient());
        let missing = StageError::missing(StageName::Sync, "narration");
        assert!(!missing.is_transient());
    }

    #[test]
    fn failure_record_hides_nothing_but_wraps_everything() {
        let err = StageError::provider(StageName::Research, ProviderError::Unavailable {
            provider: "google".into(),
            detail: "502".into(),
        });
        let failure = RunFailure::from_stage_error(&err, true);
        assert_eq!(failure.stage, Some(StageName::Research));
        assert_eq!(failure.kind, FailureKind::Provider);
        assert!(failure.retries_exhausted);
        assert!(failure.message.contains("research"));
        serde_json::to_string(&failure).unwrap();
    }

    #[test]
    fn status_serializes_with_a_state_tag() {
        let status = RunStatus::Retrying { stage: StageName::Voice, attempt: 2 };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "retrying");
        assert_eq!(json["stage"], "voice");
        assert_eq!(json["attempt"], 2);
    }
}

//! End-to-end pipeline runs against in-process stub providers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use showrun::config::{ConfigTree, Persona, VoiceProfile};
use showrun::pipeline::artifact::{
    AudioClip, ScriptDraft, ScriptSegment, SourceSnippet, StagePayload,
};
use showrun::pipeline::FailureKind;
use showrun::provider::{LlmProvider, ProviderError, SearchProvider, VoiceProvider};
use showrun::render::{RenderPlan, RenderedVideo, Renderer};
use showrun::{
    ConfigError, Orchestrator, PipelineRun, ProviderRegistry, RunStatus, StageName, StageOutcome,
};

/// 7 segments of this many words sit near the 8 minute target at 150 wpm.
const SEGMENT_WORDS: usize = 170;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("showrun-e2e-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// Builtin defaults extended with stub provider selections and a scratch
/// output directory.
fn stub_tree(out_dir: &Path) -> ConfigTree {
    ConfigTree::from_value(json!({
        "llm": {"provider": "stub_llm", "model": {"stub_llm": "stub-script-1"}},
        "search": {"provider": "stub_search"},
        "voice": {"provider": "stub_voice", "model": {"stub_voice": "stub-tts-1"}},
        "output": {
            "dir": out_dir.to_string_lossy(),
            "temp_dir": out_dir.join("temp").to_string_lossy(),
        },
    }))
    .expect("stub config merges over builtins")
}

fn well_formed_draft(topic: &str, sections: usize) -> ScriptDraft {
    let filler = vec!["insight"; SEGMENT_WORDS].join(" ");
    let segments = (0..sections)
        .map(|i| {
            let narration = match i {
                0 => format!("[SCREENSHOT: https://anthropic.com/news] {filler}"),
                1 => format!("[VISUAL: benchmark chart] {filler}"),
                _ => filler.clone(),
            };
            ScriptSegment {
                id: format!("s{:02}", i + 1),
                kind: match i {
                    0 => "intro".to_string(),
                    n if n + 1 == sections => "outro".to_string(),
                    _ => "main".to_string(),
                },
                title: format!("Part {}", i + 1),
                narration,
                markers: vec![],
                estimated_seconds: 0.0,
                start_seconds: 0.0,
            }
        })
        .collect();
    ScriptDraft {
        topic: topic.to_string(),
        title: format!("{topic} Explained"),
        segments,
        full_text: String::new(),
        estimated_seconds: 0.0,
    }
}

#[derive(Clone, Default)]
struct StubLlm {
    calls: Arc<AtomicUsize>,
    /// Calls that fail with `RateLimited` before one succeeds.
    rate_limited_first: usize,
    /// Calls that return a 2-section draft (fails the script gate) first.
    thin_first: usize,
    auth_always_fails: bool,
}

#[async_trait]
impl LlmProvider for StubLlm {
    fn name(&self) -> &'static str {
        "stub_llm"
    }

    async fn generate_script(
        &self,
        topic: &str,
        _persona: &Persona,
        _target_minutes: u32,
    ) -> Result<ScriptDraft, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.auth_always_fails {
            return Err(ProviderError::auth("stub_llm", "key rejected"));
        }
        if n < self.rate_limited_first {
            return Err(ProviderError::rate_limited("stub_llm"));
        }
        if n < self.rate_limited_first + self.thin_first {
            return Ok(well_formed_draft(topic, 2));
        }
        Ok(well_formed_draft(topic, 7))
    }
}

#[derive(Clone, Default)]
struct StubSearch {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SearchProvider for StubSearch {
    fn name(&self) -> &'static str {
        "stub_search"
    }

    async fn research(&self, _topic: &str) -> Result<Vec<SourceSnippet>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // one duplicate URL on purpose
        Ok(vec![
            SourceSnippet {
                title: "Launch post".to_string(),
                url: "https://anthropic.com/news".to_string(),
                snippet: "Anthropic announced a new frontier model today".to_string(),
                rank: 0,
            },
            SourceSnippet {
                title: "Benchmarks".to_string(),
                url: "https://example.com/benchmarks".to_string(),
                snippet: "Benchmark results improved across reasoning suites".to_string(),
                rank: 1,
            },
            SourceSnippet {
                title: "Launch post again".to_string(),
                url: "https://anthropic.com/news".to_string(),
                snippet: "duplicate".to_string(),
                rank: 2,
            },
        ])
    }
}

#[derive(Clone, Default)]
struct StubVoice {
    calls: Arc<AtomicUsize>,
    /// When set, signal on first synthesis and then block until cancelled.
    hang: Option<Arc<Notify>>,
}

#[async_trait]
impl VoiceProvider for StubVoice {
    fn name(&self) -> &'static str {
        "stub_voice"
    }

    async fn synthesize(
        &self,
        segment: &ScriptSegment,
        profile: &VoiceProfile,
    ) -> Result<AudioClip, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(started) = &self.hang {
            started.notify_one();
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(AudioClip {
            segment_id: segment.id.clone(),
            path: profile.temp_dir.join(format!("{}.mp3", segment.id)),
            duration_seconds: segment.word_count() as f64 / 2.5,
        })
    }
}

struct StubRenderer;

#[async_trait]
impl Renderer for StubRenderer {
    fn name(&self) -> &'static str {
        "stub_renderer"
    }

    async fn render(&self, plan: &RenderPlan) -> Result<RenderedVideo, ProviderError> {
        Ok(RenderedVideo { path: plan.output_path.clone(), duration_seconds: plan.total_seconds })
    }
}

fn stub_registry(llm: StubLlm, search: StubSearch, voice: StubVoice) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register_llm("stub_llm", move |_| Arc::new(llm.clone()));
    registry.register_search("stub_search", move |_| Arc::new(search.clone()));
    registry.register_voice("stub_voice", move |_| Arc::new(voice.clone()));
    registry
}

fn engine(llm: StubLlm, search: StubSearch, voice: StubVoice) -> Arc<Orchestrator> {
    Arc::new(Orchestrator::new(stub_registry(llm, search, voice), Arc::new(StubRenderer)))
}

fn stage_payload(run: &PipelineRun, stage: StageName) -> &StagePayload {
    run.results
        .iter()
        .rev()
        .find_map(|r| match &r.outcome {
            StageOutcome::Succeeded { payload } if r.stage == stage => Some(payload),
            _ => None,
        })
        .expect("stage should have a successful payload")
}

#[tokio::test]
async fn full_run_walks_all_seven_stages_in_order() {
    let out = scratch("full-run");
    let cfg = Arc::new(stub_tree(&out).resolve(&[], &[], &[]).unwrap());
    let orchestrator = engine(StubLlm::default(), StubSearch::default(), StubVoice::default());

    let run = orchestrator.run("Claude 4 just launched", cfg).await.unwrap();

    assert!(run.succeeded(), "status was {:?}", run.status);
    let order: Vec<StageName> = run.results.iter().map(|r| r.stage).collect();
    assert_eq!(order, StageName::ALL);
    assert!(run.results.iter().all(|r| r.outcome.is_success()));
    assert!(run.finished_at.is_some());

    // gate verdicts only where gates are designated
    for result in &run.results {
        match result.stage {
            StageName::Script | StageName::Video => assert_eq!(result.quality_passed, Some(true)),
            _ => assert_eq!(result.quality_passed, None),
        }
    }

    let StagePayload::Metadata(meta) = stage_payload(&run, StageName::Metadata) else {
        panic!("metadata payload expected");
    };
    assert_eq!(meta.style, "dark_tech");
    assert_eq!(meta.persona, "tech_enthusiast");
    assert!(meta.title.contains("Claude 4 just launched"));
    assert!(meta.tags.iter().any(|t| t == "claude"));

    // the metadata file really landed next to the video path
    let written = std::fs::read_to_string(&meta.metadata_path).unwrap();
    assert!(written.contains("dark_tech"));

    let StagePayload::Video(video) = stage_payload(&run, StageName::Video) else {
        panic!("video payload expected");
    };
    assert!(video.path.to_string_lossy().ends_with("claude_4_just_launched_explained.mp4"));

    let StagePayload::Sync(timeline) = stage_payload(&run, StageName::Sync) else {
        panic!("timeline payload expected");
    };
    assert!(!timeline.cues.is_empty());
    assert!(timeline
        .cues
        .windows(2)
        .all(|w| w[0].start_seconds <= w[1].start_seconds));

    let StagePayload::Research(dossier) = stage_payload(&run, StageName::Research) else {
        panic!("research payload expected");
    };
    assert_eq!(dossier.snippets.len(), 2, "duplicate url should be dropped");

    let _ = std::fs::remove_dir_all(&out);
}

#[tokio::test]
async fn transient_failures_retry_within_the_stage_budget() {
    let out = scratch("retry");
    let tree = stub_tree(&out);
    let fast = [showrun::Override::parse("stages.script.backoff_ms=1").unwrap()];
    let cfg = Arc::new(tree.resolve(&[], &fast, &[]).unwrap());

    let llm = StubLlm { rate_limited_first: 2, ..StubLlm::default() };
    let orchestrator = engine(llm.clone(), StubSearch::default(), StubVoice::default());

    let run = orchestrator.run("Claude 4 just launched", cfg).await.unwrap();

    assert!(run.succeeded(), "status was {:?}", run.status);
    let script: Vec<_> = run.results.iter().filter(|r| r.stage == StageName::Script).collect();
    assert_eq!(script.len(), 3, "two failures plus the success");
    assert!(!script[0].outcome.is_success());
    assert!(!script[1].outcome.is_success());
    assert!(script[2].outcome.is_success());
    assert_eq!(script[2].attempt, 3);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 3);

    let _ = std::fs::remove_dir_all(&out);
}

#[tokio::test]
async fn exhausted_budget_fails_the_run() {
    let out = scratch("exhausted");
    let fast = [showrun::Override::parse("stages.script.backoff_ms=1").unwrap()];
    let cfg = Arc::new(stub_tree(&out).resolve(&[], &fast, &[]).unwrap());

    let llm = StubLlm { rate_limited_first: 99, ..StubLlm::default() };
    let orchestrator = engine(llm, StubSearch::default(), StubVoice::default());

    let run = orchestrator.run("Claude 4 just launched", cfg).await.unwrap();

    let RunStatus::Failed { failure } = &run.status else {
        panic!("expected failure, got {:?}", run.status);
    };
    assert_eq!(failure.stage, Some(StageName::Script));
    assert_eq!(failure.kind, FailureKind::Provider);
    assert!(failure.retries_exhausted);
    // one research result plus the full script budget
    assert_eq!(run.results.len(), 4);
    assert_eq!(run.results.iter().filter(|r| r.stage == StageName::Script).count(), 3);

    let _ = std::fs::remove_dir_all(&out);
}

#[tokio::test]
async fn fatal_errors_do_not_retry() {
    let out = scratch("fatal");
    let cfg = Arc::new(stub_tree(&out).resolve(&[], &[], &[]).unwrap());

    let llm = StubLlm { auth_always_fails: true, ..StubLlm::default() };
    let orchestrator = engine(llm.clone(), StubSearch::default(), StubVoice::default());

    let run = orchestrator.run("Claude 4 just launched", cfg).await.unwrap();

    let RunStatus::Failed { failure } = &run.status else {
        panic!("expected failure, got {:?}", run.status);
    };
    assert_eq!(failure.stage, Some(StageName::Script));
    assert!(!failure.retries_exhausted, "auth failures are not retried");
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    assert_eq!(run.results.iter().filter(|r| r.stage == StageName::Script).count(), 1);

    let _ = std::fs::remove_dir_all(&out);
}

#[tokio::test]
async fn quality_gate_failures_consume_attempts_then_pass() {
    let out = scratch("gate");
    let fast = [showrun::Override::parse("stages.script.backoff_ms=1").unwrap()];
    let cfg = Arc::new(stub_tree(&out).resolve(&[], &fast, &[]).unwrap());

    let llm = StubLlm { thin_first: 1, ..StubLlm::default() };
    let orchestrator = engine(llm, StubSearch::default(), StubVoice::default());

    let run = orchestrator.run("Claude 4 just launched", cfg).await.unwrap();

    assert!(run.succeeded(), "status was {:?}", run.status);
    let script: Vec<_> = run.results.iter().filter(|r| r.stage == StageName::Script).collect();
    assert_eq!(script.len(), 2);
    assert_eq!(script[0].quality_passed, Some(false));
    match &script[0].outcome {
        StageOutcome::Failed { error, transient } => {
            assert!(error.contains("quality gate"), "got: {error}");
            assert!(transient);
        }
        StageOutcome::Succeeded { .. } => panic!("first attempt should fail the gate"),
    }
    assert_eq!(script[1].quality_passed, Some(true));

    let _ = std::fs::remove_dir_all(&out);
}

#[tokio::test]
async fn cancellation_during_voice_stops_the_run_cleanly() {
    let out = scratch("cancel");
    let cfg = Arc::new(stub_tree(&out).resolve(&[], &[], &[]).unwrap());

    let started = Arc::new(Notify::new());
    let voice = StubVoice { hang: Some(Arc::clone(&started)), ..StubVoice::default() };
    let orchestrator = engine(StubLlm::default(), StubSearch::default(), voice);

    let handle = Arc::clone(&orchestrator)
        .spawn("Claude 4 just launched", cfg)
        .await
        .expect("spawn accepts the config");
    let id = handle.id;

    started.notified().await;
    assert!(orchestrator.cancel(id).await, "run should be cancellable while voicing");

    let run = handle.join().await.unwrap();
    let RunStatus::Failed { failure } = &run.status else {
        panic!("expected cancellation, got {:?}", run.status);
    };
    assert_eq!(failure.kind, FailureKind::Cancelled);
    assert_eq!(failure.stage, Some(StageName::Voice));

    // research, script, visual succeeded; the interrupted voice attempt left
    // no record
    let order: Vec<StageName> = run.results.iter().map(|r| r.stage).collect();
    assert_eq!(order, [StageName::Research, StageName::Script, StageName::Visual]);
    assert!(run.finished_at.is_some());

    // the run is gone once terminal
    assert!(!orchestrator.cancel(id).await);

    let _ = std::fs::remove_dir_all(&out);
}

#[tokio::test]
async fn providers_are_materialized_fresh_per_run() {
    static LLM_BUILDS: AtomicUsize = AtomicUsize::new(0);
    static SEARCH_BUILDS: AtomicUsize = AtomicUsize::new(0);
    static VOICE_BUILDS: AtomicUsize = AtomicUsize::new(0);

    let out = scratch("materialize");
    let cfg = Arc::new(stub_tree(&out).resolve(&[], &[], &[]).unwrap());

    let mut registry = ProviderRegistry::new();
    registry.register_llm("stub_llm", |_| {
        LLM_BUILDS.fetch_add(1, Ordering::SeqCst);
        Arc::new(StubLlm::default())
    });
    registry.register_search("stub_search", |_| {
        SEARCH_BUILDS.fetch_add(1, Ordering::SeqCst);
        Arc::new(StubSearch::default())
    });
    registry.register_voice("stub_voice", |_| {
        VOICE_BUILDS.fetch_add(1, Ordering::SeqCst);
        Arc::new(StubVoice::default())
    });
    let orchestrator = Arc::new(Orchestrator::new(registry, Arc::new(StubRenderer)));

    orchestrator.run("Claude 4 just launched", Arc::clone(&cfg)).await.unwrap();
    orchestrator.run("Claude 4 just launched", cfg).await.unwrap();

    assert_eq!(LLM_BUILDS.load(Ordering::SeqCst), 2);
    assert_eq!(SEARCH_BUILDS.load(Ordering::SeqCst), 2);
    assert_eq!(VOICE_BUILDS.load(Ordering::SeqCst), 2);

    let _ = std::fs::remove_dir_all(&out);
}

#[tokio::test]
async fn embedders_can_register_their_own_vendors() {
    let out = scratch("custom");
    let tree = ConfigTree::from_value(json!({
        "llm": {"provider": "mistral", "model": {"mistral": "mistral-large"}},
        "search": {"provider": "stub_search"},
        "voice": {"provider": "stub_voice", "model": {"stub_voice": "stub-tts-1"}},
        "output": {
            "dir": out.to_string_lossy(),
            "temp_dir": out.join("temp").to_string_lossy(),
        },
    }))
    .unwrap();
    let cfg = Arc::new(tree.resolve(&[], &[], &[]).unwrap());

    let mut registry = stub_registry(StubLlm::default(), StubSearch::default(), StubVoice::default());
    assert!(registry.register_llm("mistral", |_| Arc::new(StubLlm::default())));
    let orchestrator = Arc::new(Orchestrator::new(registry, Arc::new(StubRenderer)));

    let run = orchestrator.run("Claude 4 just launched", cfg).await.unwrap();
    assert!(run.succeeded(), "status was {:?}", run.status);

    let _ = std::fs::remove_dir_all(&out);
}

#[tokio::test]
async fn unknown_provider_selection_fails_before_any_call() {
    let out = scratch("unknown");
    let tree = ConfigTree::from_value(json!({
        "llm": {"provider": "nope", "model": {"nope": "nope-1"}},
        "search": {"provider": "stub_search"},
        "voice": {"provider": "stub_voice", "model": {"stub_voice": "stub-tts-1"}},
    }))
    .unwrap();
    let cfg = Arc::new(tree.resolve(&[], &[], &[]).unwrap());

    let search = StubSearch::default();
    let orchestrator = engine(StubLlm::default(), search.clone(), StubVoice::default());

    let err = orchestrator.run("Claude 4 just launched", cfg).await.unwrap_err();
    let ConfigError::UnknownProvider { identifier, .. } = &err else {
        panic!("expected unknown provider, got {err:?}");
    };
    assert_eq!(identifier, "nope");
    assert!(err.to_string().contains("stub_llm"), "candidates should be listed: {err}");
    assert_eq!(search.calls.load(Ordering::SeqCst), 0, "no provider call may happen");

    let _ = std::fs::remove_dir_all(&out);
}

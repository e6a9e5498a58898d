//! Run driver: stage sequencing, retries, deadlines, gates, cancellation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::Rng;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{ConfigError, RuntimeConfig};
use crate::pipeline::quality;
use crate::pipeline::stage::{stage_set, RunState, StageContext};
use crate::pipeline::{
    PipelineRun, RunFailure, RunId, RunStatus, StageCause, StageError, StageName, StageOutcome,
    StageResult,
};
use crate::provider::ProviderRegistry;
use crate::render::Renderer;

/// Retry delays never exceed this, whatever the configured base.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Drives topics through the seven stages. One orchestrator serves many
/// runs; each run gets fresh provider instances and its own cancel channel.
pub struct Orchestrator {
    registry: ProviderRegistry,
    renderer: Arc<dyn Renderer>,
    active: Mutex<HashMap<RunId, watch::Sender<bool>>>,
}

/// Handle to a run started with [`Orchestrator::spawn`].
pub struct RunHandle {
    pub id: RunId,
    task: JoinHandle<PipelineRun>,
}

impl RunHandle {
    /// Wait for the run to reach a terminal state.
    pub async fn join(self) -> Result<PipelineRun, tokio::task::JoinError> {
        self.task.await
    }
}

impl Orchestrator {
    pub fn new(registry: ProviderRegistry, renderer: Arc<dyn Renderer>) -> Self {
        Self { registry, renderer, active: Mutex::new(HashMap::new()) }
    }

    /// Drive one topic to a terminal state on the current task.
    ///
    /// Provider selection and persona, style, and voice resolution happen
    /// before the first stage; a bad selection fails here with no run record.
    pub async fn run(
        &self,
        topic: &str,
        cfg: Arc<RuntimeConfig>,
    ) -> Result<PipelineRun, ConfigError> {
        let ctx = self.prepare(&cfg)?;
        let id = RunId::new();
        let cancel = self.register(id).await;
        let run = self.execute(id, topic, ctx, cancel).await;
        self.active.lock().await.remove(&id);
        Ok(run)
    }

    /// Start a run on its own task. The returned handle carries the id that
    /// [`Orchestrator::cancel`] targets; the id is cancellable as soon as
    /// this returns.
    pub async fn spawn(
        self: Arc<Self>,
        topic: impl Into<String>,
        cfg: Arc<RuntimeConfig>,
    ) -> Result<RunHandle, ConfigError> {
        let ctx = self.prepare(&cfg)?;
        let id = RunId::new();
        let cancel = self.register(id).await;
        let topic = topic.into();
        let task = tokio::spawn(async move {
            let run = self.execute(id, &topic, ctx, cancel).await;
            self.active.lock().await.remove(&id);
            run
        });
        Ok(RunHandle { id, task })
    }

    /// Request cancellation. Returns `false` when the run is unknown or
    /// already finished.
    pub async fn cancel(&self, id: RunId) -> bool {
        let active = self.active.lock().await;
        active.get(&id).is_some_and(|tx| tx.send(true).is_ok())
    }

    /// Ids of runs currently in flight.
    pub async fn active_runs(&self) -> Vec<RunId> {
        self.active.lock().await.keys().copied().collect()
    }

    async fn register(&self, id: RunId) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        self.active.lock().await.insert(id, tx);
        rx
    }

    /// Materialize providers and resolve the persona, style, and voice
    /// profile the whole run will use.
    fn prepare(&self, cfg: &Arc<RuntimeConfig>) -> Result<StageContext, ConfigError> {
        let providers = self.registry.materialize(cfg)?;
        let persona = cfg.persona().cloned().ok_or_else(|| {
            ConfigError::invalid("script.persona", format!("unknown persona '{}'", cfg.script.persona))
        })?;
        let style = cfg.style().cloned().ok_or_else(|| {
            ConfigError::invalid("video.style", format!("unknown style '{}'", cfg.video.style))
        })?;
        let profile = cfg.voice_profile().ok_or_else(|| {
            ConfigError::invalid(
                "voice.provider",
                format!("no voice model configured for '{}'", cfg.voice.provider),
            )
        })?;
        Ok(StageContext {
            cfg: Arc::clone(cfg),
            providers,
            renderer: Arc::clone(&self.renderer),
            persona,
            style_name: cfg.video.style.clone(),
            style,
            profile,
        })
    }

    async fn execute(
        &self,
        id: RunId,
        topic: &str,
        ctx: StageContext,
        mut cancel: watch::Receiver<bool>,
    ) -> PipelineRun {
        let cfg = Arc::clone(&ctx.cfg);
        let mut run = PipelineRun::new(id, topic, Arc::clone(&cfg));
        let mut state = RunState::new(topic);
        info!(run = %id, topic, llm = %cfg.llm.provider, voice = %cfg.voice.provider, "run accepted");
        run.push_log(format!("run {id} accepted for \"{topic}\""));

        for stage in stage_set() {
            let name = stage.name();
            let policy = *cfg.policy(name);
            // A zero deadline means effectively unbounded.
            let deadline = if policy.timeout_seconds == 0 {
                Duration::from_secs(86_400)
            } else {
                Duration::from_secs(policy.timeout_seconds)
            };
            let mut attempt: u32 = 0;

            loop {
                attempt += 1;
                run.status = if attempt == 1 {
                    RunStatus::Running { stage: name }
                } else {
                    RunStatus::Retrying { stage: name, attempt }
                };
                run.push_log(format!(
                    "stage {}/7 {name} (attempt {attempt}/{})",
                    name.position(),
                    policy.attempts
                ));
                info!(run = %id, stage = %name, attempt, "stage started");

                let started = Instant::now();
                let invoked = tokio::select! {
                    _ = cancel.changed() => {
                        mark_cancelled(&mut run, name);
                        return run;
                    }
                    result = tokio::time::timeout(deadline, stage.run(&state, &ctx)) => result,
                };
                let elapsed_ms = started.elapsed().as_millis() as u64;

                let mut gate_failed = false;
                let result = match invoked {
                    Err(_) => {
                        Err(StageError::new(name, StageCause::DeadlineElapsed(policy.timeout_seconds)))
                    }
                    Ok(Err(e)) => Err(e),
                    Ok(Ok(payload)) => {
                        if let Some(reason) = cfg
                            .is_gated(name)
                            .then(|| quality::evaluate(&payload, &state, &cfg))
                            .flatten()
                        {
                            gate_failed = true;
                            Err(StageError::new(name, StageCause::QualityGate(reason)))
                        } else {
                            Ok(payload)
                        }
                    }
                };

                match result {
                    Ok(payload) => {
                        state.absorb(&payload);
                        run.results.push(StageResult {
                            stage: name,
                            attempt,
                            outcome: StageOutcome::Succeeded { payload },
                            quality_passed: cfg.is_gated(name).then_some(true),
                            elapsed_ms,
                        });
                        run.push_log(format!("stage {}/7 {name} done in {elapsed_ms}ms", name.position()));
                        info!(run = %id, stage = %name, attempt, elapsed_ms, "stage succeeded");
                        break;
                    }
                    Err(err) => {
                        let transient = err.is_transient();
                        warn!(run = %id, stage = %name, attempt, transient, error = %err, "stage failed");
                        run.push_log(format!("stage {}/7 {name} failed: {err}", name.position()));
                        run.results.push(StageResult {
                            stage: name,
                            attempt,
                            outcome: StageOutcome::Failed { error: err.to_string(), transient },
                            quality_passed: if gate_failed { Some(false) } else { None },
                            elapsed_ms,
                        });

                        if transient && attempt < policy.attempts {
                            let delay = backoff_delay(policy.backoff_ms, attempt);
                            run.push_log(format!(
                                "retrying {name} in {}ms ({}/{} attempts used)",
                                delay.as_millis(),
                                attempt,
                                policy.attempts
                            ));
                            tokio::select! {
                                _ = cancel.changed() => {
                                    mark_cancelled(&mut run, name);
                                    return run;
                                }
                                () = tokio::time::sleep(delay) => {}
                            }
                            continue;
                        }

                        let failure = RunFailure::from_stage_error(&err, transient);
                        run.push_log(format!("run failed at {name}: {err}"));
                        warn!(run = %id, stage = %name, "run failed");
                        run.status = RunStatus::Failed { failure };
                        run.finished_at = Some(Utc::now());
                        return run;
                    }
                }
            }
        }

        run.status = RunStatus::Completed;
        run.finished_at = Some(Utc::now());
        run.push_log("run completed".to_string());
        info!(run = %id, stages = run.results.len(), "run completed");
        run
    }
}

fn mark_cancelled(run: &mut PipelineRun, stage: StageName) {
    warn!(run = %run.id, stage = %stage, "run cancelled");
    run.push_log(format!("cancelled during {stage}"));
    run.status = RunStatus::Failed { failure: RunFailure::cancelled(Some(stage)) };
    run.finished_at = Some(Utc::now());
}

/// Exponential backoff from the stage's base, with jitter so parallel runs
/// spread out, capped at [`MAX_BACKOFF`].
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    if base_ms == 0 {
        return Duration::ZERO;
    }
    let doubled = base_ms.saturating_mul(1_u64 << (attempt - 1).min(16));
    let jitter = rand::thread_rng().gen_range(0..=doubled / 4);
    Duration::from_millis(doubled.saturating_add(jitter)).min(MAX_BACKOFF)
}

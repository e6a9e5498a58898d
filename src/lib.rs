//! `showrun` - Topic-to-video pipeline orchestration
//!
//! # Features
//!
//! - **Layered configuration**: builtin defaults < config file < topic file <
//!   CLI `--set` < request overrides, resolved into one immutable snapshot
//! - **Pluggable providers**: LLM, web search, and TTS vendors selected by
//!   identifier through a capability registry
//! - **Staged pipeline**: Research → Script → Visual → Voice → Sync → Video →
//!   Metadata with quality gates, per-stage retries, timeouts, and
//!   cancellation
//! - **Two front ends**: a clap CLI and an axum REST server over the same
//!   engine
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use showrun::config::ConfigTree;
//! use showrun::pipeline::Orchestrator;
//! use showrun::provider::ProviderRegistry;
//! use showrun::render::FfmpegRenderer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = Arc::new(ConfigTree::builtin().resolve(&[], &[], &[])?);
//!     let engine = Orchestrator::new(ProviderRegistry::with_defaults(), Arc::new(FfmpegRenderer::new()));
//!     let run = engine.run("Claude 4 just launched", cfg).await?;
//!     println!("{} finished: {:?}", run.id, run.status);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod pipeline;
pub mod provider;
pub mod render;

pub use api::{router, serve, AppState};
pub use config::{ConfigError, ConfigTree, Override, RuntimeConfig};
pub use pipeline::{
    Orchestrator, PipelineRun, RunHandle, RunId, RunStatus, StageName, StageOutcome, StageResult,
};
pub use provider::{
    LlmProvider, ProviderError, ProviderRegistry, Providers, SearchProvider, VoiceProvider,
};
pub use render::{FfmpegRenderer, RenderPlan, RenderedVideo, Renderer};

/// Version of showrun
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

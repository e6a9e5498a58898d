//! HTTP surface: one-shot generation plus config and health introspection.
//!
//! `POST /generate` is synchronous: the response carries the finished run,
//! success or failure. Request overrides layer above the server's CLI
//! overrides, which layer above the config file and builtins.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{ConfigError, ConfigTree, Override};
use crate::pipeline::{Orchestrator, PipelineRun, RunFailure, RunId, RunStatus};

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub tree: Arc<ConfigTree>,
    /// `--set` overrides the server was started with.
    pub cli_overrides: Arc<Vec<Override>>,
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub topic: String,
    /// Dotted-path overrides, applied above every other layer.
    #[serde(default)]
    pub overrides: serde_json::Map<String, serde_json::Value>,
}

/// Completed-run summary returned by `POST /generate`.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub run_id: RunId,
    pub status: RunStatus,
    pub title: Option<String>,
    pub video_path: Option<String>,
    pub metadata_path: Option<String>,
    pub stages: Vec<StageBrief>,
    pub log: Vec<String>,
}

/// One stage invocation, without its payload.
#[derive(Debug, Serialize)]
pub struct StageBrief {
    pub stage: String,
    pub attempt: u32,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_passed: Option<bool>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// `POST /generate` failure payload: the run record minus artifacts.
#[derive(Debug, Serialize)]
struct FailureBody {
    code: String,
    failure: RunFailure,
    run_id: RunId,
    stages: Vec<StageBrief>,
    log: Vec<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/config", get(effective_config))
        .route("/generate", post(generate))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "http server listening");
    axum::serve(listener, router(state)).await.context("server terminated")
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "version": crate::VERSION}))
}

/// The config a request without overrides would run under.
async fn effective_config(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let cfg = state.tree.resolve(&[], &state.cli_overrides, &[]).map_err(map_config_error)?;
    Ok(Json(cfg))
}

async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let topic = request.topic.trim();
    if topic.is_empty() {
        let body = ErrorBody { code: "invalid_argument".into(), message: "topic is empty".into() };
        return Err((StatusCode::BAD_REQUEST, Json(as_json(&body))));
    }

    let request_overrides = Override::from_map(&request.overrides);
    let cfg = state
        .tree
        .resolve(&[], &state.cli_overrides, &request_overrides)
        .map_err(|e| widen(map_config_error(e)))?;

    let run = state
        .orchestrator
        .run(topic, Arc::new(cfg))
        .await
        .map_err(|e| widen(map_config_error(e)))?;

    match &run.status {
        RunStatus::Failed { failure } => {
            let body = FailureBody {
                code: "run_failed".into(),
                failure: failure.clone(),
                run_id: run.id,
                stages: briefs(&run),
                log: run.log.clone(),
            };
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(as_json(&body))))
        }
        _ => Ok(Json(summarize(&run))),
    }
}

fn summarize(run: &PipelineRun) -> GenerateResponse {
    GenerateResponse {
        run_id: run.id,
        status: run.status.clone(),
        title: run.metadata().map(|m| m.title.clone()),
        video_path: run.video().map(|v| v.path.display().to_string()),
        metadata_path: run.metadata().map(|m| m.metadata_path.display().to_string()),
        stages: briefs(run),
        log: run.log.clone(),
    }
}

fn briefs(run: &PipelineRun) -> Vec<StageBrief> {
    run.results
        .iter()
        .map(|r| StageBrief {
            stage: r.stage.to_string(),
            attempt: r.attempt,
            ok: r.outcome.is_success(),
            quality_passed: r.quality_passed,
            elapsed_ms: r.elapsed_ms,
        })
        .collect()
}

fn map_config_error(err: ConfigError) -> (StatusCode, Json<ErrorBody>) {
    let code = match &err {
        ConfigError::UnknownPath { .. } => "unknown_path",
        ConfigError::InvalidValue { .. } => "invalid_value",
        ConfigError::UnknownProvider { .. } => "unknown_provider",
        ConfigError::File { .. } => "config_file",
    };
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody { code: code.to_string(), message: err.to_string() }),
    )
}

fn widen((status, Json(body)): (StatusCode, Json<ErrorBody>)) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(as_json(&body)))
}

fn as_json<T: Serialize>(body: &T) -> serde_json::Value {
    serde_json::to_value(body).unwrap_or_else(|_| serde_json::json!({"code": "internal"}))
}

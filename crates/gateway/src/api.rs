//! Route handlers.
//!
//! Endpoints:
//! - `POST  /chat`           run the loop, stream NDJSON frames
//! - `POST  /execute`        run one approved command
//! - `GET   /status`         provider, executor and uptime
//! - `GET   /init_status`    readiness of each subsystem
//! - `GET   /config`         current config, secrets redacted
//! - `PATCH /config`         deep-merge a partial config (in memory; `POST` too)
//! - `POST  /start_service`  bring the executor online
//! - `POST  /stop_service`   take the executor offline

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use cmdloop_agent::{AgentLoop, Invocation, LoopSettings, ndjson_stream};
use cmdloop_config::AppConfig;
use cmdloop_core::executor::CommandExecutor;

use crate::SharedState;

const REDACTED: &str = "***REDACTED***";

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ── Chat ──────────────────────────────────────────────────────────────────

/// `POST /chat` body. Older clients send `message` and snake_case flags.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default, alias = "message")]
    pub instruction: String,

    #[serde(default, alias = "auto_execute")]
    pub auto_execute: Option<bool>,

    #[serde(default, alias = "max_iterations")]
    pub max_iterations: Option<u32>,
}

/// Build the loop for one invocation from the config as it is right now.
async fn agent_for(state: &SharedState, config: &AppConfig) -> AgentLoop {
    let mut agent = AgentLoop::new(
        state.provider().await,
        cmdloop_providers::router::resolve_model(config),
        config.default_temperature,
    )
    .with_max_tokens(config.default_max_tokens)
    .with_system_prompt(&config.agent.system_prompt)
    .with_completion_phrases(&config.agent.completion_phrases);

    if let Some(executor) = state.executor().await {
        agent = agent.with_executor(executor);
    }
    agent
}

pub async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;

    let (agent, settings) = {
        let config = state.config.read().await;
        (agent_for(&state, &config).await, LoopSettings::from_config(&config.agent))
    };

    let settings = settings
        .with_overrides(payload.auto_execute, payload.max_iterations)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    let invocation = Invocation::new(payload.instruction, settings)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    info!(
        invocation_id = %invocation.id,
        limit = settings.effective_limit(),
        auto_execute = settings.auto_execute,
        "Chat request accepted"
    );

    let rx = agent.run_stream(invocation);
    let body = Body::from_stream(ndjson_stream(rx).map(Ok::<_, Infallible>));

    Ok((
        [
            (header::CONTENT_TYPE, "application/x-ndjson"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

// ── Manual execution ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub command: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub result: String,
}

pub async fn execute_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;
    let command = payload.command.trim();

    if command.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No command provided"));
    }

    let executor = state
        .executor()
        .await
        .ok_or_else(|| api_error(StatusCode::SERVICE_UNAVAILABLE, "No executor configured"))?;

    info!(command = %command, "Manual command execution");
    let result = executor.run_to_text(command).await;

    Ok(Json(ExecuteResponse { result }))
}

// ── Status ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecutorStatus {
    pub kind: String,
    pub online: bool,
    pub available: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub provider: String,
    pub model: String,
    pub executor: Option<ExecutorStatus>,
}

async fn executor_status(state: &SharedState) -> Option<ExecutorStatus> {
    let executor = state.executor().await?;
    Some(ExecutorStatus {
        kind: executor.name().to_string(),
        online: executor.is_online(),
        available: executor.is_available().await,
    })
}

pub async fn status_handler(State(state): State<SharedState>) -> Json<StatusResponse> {
    let model = cmdloop_providers::router::resolve_model(&*state.config.read().await);

    let uptime = chrono::Utc::now()
        .signed_duration_since(state.start_time)
        .num_seconds()
        .max(0) as u64;

    Json(StatusResponse {
        status: "running".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: uptime,
        provider: state.provider().await.name().into(),
        model,
        executor: executor_status(&state).await,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    pub status: String,
    pub message: String,
}

impl Readiness {
    fn new(ready: bool, pending: bool, message: impl Into<String>) -> Self {
        let status = match (ready, pending) {
            (true, _) => "success",
            (false, true) => "pending",
            (false, false) => "error",
        };
        Self {
            ready,
            status: status.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InitStatusResponse {
    pub backend: Readiness,
    pub model: Readiness,
    pub executor: Readiness,
    pub config: Readiness,
}

pub async fn init_status_handler(State(state): State<SharedState>) -> Json<InitStatusResponse> {
    let (has_key, local_provider, config_check) = {
        let config = state.config.read().await;
        (
            config.has_api_key(),
            config.default_provider == "ollama",
            config.validate(),
        )
    };

    let model = if has_key || local_provider {
        Readiness::new(true, false, format!("{} configured", state.provider().await.name()))
    } else {
        Readiness::new(false, false, "No API key configured")
    };

    let executor = match executor_status(&state).await {
        Some(s) if s.available => Readiness::new(true, false, format!("{} connected", s.kind)),
        Some(s) if !s.online => Readiness::new(false, true, "Offline (start the service to enable it)"),
        Some(s) => Readiness::new(false, true, format!("{} not responding", s.kind)),
        None => Readiness::new(false, false, "No executor configured"),
    };

    let config = match config_check {
        Ok(()) => Readiness::new(true, false, "Configuration valid"),
        Err(e) => Readiness::new(false, false, e.to_string()),
    };

    Json(InitStatusResponse {
        backend: Readiness::new(true, false, "Backend running"),
        model,
        executor,
        config,
    })
}

// ── Config ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub config: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigUpdateResponse {
    pub success: bool,
    pub message: String,
}

pub async fn get_config_handler(State(state): State<SharedState>) -> Json<ConfigResponse> {
    let config = state.config.read().await;
    let mut value = serde_json::to_value(&*config).unwrap_or(serde_json::json!({}));

    redact_secrets(&mut value);

    Json(ConfigResponse { config: value })
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_lowercase();
    key.contains("key") || key.contains("secret") || key.contains("token") || key.contains("password")
}

fn redact_secrets(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if is_secret_key(key) {
                    if val.as_str().is_some_and(|s| !s.is_empty()) {
                        *val = serde_json::json!(REDACTED);
                    }
                } else {
                    redact_secrets(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                redact_secrets(item);
            }
        }
        _ => {}
    }
}

/// Changes apply to the next invocation and are not written to disk.
pub async fn update_config_handler(
    State(state): State<SharedState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<ConfigUpdateResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;

    if !payload.is_object() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Request body must be a JSON object",
        ));
    }

    let mut config = state.config.write().await;
    let mut current = serde_json::to_value(&*config).unwrap_or(serde_json::json!({}));
    merge_json(&mut current, &payload);

    let updated = serde_json::from_value::<AppConfig>(current)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid config update: {e}")))?;
    updated
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    state.rebuild_components(&config, &updated).await;
    *config = updated;
    info!("Configuration updated in memory");

    Ok(Json(ConfigUpdateResponse {
        success: true,
        message: "Configuration updated".into(),
    }))
}

/// Deep-merge `patch` into `base`. Redaction placeholders echoed back by a
/// client never overwrite the real secret.
fn merge_json(base: &mut serde_json::Value, patch: &serde_json::Value) {
    if let (serde_json::Value::Object(base_map), serde_json::Value::Object(patch_map)) = (base, patch) {
        for (key, value) in patch_map {
            if value.as_str() == Some(REDACTED) {
                continue;
            }
            if value.is_object() && base_map.get(key).is_some_and(|v| v.is_object()) {
                if let Some(existing) = base_map.get_mut(key) {
                    merge_json(existing, value);
                }
            } else {
                base_map.insert(key.clone(), value.clone());
            }
        }
    }
}

// ── Service control ───────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub success: bool,
    pub online: bool,
    pub message: String,
}

pub async fn start_service_handler(State(state): State<SharedState>) -> Result<Json<ServiceResponse>, ApiError> {
    let executor = state
        .executor()
        .await
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No executor configured"))?;

    let healthy = executor.start().await;
    if !healthy {
        warn!(executor = %executor.name(), "Executor started but is not responding");
    }

    Ok(Json(ServiceResponse {
        success: healthy,
        online: true,
        message: if healthy {
            "Executor online".into()
        } else {
            "Executor switched on but not responding".into()
        },
    }))
}

pub async fn stop_service_handler(State(state): State<SharedState>) -> Result<Json<ServiceResponse>, ApiError> {
    let executor = state
        .executor()
        .await
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No executor configured"))?;

    executor.stop();

    Ok(Json(ServiceResponse {
        success: true,
        online: false,
        message: "Executor offline".into(),
    }))
}

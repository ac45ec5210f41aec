//! HTTP gateway for cmdloop.
//!
//! Exposes the streaming `/chat` endpoint plus the service-control, status
//! and configuration routes the desktop client polls.
//!
//! Built on Axum for high performance async HTTP.

pub mod api;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use cmdloop_config::AppConfig;
use cmdloop_core::provider::Provider;
use cmdloop_executor::ManagedExecutor;

/// Shared application state for the gateway.
///
/// Each `/chat` invocation reads the config once and keeps its own loop
/// state. The provider and the executor are rebuilt when a config update
/// changes the settings they were built from.
pub struct GatewayState {
    pub config: RwLock<AppConfig>,
    provider: RwLock<Arc<dyn Provider>>,
    executor: RwLock<Option<Arc<ManagedExecutor>>>,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(config: AppConfig, provider: Arc<dyn Provider>, executor: Option<Arc<ManagedExecutor>>) -> Self {
        Self {
            config: RwLock::new(config),
            provider: RwLock::new(provider),
            executor: RwLock::new(executor),
            start_time: chrono::Utc::now(),
        }
    }

    pub async fn provider(&self) -> Arc<dyn Provider> {
        self.provider.read().await.clone()
    }

    pub async fn executor(&self) -> Option<Arc<ManagedExecutor>> {
        self.executor.read().await.clone()
    }

    /// Rebuild whatever `updated` configures differently from `previous`.
    ///
    /// Invocations already running keep the provider and executor they
    /// started with.
    pub async fn rebuild_components(&self, previous: &AppConfig, updated: &AppConfig) {
        if provider_settings(previous) != provider_settings(updated) {
            match cmdloop_providers::router::build_from_config(updated).default() {
                Some(provider) => {
                    info!(provider = %provider.name(), "Provider rebuilt from updated config");
                    *self.provider.write().await = provider;
                }
                None => warn!(provider = %updated.default_provider, "Updated config names no usable provider"),
            }
        }

        if executor_settings(previous) != executor_settings(updated) {
            let executor = cmdloop_executor::build_from_config(&updated.executor);
            info!(kind = ?updated.executor.kind, "Executor rebuilt from updated config");
            *self.executor.write().await = executor;
        }
    }
}

fn provider_settings(config: &AppConfig) -> serde_json::Value {
    serde_json::to_value((&config.api_key, &config.default_provider, &config.providers)).unwrap_or_default()
}

fn executor_settings(config: &AppConfig) -> serde_json::Value {
    serde_json::to_value(&config.executor).unwrap_or_default()
}

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - CORS restricted to `gateway.allowed_origins`
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(api::chat_handler))
        .route("/execute", post(api::execute_handler))
        .route("/status", get(api::status_handler))
        .route("/init_status", get(api::init_status_handler))
        .route(
            "/config",
            get(api::get_config_handler)
                .patch(api::update_config_handler)
                .post(api::update_config_handler),
        )
        .route("/start_service", post(api::start_service_handler))
        .route("/stop_service", post(api::stop_service_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors_layer(allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
///
/// Builds the provider and the executor once; every invocation shares them.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let router = cmdloop_providers::router::build_from_config(&config);
    let provider = router
        .default()
        .ok_or("No default provider configured - set default_provider")?;

    if !config.has_api_key() && config.default_provider != "ollama" {
        warn!("No API key configured; model requests will likely be rejected");
    }

    let executor = cmdloop_executor::build_from_config(&config.executor);
    match &executor {
        Some(executor) => info!(
            executor = %cmdloop_core::CommandExecutor::name(executor.as_ref()),
            online = executor.is_online(),
            "Executor ready"
        ),
        None => warn!("No executor configured; auto-executed commands will be refused"),
    }

    let allowed_origins = config.gateway.allowed_origins.clone();
    let state = Arc::new(GatewayState::new(config, provider, executor));
    let app = build_router(state, &allowed_origins);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        let config = AppConfig::default();
        let router = cmdloop_providers::router::build_from_config(&config);
        let provider = router.default().expect("default provider");
        Arc::new(GatewayState::new(config, provider, None))
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state(), &["http://localhost:5173".into()]);

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn cors_preflight_allows_configured_origin() {
        let app = build_router(test_state(), &["http://localhost:5173".into()]);

        let req = Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .header("Origin", "http://localhost:5173")
            .header("Access-Control-Request-Method", "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:5173"
        );
    }

    #[test]
    fn invalid_origins_are_skipped() {
        // Must not panic on a header value with control characters
        let _ = cors_layer(&["http://ok.example".into(), "bad\norigin".into()]);
    }
}

//! HTTP server for the Jeeves API.
//!
//! Exposes the gateway's `answer` operation plus status, usage and
//! health endpoints for callers (e.g. a UI) that want to display
//! availability without issuing a full request.

use crate::config::Config;
use crate::gateway::{Gateway, GatewayError};
use crate::model::{AnswerRequest, AnswerResponse, ApiError, HealthResponse, StatusResponse};
use crate::usage::{UsageError, UsageEvent, UsageLog};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument};
use utoipa::OpenApi;

/// OpenAPI documentation for the Jeeves API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Jeeves API",
        version = "0.1.0",
        description = "Quota-aware LLM request gateway. Jeeves wraps any OpenAI-compatible \
                       backend with response caching, call throttling, retries with backoff \
                       and fallback answers.",
        license(name = "MIT"),
        contact(name = "Jeeves Contributors")
    ),
    servers(
        (url = "http://127.0.0.1:11440", description = "Local development server")
    ),
    paths(answer, get_status, health_check),
    components(schemas(
        crate::model::AnswerRequest,
        crate::model::AnswerResponse,
        crate::model::AnswerSource,
        crate::model::StatusResponse,
        crate::model::HealthResponse,
        crate::model::ApiError,
        crate::model::ApiErrorDetail,
    )),
    tags(
        (name = "Gateway", description = "Answer prompts through the quota-aware gateway"),
        (name = "Usage", description = "Usage tracking"),
        (name = "Health", description = "Server health and status")
    )
)]
pub struct ApiDoc;

/// Shared application state
pub struct AppState {
    pub gateway: Gateway,
    pub usage: Arc<UsageLog>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(gateway: Gateway, usage: Arc<UsageLog>, config: Config) -> Self {
        Self {
            gateway,
            usage,
            config: Arc::new(config),
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // OpenAPI documentation (JSON spec)
        .route("/openapi.json", get(openapi_json))
        // Gateway endpoints
        .route("/v1/answer", post(answer))
        .route("/v1/status", get(get_status))
        .route("/v1/usage/logs", get(get_usage_logs))
        // Health & discovery
        .route("/health", get(health_check))
        .route("/", get(root))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// OpenAPI JSON specification endpoint
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Root endpoint - discovery information for clients
async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let base_url = state.config.server_url();

    Json(serde_json::json!({
        "name": "Jeeves",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Quota-aware LLM request gateway",
        "base_url": base_url,
        "default_model": state.gateway.default_model(),
        "endpoints": {
            "answer": { "path": "/v1/answer", "method": "POST" },
            "status": { "path": "/v1/status", "method": "GET" },
            "usage_logs": { "path": "/v1/usage/logs", "method": "GET" },
            "health": { "path": "/health", "method": "GET" },
            "openapi": { "path": "/openapi.json", "method": "GET" }
        }
    }))
}

/// Answer a prompt through the gateway
#[utoipa::path(
    post,
    path = "/v1/answer",
    tag = "Gateway",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer (live, cached or fallback - see source)", body = AnswerResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 502, description = "Backend failure", body = ApiError),
        (status = 503, description = "Backend unavailable", body = ApiError)
    )
)]
#[instrument(skip(state, request), fields(prompt_len = request.prompt.len()))]
async fn answer(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    debug!("Received answer request");

    let response = state.gateway.answer(&request).await?;

    info!(
        source = %response.source,
        attempts = response.attempts,
        "Answered request"
    );

    Ok(Json(response))
}

/// Gateway status: backend reachability and usage counters
#[utoipa::path(
    get,
    path = "/v1/status",
    tag = "Gateway",
    responses(
        (status = 200, description = "Gateway status", body = StatusResponse),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
#[instrument(skip(state))]
async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, AppError> {
    let backend_reachable = state.gateway.is_backend_reachable().await;
    let stats = state.usage.stats().await?;
    let gateway_config = state.gateway.config();

    Ok(Json(StatusResponse {
        backend_reachable,
        model: state.gateway.default_model().to_string(),
        cache_enabled: gateway_config.enable_cache,
        fallback_enabled: gateway_config.enable_fallback,
        requests_today: stats.requests_today,
        live_today: stats.live_today,
        cached_today: stats.cached_today,
        fallback_today: stats.fallback_today,
        approx_input_tokens_today: stats.approx_input_tokens_today,
        approx_output_tokens_today: stats.approx_output_tokens_today,
        last_error: stats.last_error,
    }))
}

/// Get recent usage events
#[instrument(skip(state))]
async fn get_usage_logs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UsageEvent>>, AppError> {
    let events = state.usage.recent(50).await?;
    Ok(Json(events))
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Server health status", body = HealthResponse)
    )
)]
#[instrument(skip(state))]
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let backend_reachable = state.gateway.is_backend_reachable().await;

    Json(HealthResponse {
        status: if backend_reachable { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend_reachable,
    })
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    InvalidRequest(String),
    BackendUnavailable(String),
    BackendFailure(String),
    InternalError(String),
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::InvalidRequest(message) => AppError::InvalidRequest(message),
            GatewayError::BackendUnavailable { .. } => AppError::BackendUnavailable(e.to_string()),
            GatewayError::Backend(_) => AppError::BackendFailure(e.to_string()),
        }
    }
}

impl From<UsageError> for AppError {
    fn from(e: UsageError) -> Self {
        AppError::InternalError(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::invalid_request(msg))
            }
            AppError::BackendUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiError::backend_unavailable(msg),
            ),
            AppError::BackendFailure(msg) => (
                StatusCode::BAD_GATEWAY,
                ApiError::new(msg, "backend_error"),
            ),
            AppError::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::internal_error(msg),
            ),
        };

        (status, Json(error)).into_response()
    }
}

/// Start the HTTP server
pub async fn start_server(state: Arc<AppState>) -> Result<(), std::io::Error> {
    let addr = state.config.server_addr();
    let router = create_router(state);

    info!("Starting Jeeves server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

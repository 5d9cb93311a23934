//! HTTP server: REST routes plus the `/rpc` endpoint over one RsiService

use crate::rpc::{graph_error_code, route_rpc, to_response};
use crate::service::{
    AttemptSubmission, AttemptsQuery, GoalSubmission, PendingQuery, PrincipleSubmission,
    PrinciplesQuery, RsiService,
};
use anyhow::Context;
use autotelos_core::{RpcRequest, INVALID_PARAMS, NOT_FOUND};
use autotelos_graph::GraphError;
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1".into(),
            port: 8089,
        }
    }
}

impl GatewayConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid gateway bind address {}:{}", self.bind, self.port))
    }
}

/// Graph failure rendered as an HTTP error.
pub struct ApiError(GraphError);

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match graph_error_code(&self.0) {
            NOT_FOUND => StatusCode::NOT_FOUND,
            INVALID_PARAMS => StatusCode::CONFLICT,
            _ => {
                warn!("request failed: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(service: Arc<RsiService>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/goals", post(submit_goal_handler))
        .route("/goals/pending", get(pending_goals_handler))
        .route("/attempts", post(store_attempt_handler).get(attempts_handler))
        .route("/principles", post(store_principle_handler).get(principles_handler))
        .route("/principles/:id/usage", post(increment_usage_handler))
        .route("/metrics", get(metrics_handler))
        .route("/phase-gate", get(phase_gate_handler))
        .route("/agents", get(agents_handler))
        .route("/rpc", post(rpc_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(service)
}

/// Serve until `cancel` fires.
pub async fn start_gateway(
    config: &GatewayConfig,
    service: Arc<RsiService>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let bind_addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Autotelos gateway v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: http://{}", bind_addr);
    info!("  JSON-RPC:     http://{}/rpc", bind_addr);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    info!("gateway stopped");
    Ok(())
}

async fn health_handler(State(service): State<Arc<RsiService>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "agents": service.agents().len(),
    }))
}

async fn submit_goal_handler(
    State(service): State<Arc<RsiService>>,
    Json(body): Json<GoalSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    let goal = service.submit_goal(body).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

async fn pending_goals_handler(
    State(service): State<Arc<RsiService>>,
    Query(query): Query<PendingQuery>,
) -> ApiResult<Vec<autotelos_core::Goal>> {
    Ok(Json(service.pending_goals(query.limit).await?))
}

async fn store_attempt_handler(
    State(service): State<Arc<RsiService>>,
    Json(body): Json<AttemptSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    let attempt = service.store_attempt(body).await?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

async fn attempts_handler(
    State(service): State<Arc<RsiService>>,
    Query(query): Query<AttemptsQuery>,
) -> ApiResult<Vec<autotelos_core::Attempt>> {
    Ok(Json(service.attempts(query.domain.as_deref(), query.limit).await?))
}

async fn store_principle_handler(
    State(service): State<Arc<RsiService>>,
    Json(body): Json<PrincipleSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    let principle = service.store_principle(body).await?;
    Ok((StatusCode::CREATED, Json(principle)))
}

async fn principles_handler(
    State(service): State<Arc<RsiService>>,
    Query(query): Query<PrinciplesQuery>,
) -> ApiResult<Vec<autotelos_core::Principle>> {
    Ok(Json(service.principles(&query.domain, query.limit).await?))
}

async fn increment_usage_handler(
    State(service): State<Arc<RsiService>>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    service.increment_usage(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn metrics_handler(
    State(service): State<Arc<RsiService>>,
) -> ApiResult<autotelos_core::Metrics> {
    Ok(Json(service.metrics().await?))
}

async fn phase_gate_handler(
    State(service): State<Arc<RsiService>>,
) -> ApiResult<autotelos_core::PhaseGateReport> {
    Ok(Json(service.phase_gate().await?))
}

async fn agents_handler(
    State(service): State<Arc<RsiService>>,
) -> Json<Vec<autotelos_core::AgentStatus>> {
    Json(service.agents())
}

/// JSON-RPC errors travel in the body; the HTTP status is always 200.
async fn rpc_handler(
    State(service): State<Arc<RsiService>>,
    Json(request): Json<RpcRequest>,
) -> impl IntoResponse {
    let result = route_rpc(&request.method, request.params, &service).await;
    Json(to_response(&request.id, result))
}

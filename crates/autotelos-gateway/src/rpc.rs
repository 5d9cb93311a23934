//! RPC router: dispatches JSON-RPC method calls onto the service façade

use crate::service::{
    AttemptSubmission, AttemptsQuery, GoalSubmission, PendingQuery, PrincipleSubmission,
    PrinciplesQuery, RsiService,
};
use autotelos_core::{RpcResponse, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND, NOT_FOUND};
use autotelos_graph::GraphError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

/// Result type for RPC handlers.
pub type RpcResult = Result<Value, (i32, String)>;

/// Route an RPC method call to the appropriate handler.
pub async fn route_rpc(method: &str, params: Value, service: &RsiService) -> RpcResult {
    debug!("rpc: {}", method);
    match method {
        "goals.submit" => {
            let submission: GoalSubmission = params_as(params)?;
            encode(service.submit_goal(submission).await)
        }
        "goals.pending" => {
            let query: PendingQuery = params_as(params)?;
            encode(service.pending_goals(query.limit).await)
        }
        "attempts.store" => {
            let submission: AttemptSubmission = params_as(params)?;
            encode(service.store_attempt(submission).await)
        }
        "attempts.list" => {
            let query: AttemptsQuery = params_as(params)?;
            encode(service.attempts(query.domain.as_deref(), query.limit).await)
        }
        "principles.store" => {
            let submission: PrincipleSubmission = params_as(params)?;
            encode(service.store_principle(submission).await)
        }
        "principles.list" => {
            let query: PrinciplesQuery = params_as(params)?;
            encode(service.principles(&query.domain, query.limit).await)
        }
        "principles.increment_usage" => {
            let id = uuid_param(&params, "id")?;
            service.increment_usage(id).await.map_err(graph_error)?;
            Ok(json!({ "id": id }))
        }
        "metrics.get" => encode(service.metrics().await),
        "phase_gate.validate" => encode(service.phase_gate().await),
        "agents.list" => encode(Ok(service.agents())),
        "health" => Ok(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") })),
        _ => Err((METHOD_NOT_FOUND, format!("Method not found: {}", method))),
    }
}

/// Convert an RPC result to an RpcResponse.
pub fn to_response(id: &str, result: RpcResult) -> RpcResponse {
    match result {
        Ok(value) => RpcResponse::ok(id, value),
        Err((code, message)) => RpcResponse::err(id, code, message),
    }
}

/// JSON-RPC code for a graph failure.
pub fn graph_error_code(err: &GraphError) -> i32 {
    match err {
        GraphError::GoalNotFound(_) | GraphError::NotFound { .. } => NOT_FOUND,
        GraphError::AlreadyFulfilled(_) => INVALID_PARAMS,
        _ => INTERNAL_ERROR,
    }
}

fn graph_error(err: GraphError) -> (i32, String) {
    let code = graph_error_code(&err);
    if code == INTERNAL_ERROR {
        warn!("rpc graph failure: {}", err);
    }
    (code, err.to_string())
}

fn encode<T: Serialize>(result: Result<T, GraphError>) -> RpcResult {
    let value = result.map_err(graph_error)?;
    serde_json::to_value(value).map_err(|e| (INTERNAL_ERROR, e.to_string()))
}

fn params_as<T: DeserializeOwned>(params: Value) -> Result<T, (i32, String)> {
    // Absent params behave like an empty object so defaults apply.
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| (INVALID_PARAMS, format!("Invalid params: {}", e)))
}

fn uuid_param(params: &Value, name: &str) -> Result<Uuid, (i32, String)> {
    let raw = params[name]
        .as_str()
        .ok_or_else(|| (INVALID_PARAMS, format!("Missing required param: {}", name)))?;
    Uuid::parse_str(raw).map_err(|e| (INVALID_PARAMS, format!("Invalid param {}: {}", name, e)))
}

//! JSON-RPC style protocol for the service façade
//!
//! Wire format:
//!
//! Client → Server (RPC request):
//!   { "id": "req-1", "method": "goals.pending", "params": { "limit": 10 } }
//!
//! Server → Client (RPC response):
//!   { "id": "req-1", "result": [ ... ] }
//!   { "id": "req-1", "error": { "code": -32004, "message": "goal not found" } }

use serde::{Deserialize, Serialize};

pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const NOT_FOUND: i32 = -32004;

/// RPC request from client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// RPC response to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Successful response with a result value.
    pub fn ok(id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    /// Error response.
    pub fn err(id: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Shorthand for a method-not-found error.
    pub fn method_not_found(id: impl Into<String>, method: &str) -> Self {
        Self::err(id, METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    /// Shorthand for an internal error.
    pub fn internal_error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::err(id, INTERNAL_ERROR, message)
    }
}

/// RPC error detail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

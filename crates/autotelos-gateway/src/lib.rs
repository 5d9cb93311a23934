//! Autotelos Gateway - external façade over the RSI graph
//!
//! REST routes and a JSON-RPC endpoint, both backed by [`RsiService`].

pub mod rpc;
pub mod server;
pub mod service;

pub use rpc::{route_rpc, to_response, RpcResult};
pub use server::{router, start_gateway, GatewayConfig};
pub use service::{
    AttemptSubmission, GoalSubmission, PrincipleSubmission, RsiService, DEFAULT_LIST_LIMIT,
};

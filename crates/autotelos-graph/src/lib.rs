//! Autotelos Graph - durable goal/attempt/principle graph
//!
//! Node kinds: Goal, Attempt, Principle, CycleRecord, DomainPhase.
//! Relationship: `FULFILLS` (Attempt → Goal), held in the `edges` table.
//!
//! Every operation is a single call against a pooled session. The store
//! never retries; callers log and move on.

pub mod error;
pub mod pool;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use error::{GraphError, GraphResult};
pub use pool::{Session, SessionPool};
pub use sqlite::{GraphConfig, SqliteGraphStore};
pub use store::GraphStore;

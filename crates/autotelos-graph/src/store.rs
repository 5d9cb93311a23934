//! GraphStore trait. Agents and the façade touch durable state only through it.

use crate::error::GraphResult;
use autotelos_core::{AggregateCounts, Attempt, CycleRecord, DomainPhase, Goal, Principle};
use uuid::Uuid;

#[async_trait::async_trait]
pub trait GraphStore: Send + Sync {
    async fn store_goal(&self, goal: &Goal) -> GraphResult<()>;

    async fn get_goal(&self, id: Uuid) -> GraphResult<Option<Goal>>;

    /// Verified goals with no FULFILLS edge, highest intensity first, then
    /// oldest first.
    async fn get_pending_goals(&self, limit: usize) -> GraphResult<Vec<Goal>>;

    /// Pending goals tagged with `domain`, in the same order.
    async fn get_pending_goals_in_domain(&self, domain: &str, limit: usize) -> GraphResult<Vec<Goal>>;

    /// Write the attempt and its FULFILLS edge. Fails with `GoalNotFound`
    /// when the goal does not exist and `AlreadyFulfilled` when another
    /// attempt already consumed it.
    async fn store_attempt(&self, attempt: &Attempt) -> GraphResult<()>;

    /// Most recent attempts, optionally restricted to one domain.
    async fn get_attempts(&self, domain: Option<&str>, limit: usize) -> GraphResult<Vec<Attempt>>;

    /// Active successful attempts in a domain, most recent first.
    async fn get_successful_attempts(
        &self,
        domain: &str,
        limit: usize,
        include_bootstrap: bool,
    ) -> GraphResult<Vec<Attempt>>;

    /// Count of active attempts in a domain.
    async fn get_attempt_count(&self, domain: &str, success_only: bool) -> GraphResult<u64>;

    async fn store_principle(&self, principle: &Principle) -> GraphResult<()>;

    /// Highest confidence first, then most used.
    async fn get_principles_by_domain(&self, domain: &str, limit: usize) -> GraphResult<Vec<Principle>>;

    async fn increment_principle_usage(&self, id: Uuid) -> GraphResult<()>;

    async fn store_cycle_record(&self, record: &CycleRecord) -> GraphResult<()>;

    /// Most recent cycle records first.
    async fn get_cycle_records(&self, limit: usize) -> GraphResult<Vec<CycleRecord>>;

    /// Deactivate every bootstrap-flagged attempt in the domain. Returns the
    /// number of attempts affected.
    async fn mark_bootstrap_attempts_inactive(&self, domain: &str) -> GraphResult<u64>;

    /// Unknown domains are in bootstrap.
    async fn get_domain_phase(&self, domain: &str) -> GraphResult<DomainPhase>;

    /// Persist a phase. Never moves a mature domain back to bootstrap.
    async fn set_domain_phase(&self, domain: &str, phase: DomainPhase) -> GraphResult<()>;

    async fn get_aggregate_metrics(&self) -> GraphResult<AggregateCounts>;
}

//! RsiService: read/write façade over the graph and metrics
//!
//! Every method maps onto exactly one GraphStore or MetricsEvaluator call.
//! Request payloads are shaped into domain types here; nothing else is
//! decided.

use autotelos_agent::{Agent, MetricsEvaluator};
use autotelos_core::{AgentStatus, Attempt, Goal, Metrics, PhaseGateReport, Principle};
use autotelos_graph::{GraphResult, GraphStore};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_LIST_LIMIT: usize = 10;

fn default_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoalSubmission {
    pub description: String,
    pub intensity: f64,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

impl GoalSubmission {
    pub fn into_goal(self) -> Goal {
        let goal = Goal::new(self.description, self.intensity, self.domain);
        if self.verified {
            goal.verified()
        } else {
            goal
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttemptSubmission {
    pub goal_id: Uuid,
    pub domain: String,
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub approach: String,
    pub success: bool,
    #[serde(default)]
    pub is_bootstrap: bool,
    #[serde(default)]
    pub attempts_used: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AttemptSubmission {
    pub fn into_attempt(self) -> Attempt {
        let mut attempt = Attempt::new(self.goal_id, self.domain);
        attempt.problem = self.problem;
        attempt.solution = self.solution;
        attempt.approach = self.approach;
        attempt.success = self.success;
        attempt.is_bootstrap = self.is_bootstrap;
        if let Some(used) = self.attempts_used {
            attempt.attempts_used = used;
        }
        attempt.error = self.error;
        attempt
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrincipleSubmission {
    pub domain: String,
    pub statement: String,
    #[serde(default)]
    pub source_count: u32,
    pub confidence: f64,
}

impl PrincipleSubmission {
    pub fn into_principle(self) -> Principle {
        Principle::new(self.domain, self.statement, self.source_count, self.confidence)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PendingQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttemptsQuery {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrinciplesQuery {
    pub domain: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub struct RsiService {
    graph: Arc<dyn GraphStore>,
    metrics: MetricsEvaluator,
    agents: Vec<Arc<dyn Agent>>,
}

impl RsiService {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self {
            metrics: MetricsEvaluator::new(graph.clone()),
            graph,
            agents: Vec::new(),
        }
    }

    /// Agents whose status `/agents` reports.
    pub fn with_agents(mut self, agents: Vec<Arc<dyn Agent>>) -> Self {
        self.agents = agents;
        self
    }

    pub async fn submit_goal(&self, submission: GoalSubmission) -> GraphResult<Goal> {
        let goal = submission.into_goal();
        self.graph.store_goal(&goal).await?;
        Ok(goal)
    }

    pub async fn pending_goals(&self, limit: usize) -> GraphResult<Vec<Goal>> {
        self.graph.get_pending_goals(limit).await
    }

    pub async fn store_attempt(&self, submission: AttemptSubmission) -> GraphResult<Attempt> {
        let attempt = submission.into_attempt();
        self.graph.store_attempt(&attempt).await?;
        Ok(attempt)
    }

    pub async fn attempts(&self, domain: Option<&str>, limit: usize) -> GraphResult<Vec<Attempt>> {
        self.graph.get_attempts(domain, limit).await
    }

    pub async fn store_principle(&self, submission: PrincipleSubmission) -> GraphResult<Principle> {
        let principle = submission.into_principle();
        self.graph.store_principle(&principle).await?;
        Ok(principle)
    }

    pub async fn principles(&self, domain: &str, limit: usize) -> GraphResult<Vec<Principle>> {
        self.graph.get_principles_by_domain(domain, limit).await
    }

    pub async fn increment_usage(&self, id: Uuid) -> GraphResult<()> {
        self.graph.increment_principle_usage(id).await
    }

    pub async fn metrics(&self) -> GraphResult<Metrics> {
        self.metrics.get_metrics().await
    }

    pub async fn phase_gate(&self) -> GraphResult<PhaseGateReport> {
        self.metrics.validate_phase_gate().await
    }

    pub fn agents(&self) -> Vec<AgentStatus> {
        self.agents.iter().map(|a| a.status()).collect()
    }
}

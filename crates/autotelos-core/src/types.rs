//! Domain types for Autotelos
//!
//! Goals, attempts, principles and cycle records are the persisted node
//! kinds. `AgentStatus` is ephemeral and only lives in agent memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Clamp a score into [0, 1]. Non-finite input collapses to 0.
pub fn unit_interval(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Goal
// ---------------------------------------------------------------------------

/// A candidate improvement objective emitted by reflection.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: Uuid,
    pub description: String,
    pub intensity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    pub fn new(description: impl Into<String>, intensity: f64, domain: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            intensity: unit_interval(intensity),
            domain: domain.filter(|d| !d.trim().is_empty()),
            verified: false,
            created_at: Utc::now(),
        }
    }

    /// Mark the goal as having passed verification.
    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Attempt
// ---------------------------------------------------------------------------

/// One complete problem-solve-outcome record for a goal.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Attempt {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub domain: String,
    pub problem: String,
    pub solution: String,
    pub approach: String,
    pub success: bool,
    #[serde(default)]
    pub is_bootstrap: bool,
    /// Repair iterations consumed by the practice loop.
    #[serde(default)]
    pub attempts_used: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Attempt {
    pub fn new(goal_id: Uuid, domain: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            goal_id,
            domain: domain.into(),
            problem: String::new(),
            solution: String::new(),
            approach: String::new(),
            success: false,
            is_bootstrap: false,
            attempts_used: 0,
            error: None,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Principle
// ---------------------------------------------------------------------------

/// A crystallized insight derived from a batch of successful attempts.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Principle {
    pub id: Uuid,
    pub domain: String,
    pub statement: String,
    pub source_count: u32,
    pub confidence: f64,
    #[serde(default)]
    pub usage_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Principle {
    pub fn new(
        domain: impl Into<String>,
        statement: impl Into<String>,
        source_count: u32,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain: domain.into(),
            statement: statement.into(),
            source_count,
            confidence: unit_interval(confidence),
            usage_count: 0,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Reflector,
    Practitioner,
    Crystallizer,
}

impl AgentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Reflector => "reflector",
            AgentKind::Practitioner => "practitioner",
            AgentKind::Crystallizer => "crystallizer",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reflector" => Ok(AgentKind::Reflector),
            "practitioner" => Ok(AgentKind::Practitioner),
            "crystallizer" => Ok(AgentKind::Crystallizer),
            other => Err(crate::Error::UnknownAgentKind(other.to_string())),
        }
    }
}

/// Name of the phase a cycle reports when it ran to the end without error.
pub const PHASE_COMPLETE: &str = "complete";
/// Phase reported by an agent that is not inside a cycle.
pub const PHASE_IDLE: &str = "idle";

/// Audit record written once per agent cycle.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CycleRecord {
    pub id: Uuid,
    pub agent_id: String,
    pub agent_kind: AgentKind,
    pub phase_reached: String,
    #[serde(default)]
    pub goals_generated: u32,
    #[serde(default)]
    pub goals_verified: u32,
    #[serde(default)]
    pub attempt_succeeded: bool,
    #[serde(default)]
    pub principle_extracted: bool,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CycleRecord {
    pub fn new(agent_id: impl Into<String>, agent_kind: AgentKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            agent_kind,
            phase_reached: PHASE_IDLE.to_string(),
            goals_generated: 0,
            goals_verified: 0,
            attempt_succeeded: false,
            principle_extracted: false,
            duration_seconds: 0.0,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase_reached == PHASE_COMPLETE && self.error.is_none()
    }
}

/// Ephemeral, in-memory snapshot of an agent. Never persisted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AgentStatus {
    pub id: String,
    pub kind: AgentKind,
    pub running: bool,
    pub cycles_run: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub current_phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentStatus {
    pub fn new(id: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            running: false,
            cycles_run: 0,
            last_cycle_at: None,
            current_phase: PHASE_IDLE.to_string(),
            error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Domain phase
// ---------------------------------------------------------------------------

/// Evidence regime of a domain. Moves from bootstrap to mature exactly once.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DomainPhase {
    #[default]
    Bootstrap,
    Mature,
}

impl DomainPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            DomainPhase::Bootstrap => "bootstrap",
            DomainPhase::Mature => "mature",
        }
    }

    pub fn is_bootstrap(self) -> bool {
        self == DomainPhase::Bootstrap
    }
}

impl std::fmt::Display for DomainPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainPhase {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bootstrap" => Ok(DomainPhase::Bootstrap),
            "mature" => Ok(DomainPhase::Mature),
            other => Err(crate::Error::UnknownPhase(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Raw counts straight from the store. No derived ratios here.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregateCounts {
    pub total_goals: u64,
    pub pending_goals: u64,
    pub total_attempts: u64,
    pub successful_attempts: u64,
    pub total_principles: u64,
    /// Sum of goals generated across reflection cycles.
    pub total_reflections: u64,
    /// Sum of goals that passed verification across reflection cycles.
    pub verified_goals: u64,
    pub total_cycles: u64,
    pub complete_cycles: u64,
}

/// Aggregate counts plus the derived rates.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    #[serde(flatten)]
    pub counts: AggregateCounts,
    pub activation_rate: f64,
    pub attempt_success_rate: f64,
}

/// Outcome of a phase-gate evaluation, one entry per criterion.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PhaseGateReport {
    pub passed: bool,
    pub criteria: BTreeMap<String, bool>,
    pub metrics: Metrics,
}

impl PhaseGateReport {
    pub fn failing(&self) -> Vec<&str> {
        self.criteria
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

//! Autotelos Agent - the three RSI agents and their shared lifecycle
//!
//! - `ReflectorAgent` writes verified goals
//! - `PractitionerAgent` consumes one goal per tick and writes an attempt
//! - `CrystallizerAgent` turns successful attempts into principles
//!
//! Agents never talk to each other; all handoff goes through the graph.

pub mod agent;
pub mod crystallizer;
pub mod error;
pub mod metrics;
pub mod practitioner;
pub mod prompts;
pub mod reflector;
pub mod runner;

pub use agent::{Agent, AgentCore, Cycle};
pub use crystallizer::{CrystallizerAgent, CrystallizerConfig, DomainOutcome};
pub use error::{AgentError, AgentResult};
pub use metrics::{derive_metrics, evaluate_gate, ratio, MetricsEvaluator};
pub use practitioner::{PracticeOutcome, PractitionerAgent, PractitionerConfig, Problem, MAX_ATTEMPTS_EXCEEDED};
pub use reflector::{ReflectorAgent, ReflectorConfig, Verdict};
pub use runner::{RunnerConfig, RunnerError, SubprocessRunner, TestRun, TestRunner};

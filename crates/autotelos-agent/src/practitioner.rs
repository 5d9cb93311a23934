//! PractitionerAgent: FETCH -> GENERATE -> PRACTICE -> RECORD
//!
//! Claims one pending goal in its domain, turns it into a testable problem,
//! and runs a bounded solve/repair loop against the test runner. Every
//! claimed goal ends in exactly one stored attempt, pass or fail.

use crate::agent::{Agent, AgentCore, Cycle};
use crate::error::{AgentError, AgentResult};
use crate::prompts;
use crate::runner::{truncate_feedback, RunnerConfig, TestRunner};
use autotelos_core::{AgentKind, Attempt, CycleRecord, Goal, Principle, PHASE_COMPLETE};
use autotelos_graph::GraphStore;
use autotelos_llm::{parse_json, strip_code_fences, GenerateOptions, Generator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PHASE_FETCH: &str = "fetch";
pub const PHASE_GENERATE: &str = "generate";
pub const PHASE_PRACTICE: &str = "practice";
pub const PHASE_RECORD: &str = "record";

pub const MAX_ATTEMPTS_EXCEEDED: &str = "max attempts exceeded";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PractitionerConfig {
    /// The one domain this instance practices.
    pub domain: String,
    pub max_attempts: u32,
    /// Principles injected as context into problem generation.
    pub principle_context_limit: usize,
    pub max_feedback_chars: usize,
    pub temperature: f32,
    pub repair_temperature: f32,
    pub max_tokens: u32,
    pub runner: RunnerConfig,
}

impl Default for PractitionerConfig {
    fn default() -> Self {
        Self {
            domain: "code".into(),
            max_attempts: 5,
            principle_context_limit: 5,
            max_feedback_chars: 4000,
            temperature: 0.7,
            repair_temperature: 0.2,
            max_tokens: 4096,
            runner: RunnerConfig::default(),
        }
    }
}

/// A generated practice problem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Problem {
    pub description: String,
    #[serde(default)]
    pub approach: String,
    pub test_code: String,
    #[serde(default)]
    pub starter_code: String,
}

/// Result of the bounded practice loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PracticeOutcome {
    pub success: bool,
    /// Test runs performed, 1..=max_attempts.
    pub attempts: u32,
    /// Last solution that was run.
    pub solution: String,
    pub error: Option<String>,
}

pub struct PractitionerAgent {
    core: AgentCore,
    graph: Arc<dyn GraphStore>,
    generator: Arc<dyn Generator>,
    runner: Arc<dyn TestRunner>,
    config: PractitionerConfig,
}

impl PractitionerAgent {
    pub fn new(
        id: impl Into<String>,
        graph: Arc<dyn GraphStore>,
        generator: Arc<dyn Generator>,
        runner: Arc<dyn TestRunner>,
        config: PractitionerConfig,
    ) -> Self {
        Self {
            core: AgentCore::new(id, AgentKind::Practitioner),
            graph,
            generator,
            runner,
            config,
        }
    }

    pub fn domain(&self) -> &str {
        &self.config.domain
    }

    /// FETCH: the top pending goal tagged with this domain, if any.
    pub async fn fetch(&self) -> AgentResult<Option<Goal>> {
        let mut pending = self
            .graph
            .get_pending_goals_in_domain(&self.config.domain, 1)
            .await?;
        Ok(pending.pop())
    }

    async fn principle_context(&self) -> Vec<Principle> {
        match self
            .graph
            .get_principles_by_domain(&self.config.domain, self.config.principle_context_limit)
            .await
        {
            Ok(p) => p,
            Err(e) => {
                warn!("principles unavailable for {}: {}", self.config.domain, e);
                Vec::new()
            }
        }
    }

    /// GENERATE: turn a goal into a problem with tests. Principles given as
    /// context are counted as used only once a usable problem comes back.
    pub async fn generate_problem(&self, goal: &Goal) -> AgentResult<Problem> {
        let principles = self.principle_context().await;
        let prompt = prompts::problem(goal, &self.config.domain, &principles);
        let options = GenerateOptions::with_temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens);

        let text = self.generator.generate(&prompt, options).await?;
        let problem: Problem = parse_json(&text)?;
        if problem.test_code.trim().is_empty() {
            return Err(AgentError::InvalidOutput("problem has no test code".into()));
        }

        for p in &principles {
            if let Err(e) = self.graph.increment_principle_usage(p.id).await {
                warn!("failed to record usage of principle {}: {}", p.id, e);
            }
        }
        Ok(problem)
    }

    /// PRACTICE: run the tests, repair on failure, give up after
    /// `max_attempts` runs.
    pub async fn practice(&self, problem: &Problem) -> PracticeOutcome {
        let max = self.config.max_attempts.max(1);
        let tests = strip_code_fences(&problem.test_code);
        let mut solution = strip_code_fences(&problem.starter_code);
        let mut feedback = String::new();

        for attempt in 1..=max {
            match self.runner.run(&solution, &tests).await {
                Ok(run) if run.passed => {
                    debug!("tests passed on attempt {}/{}", attempt, max);
                    return PracticeOutcome {
                        success: true,
                        attempts: attempt,
                        solution,
                        error: None,
                    };
                }
                Ok(run) => {
                    feedback = truncate_feedback(&run.output, self.config.max_feedback_chars);
                }
                Err(e) => {
                    feedback = format!("test runner error: {}", e);
                }
            }
            debug!("attempt {}/{} failed", attempt, max);

            if attempt == max {
                break;
            }

            let prompt = prompts::repair(&problem.description, &solution, &feedback);
            let options = GenerateOptions::with_temperature(self.config.repair_temperature)
                .max_tokens(self.config.max_tokens);
            match self.generator.generate(&prompt, options).await {
                Ok(text) => solution = strip_code_fences(&text),
                Err(e) => {
                    warn!("repair generation failed on attempt {}: {}", attempt, e);
                    return PracticeOutcome {
                        success: false,
                        attempts: attempt,
                        solution,
                        error: Some(format!("repair generation failed: {}", e)),
                    };
                }
            }
        }

        PracticeOutcome {
            success: false,
            attempts: max,
            solution,
            error: Some(format!("{} ({}): {}", MAX_ATTEMPTS_EXCEEDED, max, feedback)),
        }
    }
}

#[async_trait::async_trait]
impl Agent for PractitionerAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn graph(&self) -> &Arc<dyn GraphStore> {
        &self.graph
    }

    async fn run_cycle(&self, record: &mut CycleRecord) -> AgentResult<Cycle> {
        self.core.enter(record, PHASE_FETCH);
        let Some(goal) = self.fetch().await? else {
            return Ok(Cycle::Skipped);
        };
        debug!("claimed goal {} ({})", goal.id, goal.description);

        self.core.enter(record, PHASE_GENERATE);
        let problem = self.generate_problem(&goal).await?;
        let phase = self.graph.get_domain_phase(&self.config.domain).await?;

        self.core.enter(record, PHASE_PRACTICE);
        let outcome = self.practice(&problem).await;

        self.core.enter(record, PHASE_RECORD);
        let mut attempt = Attempt::new(goal.id, self.config.domain.clone());
        attempt.problem = problem.description;
        attempt.approach = problem.approach;
        attempt.solution = outcome.solution;
        attempt.success = outcome.success;
        attempt.is_bootstrap = phase.is_bootstrap();
        attempt.attempts_used = outcome.attempts;
        attempt.error = outcome.error;
        self.graph.store_attempt(&attempt).await?;
        record.attempt_succeeded = attempt.success;

        info!(
            "goal {} practiced in {}: success={} after {} attempt(s)",
            goal.id, self.config.domain, attempt.success, attempt.attempts_used
        );
        self.core.enter(record, PHASE_COMPLETE);
        Ok(Cycle::Done)
    }
}

//! CrystallizerAgent: per-domain principle extraction
//!
//! Each tick walks the configured domains in order. A domain with enough
//! successful attempts gets one extraction call; a confident answer becomes
//! a Principle. The first accepted principle in a bootstrap domain moves it
//! to mature and retires the bootstrap evidence.

use crate::agent::{Agent, AgentCore, Cycle};
use crate::error::AgentResult;
use crate::prompts;
use autotelos_core::{unit_interval, AgentKind, CycleRecord, DomainPhase, Principle, PHASE_COMPLETE};
use autotelos_graph::GraphStore;
use autotelos_llm::{parse_json, GenerateOptions, Generator};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const PHASE_COUNT: &str = "count";
pub const PHASE_EXTRACT: &str = "extract";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrystallizerConfig {
    pub domains: Vec<String>,
    pub bootstrap_threshold: u64,
    pub mature_threshold: u64,
    /// Successful attempts fetched per extraction.
    pub fetch_limit: usize,
    /// Of those, how many (most recent first) go into the prompt.
    pub prompt_limit: usize,
    pub min_confidence: f64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CrystallizerConfig {
    fn default() -> Self {
        Self {
            domains: vec!["code".into()],
            bootstrap_threshold: 10,
            mature_threshold: 20,
            fetch_limit: 50,
            prompt_limit: 20,
            min_confidence: 0.8,
            temperature: 0.3,
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Extraction {
    #[serde(default)]
    principle: String,
    #[serde(default)]
    confidence: f64,
}

/// What happened to one domain on one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainOutcome {
    BelowThreshold { count: u64, threshold: u64 },
    Rejected { confidence: f64 },
    Extracted(Principle),
}

pub struct CrystallizerAgent {
    core: AgentCore,
    graph: Arc<dyn GraphStore>,
    generator: Arc<dyn Generator>,
    config: CrystallizerConfig,
    phases: Mutex<HashMap<String, DomainPhase>>,
}

impl CrystallizerAgent {
    pub fn new(
        id: impl Into<String>,
        graph: Arc<dyn GraphStore>,
        generator: Arc<dyn Generator>,
        config: CrystallizerConfig,
    ) -> Self {
        Self {
            core: AgentCore::new(id, AgentKind::Crystallizer),
            graph,
            generator,
            config,
            phases: Mutex::new(HashMap::new()),
        }
    }

    /// Cached phase, loaded from the store on first use.
    pub async fn phase(&self, domain: &str) -> AgentResult<DomainPhase> {
        let mut phases = self.phases.lock().await;
        if let Some(phase) = phases.get(domain) {
            return Ok(*phase);
        }
        let phase = self.graph.get_domain_phase(domain).await?;
        phases.insert(domain.to_string(), phase);
        Ok(phase)
    }

    fn threshold(&self, phase: DomainPhase) -> u64 {
        match phase {
            DomainPhase::Bootstrap => self.config.bootstrap_threshold,
            DomainPhase::Mature => self.config.mature_threshold,
        }
    }

    pub async fn crystallize(&self, domain: &str) -> AgentResult<DomainOutcome> {
        let phase = self.phase(domain).await?;
        let threshold = self.threshold(phase);
        let count = self.graph.get_attempt_count(domain, true).await?;
        if count < threshold {
            debug!("{}: {} of {} successes ({})", domain, count, threshold, phase);
            return Ok(DomainOutcome::BelowThreshold { count, threshold });
        }

        self.core.set_phase(PHASE_EXTRACT);
        let attempts = self
            .graph
            .get_successful_attempts(domain, self.config.fetch_limit, phase.is_bootstrap())
            .await?;
        let recent = &attempts[..attempts.len().min(self.config.prompt_limit)];
        let prompt = prompts::extraction(domain, recent);
        let options = GenerateOptions::with_temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens);

        let text = self.generator.generate(&prompt, options).await?;
        let extraction: Extraction = parse_json(&text)?;
        let statement = extraction.principle.trim();
        let confidence = unit_interval(extraction.confidence);
        if statement.is_empty() || confidence < self.config.min_confidence {
            info!(
                "{}: extraction rejected (confidence {:.2} < {:.2})",
                domain, confidence, self.config.min_confidence
            );
            return Ok(DomainOutcome::Rejected { confidence });
        }

        let principle = Principle::new(domain, statement, attempts.len() as u32, confidence);
        self.graph.store_principle(&principle).await?;
        info!(
            "{}: principle extracted from {} attempts (confidence {:.2})",
            domain,
            attempts.len(),
            confidence
        );

        if phase.is_bootstrap() {
            self.graph.set_domain_phase(domain, DomainPhase::Mature).await?;
            let retired = self.graph.mark_bootstrap_attempts_inactive(domain).await?;
            self.phases
                .lock()
                .await
                .insert(domain.to_string(), DomainPhase::Mature);
            info!("{}: bootstrap -> mature, {} bootstrap attempts retired", domain, retired);
        }

        Ok(DomainOutcome::Extracted(principle))
    }
}

#[async_trait::async_trait]
impl Agent for CrystallizerAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn graph(&self) -> &Arc<dyn GraphStore> {
        &self.graph
    }

    async fn run_cycle(&self, record: &mut CycleRecord) -> AgentResult<Cycle> {
        let mut worked = false;
        let mut last_error = None;

        for domain in &self.config.domains {
            self.core.enter(record, PHASE_COUNT);
            let outcome = self.crystallize(domain).await;
            record.phase_reached = self.core.current_phase();
            match outcome {
                Ok(DomainOutcome::BelowThreshold { .. }) => {}
                Ok(DomainOutcome::Rejected { .. }) => worked = true,
                Ok(DomainOutcome::Extracted(_)) => {
                    worked = true;
                    record.principle_extracted = true;
                }
                Err(e) => {
                    warn!("{}: crystallization failed: {}", domain, e);
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            return Err(e);
        }
        if !worked {
            return Ok(Cycle::Skipped);
        }
        self.core.enter(record, PHASE_COMPLETE);
        Ok(Cycle::Done)
    }
}

//! ReflectorAgent: REFLECT -> VERIFY -> STORE
//!
//! Asks the model what it wants to get better at, gates each candidate on
//! two scores, and persists the survivors as verified goals.

use crate::agent::{Agent, AgentCore, Cycle};
use crate::error::AgentResult;
use crate::prompts;
use autotelos_core::{unit_interval, AgentKind, CycleRecord, Goal, PHASE_COMPLETE};
use autotelos_entropy::EntropyPool;
use autotelos_graph::GraphStore;
use autotelos_llm::{parse_json, GenerateOptions, Generator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PHASE_REFLECT: &str = "reflect";
pub const PHASE_VERIFY: &str = "verify";
pub const PHASE_STORE: &str = "store";

/// Goals below this intensity are rejected without a verification call.
pub const MIN_INTENSITY: f64 = 0.1;
/// Both verification scores must reach this.
pub const MIN_SCORE: f64 = 0.6;
pub const VERIFY_TEMPERATURE: f32 = 0.1;
/// Heuristic gate used when verification cannot be obtained.
pub const HEURISTIC_MIN_CHARS: usize = 20;
pub const HEURISTIC_MIN_INTENSITY: f64 = 0.3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectorConfig {
    /// Domains a goal may be tagged with. Anything else is stored domain-less.
    pub domains: Vec<String>,
    pub max_candidates: usize,
    pub temperature: f32,
    /// Half-width of the entropy jitter applied to `temperature`. Zero disables it.
    pub temperature_jitter: f32,
    pub max_tokens: u32,
}

impl Default for ReflectorConfig {
    fn default() -> Self {
        Self {
            domains: vec!["code".into()],
            max_candidates: 5,
            temperature: 0.8,
            temperature_jitter: 0.2,
            max_tokens: 2048,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Scores {
    #[serde(default)]
    actionability: f64,
    #[serde(default)]
    specificity: f64,
}

/// How a candidate fared in VERIFY.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Failed the pre-checks; no generation call was made.
    Rejected,
    Scored { actionability: f64, specificity: f64, passed: bool },
    /// Verification call failed; the local heuristic decided.
    Heuristic { passed: bool },
}

impl Verdict {
    pub fn passed(self) -> bool {
        match self {
            Verdict::Rejected => false,
            Verdict::Scored { passed, .. } | Verdict::Heuristic { passed } => passed,
        }
    }
}

pub struct ReflectorAgent {
    core: AgentCore,
    graph: Arc<dyn GraphStore>,
    generator: Arc<dyn Generator>,
    entropy: Option<EntropyPool>,
    config: ReflectorConfig,
}

impl ReflectorAgent {
    pub fn new(
        id: impl Into<String>,
        graph: Arc<dyn GraphStore>,
        generator: Arc<dyn Generator>,
        config: ReflectorConfig,
    ) -> Self {
        Self {
            core: AgentCore::new(id, AgentKind::Reflector),
            graph,
            generator,
            entropy: None,
            config,
        }
    }

    /// Jitter the reflection temperature from this pool.
    pub fn with_entropy(mut self, pool: EntropyPool) -> Self {
        self.entropy = Some(pool);
        self
    }

    fn reflection_temperature(&self) -> f32 {
        let base = self.config.temperature;
        match &self.entropy {
            Some(pool) if self.config.temperature_jitter > 0.0 => {
                let t = pool.temperature_delta(base as f64, self.config.temperature_jitter as f64);
                t.clamp(0.0, 2.0) as f32
            }
            _ => base,
        }
    }

    /// REFLECT: ask for candidates and parse them.
    pub async fn reflect(&self) -> AgentResult<Vec<Goal>> {
        let prompt = prompts::reflection(&self.config.domains, self.config.max_candidates);
        let temperature = self.reflection_temperature();
        let options = GenerateOptions::with_temperature(temperature).max_tokens(self.config.max_tokens);

        let text = self.generator.generate(&prompt, options).await?;
        let mut goals = parse_candidates(&text, &self.config.domains)?;
        goals.truncate(self.config.max_candidates);
        debug!("reflection at t={:.2} produced {} candidates", temperature, goals.len());
        Ok(goals)
    }

    /// VERIFY: gate one candidate.
    pub async fn verify(&self, goal: &Goal) -> Verdict {
        if goal.description.trim().is_empty() || goal.intensity < MIN_INTENSITY {
            return Verdict::Rejected;
        }

        let prompt = prompts::verification(goal);
        let options = GenerateOptions::with_temperature(VERIFY_TEMPERATURE).max_tokens(256);
        let scored = match self.generator.generate(&prompt, options).await {
            Ok(text) => parse_json::<Scores>(&text).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match scored {
            Ok(scores) => {
                let actionability = unit_interval(scores.actionability);
                let specificity = unit_interval(scores.specificity);
                Verdict::Scored {
                    actionability,
                    specificity,
                    passed: actionability >= MIN_SCORE && specificity >= MIN_SCORE,
                }
            }
            Err(reason) => {
                warn!("verification unavailable, using heuristic: {}", reason);
                Verdict::Heuristic {
                    passed: heuristic_gate(goal),
                }
            }
        }
    }
}

/// Local fallback gate.
pub fn heuristic_gate(goal: &Goal) -> bool {
    goal.description.trim().chars().count() > HEURISTIC_MIN_CHARS
        && goal.intensity >= HEURISTIC_MIN_INTENSITY
}

/// Parse a reflection response into unverified goals. Elements without a
/// description are dropped; a domain outside `domains` becomes `None`.
pub fn parse_candidates(text: &str, domains: &[String]) -> Result<Vec<Goal>, autotelos_llm::ParseError> {
    let items: Vec<Value> = parse_json(text)?;
    let goals = items
        .iter()
        .filter_map(|item| {
            let description = item.get("description")?.as_str()?.trim();
            if description.is_empty() {
                return None;
            }
            let intensity = item.get("intensity").and_then(Value::as_f64).unwrap_or(0.0);
            let domain = item
                .get("domain")
                .and_then(Value::as_str)
                .and_then(|d| known_domain(d, domains));
            Some(Goal::new(description, intensity, domain))
        })
        .collect();
    Ok(goals)
}

fn known_domain(raw: &str, domains: &[String]) -> Option<String> {
    let raw = raw.trim();
    domains.iter().find(|d| d.eq_ignore_ascii_case(raw)).cloned()
}

#[async_trait::async_trait]
impl Agent for ReflectorAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn graph(&self) -> &Arc<dyn GraphStore> {
        &self.graph
    }

    async fn run_cycle(&self, record: &mut CycleRecord) -> AgentResult<Cycle> {
        self.core.enter(record, PHASE_REFLECT);
        let candidates = self.reflect().await?;
        record.goals_generated = candidates.len() as u32;

        self.core.enter(record, PHASE_VERIFY);
        let mut accepted = Vec::new();
        for goal in candidates {
            let verdict = self.verify(&goal).await;
            debug!("{:?} for {:?}", verdict, goal.description);
            if verdict.passed() {
                accepted.push(goal.verified());
            }
        }
        record.goals_verified = accepted.len() as u32;

        self.core.enter(record, PHASE_STORE);
        let mut last_error = None;
        for goal in &accepted {
            if let Err(e) = self.graph.store_goal(goal).await {
                warn!("failed to store goal {}: {}", goal.id, e);
                last_error = Some(e);
            }
        }
        if let Some(e) = last_error {
            return Err(e.into());
        }

        info!(
            "reflection: {} candidates, {} verified",
            record.goals_generated, record.goals_verified
        );
        self.core.enter(record, PHASE_COMPLETE);
        Ok(Cycle::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_drop_unknown_domains() {
        let domains = vec!["code".to_string(), "math".to_string()];
        let text = r#"```json
[
  {"description": "Implement stable sort", "intensity": 0.8, "domain": "Code"},
  {"description": "Learn to juggle", "intensity": 0.4, "domain": "circus"},
  {"description": "Prove things", "intensity": 1.7, "domain": 42},
  {"description": "   ", "intensity": 0.9},
  {"intensity": 0.9}
]
```"#;
        let goals = parse_candidates(text, &domains).unwrap();
        assert_eq!(goals.len(), 3);
        assert_eq!(goals[0].domain.as_deref(), Some("code"));
        assert!(goals[1].domain.is_none());
        assert!(goals[2].domain.is_none());
        assert_eq!(goals[2].intensity, 1.0);
        assert!(goals.iter().all(|g| !g.verified));
    }

    #[test]
    fn candidates_reject_non_array() {
        assert!(parse_candidates("{\"description\": \"x\"}", &[]).is_err());
        assert!(parse_candidates("no json here", &[]).is_err());
    }

    #[test]
    fn heuristic_needs_length_and_intensity() {
        let long = "Implement a stable merge sort over linked lists";
        assert!(heuristic_gate(&Goal::new(long, 0.3, None)));
        assert!(!heuristic_gate(&Goal::new(long, 0.29, None)));
        assert!(!heuristic_gate(&Goal::new("Sort faster", 0.9, None)));
    }
}

//! Autotelos configuration
//!
//! Every tunable in one place. Loaded from TOML at startup, falls back to
//! defaults if the file is missing or does not parse.

use autotelos_agent::{CrystallizerConfig, PractitionerConfig, ReflectorConfig};
use autotelos_entropy::EntropyConfig;
use autotelos_gateway::GatewayConfig;
use autotelos_graph::GraphConfig;
use autotelos_llm::GenerationConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutotelosConfig {
    pub graph: GraphConfig,
    pub llm: LlmConfig,
    pub entropy: EntropyConfig,
    pub reflector: ReflectorConfig,
    pub crystallizer: CrystallizerConfig,
    pub gateway: GatewayConfig,
    pub intervals: IntervalConfig,
    /// One practitioner per entry. Each should own a distinct domain.
    pub practitioner: Vec<PractitionerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key when `--api-key` is absent.
    pub api_key_env: String,
    pub min_interval_secs: f64,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let generation = GenerationConfig::default();
        Self {
            base_url: generation.base_url,
            model: generation.model,
            api_key_env: "OPENAI_API_KEY".into(),
            min_interval_secs: generation.min_interval_secs,
            timeout_secs: generation.timeout_secs,
        }
    }
}

impl LlmConfig {
    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            min_interval_secs: self.min_interval_secs,
            timeout_secs: self.timeout_secs,
        }
    }

    /// Flag value first, then the configured environment variable.
    pub fn resolve_api_key(&self, flag: Option<String>) -> anyhow::Result<String> {
        flag.filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "{} not set. Pass --api-key or set the env var.",
                    self.api_key_env
                )
            })
    }
}

/// Tick period per agent kind, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    pub reflector_secs: f64,
    pub practitioner_secs: f64,
    pub crystallizer_secs: f64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            reflector_secs: 300.0,
            practitioner_secs: 60.0,
            crystallizer_secs: 600.0,
        }
    }
}

impl IntervalConfig {
    pub fn reflector(&self) -> Duration {
        secs(self.reflector_secs)
    }

    pub fn practitioner(&self) -> Duration {
        secs(self.practitioner_secs)
    }

    pub fn crystallizer(&self) -> Duration {
        secs(self.crystallizer_secs)
    }
}

fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::from_secs(1)
    }
}

impl AutotelosConfig {
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}; using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Practitioners to launch. An empty list means one for each reflector
    /// domain with default settings.
    pub fn practitioners(&self) -> Vec<PractitionerConfig> {
        if !self.practitioner.is_empty() {
            return self.practitioner.clone();
        }
        self.reflector
            .domains
            .iter()
            .map(|domain| PractitionerConfig {
                domain: domain.clone(),
                ..PractitionerConfig::default()
            })
            .collect()
    }

    /// Deployment problems worth a warning. None of them stop startup.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let reflected: HashSet<&str> = self.reflector.domains.iter().map(String::as_str).collect();

        let mut seen = HashSet::new();
        for p in self.practitioners() {
            if !seen.insert(p.domain.clone()) {
                warnings.push(format!(
                    "domain '{}' has more than one practitioner; they will race for the same goals",
                    p.domain
                ));
            }
            if !reflected.contains(p.domain.as_str()) {
                warnings.push(format!(
                    "practitioner domain '{}' is not a reflector domain; it only sees submitted goals",
                    p.domain
                ));
            }
        }
        for domain in &self.crystallizer.domains {
            if !seen.contains(domain) {
                warnings.push(format!(
                    "crystallizer domain '{}' has no practitioner; it will never reach threshold",
                    domain
                ));
            }
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_roundtrip_through_toml() {
        let config = AutotelosConfig::default();
        let parsed: AutotelosConfig = toml::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.crystallizer.bootstrap_threshold, 10);
    }

    #[test]
    fn nonpositive_interval_is_clamped() {
        let intervals = IntervalConfig {
            reflector_secs: 0.0,
            practitioner_secs: -3.0,
            crystallizer_secs: f64::NAN,
        };
        assert_eq!(intervals.reflector(), Duration::from_secs(1));
        assert_eq!(intervals.practitioner(), Duration::from_secs(1));
        assert_eq!(intervals.crystallizer(), Duration::from_secs(1));
    }
}

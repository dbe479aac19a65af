// =============================================================================
// Runtime Configuration — engine settings loaded from JSON + environment
// =============================================================================
//
// Every field carries a serde default so that a partial (or empty) config
// file still loads. Environment variables override the file for the handful
// of settings a deployment usually changes. Secrets (RPC URL, private key)
// are never part of this struct; they come from the environment only.
// =============================================================================

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::Horizon;

// =============================================================================
// Default-value helpers
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:3002".to_string()
}

fn default_deployment_path() -> String {
    "../contracts/build/deployment.json".to_string()
}

fn default_decision_log_capacity() -> usize {
    100
}

fn default_scorer_program() -> String {
    "python".to_string()
}

fn default_scorer_args() -> Vec<String> {
    vec!["../ml/run_risk_with_template.py".to_string()]
}

fn default_scorer_workdir() -> Option<String> {
    Some("../ml".to_string())
}

fn default_scorer_timeout_ms() -> u64 {
    10_000
}

fn default_market() -> String {
    "vn30".to_string()
}

fn default_recent_action_count() -> u32 {
    3
}

// =============================================================================
// ScorerSettings
// =============================================================================

/// How the external risk scorer is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerSettings {
    /// Executable to spawn.
    #[serde(default = "default_scorer_program")]
    pub program: String,

    /// Leading arguments (typically the script path). The strategy, market
    /// and order type are appended after these.
    #[serde(default = "default_scorer_args")]
    pub args: Vec<String>,

    /// Working directory for the child process.
    #[serde(default = "default_scorer_workdir")]
    pub workdir: Option<String>,

    /// Hard limit on a single scoring call.
    #[serde(default = "default_scorer_timeout_ms")]
    pub timeout_ms: u64,

    /// When set, no process is spawned and every order scores this value.
    /// Must be a finite number in `[0, 1]`.
    #[serde(default)]
    pub fixed_score: Option<f64>,
}

impl Default for ScorerSettings {
    fn default() -> Self {
        Self {
            program: default_scorer_program(),
            args: default_scorer_args(),
            workdir: default_scorer_workdir(),
            timeout_ms: default_scorer_timeout_ms(),
            fixed_score: None,
        }
    }
}

// =============================================================================
// PipelineDefaults
// =============================================================================

/// Context the decision pipeline fills in for every order intent, since the
/// intent itself does not carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefaults {
    /// Market tag handed to the scorer.
    #[serde(default = "default_market")]
    pub market: String,

    /// Horizon handed to the rule classifier.
    #[serde(default)]
    pub horizon: Horizon,

    /// Recent action count handed to the rule classifier.
    #[serde(default = "default_recent_action_count")]
    pub recent_action_count: u32,
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            market: default_market(),
            horizon: Horizon::Long,
            recent_action_count: default_recent_action_count(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Address the HTTP API binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Deployment descriptor written by the contract deploy script.
    #[serde(default = "default_deployment_path")]
    pub deployment_path: String,

    /// Number of recent verdicts kept in memory.
    #[serde(default = "default_decision_log_capacity")]
    pub decision_log_capacity: usize,

    #[serde(default)]
    pub scorer: ScorerSettings,

    #[serde(default)]
    pub pipeline: PipelineDefaults,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            deployment_path: default_deployment_path(),
            decision_log_capacity: default_decision_log_capacity(),
            scorer: ScorerSettings::default(),
            pipeline: PipelineDefaults::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid runtime config in {}", path.display()))?;

        info!(
            path = %path.display(),
            bind_addr = %config.bind_addr,
            market = %config.pipeline.market,
            horizon = %config.pipeline.horizon,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Reject values that would break downstream invariants.
    pub fn validate(&self) -> Result<()> {
        if let Some(score) = self.scorer.fixed_score {
            if !score.is_finite() || !(0.0..=1.0).contains(&score) {
                bail!("scorer.fixed_score must be within [0, 1], got {score}");
            }
        }
        Ok(())
    }

    /// Apply environment overrides on top of the loaded values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.bind_addr = format!("0.0.0.0:{port}"),
                Err(e) => warn!(value = %port, error = %e, "ignoring invalid PORT"),
            }
        }
        if let Some(addr) = lookup("DISCIPLINE_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(path) = lookup("DEPLOYMENT_PATH") {
            self.deployment_path = path;
        }
        if let Some(script) = lookup("ML_SCRIPT_PATH") {
            self.scorer.args = vec![script];
        }
        if let Some(ms) = lookup("ML_TIMEOUT_MS") {
            match ms.trim().parse::<u64>() {
                Ok(ms) => self.scorer.timeout_ms = ms,
                Err(e) => warn!(value = %ms, error = %e, "ignoring invalid ML_TIMEOUT_MS"),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3002");
        assert_eq!(cfg.decision_log_capacity, 100);
        assert_eq!(cfg.scorer.program, "python");
        assert_eq!(cfg.scorer.timeout_ms, 10_000);
        assert!(cfg.scorer.fixed_score.is_none());
        assert_eq!(cfg.pipeline.market, "vn30");
        assert_eq!(cfg.pipeline.horizon, Horizon::Long);
        assert_eq!(cfg.pipeline.recent_action_count, 3);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3002");
        assert_eq!(cfg.scorer.args, vec!["../ml/run_risk_with_template.py"]);
        assert_eq!(cfg.pipeline.horizon, Horizon::Long);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "pipeline": { "horizon": "short" }, "scorer": { "fixed_score": 0.2 } }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.pipeline.horizon, Horizon::Short);
        assert_eq!(cfg.pipeline.market, "vn30");
        assert_eq!(cfg.scorer.fixed_score, Some(0.2));
        assert_eq!(cfg.scorer.timeout_ms, 10_000);
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "4000"),
            ("DEPLOYMENT_PATH", "/tmp/deployment.json"),
            ("ML_SCRIPT_PATH", "/opt/ml/score.py"),
            ("ML_TIMEOUT_MS", "2500"),
        ]
        .into_iter()
        .collect();

        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.bind_addr, "0.0.0.0:4000");
        assert_eq!(cfg.deployment_path, "/tmp/deployment.json");
        assert_eq!(cfg.scorer.args, vec!["/opt/ml/score.py"]);
        assert_eq!(cfg.scorer.timeout_ms, 2500);
    }

    #[test]
    fn bind_addr_override_beats_port() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(|k| match k {
            "PORT" => Some("4000".into()),
            "DISCIPLINE_BIND_ADDR" => Some("127.0.0.1:9000".into()),
            _ => None,
        });
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
    }

    #[test]
    fn invalid_numbers_are_ignored() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(|k| match k {
            "PORT" => Some("not-a-port".into()),
            "ML_TIMEOUT_MS" => Some("soon".into()),
            _ => None,
        });
        assert_eq!(cfg.bind_addr, "0.0.0.0:3002");
        assert_eq!(cfg.scorer.timeout_ms, 10_000);
    }

    #[test]
    fn fixed_score_must_be_a_probability() {
        for score in [0.0, 0.5, 1.0] {
            let mut cfg = RuntimeConfig::default();
            cfg.scorer.fixed_score = Some(score);
            assert!(cfg.validate().is_ok(), "score {score}");
        }
        for score in [5.0, -0.1, 1.000_1, f64::NAN, f64::INFINITY] {
            let mut cfg = RuntimeConfig::default();
            cfg.scorer.fixed_score = Some(score);
            assert!(cfg.validate().is_err(), "score {score}");
        }
    }

    #[test]
    fn load_rejects_out_of_range_fixed_score() {
        let path = std::env::temp_dir().join(format!("discipline-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{ "scorer": { "fixed_score": 5.0 } }"#).unwrap();
        let result = RuntimeConfig::load(&path);
        std::fs::remove_file(&path).unwrap();

        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("fixed_score"));
    }

    #[test]
    fn load_accepts_in_range_fixed_score() {
        let path = std::env::temp_dir().join(format!("discipline-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{ "scorer": { "fixed_score": 0.8 } }"#).unwrap();
        let result = RuntimeConfig::load(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(result.unwrap().scorer.fixed_score, Some(0.8));
    }
}

// =============================================================================
// Risk Scoring — external ML scorer behind a trait
// =============================================================================
//
// `ProcessScorer` spawns the configured scoring program once per call with
// three trailing positional arguments (strategy, market, orderType) and
// expects a single JSON object `{"risk_score": <0..=1>}` on stdout.
//
// Any failure (spawn error, non-zero exit, malformed or out-of-range output,
// timeout) is logged and replaced by NEUTRAL_RISK_SCORE. On timeout the child
// is killed. There are no retries.
//
// `FixedScorer` returns a constant and is used when no scoring program is
// configured, and in tests.
// =============================================================================

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::runtime_config::ScorerSettings;
use crate::types::OrderDirection;

/// Score substituted whenever the scorer cannot produce a valid value.
pub const NEUTRAL_RISK_SCORE: f64 = 0.5;

/// Input to a risk scorer.
#[derive(Debug, Clone)]
pub struct ScoreRequest {
    pub strategy: String,
    pub market: String,
    pub direction: OrderDirection,
}

/// Anything that can turn a [`ScoreRequest`] into a risk score in `[0, 1]`.
///
/// Implementations never fail; they fall back to [`NEUTRAL_RISK_SCORE`].
#[async_trait]
pub trait RiskScorer: Send + Sync {
    async fn risk_score(&self, request: &ScoreRequest) -> f64;
}

// ---------------------------------------------------------------------------
// FixedScorer
// ---------------------------------------------------------------------------

/// Always returns the same score.
#[derive(Debug, Clone, Copy)]
pub struct FixedScorer(pub f64);

#[async_trait]
impl RiskScorer for FixedScorer {
    async fn risk_score(&self, _request: &ScoreRequest) -> f64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// ProcessScorer
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ScoreOutput {
    risk_score: f64,
}

/// Runs an external program to obtain the score.
#[derive(Debug, Clone)]
pub struct ProcessScorer {
    program: String,
    args: Vec<String>,
    workdir: Option<PathBuf>,
    timeout: Duration,
}

impl ProcessScorer {
    pub fn new(settings: &ScorerSettings) -> Self {
        Self {
            program: settings.program.clone(),
            args: settings.args.clone(),
            workdir: settings.workdir.as_ref().map(PathBuf::from),
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }

    async fn run(&self, request: &ScoreRequest) -> Result<f64> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&request.strategy)
            .arg(&request.market)
            .arg(request.direction.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn scorer '{}'", self.program))?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.context("failed to collect scorer output")?,
            Err(_) => bail!("scorer timed out after {} ms", self.timeout.as_millis()),
        };

        if !output.status.success() {
            bail!(
                "scorer exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        parse_score(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse the scorer's stdout. The value must be a finite number in `[0, 1]`.
fn parse_score(stdout: &str) -> Result<f64> {
    let parsed: ScoreOutput =
        serde_json::from_str(stdout.trim()).context("malformed scorer output")?;
    let score = parsed.risk_score;
    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        bail!("scorer returned out-of-range risk_score {score}");
    }
    Ok(score)
}

#[async_trait]
impl RiskScorer for ProcessScorer {
    #[instrument(skip(self), name = "scoring::process", fields(strategy = %request.strategy))]
    async fn risk_score(&self, request: &ScoreRequest) -> f64 {
        match self.run(request).await {
            Ok(score) => {
                debug!(score, "risk score received");
                score
            }
            Err(e) => {
                warn!(error = %e, fallback = NEUTRAL_RISK_SCORE, "scorer failed, using neutral score");
                NEUTRAL_RISK_SCORE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ScoreRequest {
        ScoreRequest {
            strategy: "MOMENTUM".into(),
            market: "vn30".into(),
            direction: OrderDirection::Sell,
        }
    }

    #[test]
    fn parse_accepts_valid_score() {
        assert!((parse_score("{\"risk_score\": 0.8}\n").unwrap() - 0.8).abs() < f64::EPSILON);
        assert!((parse_score("{\"risk_score\": 0}").unwrap()).abs() < f64::EPSILON);
        assert!((parse_score("{\"risk_score\": 1}").unwrap() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_rejects_bad_output() {
        assert!(parse_score("").is_err());
        assert!(parse_score("not json").is_err());
        assert!(parse_score("{\"score\": 0.2}").is_err());
        assert!(parse_score("{\"risk_score\": \"0.2\"}").is_err());
        assert!(parse_score("{\"risk_score\": 1.5}").is_err());
        assert!(parse_score("{\"risk_score\": -0.1}").is_err());
    }

    #[tokio::test]
    async fn fixed_scorer_returns_constant() {
        assert!((FixedScorer(0.42).risk_score(&request()).await - 0.42).abs() < f64::EPSILON);
    }

    #[cfg(unix)]
    fn shell(script: &str, timeout_ms: u64) -> ProcessScorer {
        ProcessScorer::new(&ScorerSettings {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            workdir: None,
            timeout_ms,
            fixed_score: None,
        })
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_scorer_reads_stdout() {
        let scorer = shell("echo '{\"risk_score\": 0.8}'", 5_000);
        assert!((scorer.risk_score(&request()).await - 0.8).abs() < f64::EPSILON);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_scorer_passes_positional_args() {
        // `sh -c script a b c` binds $0=a, $1=b, $2=c.
        let scorer = shell(
            "[ \"$0\" = MOMENTUM ] && [ \"$1\" = vn30 ] && [ \"$2\" = sell ] && echo '{\"risk_score\": 0.25}'",
            5_000,
        );
        assert!((scorer.risk_score(&request()).await - 0.25).abs() < f64::EPSILON);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_scorer_falls_back_on_failure() {
        for script in [
            "echo garbage",
            "echo '{\"risk_score\": 7}'",
            "echo '{\"risk_score\": 0.9}'; exit 3",
        ] {
            let scorer = shell(script, 5_000);
            assert!(
                (scorer.risk_score(&request()).await - NEUTRAL_RISK_SCORE).abs() < f64::EPSILON,
                "script {script:?} should fall back"
            );
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_scorer_falls_back_on_timeout() {
        let scorer = shell("sleep 5; echo '{\"risk_score\": 0.9}'", 100);
        let started = std::time::Instant::now();
        let score = scorer.risk_score(&request()).await;
        assert!((score - NEUTRAL_RISK_SCORE).abs() < f64::EPSILON);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn process_scorer_falls_back_on_spawn_error() {
        let scorer = ProcessScorer::new(&ScorerSettings {
            program: "definitely-not-a-real-scorer-binary".into(),
            args: vec![],
            workdir: None,
            timeout_ms: 1_000,
            fixed_score: None,
        });
        assert!((scorer.risk_score(&request()).await - NEUTRAL_RISK_SCORE).abs() < f64::EPSILON);
    }
}

// =============================================================================
// Ledger Module
// =============================================================================
//
// On-chain record keeping for the discipline engine:
// - Commitments: a keccak256 hash of (user, strategy, text) registered with
//   the discipline vault.
// - Penalties: a fixed percentage per severity, applied through the vault.
//
// Both operations wait for the transaction receipt. Nothing is retried and
// every failure reaches the caller.

pub mod chain;
pub mod deployment;

use async_trait::async_trait;
use anyhow::Result;
use serde::Serialize;

use crate::types::{Horizon, Severity, ViolationType};

pub use chain::ChainLedger;
pub use deployment::{ContractAddresses, DeploymentStore};

/// Risk score reported on-chain with a penalty. The penalty request carries
/// no score of its own, so a neutral value is sent.
pub const PENALTY_RISK_SCORE: f64 = 0.5;

/// A user's written trading plan.
#[derive(Debug, Clone)]
pub struct Commitment {
    pub user_id: String,
    pub strategy_id: String,
    pub horizon: Horizon,
    pub text: String,
}

/// A violation to be penalised.
#[derive(Debug, Clone)]
pub struct ViolationEvent {
    pub user_id: String,
    pub violation_type: ViolationType,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerReceipt {
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PenaltyReceipt {
    pub tx_hash: String,
    /// Human-readable percentage, e.g. `"0.5%"`.
    pub penalty_amount: String,
}

/// Penalty charged for a severity tier.
///
/// The tier is a fraction of a percent (0.1 / 0.3 / 0.5). The vault takes it
/// scaled by 100 as an integer; the API reports the unscaled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Penalty {
    /// Percent x100; this is the value submitted on-chain.
    pub units: u64,
}

impl Penalty {
    pub fn for_severity(severity: Severity) -> Self {
        let units = match severity {
            Severity::Low => 10,
            Severity::Medium => 30,
            Severity::High => 50,
        };
        Self { units }
    }

    /// Unscaled percentage, e.g. `0.5`.
    pub fn percent(&self) -> f64 {
        self.units as f64 / 100.0
    }

    /// e.g. `"0.5%"`.
    pub fn label(&self) -> String {
        format!("{}%", self.percent())
    }
}

/// Scale a `[0, 1]` risk score to the integer percentage the vault expects.
pub fn risk_score_units(risk_score: f64) -> u64 {
    (risk_score.clamp(0.0, 1.0) * 100.0).floor() as u64
}

/// External ledger the HTTP layer writes to.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn register_commitment(&self, commitment: &Commitment) -> Result<LedgerReceipt>;

    async fn enforce_violation(&self, event: &ViolationEvent) -> Result<PenaltyReceipt>;
}

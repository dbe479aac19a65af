// =============================================================================
// Chain Ledger — DisciplineVault writes over JSON-RPC
// =============================================================================
//
// SECURITY: the private key is never logged; only its presence is reported.
//
// A ledger without RPC URL or key still constructs, so the API can serve
// everything else; its operations then fail with a configuration error.
// =============================================================================

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_provider::{network::EthereumWallet, Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{sol, SolValue};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::{info, instrument, warn};
use url::Url;

use super::{
    risk_score_units, Commitment, DeploymentStore, Ledger, LedgerReceipt, Penalty,
    PenaltyReceipt, ViolationEvent, PENALTY_RISK_SCORE,
};

sol! {
    #[sol(rpc)]
    contract DisciplineVault {
        function registerCommitment(bytes32 commitmentHash) external;
        function applyPenalty(uint256 penalty, string violationType, uint256 riskScore) external;
    }
}

/// `keccak256(abi.encode(userId, strategyId, commitmentText))`.
pub fn commitment_hash(user_id: &str, strategy_id: &str, text: &str) -> B256 {
    keccak256(encode_commitment(user_id, strategy_id, text))
}

fn encode_commitment(user_id: &str, strategy_id: &str, text: &str) -> Vec<u8> {
    (user_id.to_string(), strategy_id.to_string(), text.to_string()).abi_encode_params()
}

struct Connection {
    rpc_url: Url,
    signer: PrivateKeySigner,
}

pub struct ChainLedger {
    connection: Option<Connection>,
    deployment: Arc<DeploymentStore>,
}

impl ChainLedger {
    /// Build from `SEPOLIA_RPC_URL` / `SEPOLIA_PRIVATE_KEY`.
    pub fn from_env(deployment: Arc<DeploymentStore>) -> Result<Self> {
        Self::new(
            std::env::var("SEPOLIA_RPC_URL").ok(),
            std::env::var("SEPOLIA_PRIVATE_KEY").ok(),
            deployment,
        )
    }

    /// Missing values yield an unconfigured ledger; malformed values are an
    /// error.
    pub fn new(
        rpc_url: Option<String>,
        private_key: Option<String>,
        deployment: Arc<DeploymentStore>,
    ) -> Result<Self> {
        let rpc_url = rpc_url.filter(|s| !s.trim().is_empty());
        let private_key = private_key.filter(|s| !s.trim().is_empty());

        info!(
            rpc_url = rpc_url.as_deref().unwrap_or("<missing>"),
            private_key = if private_key.is_some() { "present" } else { "missing" },
            "ledger credentials"
        );

        let connection = match (rpc_url, private_key) {
            (Some(rpc_url), Some(private_key)) => {
                let rpc_url: Url = rpc_url
                    .trim()
                    .parse()
                    .context("SEPOLIA_RPC_URL is not a valid URL")?;
                let signer = PrivateKeySigner::from_str(private_key.trim())
                    .map_err(|e| anyhow!("SEPOLIA_PRIVATE_KEY is invalid: {e}"))?;
                info!(address = %signer.address(), "ledger signer ready");
                Some(Connection { rpc_url, signer })
            }
            _ => {
                warn!("SEPOLIA_RPC_URL or SEPOLIA_PRIVATE_KEY missing — ledger writes will fail");
                None
            }
        };

        Ok(Self {
            connection,
            deployment,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.connection.is_some()
    }

    fn provider(&self) -> Result<impl Provider> {
        let conn = self
            .connection
            .as_ref()
            .ok_or_else(|| anyhow!("ledger not configured: SEPOLIA_RPC_URL and SEPOLIA_PRIVATE_KEY are required"))?;
        let wallet = EthereumWallet::from(conn.signer.clone());
        Ok(ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(conn.rpc_url.clone()))
    }

    fn vault_address(&self) -> Result<Address> {
        let deployment = self.deployment.get()?;
        Address::from_str(&deployment.discipline_vault).with_context(|| {
            format!(
                "invalid disciplineVault address '{}'",
                deployment.discipline_vault
            )
        })
    }
}

#[async_trait]
impl Ledger for ChainLedger {
    #[instrument(skip_all, name = "ledger::register_commitment", fields(user_id = %commitment.user_id))]
    async fn register_commitment(&self, commitment: &Commitment) -> Result<LedgerReceipt> {
        let provider = self.provider()?;
        let vault = DisciplineVault::new(self.vault_address()?, &provider);

        let hash = commitment_hash(&commitment.user_id, &commitment.strategy_id, &commitment.text);

        let receipt = vault
            .registerCommitment(hash)
            .send()
            .await
            .context("failed to send registerCommitment")?
            .get_receipt()
            .await
            .context("failed to confirm registerCommitment")?;

        let tx_hash = format!("{:?}", receipt.transaction_hash);
        info!(
            tx_hash = %tx_hash,
            commitment_hash = %hash,
            strategy = %commitment.strategy_id,
            horizon = %commitment.horizon,
            "commitment registered"
        );

        Ok(LedgerReceipt { tx_hash })
    }

    #[instrument(skip_all, name = "ledger::enforce_violation", fields(user_id = %event.user_id))]
    async fn enforce_violation(&self, event: &ViolationEvent) -> Result<PenaltyReceipt> {
        let provider = self.provider()?;
        let vault = DisciplineVault::new(self.vault_address()?, &provider);

        let penalty = Penalty::for_severity(event.severity);

        let receipt = vault
            .applyPenalty(
                U256::from(penalty.units),
                event.violation_type.as_str().to_string(),
                U256::from(risk_score_units(PENALTY_RISK_SCORE)),
            )
            .send()
            .await
            .context("failed to send applyPenalty")?
            .get_receipt()
            .await
            .context("failed to confirm applyPenalty")?;

        let tx_hash = format!("{:?}", receipt.transaction_hash);
        info!(
            tx_hash = %tx_hash,
            violation = %event.violation_type,
            severity = %event.severity,
            penalty_units = penalty.units,
            "penalty applied"
        );

        Ok(PenaltyReceipt {
            tx_hash,
            penalty_amount: penalty.label(),
        })
    }
}

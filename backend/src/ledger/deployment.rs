// =============================================================================
// Deployment Descriptor — contract addresses written by the deploy script
// =============================================================================
//
// The descriptor is read on first use and cached for the process lifetime.
// A failed read is not cached, so a later request retries the file.
// =============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Contents of `deployment.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub network: String,
    pub decision_log: String,
    pub discipline_vault: String,
    /// Omitted by the deploy script when no treasury was configured.
    #[serde(default)]
    pub treasury: Option<String>,
    #[serde(default)]
    pub deployer: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: Option<u64>,
}

/// Public subset exposed over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAddresses {
    pub network: String,
    pub decision_log: String,
    pub discipline_vault: String,
    pub treasury: Option<String>,
}

impl Deployment {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read deployment descriptor {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse deployment descriptor {}", path.display()))
    }

    pub fn contracts(&self) -> ContractAddresses {
        ContractAddresses {
            network: self.network.clone(),
            decision_log: self.decision_log.clone(),
            discipline_vault: self.discipline_vault.clone(),
            treasury: self.treasury.clone(),
        }
    }
}

/// Lazily loaded, cached deployment descriptor.
#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
    cached: RwLock<Option<Arc<Deployment>>>,
}

impl DeploymentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: RwLock::new(None),
        }
    }

    /// Build a store that is already populated.
    #[cfg(test)]
    pub fn preloaded(deployment: Deployment) -> Self {
        Self {
            path: PathBuf::new(),
            cached: RwLock::new(Some(Arc::new(deployment))),
        }
    }

    pub fn get(&self) -> Result<Arc<Deployment>> {
        if let Some(d) = self.cached.read().as_ref() {
            return Ok(d.clone());
        }

        let mut cached = self.cached.write();
        if let Some(d) = cached.as_ref() {
            return Ok(d.clone());
        }
        let deployment = Arc::new(Deployment::load(&self.path)?);
        info!(
            path = %self.path.display(),
            network = %deployment.network,
            vault = %deployment.discipline_vault,
            "deployment descriptor loaded"
        );
        *cached = Some(deployment.clone());
        Ok(deployment)
    }
}

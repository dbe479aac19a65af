// =============================================================================
// Central Application State — Discipline Engine
// =============================================================================
//
// Ties the subsystems together for the HTTP handlers. Shared across requests
// via `Arc<AppState>`; each subsystem manages its own interior mutability.
//
// Thread safety:
//   - parking_lot::RwLock inside the cooldown store, decision log and
//     deployment cache.
//   - Arc wrappers so the pipeline and the state share one cooldown store.
// =============================================================================

use std::sync::Arc;

use crate::cooldown::CooldownStore;
use crate::decision_log::{DecisionLog, DecisionRecord};
use crate::ledger::{DeploymentStore, Ledger};
use crate::pipeline::{DecisionPipeline, Verdict};
use crate::runtime_config::RuntimeConfig;
use crate::scoring::RiskScorer;
use crate::types::OrderIntent;

pub struct AppState {
    // ── Decision path ──────────────────────────────────────────────────
    pub pipeline: DecisionPipeline,
    pub cooldowns: Arc<CooldownStore>,
    pub decision_log: DecisionLog,

    // ── Ledger ─────────────────────────────────────────────────────────
    pub ledger: Arc<dyn Ledger>,
    pub deployment: Arc<DeploymentStore>,

    /// Instant when the engine was started.
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Wire the subsystems together. The scorer and ledger are injected so
    /// tests can substitute deterministic implementations.
    pub fn new(
        config: RuntimeConfig,
        scorer: Arc<dyn RiskScorer>,
        ledger: Arc<dyn Ledger>,
        deployment: Arc<DeploymentStore>,
    ) -> Self {
        let cooldowns = Arc::new(CooldownStore::new());
        let pipeline = DecisionPipeline::new(scorer, cooldowns.clone(), config.pipeline);

        Self {
            decision_log: DecisionLog::new(config.decision_log_capacity),
            pipeline,
            cooldowns,
            ledger,
            deployment,
            start_time: std::time::Instant::now(),
        }
    }

    /// Run the decision pipeline and record the verdict.
    pub async fn evaluate_order(&self, intent: &OrderIntent) -> Verdict {
        let verdict = self.pipeline.evaluate(intent).await;
        self.decision_log.push(DecisionRecord::new(intent, &verdict));
        verdict
    }
}

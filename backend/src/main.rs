// =============================================================================
// Discipline Engine — Main Entry Point
// =============================================================================
//
// Evaluates trading intents against behavioural rules, enforces per-user
// cooldowns, and records commitments and penalties on-chain.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod cooldown;
mod decision_log;
mod ledger;
mod pipeline;
mod rules;
mod runtime_config;
mod scoring;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::ledger::{ChainLedger, DeploymentStore};
use crate::runtime_config::RuntimeConfig;
use crate::scoring::{FixedScorer, ProcessScorer, RiskScorer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Discipline Engine — Starting Up                   ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path =
        std::env::var("DISCIPLINE_CONFIG").unwrap_or_else(|_| "discipline_config.json".into());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env();

    // ── 2. Risk scorer ───────────────────────────────────────────────────
    let scorer: Arc<dyn RiskScorer> = match config.scorer.fixed_score {
        Some(score) => {
            warn!(score, "Fixed risk score configured — external scorer disabled");
            Arc::new(FixedScorer(score))
        }
        None => {
            info!(
                program = %config.scorer.program,
                args = ?config.scorer.args,
                timeout_ms = config.scorer.timeout_ms,
                "External risk scorer configured"
            );
            Arc::new(ProcessScorer::new(&config.scorer))
        }
    };

    // ── 3. Ledger ────────────────────────────────────────────────────────
    let deployment = Arc::new(DeploymentStore::new(&config.deployment_path));
    let ledger = ChainLedger::from_env(deployment.clone())
        .context("failed to initialise ledger from environment")?;
    if !ledger.is_configured() {
        warn!("Ledger unconfigured — /plan/create and /order/confirm will return 500");
    }

    // ── 4. Shared state ──────────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, scorer, Arc::new(ledger), deployment));

    // ── 5. Start the API server ──────────────────────────────────────────
    let app = api::rest::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("API server failed")?;

    info!("Discipline Engine shut down complete.");
    Ok(())
}

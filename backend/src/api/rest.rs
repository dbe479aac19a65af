// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Routes:
//   GET  /health              liveness
//   GET  /config/contracts    deployed contract addresses
//   POST /plan/create         register a trading commitment on-chain
//   POST /order/intent        evaluate an intended order
//   POST /order/confirm       apply a penalty on-chain
//   GET  /cooldown/:userId    current cooldown for a user
//   GET  /decisions           recent order-intent verdicts
//
// Every failure is either 400 (bad input, static message) or 500 (generic
// body, detail only in the logs). There is no authentication.
//
// CORS is permissive; the UI is served from a different origin. A panicking
// handler is answered with the same generic 500 as any internal error.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::error::{panic_response, ApiError, INVALID_REQUEST, MISSING_FIELDS};
use crate::app_state::AppState;
use crate::ledger::{Commitment, ContractAddresses, ViolationEvent};
use crate::pipeline::Verdict;
use crate::types::{Horizon, OrderDirection, OrderIntent, Severity, ViolationType};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS and panic middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/config/contracts", get(contracts))
        .route("/plan/create", post(create_plan))
        .route("/order/intent", post(order_intent))
        .route("/order/confirm", post(order_confirm))
        .route("/cooldown/:user_id", get(cooldown_status))
        .route("/decisions", get(decisions))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .with_state(state)
}

/// Treat absent and blank strings alike.
fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    uptime_seconds: u64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

// =============================================================================
// Contract config
// =============================================================================

#[derive(Serialize)]
struct ContractsResponse {
    contracts: ContractAddresses,
}

async fn contracts(State(state): State<Arc<AppState>>) -> Result<Json<ContractsResponse>, ApiError> {
    let deployment = state.deployment.get()?;
    Ok(Json(ContractsResponse {
        contracts: deployment.contracts(),
    }))
}

// =============================================================================
// Plan commitment
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePlanRequest {
    user_id: Option<String>,
    strategy_id: Option<String>,
    horizon: Option<String>,
    commitment_text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePlanResponse {
    status: &'static str,
    tx_hash: String,
}

impl CreatePlanRequest {
    fn into_commitment(self) -> Result<Commitment, ApiError> {
        let (Some(user_id), Some(strategy_id), Some(horizon), Some(text)) = (
            required(self.user_id),
            required(self.strategy_id),
            required(self.horizon),
            required(self.commitment_text),
        ) else {
            return Err(ApiError::BadRequest(MISSING_FIELDS));
        };

        let horizon: Horizon = horizon
            .parse()
            .map_err(|_| ApiError::BadRequest("Invalid horizon"))?;

        Ok(Commitment {
            user_id,
            strategy_id,
            horizon,
            text,
        })
    }
}

async fn create_plan(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreatePlanRequest>, JsonRejection>,
) -> Result<Json<CreatePlanResponse>, ApiError> {
    let Json(req) = body.map_err(|e| {
        warn!(error = %e, "rejected plan body");
        ApiError::BadRequest(MISSING_FIELDS)
    })?;
    let commitment = req.into_commitment()?;

    let receipt = state.ledger.register_commitment(&commitment).await?;
    info!(user_id = %commitment.user_id, tx_hash = %receipt.tx_hash, "plan committed");

    Ok(Json(CreatePlanResponse {
        status: "COMMITTED",
        tx_hash: receipt.tx_hash,
    }))
}

// =============================================================================
// Order intent
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderIntentRequest {
    user_id: Option<String>,
    order_type: Option<String>,
    amount: Option<f64>,
    strategy_id: Option<String>,
}

impl OrderIntentRequest {
    fn into_intent(self) -> Result<OrderIntent, ApiError> {
        let (Some(user_id), Some(order_type), Some(amount), Some(strategy_id)) = (
            required(self.user_id),
            required(self.order_type),
            self.amount,
            required(self.strategy_id),
        ) else {
            return Err(ApiError::BadRequest(MISSING_FIELDS));
        };

        let direction: OrderDirection = order_type
            .parse()
            .map_err(|_| ApiError::BadRequest("Invalid orderType"))?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ApiError::BadRequest("Invalid amount"));
        }

        Ok(OrderIntent {
            user_id,
            direction,
            amount,
            strategy_id,
        })
    }
}

async fn order_intent(
    State(state): State<Arc<AppState>>,
    body: Result<Json<OrderIntentRequest>, JsonRejection>,
) -> Result<Json<Verdict>, ApiError> {
    let Json(req) = body.map_err(|e| {
        warn!(error = %e, "rejected order intent body");
        ApiError::BadRequest(MISSING_FIELDS)
    })?;
    let intent = req.into_intent()?;

    Ok(Json(state.evaluate_order(&intent).await))
}

// =============================================================================
// Order confirmation
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderConfirmRequest {
    user_id: Option<String>,
    confirm: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderConfirmResponse {
    status: &'static str,
    tx_hash: String,
    penalty: String,
}

async fn order_confirm(
    State(state): State<Arc<AppState>>,
    body: Result<Json<OrderConfirmRequest>, JsonRejection>,
) -> Result<Json<OrderConfirmResponse>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::BadRequest(INVALID_REQUEST))?;
    let user_id = match (required(req.user_id), req.confirm) {
        (Some(user_id), Some(true)) => user_id,
        _ => return Err(ApiError::BadRequest(INVALID_REQUEST)),
    };

    // Confirmation is not linked to the user's last intent; it always
    // penalises a high-severity panic sell.
    let event = ViolationEvent {
        user_id,
        violation_type: ViolationType::PanicSell,
        severity: Severity::High,
    };
    let receipt = state.ledger.enforce_violation(&event).await?;

    Ok(Json(OrderConfirmResponse {
        status: "PENALTY_APPLIED",
        tx_hash: receipt.tx_hash,
        penalty: receipt.penalty_amount,
    }))
}

// =============================================================================
// Cooldown status
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CooldownResponse {
    user_id: String,
    active: bool,
    remaining_seconds: i64,
    cooldown_minutes: i64,
}

async fn cooldown_status(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let status = state.cooldowns.status(&user_id);
    Json(CooldownResponse {
        user_id,
        active: status.active,
        remaining_seconds: status.remaining_seconds,
        cooldown_minutes: status.cooldown_minutes,
    })
}

// =============================================================================
// Decisions
// =============================================================================

async fn decisions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.decision_log.recent())
}

// =============================================================================
// Tests
// =============================================================================

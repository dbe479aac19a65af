// =============================================================================
// Rule Classifier — maps a risk score plus order context to a violation
// =============================================================================
//
// Rules are checked in priority order; the first match wins:
//   1. PanicSell      — score >= 0.75, sell, long horizon
//   2. Overtrading    — score >= 0.60, >= 5 recent actions, short horizon
//   3. ShortTermism   — score >= 0.50, short horizon, sell
//   4. PlanDeviation  — score >= 0.40
//   5. None
//
// Severity depends on the score only. The explanation is a fixed three-line
// text selected by violation type.
// =============================================================================

use crate::types::{Horizon, OrderDirection, Severity, ViolationType};

const PANIC_SELL_MIN_SCORE: f64 = 0.75;
const OVERTRADING_MIN_SCORE: f64 = 0.60;
const OVERTRADING_MIN_ACTIONS: u32 = 5;
const SHORT_TERMISM_MIN_SCORE: f64 = 0.50;
const PLAN_DEVIATION_MIN_SCORE: f64 = 0.40;

/// Output of [`classify`].
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub explanation: [&'static str; 3],
}

/// Classify an order. Pure and total.
pub fn classify(
    risk_score: f64,
    direction: OrderDirection,
    horizon: Horizon,
    recent_action_count: u32,
) -> Classification {
    let is_sell = direction == OrderDirection::Sell;

    let violation_type = if risk_score >= PANIC_SELL_MIN_SCORE && is_sell && horizon == Horizon::Long
    {
        ViolationType::PanicSell
    } else if risk_score >= OVERTRADING_MIN_SCORE
        && recent_action_count >= OVERTRADING_MIN_ACTIONS
        && horizon == Horizon::Short
    {
        ViolationType::Overtrading
    } else if risk_score >= SHORT_TERMISM_MIN_SCORE && horizon == Horizon::Short && is_sell {
        ViolationType::ShortTermism
    } else if risk_score >= PLAN_DEVIATION_MIN_SCORE {
        ViolationType::PlanDeviation
    } else {
        ViolationType::None
    };

    Classification {
        violation_type,
        severity: severity_for(risk_score),
        explanation: explanation_for(violation_type),
    }
}

/// Severity tier for a risk score.
pub fn severity_for(risk_score: f64) -> Severity {
    if risk_score < 0.4 {
        Severity::Low
    } else if risk_score < 0.7 {
        Severity::Medium
    } else {
        Severity::High
    }
}

/// Cooldown length implied by the risk score alone.
pub fn base_cooldown_minutes(risk_score: f64) -> u32 {
    if risk_score < 0.4 {
        0
    } else if risk_score < 0.6 {
        15
    } else if risk_score < 0.8 {
        30
    } else {
        60
    }
}

/// The static explanation block for a violation type.
pub fn explanation_for(violation_type: ViolationType) -> [&'static str; 3] {
    match violation_type {
        ViolationType::PanicSell => [
            "This action shows signs of panic selling.",
            "Your current decision deviates from a long-term strategy due to short-term market pressure.",
            "Historical evidence suggests such behavior increases long-term loss probability.",
        ],
        ViolationType::Overtrading => [
            "This indicates overtrading behavior.",
            "Frequent short-term actions can lead to increased transaction costs and emotional fatigue.",
            "Consider pausing to reflect on your overall strategy.",
        ],
        ViolationType::ShortTermism => [
            "This reflects short-term focus in decision-making.",
            "Selling assets quickly may overlook long-term potential.",
            "Behavioral studies show short-termism often leads to suboptimal outcomes.",
        ],
        ViolationType::PlanDeviation => [
            "This action deviates from your planned investment approach.",
            "Sticking to a consistent plan helps mitigate behavioral biases.",
            "Review your original strategy to ensure alignment with long-term goals.",
        ],
        ViolationType::None => [
            "No significant behavioral violation detected.",
            "Your action aligns with low-risk decision-making.",
            "Continue monitoring for consistent, disciplined trading.",
        ],
    }
}

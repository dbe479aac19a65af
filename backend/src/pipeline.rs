// =============================================================================
// Decision Pipeline — score -> classify -> cooldown -> verdict
// =============================================================================
//
// Steps run strictly in sequence, and all of them always run:
//   1. Risk score from the injected scorer.
//   2. Rule classification with the configured horizon / recent-action count.
//   3. Cooldown start for the user (also for `None`, which clears any
//      running window), then a status read.
//   4. Verdict: BLOCKED if severity is HIGH and the cooldown is active,
//      WARN for any other violation, ALLOW otherwise.
// =============================================================================

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::cooldown::{CooldownStatus, CooldownStore};
use crate::rules::{self, Classification};
use crate::runtime_config::PipelineDefaults;
use crate::scoring::{RiskScorer, ScoreRequest};
use crate::types::{Decision, OrderIntent, Severity, ViolationType};

#[derive(Debug, Clone, Serialize)]
pub struct ViolationSummary {
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CooldownSummary {
    pub active: bool,
    pub minutes: i64,
}

/// Outcome of evaluating one order intent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub decision: Decision,
    pub risk_score: f64,
    pub violation: ViolationSummary,
    pub cooldown: CooldownSummary,
    pub explanation: [&'static str; 3],
}

/// Final decision rule.
pub fn decide(classification: &Classification, cooldown: &CooldownStatus) -> Decision {
    if classification.severity == Severity::High && cooldown.active {
        Decision::Blocked
    } else if classification.violation_type != ViolationType::None {
        Decision::Warn
    } else {
        Decision::Allow
    }
}

pub struct DecisionPipeline {
    scorer: Arc<dyn RiskScorer>,
    cooldowns: Arc<CooldownStore>,
    defaults: PipelineDefaults,
}

impl DecisionPipeline {
    pub fn new(
        scorer: Arc<dyn RiskScorer>,
        cooldowns: Arc<CooldownStore>,
        defaults: PipelineDefaults,
    ) -> Self {
        Self {
            scorer,
            cooldowns,
            defaults,
        }
    }

    /// Evaluate an order intent. Mutates the user's cooldown window.
    pub async fn evaluate(&self, intent: &OrderIntent) -> Verdict {
        let request = ScoreRequest {
            strategy: intent.strategy_id.clone(),
            market: self.defaults.market.clone(),
            direction: intent.direction,
        };
        let risk_score = self.scorer.risk_score(&request).await;

        let classification = rules::classify(
            risk_score,
            intent.direction,
            self.defaults.horizon,
            self.defaults.recent_action_count,
        );

        self.cooldowns
            .start(&intent.user_id, risk_score, classification.violation_type);
        let status = self.cooldowns.status(&intent.user_id);

        let decision = decide(&classification, &status);

        info!(
            user_id = %intent.user_id,
            strategy = %intent.strategy_id,
            direction = %intent.direction,
            amount = intent.amount,
            risk_score,
            violation = %classification.violation_type,
            severity = %classification.severity,
            cooldown_minutes = status.cooldown_minutes,
            decision = %decision,
            "order intent evaluated"
        );

        Verdict {
            decision,
            risk_score,
            violation: ViolationSummary {
                violation_type: classification.violation_type,
                severity: classification.severity,
            },
            cooldown: CooldownSummary {
                active: status.active,
                minutes: status.cooldown_minutes,
            },
            explanation: classification.explanation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::FixedScorer;
    use crate::types::{Horizon, OrderDirection};

    fn pipeline(score: f64, horizon: Horizon) -> (DecisionPipeline, Arc<CooldownStore>) {
        let store = Arc::new(CooldownStore::new());
        let defaults = PipelineDefaults {
            horizon,
            ..PipelineDefaults::default()
        };
        (
            DecisionPipeline::new(Arc::new(FixedScorer(score)), store.clone(), defaults),
            store,
        )
    }

    fn intent(direction: OrderDirection) -> OrderIntent {
        OrderIntent {
            user_id: "u1".into(),
            direction,
            amount: 100.0,
            strategy_id: "s1".into(),
        }
    }

    #[tokio::test]
    async fn high_risk_panic_sell_is_blocked() {
        let (p, _) = pipeline(0.8, Horizon::Long);
        let v = p.evaluate(&intent(OrderDirection::Sell)).await;
        assert_eq!(v.decision, Decision::Blocked);
        assert_eq!(v.violation.violation_type, ViolationType::PanicSell);
        assert_eq!(v.violation.severity, Severity::High);
        assert!(v.cooldown.active);
        assert_eq!(v.cooldown.minutes, 60);
    }

    #[tokio::test]
    async fn medium_risk_warns() {
        let (p, _) = pipeline(0.5, Horizon::Long);
        let v = p.evaluate(&intent(OrderDirection::Buy)).await;
        assert_eq!(v.decision, Decision::Warn);
        assert_eq!(v.violation.violation_type, ViolationType::PlanDeviation);
        assert_eq!(v.violation.severity, Severity::Medium);
        assert!(v.cooldown.active);
        assert_eq!(v.cooldown.minutes, 15);
    }

    #[tokio::test]
    async fn high_risk_buy_is_blocked_through_plan_deviation() {
        let (p, _) = pipeline(0.9, Horizon::Long);
        let v = p.evaluate(&intent(OrderDirection::Buy)).await;
        assert_eq!(v.violation.violation_type, ViolationType::PlanDeviation);
        assert_eq!(v.decision, Decision::Blocked);
        assert_eq!(v.cooldown.minutes, 60);
    }

    #[tokio::test]
    async fn clean_evaluation_clears_existing_cooldown() {
        let (p, store) = pipeline(0.05, Horizon::Long);
        store.start("u1", 0.9, ViolationType::PanicSell);
        assert!(store.status("u1").active);

        let v = p.evaluate(&intent(OrderDirection::Sell)).await;
        assert_eq!(v.decision, Decision::Allow);
        assert_eq!(v.violation.violation_type, ViolationType::None);
        assert!(!v.cooldown.active);
        assert_eq!(v.cooldown.minutes, 0);
        assert!(!store.status("u1").active);
    }

    #[tokio::test]
    async fn configured_horizon_reaches_classifier() {
        let (p, _) = pipeline(0.55, Horizon::Short);
        let v = p.evaluate(&intent(OrderDirection::Sell)).await;
        assert_eq!(v.violation.violation_type, ViolationType::ShortTermism);
        assert_eq!(v.decision, Decision::Warn);
        assert_eq!(v.cooldown.minutes, 30);
    }

    #[test]
    fn high_severity_without_cooldown_only_warns() {
        let c = rules::classify(0.9, OrderDirection::Buy, Horizon::Long, 0);
        let inactive = CooldownStatus {
            active: false,
            remaining_seconds: 0,
            cooldown_minutes: 0,
        };
        assert_eq!(decide(&c, &inactive), Decision::Warn);
    }

    #[test]
    fn verdict_serialises_in_wire_shape() {
        let v = Verdict {
            decision: Decision::Warn,
            risk_score: 0.5,
            violation: ViolationSummary {
                violation_type: ViolationType::PlanDeviation,
                severity: Severity::Medium,
            },
            cooldown: CooldownSummary {
                active: true,
                minutes: 15,
            },
            explanation: rules::explanation_for(ViolationType::PlanDeviation),
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["decision"], "WARN");
        assert_eq!(json["riskScore"], 0.5);
        assert_eq!(json["violation"]["type"], "PLAN_DEVIATION");
        assert_eq!(json["violation"]["severity"], "MEDIUM");
        assert_eq!(json["cooldown"]["active"], true);
        assert_eq!(json["cooldown"]["minutes"], 15);
        assert_eq!(json["explanation"].as_array().unwrap().len(), 3);
    }
}

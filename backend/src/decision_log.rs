// =============================================================================
// Decision Log — auditable record of every order-intent verdict
// =============================================================================
//
// Bounded in-memory ring; oldest entries are evicted once capacity is
// reached. Nothing is persisted.
// =============================================================================

use std::collections::VecDeque;

use parking_lot::RwLock;
use serde::Serialize;

use crate::pipeline::Verdict;
use crate::types::{Decision, OrderDirection, OrderIntent, Severity, ViolationType};

/// One evaluated order intent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    /// Unique identifier for this decision (UUID v4).
    pub id: String,
    /// ISO 8601 timestamp of when this decision was recorded.
    pub timestamp: String,
    pub user_id: String,
    pub strategy_id: String,
    pub order_type: OrderDirection,
    pub amount: f64,
    pub decision: Decision,
    pub risk_score: f64,
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub cooldown_minutes: i64,
}

impl DecisionRecord {
    pub fn new(intent: &OrderIntent, verdict: &Verdict) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            user_id: intent.user_id.clone(),
            strategy_id: intent.strategy_id.clone(),
            order_type: intent.direction,
            amount: intent.amount,
            decision: verdict.decision,
            risk_score: verdict.risk_score,
            violation_type: verdict.violation.violation_type,
            severity: verdict.violation.severity,
            cooldown_minutes: verdict.cooldown.minutes,
        }
    }
}

#[derive(Debug)]
pub struct DecisionLog {
    capacity: usize,
    records: RwLock<VecDeque<DecisionRecord>>,
}

impl DecisionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, record: DecisionRecord) {
        if self.capacity == 0 {
            return;
        }
        let mut records = self.records.write();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// All retained records, oldest first.
    pub fn recent(&self) -> Vec<DecisionRecord> {
        self.records.read().iter().cloned().collect()
    }
}

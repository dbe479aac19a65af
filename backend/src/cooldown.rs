// =============================================================================
// Cooldown Store — one cool-off window per user
// =============================================================================
//
// Duration = max(score-derived base, per-violation floor), except that a
// `None` violation forces zero. Starting a window replaces any previous one
// for the same user; there is no stacking.
//
// Expiry is lazy: there is no background timer. `status` flips the stored
// `active` flag once `now >= expires_at_ms`.
//
// Thread-safety: the map lives behind a `parking_lot::RwLock`. Concurrent
// writes for the same user are last-writer-wins.
// =============================================================================

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::rules::base_cooldown_minutes;
use crate::types::ViolationType;

const MS_PER_MINUTE: i64 = 60 * 1000;

/// A user's cool-off window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownWindow {
    pub user_id: String,
    pub started_at_ms: i64,
    pub expires_at_ms: i64,
    pub active: bool,
}

/// Point-in-time view of a user's cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownStatus {
    pub active: bool,
    pub remaining_seconds: i64,
    /// Remaining time rounded up to whole minutes.
    pub cooldown_minutes: i64,
}

impl CooldownStatus {
    const INACTIVE: Self = Self {
        active: false,
        remaining_seconds: 0,
        cooldown_minutes: 0,
    };
}

/// Minimum cooldown enforced for a violation type. `None` means the window
/// is forced to zero regardless of the score.
fn violation_floor(violation_type: ViolationType) -> Option<u32> {
    match violation_type {
        ViolationType::PanicSell => Some(60),
        ViolationType::Overtrading => Some(30),
        ViolationType::ShortTermism => Some(30),
        ViolationType::PlanDeviation => Some(15),
        ViolationType::None => None,
    }
}

/// Total cooldown length in minutes for a score / violation pair.
pub fn cooldown_minutes(risk_score: f64, violation_type: ViolationType) -> u32 {
    match violation_floor(violation_type) {
        Some(floor) => base_cooldown_minutes(risk_score).max(floor),
        None => 0,
    }
}

#[derive(Debug, Default)]
pub struct CooldownStore {
    windows: RwLock<HashMap<String, CooldownWindow>>,
}

impl CooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or replace) the cool-off window for `user_id` at the current time.
    pub fn start(&self, user_id: &str, risk_score: f64, violation_type: ViolationType) -> CooldownWindow {
        self.start_at(user_id, risk_score, violation_type, now_ms())
    }

    /// Same as [`start`](Self::start) with an explicit clock reading.
    pub fn start_at(
        &self,
        user_id: &str,
        risk_score: f64,
        violation_type: ViolationType,
        now_ms: i64,
    ) -> CooldownWindow {
        let minutes = cooldown_minutes(risk_score, violation_type);
        let window = CooldownWindow {
            user_id: user_id.to_string(),
            started_at_ms: now_ms,
            expires_at_ms: now_ms + i64::from(minutes) * MS_PER_MINUTE,
            active: minutes > 0,
        };

        let previous = self
            .windows
            .write()
            .insert(user_id.to_string(), window.clone());

        if window.active {
            info!(
                user_id = %user_id,
                violation = %violation_type,
                risk_score,
                minutes,
                "cool-off started"
            );
        } else if previous.map_or(false, |p| p.active && p.expires_at_ms > now_ms) {
            info!(user_id = %user_id, "cool-off cleared by clean evaluation");
        }

        window
    }

    /// Current cooldown status for `user_id`.
    pub fn status(&self, user_id: &str) -> CooldownStatus {
        self.status_at(user_id, now_ms())
    }

    /// Same as [`status`](Self::status) with an explicit clock reading.
    pub fn status_at(&self, user_id: &str, now_ms: i64) -> CooldownStatus {
        {
            let windows = self.windows.read();
            match windows.get(user_id) {
                None => return CooldownStatus::INACTIVE,
                Some(w) if now_ms < w.expires_at_ms => {
                    return active_status(w.expires_at_ms, now_ms)
                }
                Some(w) if !w.active => return CooldownStatus::INACTIVE,
                Some(_) => {}
            }
        }

        // Expired but still flagged active. Re-check under the write lock:
        // another request may have replaced the window meanwhile.
        let mut windows = self.windows.write();
        match windows.get_mut(user_id) {
            Some(w) if now_ms < w.expires_at_ms => active_status(w.expires_at_ms, now_ms),
            Some(w) => {
                if w.active {
                    w.active = false;
                    debug!(user_id = %user_id, "cool-off expired");
                }
                CooldownStatus::INACTIVE
            }
            None => CooldownStatus::INACTIVE,
        }
    }

    #[cfg(test)]
    fn window(&self, user_id: &str) -> Option<CooldownWindow> {
        self.windows.read().get(user_id).cloned()
    }
}

fn active_status(expires_at_ms: i64, now_ms: i64) -> CooldownStatus {
    let remaining_ms = expires_at_ms - now_ms;
    let remaining_seconds = (remaining_ms + 999) / 1000;
    CooldownStatus {
        active: true,
        remaining_seconds,
        cooldown_minutes: (remaining_seconds + 59) / 60,
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

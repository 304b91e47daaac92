//! Condition types carried in `status.conditions` of every CRD, and the
//! helper that mutates a condition list in place, set-if-transitioned style.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The condition types this system writes. Kept as one enum (rather than
/// bare strings) so every writer agrees on the exact spelling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    InventoryComplete,
    DriverReady,
    ToolkitReady,
    MonitoringReady,
    ReadyForPooling,
    WorkloadsDegraded,
    HardwareHealthy,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::InventoryComplete => "InventoryComplete",
            ConditionType::DriverReady => "DriverReady",
            ConditionType::ToolkitReady => "ToolkitReady",
            ConditionType::MonitoringReady => "MonitoringReady",
            ConditionType::ReadyForPooling => "ReadyForPooling",
            ConditionType::WorkloadsDegraded => "WorkloadsDegraded",
            ConditionType::HardwareHealthy => "HardwareHealthy",
        }
    }
}

/// Tri-state status mirroring the orchestration API's `ConditionStatus`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// A single condition entry, standard shape: type/status/reason/message plus
/// the time the status last flipped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
    /// Resource generation observed when this condition was last computed.
    pub observed_generation: i64,
}

/// Sets (or leaves untouched) a condition within `conditions`.
///
/// `last_transition_time` only advances when `status` actually changes from
/// its previous value (or the condition is new); reason/message/
/// observed_generation are always refreshed. Returns `true` iff the status
/// value changed, which callers use to decide whether to emit an event.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    type_: ConditionType,
    status: ConditionStatus,
    reason: impl Into<String>,
    message: impl Into<String>,
    observed_generation: i64,
    now: DateTime<Utc>,
) -> bool {
    let type_str = type_.as_str();
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == type_str) {
        let changed = existing.status != status;
        if changed {
            existing.last_transition_time = now;
        }
        existing.status = status;
        existing.reason = reason.into();
        existing.message = message.into();
        existing.observed_generation = observed_generation;
        changed
    } else {
        conditions.push(Condition {
            type_: type_str.to_string(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: now,
            observed_generation,
        });
        true
    }
}

/// Reads the current status of a condition type, `Unknown` if absent.
pub fn get_condition_status(conditions: &[Condition], type_: ConditionType) -> ConditionStatus {
    conditions
        .iter()
        .find(|c| c.type_ == type_.as_str())
        .map(|c| c.status)
        .unwrap_or(ConditionStatus::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn new_condition_is_a_transition() {
        let mut conds = Vec::new();
        let changed = set_condition(
            &mut conds,
            ConditionType::ReadyForPooling,
            ConditionStatus::True,
            "Ready",
            "",
            1,
            now(),
        );
        assert!(changed);
        assert_eq!(conds.len(), 1);
    }

    #[test]
    fn same_status_does_not_bump_transition_time() {
        let mut conds = Vec::new();
        set_condition(
            &mut conds,
            ConditionType::DriverReady,
            ConditionStatus::True,
            "Ready",
            "",
            1,
            now(),
        );
        let later = now() + chrono::Duration::seconds(60);
        let changed = set_condition(
            &mut conds,
            ConditionType::DriverReady,
            ConditionStatus::True,
            "Ready",
            "still ready",
            2,
            later,
        );
        assert!(!changed);
        assert_eq!(conds[0].last_transition_time, now());
        assert_eq!(conds[0].message, "still ready");
    }

    #[test]
    fn status_flip_bumps_transition_time() {
        let mut conds = Vec::new();
        set_condition(
            &mut conds,
            ConditionType::MonitoringReady,
            ConditionStatus::True,
            "Ready",
            "",
            1,
            now(),
        );
        let later = now() + chrono::Duration::seconds(60);
        let changed = set_condition(
            &mut conds,
            ConditionType::MonitoringReady,
            ConditionStatus::False,
            "MonitoringNotReady",
            "exporter down",
            2,
            later,
        );
        assert!(changed);
        assert_eq!(conds[0].last_transition_time, later);
    }
}

//! Helpers for computing the label/taint mutations the node marker applies
//! to `core/v1::Node` objects (spec §4.7). The node object itself is an
//! external type (`k8s_openapi::api::core::v1::Node`); this system never
//! defines its own node CRD.

use k8s_openapi::api::core::v1::Taint;

/// Standard `NoSchedule` taint for a pool's label key.
pub fn no_schedule_taint(key: &str, value: &str) -> Taint {
    Taint {
        key: key.to_string(),
        value: Some(value.to_string()),
        effect: "NoSchedule".to_string(),
        time_added: None,
    }
}

/// `true` if `taints` already contains a `NoSchedule` taint under `key`.
pub fn has_no_schedule_taint(taints: &[Taint], key: &str) -> bool {
    taints
        .iter()
        .any(|t| t.key == key && t.effect == "NoSchedule")
}

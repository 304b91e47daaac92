//! Candidate selection and units-per-device computation (spec §4.6 steps
//! 1-4).

use std::collections::BTreeMap;

use gpu_api::{DeviceSelector, GpuDevice, NodeSelector, PoolReference, PoolSpecBody, ResourceUnit};

/// `true` iff `device`'s assignment annotation names this pool, or it
/// currently owns the pool via back-reference (spec §4.6 step 1: candidates
/// are the union of both, so departures are detected too). Ignored devices
/// and those without a node name are never candidates.
pub fn is_candidate(
    device: &GpuDevice,
    assignment_annotation_key: &str,
    pool_name: &str,
    pool_namespace: Option<&str>,
) -> bool {
    if device.is_ignored() || device.spec.node_name.is_empty() {
        return false;
    }
    let annotation_matches = device
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(assignment_annotation_key))
        .is_some_and(|v| v == pool_name);
    let owns_via_back_reference = device
        .status
        .as_ref()
        .and_then(|s| s.pool_ref.as_ref())
        .is_some_and(|p| p.name == pool_name && p.namespace.as_deref() == pool_namespace);
    annotation_matches || owns_via_back_reference
}

/// Narrows `candidates` to those on nodes whose labels satisfy the pool's
/// node selector (spec §4.6 step 2). An empty selector matches every node.
pub fn matches_node_selector(node_labels: &BTreeMap<String, String>, selector: &NodeSelector) -> bool {
    selector
        .match_labels
        .iter()
        .all(|(k, v)| node_labels.get(k) == Some(v))
}

/// `true` iff `device` satisfies every set field of `selector` (spec §4.6
/// step 1, also reused by the webhook validator §4.9).
pub fn matches_device_selector(device: &GpuDevice, selector: &DeviceSelector) -> bool {
    if selector.is_empty() {
        return true;
    }
    if !selector.inventory_ids.is_empty() && !selector.inventory_ids.iter().any(|id| id == device.inventory_id())
    {
        return false;
    }
    if let Some(vendor) = &selector.pci_vendor {
        if &device.spec.hardware.vendor != vendor {
            return false;
        }
    }
    if let Some(pci_device) = &selector.pci_device {
        if &device.spec.hardware.product_name != pci_device {
            return false;
        }
    }
    let device_labels = device.metadata.labels.clone().unwrap_or_default();
    selector
        .labels
        .iter()
        .all(|(k, v)| device_labels.get(k) == Some(v))
}

/// Units-per-device for the pool's resource unit (spec §4.6 step 3).
pub fn units_per_device(device: &GpuDevice, body: &PoolSpecBody) -> u32 {
    match body.resource_unit {
        ResourceUnit::Card => body.slices_per_unit.unwrap_or(1),
        ResourceUnit::Mig => {
            let profile_name = body.mig_profile_name.as_deref().unwrap_or_default();
            let occurrences = device.mig_profile_occurrences(profile_name);
            match body.slices_per_unit {
                Some(per_unit) if per_unit > 0 => occurrences * per_unit,
                _ => occurrences,
            }
        }
        ResourceUnit::Share => 0,
    }
}

/// Sorts candidates deterministically by inventory id (spec §4.6 step 4
/// "fallback: device name" — the inventory id *is* the device name, spec
/// §3), then applies `maxDevicesPerNode`, returning the accepted devices and
/// the total capacity they contribute.
pub fn select_and_cap<'a>(
    mut candidates: Vec<&'a GpuDevice>,
    body: &PoolSpecBody,
) -> (Vec<&'a GpuDevice>, u32) {
    candidates.sort_by(|a, b| a.inventory_id().cmp(b.inventory_id()));

    let mut per_node_count: BTreeMap<String, u32> = BTreeMap::new();
    let mut accepted = Vec::new();
    let mut total = 0u32;

    for device in candidates {
        if let Some(max) = body.max_devices_per_node {
            let count = per_node_count.entry(device.spec.node_name.clone()).or_insert(0);
            if *count >= max {
                continue;
            }
            *count += 1;
        }
        total += units_per_device(device, body);
        accepted.push(device);
    }

    (accepted, total)
}

/// A device's current pool back-reference differs from `target` — legacy
/// records without a namespace are treated as matching a namespaced target
/// (spec §4.6 step 5 "legacy records without namespace are accepted as
/// matching").
pub fn differs_from_target(current: Option<&PoolReference>, target_name: &str, target_namespace: Option<&str>) -> bool {
    match current {
        None => true,
        Some(p) => {
            if p.name != target_name {
                return true;
            }
            match (p.namespace.as_deref(), target_namespace) {
                (None, _) => false,
                (Some(a), b) => Some(a) != b,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpu_api::{GpuDeviceSpec, GpuDeviceStatus, HardwareInfo, MigProfile};
    use kube::core::ObjectMeta;

    fn device(name: &str, node: &str) -> GpuDevice {
        GpuDevice {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: GpuDeviceSpec {
                node_name: node.to_string(),
                hardware: HardwareInfo::default(),
            },
            status: None,
        }
    }

    #[test]
    fn ignored_device_is_never_a_candidate() {
        let mut d = device("gpu-0", "node-a");
        d.metadata.labels = Some(BTreeMap::from([(
            "gpu.deckhouse.io/ignore".to_string(),
            "true".to_string(),
        )]));
        d.metadata.annotations = Some(BTreeMap::from([(
            "gpu.deckhouse.io/assignment".to_string(),
            "pool-a".to_string(),
        )]));
        assert!(!is_candidate(&d, "gpu.deckhouse.io/assignment", "pool-a", None));
    }

    #[test]
    fn back_reference_alone_makes_a_departing_device_a_candidate() {
        let mut d = device("gpu-0", "node-a");
        d.status = Some(GpuDeviceStatus {
            pool_ref: Some(PoolReference {
                name: "pool-a".to_string(),
                namespace: None,
            }),
            ..Default::default()
        });
        assert!(is_candidate(&d, "gpu.deckhouse.io/assignment", "pool-a", None));
    }

    #[test]
    fn card_unit_defaults_to_one() {
        let d = device("gpu-0", "node-a");
        let body = PoolSpecBody::default();
        assert_eq!(units_per_device(&d, &body), 1);
    }

    #[test]
    fn mig_unit_counts_matching_profile_occurrences() {
        let mut d = device("gpu-0", "node-a");
        d.spec.hardware.mig_profiles = vec![
            MigProfile {
                name: "1g.10gb".to_string(),
                ..Default::default()
            },
            MigProfile {
                name: "1g.10gb".to_string(),
                ..Default::default()
            },
            MigProfile {
                name: "2g.20gb".to_string(),
                ..Default::default()
            },
        ];
        let body = PoolSpecBody {
            resource_unit: ResourceUnit::Mig,
            mig_profile_name: Some("1g.10gb".to_string()),
            ..Default::default()
        };
        assert_eq!(units_per_device(&d, &body), 2);
    }

    #[test]
    fn max_devices_per_node_caps_acceptance_and_total() {
        let devices = vec![device("gpu-0", "node-a"), device("gpu-1", "node-a"), device("gpu-2", "node-a")];
        let refs: Vec<&GpuDevice> = devices.iter().collect();
        let body = PoolSpecBody {
            max_devices_per_node: Some(2),
            ..Default::default()
        };
        let (accepted, total) = select_and_cap(refs, &body);
        assert_eq!(accepted.len(), 2);
        assert_eq!(total, 2);
        assert_eq!(accepted[0].inventory_id(), "gpu-0");
        assert_eq!(accepted[1].inventory_id(), "gpu-1");
    }

    #[test]
    fn legacy_namespaceless_record_matches_a_namespaced_target() {
        let legacy = PoolReference {
            name: "pool-a".to_string(),
            namespace: None,
        };
        assert!(!differs_from_target(Some(&legacy), "pool-a", Some("team-a")));
    }

    #[test]
    fn namespace_mismatch_is_a_difference() {
        let current = PoolReference {
            name: "pool-a".to_string(),
            namespace: Some("team-a".to_string()),
        };
        assert!(differs_from_target(Some(&current), "pool-a", Some("team-b")));
    }
}

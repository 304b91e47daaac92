//! S1: pool selection with a per-node cap (spec §8 scenarios). Three devices
//! named `A`, `B`, `C` sit on the same node; the pool caps `maxDevicesPerNode`
//! at two, so the lexicographically-last inventory id is excluded and does
//! not contribute to published capacity.

#[cfg(test)]
mod tests {
    use gpu_api::{DeviceSelector, GpuDevice, GpuDeviceSpec, HardwareInfo, NodeSelector, PoolSpecBody, ResourceUnit};
    use gpu_pool::{is_candidate, matches_device_selector, matches_node_selector, select_and_cap};
    use kube::core::ObjectMeta;
    use std::collections::BTreeMap;

    fn device(inventory_id: &str, node: &str, pool: &str) -> GpuDevice {
        GpuDevice {
            metadata: ObjectMeta {
                name: Some(inventory_id.to_string()),
                annotations: Some(BTreeMap::from([(
                    "gpu.deckhouse.io/assignment".to_string(),
                    pool.to_string(),
                )])),
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
    fn scenario_s1_caps_at_two_and_excludes_the_lexicographically_last_device() {
        let devices = vec![device("A", "node-1", "pool-a"), device("B", "node-1", "pool-a"), device("C", "node-1", "pool-a")];

        let node_labels = BTreeMap::new();
        let node_selector = NodeSelector::default();
        assert!(matches_node_selector(&node_labels, &node_selector));

        let device_selector = DeviceSelector::default();
        let candidates: Vec<&GpuDevice> = devices
            .iter()
            .filter(|d| is_candidate(d, "gpu.deckhouse.io/assignment", "pool-a", None))
            .filter(|d| matches_device_selector(d, &device_selector))
            .collect();
        assert_eq!(candidates.len(), 3, "all three devices name pool-a and carry no selector restriction");

        let body = PoolSpecBody {
            resource_unit: ResourceUnit::Card,
            max_devices_per_node: Some(2),
            ..Default::default()
        };
        let (accepted, total) = select_and_cap(candidates, &body);

        assert_eq!(accepted.len(), 2);
        assert_eq!(total, 2);
        let accepted_ids: Vec<&str> = accepted.iter().map(|d| d.inventory_id()).collect();
        assert_eq!(accepted_ids, vec!["A", "B"]);
        assert!(!accepted_ids.contains(&"C"), "the cap must exclude C, not silently admit it past the limit");
    }

    #[test]
    fn scenario_s1_selector_mismatch_removes_a_device_before_the_cap_applies() {
        let mut devices = vec![device("A", "node-1", "pool-a"), device("B", "node-1", "pool-a")];
        devices[0].spec.hardware.vendor = "NVIDIA".to_string();
        devices[1].spec.hardware.vendor = "AMD".to_string();

        let selector = DeviceSelector {
            pci_vendor: Some("NVIDIA".to_string()),
            ..Default::default()
        };
        let candidates: Vec<&GpuDevice> = devices.iter().filter(|d| matches_device_selector(d, &selector)).collect();
        assert_eq!(candidates.len(), 1, "B is filtered out by vendor selector before capacity accounting ever sees it");

        let body = PoolSpecBody {
            max_devices_per_node: Some(2),
            ..Default::default()
        };
        let (accepted, total) = select_and_cap(candidates, &body);
        assert_eq!(accepted.len(), 1);
        assert_eq!(total, 1);
    }
}

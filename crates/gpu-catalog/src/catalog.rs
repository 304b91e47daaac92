//! In-memory device index plus the read/write operations spec §4.3 assigns
//! to the device catalog.
//!
//! The catalog is not a source of truth — the orchestration API server is —
//! so it carries no locking beyond what a single reconcile worker needs: a
//! snapshot is rebuilt from a `List` call and indexed by node name and by
//! `(node, PCI address)`. Mutations never touch the index directly; they go
//! through `gpu_runtime::ResourceWrapper` against the API server, and the
//! next `refresh` picks them back up.

use std::collections::HashMap;

use gpu_api::{GpuDevice, PoolReference};
use kube::{Api, ResourceExt};

/// Snapshot-indexed view over `GpuDevice` objects.
pub struct DeviceCatalog {
    api: Api<GpuDevice>,
    by_node: HashMap<String, Vec<String>>,
    by_node_pci: HashMap<(String, String), String>,
    by_pool: HashMap<(String, Option<String>), Vec<String>>,
    devices: HashMap<String, GpuDevice>,
}

impl DeviceCatalog {
    pub fn new(api: Api<GpuDevice>) -> Self {
        DeviceCatalog {
            api,
            by_node: HashMap::new(),
            by_node_pci: HashMap::new(),
            by_pool: HashMap::new(),
            devices: HashMap::new(),
        }
    }

    /// Rebuilds every index from a fresh `List` call (spec §4.3 "Indexes are
    /// maintained against... the pool back-reference name").
    pub async fn refresh(&mut self) -> Result<(), kube::Error> {
        let list = self.api.list(&Default::default()).await?;
        self.by_node.clear();
        self.by_node_pci.clear();
        self.by_pool.clear();
        self.devices.clear();

        for device in list.items {
            let name = device.name_any();
            self.by_node
                .entry(device.spec.node_name.clone())
                .or_default()
                .push(name.clone());
            self.by_node_pci.insert(
                (device.spec.node_name.clone(), device.spec.hardware.pci_address.clone()),
                name.clone(),
            );
            if let Some(pool_ref) = device.status.as_ref().and_then(|s| s.pool_ref.clone()) {
                self.by_pool
                    .entry((pool_ref.name, pool_ref.namespace))
                    .or_default()
                    .push(name.clone());
            }
            self.devices.insert(name, device);
        }
        Ok(())
    }

    /// List devices discovered on `node_name` (spec §4.3 "list-by-node").
    pub fn list_by_node(&self, node_name: &str) -> Vec<&GpuDevice> {
        self.by_node
            .get(node_name)
            .into_iter()
            .flatten()
            .filter_map(|name| self.devices.get(name))
            .collect()
    }

    /// List devices currently referencing `pool_ref` (spec §4.3
    /// "list-by-pool-reference").
    pub fn list_by_pool_reference(&self, pool_ref: &PoolReference) -> Vec<&GpuDevice> {
        self.by_pool
            .get(&(pool_ref.name.clone(), pool_ref.namespace.clone()))
            .into_iter()
            .flatten()
            .filter_map(|name| self.devices.get(name))
            .collect()
    }

    /// Looks a device up by its `(node, PCI address)` identity.
    pub fn find_by_node_pci(&self, node_name: &str, pci_address: &str) -> Option<&GpuDevice> {
        self.by_node_pci
            .get(&(node_name.to_string(), pci_address.to_string()))
            .and_then(|name| self.devices.get(name))
    }

    /// Looks a device up by object name (the inventory id, spec §3).
    pub fn find_by_name(&self, name: &str) -> Option<&GpuDevice> {
        self.devices.get(name)
    }

    /// Every device currently in the snapshot, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &GpuDevice> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpu_api::HardwareInfo;
    use kube::core::ObjectMeta;

    fn client() -> kube::Client {
        kube::Client::try_from(kube::Config::new("http://localhost:1".parse().unwrap()))
            .expect("client config construction never touches the network")
    }

    fn device(name: &str, node: &str, pci: &str) -> GpuDevice {
        GpuDevice {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: gpu_api::GpuDeviceSpec {
                node_name: node.to_string(),
                hardware: HardwareInfo {
                    pci_address: pci.to_string(),
                    ..Default::default()
                },
            },
            status: None,
        }
    }

    #[test]
    fn empty_catalog_has_no_entries() {
        let cat = DeviceCatalog::new(Api::all(client()));
        assert!(cat.is_empty());
        assert!(cat.list_by_node("node-a").is_empty());
    }

    #[test]
    fn indices_are_populated_by_hand_for_unit_testing_the_lookup_paths() {
        // `refresh()` needs a live apiserver; exercise the index data
        // structures directly the way the lookup methods read them.
        let mut cat = DeviceCatalog::new(Api::all(client()));
        let d = device("gpu-0", "node-a", "0000:01:00.0");
        cat.by_node
            .entry("node-a".to_string())
            .or_default()
            .push("gpu-0".to_string());
        cat.by_node_pci.insert(
            ("node-a".to_string(), "0000:01:00.0".to_string()),
            "gpu-0".to_string(),
        );
        cat.devices.insert("gpu-0".to_string(), d);

        assert_eq!(cat.list_by_node("node-a").len(), 1);
        assert!(cat.find_by_node_pci("node-a", "0000:01:00.0").is_some());
        assert!(cat.find_by_node_pci("node-a", "nope").is_none());
        assert!(cat.find_by_name("gpu-0").is_some());
    }
}

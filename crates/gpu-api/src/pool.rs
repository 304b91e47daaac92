//! `GpuPool` (namespaced) and `GpuClusterPool` (cluster-scoped): logical
//! groupings of devices exposing a chosen allocatable unit to schedulers.
//!
//! See spec §3 "GPU pool" for attributes and invariants.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The allocatable unit a pool exposes (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ResourceUnit {
    Card,
    Mig,
    Share,
}

/// Inclusion rules narrowing which devices are eligible for a pool (spec
/// §4.6 step 1). All set fields must match (logical AND); an empty selector
/// matches every device.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct DeviceSelector {
    #[serde(default)]
    pub inventory_ids: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pci_vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pci_device: Option<String>,
}

impl DeviceSelector {
    pub fn is_empty(&self) -> bool {
        self.inventory_ids.is_empty()
            && self.labels.is_empty()
            && self.pci_vendor.is_none()
            && self.pci_device.is_none()
    }
}

/// Restricts pool membership to nodes whose labels match (spec §4.6 step 2).
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct NodeSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

/// Scheduling-visible side effects a pool may request (spec §4.7).
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct SchedulingFlags {
    #[serde(default)]
    pub taints_enabled: bool,
}

/// Shared spec fields between the namespaced and cluster pool kinds.
///
/// Rust has no struct inheritance, so both kinds embed this by value instead
/// — the same technique used elsewhere for claim/class CRD pairs that share
/// most of their spec shape.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct PoolSpecBody {
    pub resource_unit: ResourceUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mig_profile_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slices_per_unit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_devices_per_node: Option<u32>,
    #[serde(default)]
    pub device_selector: DeviceSelector,
    #[serde(default)]
    pub node_selector: NodeSelector,
    #[serde(default)]
    pub scheduling: SchedulingFlags,
}

impl Default for ResourceUnit {
    fn default() -> Self {
        ResourceUnit::Card
    }
}

/// Published capacity counters (spec §3 Status).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PoolStatus {
    pub capacity: PoolCapacity,
    #[serde(default)]
    pub conditions: Vec<crate::conditions::Condition>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PoolCapacity {
    pub total: u32,
    pub used: u32,
}

/// Namespaced pool: selected via `gpu.deckhouse.io/assignment`.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gpu.deckhouse.io",
    version = "v1alpha1",
    kind = "GpuPool",
    plural = "gpupools",
    status = "PoolStatus",
    namespaced
)]
pub struct GpuPoolSpec {
    #[serde(flatten)]
    pub body: PoolSpecBody,
}

/// Cluster pool: selected via `gpu.deckhouse.io/cluster-assignment`, disjoint
/// name space and annotation key from `GpuPool`.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gpu.deckhouse.io",
    version = "v1alpha1",
    kind = "GpuClusterPool",
    plural = "gpuclusterpools",
    status = "PoolStatus"
)]
pub struct GpuClusterPoolSpec {
    #[serde(flatten)]
    pub body: PoolSpecBody,
}

/// Uniform view over either pool kind, used by the selector/mutator so they
/// don't need two parallel code paths (spec §4.6 operates identically on
/// both variants modulo namespace).
pub trait PoolLike {
    fn pool_name(&self) -> &str;
    fn pool_namespace(&self) -> Option<&str>;
    fn body(&self) -> &PoolSpecBody;
    /// Annotation key this pool kind is selected by.
    fn assignment_annotation_key(&self) -> &'static str;
    /// Node-label prefix for this pool kind.
    fn label_prefix(&self) -> &'static str;
}

impl PoolLike for GpuPool {
    fn pool_name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }
    fn pool_namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }
    fn body(&self) -> &PoolSpecBody {
        &self.spec.body
    }
    fn assignment_annotation_key(&self) -> &'static str {
        crate::constants::ANNOTATION_ASSIGNMENT
    }
    fn label_prefix(&self) -> &'static str {
        crate::constants::NAMESPACED_LABEL_PREFIX
    }
}

impl PoolLike for GpuClusterPool {
    fn pool_name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }
    fn pool_namespace(&self) -> Option<&str> {
        None
    }
    fn body(&self) -> &PoolSpecBody {
        &self.spec.body
    }
    fn assignment_annotation_key(&self) -> &'static str {
        crate::constants::ANNOTATION_CLUSTER_ASSIGNMENT
    }
    fn label_prefix(&self) -> &'static str {
        crate::constants::CLUSTER_LABEL_PREFIX
    }
}

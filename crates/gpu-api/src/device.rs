//! `GpuDevice`: the inventory record for one physical GPU on one node.
//!
//! See spec §3 "GPU device record" for the authoritative attribute list and
//! invariants (I1–I5).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::conditions::Condition;

/// Lifecycle state of a GPU device (spec §3, §4 state machine).
///
/// Ordering here is the *discovery* ordering, not a total order the code
/// should rely on for comparisons — the state machine in `gpu-runtime`
/// owns transition legality, this enum is just the value space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum DeviceState {
    Discovered,
    Validating,
    Ready,
    PendingAssignment,
    Assigned,
    Reserved,
    InUse,
    Faulted,
}

impl Default for DeviceState {
    fn default() -> Self {
        DeviceState::Discovered
    }
}

impl DeviceState {
    /// States the pool subsystem owns; bootstrap state-sync must never
    /// overwrite these (spec §4.8 "Device state-sync policy", property 5).
    pub fn is_pool_owned(&self) -> bool {
        matches!(
            self,
            DeviceState::Assigned
                | DeviceState::Reserved
                | DeviceState::InUse
                | DeviceState::PendingAssignment
                | DeviceState::Ready
        )
    }

    /// A device "needs validation" iff its state is not in the accepted set
    /// (spec §4.8).
    pub fn needs_validation(&self) -> bool {
        !matches!(
            self,
            DeviceState::Ready
                | DeviceState::PendingAssignment
                | DeviceState::Assigned
                | DeviceState::Reserved
                | DeviceState::InUse
        )
    }
}

/// One MIG profile enumerated on a device (spec §3).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MigProfile {
    pub profile_id: i32,
    pub name: String,
    pub memory_mib: u64,
    pub slice_count: u32,
    pub max_instances: u32,
    pub total_slices_on_device: u32,
}

/// Static hardware attributes discovered for a device (spec §3).
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct HardwareInfo {
    pub vendor: String,
    pub product_name: String,
    pub uuid: String,
    pub pci_address: String,
    pub iommu_group: Option<u32>,
    pub memory_mib: u64,
    pub mig_capable: bool,
    #[serde(default)]
    pub mig_profiles: Vec<MigProfile>,
    /// Kernel driver currently bound to this device ("nvidia", "vfio-pci", ...).
    pub current_driver: String,
    pub nvlink_topology_id: Option<String>,
}

/// Back-reference to the pool that owns a device (spec §3, I5: namespace is
/// empty iff the pool is cluster-scoped).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PoolReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Spec (desired/observed-input) portion of a `GpuDevice`.
///
/// Unlike a typical CRD, most of this is *written by the controller itself*
/// (it is a discovery record, not a user request) — but it still needs to be
/// in `spec` rather than `status` because the admin assignment annotations
/// and the ignore label live on `metadata`, and `spec` is where discovery
/// writes the hardware snapshot it owns.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gpu.deckhouse.io",
    version = "v1alpha1",
    kind = "GpuDevice",
    plural = "gpudevices",
    status = "GpuDeviceStatus",
    namespaced
)]
pub struct GpuDeviceSpec {
    pub node_name: String,
    pub hardware: HardwareInfo,
}

/// Status subresource of a `GpuDevice`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GpuDeviceStatus {
    pub state: DeviceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_ref: Option<PoolReference>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Non-authoritative observability aid: when the device last entered
    /// each state. Never consulted by any invariant or transition rule —
    /// written for operators reviewing why a device is stuck.
    #[serde(default)]
    pub last_transition_times: BTreeMap<DeviceState, DateTime<Utc>>,
}

impl GpuDevice {
    /// Stable inventory id: this system uses the object name as the
    /// inventory id (spec §3 identity = inventory id + PCI address).
    pub fn inventory_id(&self) -> &str {
        self.metadata
            .name
            .as_deref()
            .unwrap_or_default()
    }

    /// `true` iff the ignore label is present and truthy (invariant I4).
    pub fn is_ignored(&self) -> bool {
        self.metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(crate::constants::ANNOTATION_IGNORE))
            .map(|v| crate::constants::is_ignore_value(v))
            .unwrap_or(false)
    }

    /// Returns the namespaced-assignment annotation value, if set.
    pub fn namespaced_assignment(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(crate::constants::ANNOTATION_ASSIGNMENT))
            .map(|s| s.as_str())
    }

    /// Returns the cluster-assignment annotation value, if set.
    pub fn cluster_assignment(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(crate::constants::ANNOTATION_CLUSTER_ASSIGNMENT))
            .map(|s| s.as_str())
    }

    /// Invariant I1: at most one assignment annotation may be set.
    pub fn has_conflicting_assignment_annotations(&self) -> bool {
        self.namespaced_assignment().is_some() && self.cluster_assignment().is_some()
    }

    /// Count of MIG profile entries on this device matching `profile_name`
    /// (spec §4.6 step 3, units-per-device for unit=MIG).
    pub fn mig_profile_occurrences(&self, profile_name: &str) -> u32 {
        self.spec
            .hardware
            .mig_profiles
            .iter()
            .filter(|p| p.name == profile_name)
            .count() as u32
    }
}

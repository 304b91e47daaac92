//! `GpuResourceClaim` preparation record: the DRA-facing claim a node must
//! translate into concrete MIG/MPS/VFIO actions (spec §3, §4.5).

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What kind of allocation a requested device represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum DeviceRequestType {
    Physical,
    Mig,
    Share,
}

/// One device a claim asks the node to prepare.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct ClaimDeviceRequest {
    pub device_id: String,
    pub pci_address: String,
    pub request_type: DeviceRequestType,
    /// Required when `request_type == Mig`: the GPU-instance profile id and
    /// the requested slice placement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mig_profile_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slice_start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slice_size: Option<u32>,
}

/// MPS configuration requested for a claim (spec §3).
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct MpsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_active_thread_percentage: Option<u32>,
    /// UUID -> pinned memory limit (MiB). Devices absent here fall back to
    /// `default_pinned_mem_limit_mib`.
    #[serde(default)]
    pub pinned_mem_limits_mib: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_pinned_mem_limit_mib: Option<u64>,
}

#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gpu.deckhouse.io",
    version = "v1alpha1",
    kind = "GpuResourceClaim",
    plural = "gpuresourceclaims",
    status = "ClaimStatus",
    namespaced
)]
pub struct GpuResourceClaimSpec {
    #[serde(default)]
    pub devices: Vec<ClaimDeviceRequest>,
    #[serde(default)]
    pub vfio: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mps: Option<MpsConfig>,
}

/// Identifiers for a MIG instance prepared on behalf of a claim device.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PreparedMig {
    pub pci_address: String,
    pub profile_id: i32,
    pub slice_start: u32,
    pub slice_size: u32,
    pub gpu_instance_id: i32,
    pub compute_instance_id: i32,
    pub device_uuid: String,
}

/// A device rebound to `vfio-pci` on behalf of a claim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PreparedVfio {
    pub pci_address: String,
    pub original_driver: String,
    pub iommu_group: u32,
}

/// Directories of a running MPS control daemon for this claim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PreparedMps {
    pub control_id: String,
    pub pipe_dir: String,
    pub log_dir: String,
    pub shm_dir: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClaimStatus {
    #[serde(default)]
    pub prepared_mig: Vec<PreparedMig>,
    #[serde(default)]
    pub prepared_vfio: Vec<PreparedVfio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepared_mps: Option<PreparedMps>,
    /// device_id -> fully-qualified CDI device name.
    #[serde(default)]
    pub cdi_devices: BTreeMap<String, String>,
    #[serde(default)]
    pub conditions: Vec<crate::conditions::Condition>,
}

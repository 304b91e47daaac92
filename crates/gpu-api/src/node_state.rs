//! `GpuNodeState`: the per-node bootstrap/readiness record the validator
//! signals feed and the bootstrap evaluator (spec §4.8) writes conditions
//! onto. Cluster-scoped, one object per node, named after the node.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Raw boolean signals reported by node-local validators (driver/toolkit
/// installer, GPU feature discovery, DCGM, DCGM-exporter). This system only
/// reads this struct; validators are external collaborators (spec §1).
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ValidatorStatus {
    pub driver: bool,
    pub toolkit: bool,
    pub gfd: bool,
    pub dcgm: bool,
    pub dcgm_exporter: bool,
    /// Optional human-readable detail carried alongside a `false` signal,
    /// surfaced verbatim in the corresponding condition's message (spec
    /// scenario S5).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ValidatorStatus {
    pub fn fully_ready(&self) -> bool {
        self.driver && self.toolkit && self.gfd && self.dcgm && self.dcgm_exporter
    }
}

#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gpu.deckhouse.io",
    version = "v1alpha1",
    kind = "GpuNodeState",
    plural = "gpunodestates",
    status = "GpuNodeStateStatus"
)]
pub struct GpuNodeStateSpec {
    pub node_name: String,
    pub validators: ValidatorStatus,
    /// Mirrors the external `InventoryComplete` condition: reported by the
    /// node-local device-discovery agent (out of scope, spec §1) once it
    /// has finished enumerating every GPU the node's PCI bus exposes.
    #[serde(default)]
    pub inventory_complete: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GpuNodeStateStatus {
    #[serde(default)]
    pub conditions: Vec<crate::conditions::Condition>,
}

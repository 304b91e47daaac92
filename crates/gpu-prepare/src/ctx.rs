//! Reconcile context threaded through the preparation handler chain.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use gpu_api::{ClaimDeviceRequest, PreparedMig, PreparedMps, PreparedVfio};
use gpu_hw::{CompositeCdiWriter, MigAdapter, MpsAdapter, VfioAdapter};
use gpu_runtime::ResourceWrapper;

use crate::plan::PreparationPlan;

/// Static configuration the orchestrator needs to drive the MPS adapter,
/// supplied once at controller start (spec §4.4.2 steps 1-4 inputs).
#[derive(Clone, Debug)]
pub struct MpsEnvironment {
    pub control_binary: PathBuf,
    pub plugin_root: PathBuf,
    pub driver_library_dirs: Vec<PathBuf>,
}

/// Hardware adapters the chain invokes; shared across reconciles so MIG's
/// acquisition count coordinates correctly (spec §9 "Global vendor library
/// state").
pub struct Adapters {
    pub mig: Arc<MigAdapter>,
    pub mps: Arc<MpsAdapter>,
    pub vfio: Arc<VfioAdapter>,
    pub cdi: Arc<CompositeCdiWriter>,
    pub mps_env: MpsEnvironment,
}

/// Accumulates what the adapter-invocation and CDI steps computed, folded
/// into the claim's status by the annotate step.
#[derive(Default)]
pub struct PreparedOutcome {
    pub prepared_mig: Vec<PreparedMig>,
    pub prepared_vfio: Vec<PreparedVfio>,
    pub prepared_mps: Option<PreparedMps>,
    /// Requests that went through neither MIG nor VFIO — still given a CDI
    /// entry of their own so a claim with only `Share`/`Physical` devices
    /// still gets device nodes published.
    pub passthrough_devices: Vec<ClaimDeviceRequest>,
    pub cdi_devices: BTreeMap<String, String>,
}

pub struct PrepareCtx {
    pub claim: ResourceWrapper<gpu_api::GpuResourceClaim>,
    pub adapters: Arc<Adapters>,
    pub plan: Option<PreparationPlan>,
    pub prepared: PreparedOutcome,
}

impl PrepareCtx {
    pub fn new(claim: ResourceWrapper<gpu_api::GpuResourceClaim>, adapters: Arc<Adapters>) -> Self {
        PrepareCtx {
            claim,
            adapters,
            plan: None,
            prepared: PreparedOutcome::default(),
        }
    }
}

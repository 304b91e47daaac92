//! Bootstrap decision table (spec §4.8): derives `ReadyForPooling` and its
//! sibling conditions from a node's validator signals and the state
//! counters of the devices discovered on it.

use gpu_api::{ConditionStatus, DeviceState, ValidatorStatus};

/// A minimal per-device summary the evaluator needs — pulled from the
/// catalog rather than taking `GpuDevice` directly so this module stays
/// testable without constructing full CRD objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceSummary {
    pub state: DeviceState,
}

/// Inputs to one node's bootstrap evaluation.
#[derive(Clone, Debug, Default)]
pub struct BootstrapInput {
    pub validators: ValidatorStatus,
    pub devices: Vec<DeviceSummary>,
    /// Mirrors the external `InventoryComplete` condition: `false` while
    /// device discovery is still catching up to the node's real device
    /// count (spec §6 condition types; the discovery source is an external
    /// collaborator, out of scope here).
    pub inventory_complete: bool,
}

/// One derived condition: status plus the reason string the decision table
/// assigned it (spec §4.8 table, §6 condition reasons).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub status: ConditionStatus,
    pub reason: &'static str,
}

impl Verdict {
    fn false_(reason: &'static str) -> Self {
        Verdict {
            status: ConditionStatus::False,
            reason,
        }
    }
    fn true_(reason: &'static str) -> Self {
        Verdict {
            status: ConditionStatus::True,
            reason,
        }
    }
}

/// Full set of conditions the evaluator derives for one node (spec §4.8).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapVerdicts {
    pub driver_ready: Verdict,
    pub toolkit_ready: Verdict,
    pub monitoring_ready: Verdict,
    pub workloads_degraded: Verdict,
    pub ready_for_pooling: Verdict,
}

fn mirror(signal: bool, ready_reason: &'static str, not_ready_reason: &'static str) -> Verdict {
    if signal {
        Verdict::true_(ready_reason)
    } else {
        Verdict::false_(not_ready_reason)
    }
}

/// `true` iff any device counts as "owned/assigned/in-use" for the purposes
/// of `WorkloadsDegraded` — i.e. it has progressed into or past the pool
/// subsystem's ownership states (spec §4.8 "any owned/assigned/in-use
/// device exists on the node").
fn has_workload_bearing_device(devices: &[DeviceSummary]) -> bool {
    devices.iter().any(|d| {
        matches!(
            d.state,
            DeviceState::Assigned
                | DeviceState::Reserved
                | DeviceState::InUse
                | DeviceState::PendingAssignment
        )
    })
}

/// Evaluates the decision table in §4.8, top-down, first match wins.
pub fn evaluate(input: &BootstrapInput) -> BootstrapVerdicts {
    let v = &input.validators;

    let driver_ready = mirror(v.driver, "Ready", "DriverNotReady");
    let toolkit_ready = mirror(v.toolkit, "Ready", "ToolkitNotReady");
    // Monitoring mirrors the GFD/DCGM/DCGM-exporter signals; driver/toolkit
    // readiness is reported by its own condition above.
    let monitoring_ready = mirror(v.gfd && v.dcgm && v.dcgm_exporter, "Ready", "MonitoringNotReady");

    let infra_fully_ready = v.fully_ready();
    let workloads_degraded = if !infra_fully_ready && has_workload_bearing_device(&input.devices) {
        Verdict::true_("InfraDegradedWithActiveWorkloads")
    } else {
        Verdict::false_("Nominal")
    };

    let ready_for_pooling = if input.devices.is_empty() {
        Verdict::false_("NoDevices")
    } else if !input.inventory_complete {
        Verdict::false_("InventoryIncomplete")
    } else if input.devices.iter().any(|d| d.state == DeviceState::Faulted) {
        Verdict::false_("DevicesFaulted")
    } else if input.devices.iter().any(|d| d.state.needs_validation()) {
        Verdict::false_("PendingDevices")
    } else if !v.driver {
        Verdict::false_("DriverNotReady")
    } else if !v.toolkit {
        Verdict::false_("ToolkitNotReady")
    } else if !infra_fully_ready {
        Verdict::false_("MonitoringNotReady")
    } else {
        Verdict::true_("Ready")
    };

    BootstrapVerdicts {
        driver_ready,
        toolkit_ready,
        monitoring_ready,
        workloads_degraded,
        ready_for_pooling,
    }
}

//! Per-node bootstrap reconciler (spec §4.8): evaluates the decision table
//! against a node's validator signals and device counters, writes the
//! derived conditions onto `GpuNodeState.status`, and applies the device
//! state-sync policy to every device discovered on that node.
//!
//! Like `gpu_pool::reconcile`, this touches many objects (the node state
//! plus every device on the node) so it is async orchestration code built
//! on `ResourceWrapper`, not a `gpu_runtime::Chain`.

use chrono::Utc;
use gpu_api::{set_condition, Condition, ConditionType, GpuDevice, GpuNodeState};
use gpu_catalog::DeviceCatalog;
use gpu_runtime::{HandlerError, ResourceWrapper};
use kube::Api;

use crate::evaluator::{evaluate, BootstrapInput, BootstrapVerdicts, DeviceSummary};
use crate::sync::next_state;

/// Summary of one bootstrap reconcile, for logging/tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootstrapOutcome {
    pub devices_synced: usize,
}

/// Reconciles one `GpuNodeState` object: derives conditions from its
/// validator signals and the catalog's view of devices on that node, then
/// syncs each eligible device's state.
pub async fn reconcile_node_state(
    node_state: &mut ResourceWrapper<GpuNodeState>,
    catalog: &DeviceCatalog,
    device_api: &Api<GpuDevice>,
    observed_generation: i64,
) -> Result<BootstrapOutcome, HandlerError> {
    let Some(current) = node_state.current().cloned() else {
        return Ok(BootstrapOutcome::default());
    };

    let devices_on_node = catalog.list_by_node(&current.spec.node_name);
    let input = BootstrapInput {
        validators: current.spec.validators.clone(),
        devices: devices_on_node
            .iter()
            .map(|d| DeviceSummary {
                state: d.status.as_ref().map(|s| s.state).unwrap_or_default(),
            })
            .collect(),
        inventory_complete: current.spec.inventory_complete,
    };
    let verdicts = evaluate(&input);

    if let Some(changed) = node_state.changed() {
        let mut status = changed.status.clone().unwrap_or_default();
        write_verdicts(&mut status.conditions, &verdicts, observed_generation, &current.spec.validators);
        changed.status = Some(status);
    }
    node_state.update().await?;

    let mut devices_synced = 0usize;
    for device in devices_on_node {
        let current_state = device.status.as_ref().map(|s| s.state).unwrap_or_default();
        let Some(new_state) = next_state(current_state, &current.spec.validators) else {
            continue;
        };
        let mut wrapper = ResourceWrapper::new(device_api.clone(), device.inventory_id().to_string());
        wrapper.fetch().await.map_err(HandlerError::classify_handler_error)?;
        if wrapper.is_empty() {
            continue;
        }
        if let Some(changed) = wrapper.changed() {
            if let Some(status) = changed.status.as_mut() {
                if status.state == current_state {
                    status
                        .last_transition_times
                        .insert(new_state, Utc::now());
                    status.state = new_state;
                }
            }
        }
        if wrapper.update().await? {
            devices_synced += 1;
        }
    }

    Ok(BootstrapOutcome { devices_synced })
}

fn write_verdicts(
    conditions: &mut Vec<Condition>,
    verdicts: &BootstrapVerdicts,
    observed_generation: i64,
    validators: &gpu_api::ValidatorStatus,
) {
    let now = Utc::now();
    let detail = validators.detail.clone().unwrap_or_default();
    set_condition(
        conditions,
        ConditionType::DriverReady,
        verdicts.driver_ready.status,
        verdicts.driver_ready.reason,
        &detail,
        observed_generation,
        now,
    );
    set_condition(
        conditions,
        ConditionType::ToolkitReady,
        verdicts.toolkit_ready.status,
        verdicts.toolkit_ready.reason,
        &detail,
        observed_generation,
        now,
    );
    set_condition(
        conditions,
        ConditionType::MonitoringReady,
        verdicts.monitoring_ready.status,
        verdicts.monitoring_ready.reason,
        &detail,
        observed_generation,
        now,
    );
    set_condition(
        conditions,
        ConditionType::WorkloadsDegraded,
        verdicts.workloads_degraded.status,
        verdicts.workloads_degraded.reason,
        "",
        observed_generation,
        now,
    );
    set_condition(
        conditions,
        ConditionType::ReadyForPooling,
        verdicts.ready_for_pooling.status,
        verdicts.ready_for_pooling.reason,
        &detail,
        observed_generation,
        now,
    );
}

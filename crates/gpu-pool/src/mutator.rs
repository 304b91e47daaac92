//! Device-mutation planning for the pool selector (spec §4.6 steps 5-6):
//! pure functions over device snapshots, producing instructions the
//! reconciler applies through per-device `ResourceWrapper`s.

use std::collections::HashSet;

use gpu_api::{DeviceState, GpuDevice, PoolReference};

use crate::selector::differs_from_target;

/// What to do to one device's back-reference and state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolRefChange {
    Set(PoolReference),
    Clear,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceMutation {
    pub device_name: String,
    pub pool_ref: PoolRefChange,
    pub new_state: Option<DeviceState>,
}

/// For each accepted candidate whose back-reference differs from the
/// target, transition Ready devices to `PendingAssignment`; devices already
/// further along keep their state but still get the back-reference updated
/// (spec §4.6 step 5).
pub fn plan_assignment_mutations(
    accepted: &[&GpuDevice],
    target_name: &str,
    target_namespace: Option<&str>,
) -> Vec<DeviceMutation> {
    accepted
        .iter()
        .filter_map(|device| {
            let current_ref = device.status.as_ref().and_then(|s| s.pool_ref.as_ref());
            if !differs_from_target(current_ref, target_name, target_namespace) {
                return None;
            }
            let current_state = device.status.as_ref().map(|s| s.state).unwrap_or_default();
            let new_state = matches!(current_state, DeviceState::Ready).then_some(DeviceState::PendingAssignment);
            Some(DeviceMutation {
                device_name: device.inventory_id().to_string(),
                pool_ref: PoolRefChange::Set(PoolReference {
                    name: target_name.to_string(),
                    namespace: target_namespace.map(str::to_string),
                }),
                new_state,
            })
        })
        .collect()
}

/// For each device still referencing the pool that is no longer accepted
/// and doesn't carry the matching annotation, clears the back-reference and
/// moves it back to `Ready` (spec §4.6 step 6).
pub fn plan_release_mutations(
    currently_referencing: &[&GpuDevice],
    accepted_names: &HashSet<&str>,
    assignment_annotation_key: &str,
    target_name: &str,
) -> Vec<DeviceMutation> {
    currently_referencing
        .iter()
        .filter(|device| !accepted_names.contains(device.inventory_id()))
        .filter(|device| {
            let annotation_value = device
                .metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(assignment_annotation_key));
            annotation_value != Some(&target_name.to_string())
        })
        .map(|device| DeviceMutation {
            device_name: device.inventory_id().to_string(),
            pool_ref: PoolRefChange::Clear,
            new_state: Some(DeviceState::Ready),
        })
        .collect()
}

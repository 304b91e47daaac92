//! Device state-sync policy (spec §4.8 "Device state-sync policy",
//! property 5): the bootstrap evaluator may only ever promote a device
//! along the one-way ratchet `Faulted -> Validating -> Ready` (plus
//! normalizing an unset state to `Discovered`); it must never touch a
//! device already owned by the pool subsystem.

use gpu_api::{DeviceState, ValidatorStatus};

/// Returns the state a device should move to given the node's validator
/// signals, or `None` if no transition applies. Pool-owned states
/// (`is_pool_owned`) are never returned by this function — callers must
/// still check `current.is_pool_owned()` themselves before calling if they
/// want to skip the lookup entirely, but this function is safe to call
/// unconditionally since it is a no-op for those states.
///
/// Spec §9 open question: a device in `Validating` is never demoted back to
/// `Discovered` by this system (the one-way ratchet is preserved) — this
/// function only ever returns a state later in the ratchet than `current`.
pub fn next_state(current: DeviceState, validators: &ValidatorStatus) -> Option<DeviceState> {
    if current.is_pool_owned() {
        return None;
    }

    match current {
        DeviceState::Faulted if validators.driver && validators.toolkit => Some(DeviceState::Validating),
        DeviceState::Validating if validators.fully_ready() => Some(DeviceState::Ready),
        // `Discovered` is this system's representation of "empty state"
        // (`DeviceState::default()`): it normalizes to itself unless infra
        // signals already allow an earlier promotion straight through
        // Validating to Ready (spec §4.8 "unless infra signals allow
        // earlier promotion").
        DeviceState::Discovered if validators.fully_ready() => Some(DeviceState::Ready),
        DeviceState::Discovered if validators.driver && validators.toolkit => Some(DeviceState::Validating),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> ValidatorStatus {
        ValidatorStatus {
            driver: true,
            toolkit: true,
            gfd: true,
            dcgm: true,
            dcgm_exporter: true,
            detail: None,
        }
    }

    #[test]
    fn faulted_promotes_to_validating_once_driver_and_toolkit_ready() {
        assert_eq!(next_state(DeviceState::Faulted, &ready()), Some(DeviceState::Validating));
    }

    #[test]
    fn faulted_stays_faulted_without_driver() {
        let mut v = ready();
        v.driver = false;
        assert_eq!(next_state(DeviceState::Faulted, &v), None);
    }

    #[test]
    fn validating_promotes_to_ready_once_infra_fully_ready() {
        assert_eq!(next_state(DeviceState::Validating, &ready()), Some(DeviceState::Ready));
    }

    #[test]
    fn discovered_can_jump_straight_to_ready() {
        assert_eq!(next_state(DeviceState::Discovered, &ready()), Some(DeviceState::Ready));
    }

    #[test]
    fn pool_owned_states_are_never_touched() {
        for s in [
            DeviceState::Assigned,
            DeviceState::Reserved,
            DeviceState::InUse,
            DeviceState::PendingAssignment,
            DeviceState::Ready,
        ] {
            assert_eq!(next_state(s, &ready()), None);
        }
    }

    #[test]
    fn validating_never_demotes_to_discovered() {
        let mut v = ready();
        v.dcgm = false;
        assert_eq!(next_state(DeviceState::Validating, &v), None);
    }
}

//! S5: a node whose driver, toolkit, and monitoring validators are all ready
//! and whose devices are all `Ready` flips `ReadyForPooling` true; the
//! resulting verdict is written into a real condition list the way the
//! bootstrap reconciler would, not just asserted on the bare `Verdict` value
//! (spec §8 scenarios, spec §4.8 decision table, spec §6 condition writing).

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use gpu_api::{set_condition, Condition, ConditionStatus, ConditionType};
    use gpu_bootstrap::evaluator::{evaluate, BootstrapInput, DeviceSummary};
    use gpu_api::DeviceState;
    use gpu_api::ValidatorStatus;

    fn ready_validators() -> ValidatorStatus {
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
    fn scenario_s5_fully_ready_node_flips_the_condition_to_true() {
        let input = BootstrapInput {
            validators: ready_validators(),
            devices: vec![
                DeviceSummary { state: DeviceState::Ready },
                DeviceSummary { state: DeviceState::Ready },
            ],
            inventory_complete: true,
        };
        let verdicts = evaluate(&input);

        let mut conditions: Vec<Condition> = Vec::new();
        let changed = set_condition(
            &mut conditions,
            ConditionType::ReadyForPooling,
            verdicts.ready_for_pooling.status,
            verdicts.ready_for_pooling.reason,
            "",
            1,
            Utc::now(),
        );

        assert!(changed, "a brand new condition list always counts as a transition");
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, ConditionStatus::True);
        assert_eq!(conditions[0].reason, "Ready");

        // A later reconcile with the same verdict must not bump
        // last_transition_time again.
        let later = Utc::now() + chrono::Duration::seconds(30);
        let changed_again = set_condition(
            &mut conditions,
            ConditionType::ReadyForPooling,
            verdicts.ready_for_pooling.status,
            verdicts.ready_for_pooling.reason,
            "",
            2,
            later,
        );
        assert!(!changed_again);
        assert_eq!(conditions[0].observed_generation, 2, "observed_generation still refreshes even without a status flip");
    }

    #[test]
    fn scenario_s5_one_faulted_device_among_many_blocks_pooling_and_flips_the_condition_false() {
        let input = BootstrapInput {
            validators: ready_validators(),
            devices: vec![
                DeviceSummary { state: DeviceState::Ready },
                DeviceSummary { state: DeviceState::Faulted },
            ],
            inventory_complete: true,
        };
        let verdicts = evaluate(&input);

        let mut conditions: Vec<Condition> = Vec::new();
        set_condition(&mut conditions, ConditionType::ReadyForPooling, ConditionStatus::True, "Ready", "", 1, Utc::now());
        let changed = set_condition(
            &mut conditions,
            ConditionType::ReadyForPooling,
            verdicts.ready_for_pooling.status,
            verdicts.ready_for_pooling.reason,
            "",
            2,
            Utc::now(),
        );

        assert!(changed);
        assert_eq!(conditions[0].status, ConditionStatus::False);
        assert_eq!(conditions[0].reason, "DevicesFaulted");
    }
}

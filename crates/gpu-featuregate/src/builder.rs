//! Degraded resource-slice builder (spec §4.10): assembles a
//! `gpu_api::slice::ResourceSlice`, omitting the MIG counter/consumption
//! shape when the `partitionable` feature has been disabled for the scope
//! so only whole-card offers are published (spec §4.10 "exclusive
//! fallback").

use gpu_api::slice::{CounterSet, ResourceSlice, SliceDevice};

use crate::tracker::{Feature, FeatureGateTracker};

/// One device's contribution to a slice, before feature-gate filtering is
/// applied.
#[derive(Clone, Debug, Default)]
pub struct SliceDeviceInput {
    pub device: SliceDevice,
    /// `true` if this entry only exists to describe a MIG/partitioned
    /// offer — dropped entirely when partitioning is disabled, rather than
    /// republished as a whole-card offer under the same name (the whole-
    /// card offer is a distinct entry the caller already includes).
    pub requires_partitioning: bool,
}

/// Builds a `ResourceSlice` for `pool_name`/`node_name`, respecting
/// whichever known features `tracker` currently has disabled for `scope`.
pub fn build_slice(
    tracker: &FeatureGateTracker,
    scope: &str,
    pool_name: &str,
    node_name: &str,
    counter_sets: Vec<CounterSet>,
    devices: Vec<SliceDeviceInput>,
) -> ResourceSlice {
    let partitioning_disabled = tracker.is_disabled(scope, Feature::Partitionable);

    let (counter_sets, devices): (Vec<CounterSet>, Vec<SliceDevice>) = if partitioning_disabled {
        let devices = devices
            .into_iter()
            .filter(|d| !d.requires_partitioning)
            .map(|mut d| {
                d.device.consumes_counters.clear();
                d.device
            })
            .collect();
        (Vec::new(), devices)
    } else {
        (counter_sets, devices.into_iter().map(|d| d.device).collect())
    };

    ResourceSlice {
        pool_name: pool_name.to_string(),
        node_name: node_name.to_string(),
        counter_sets,
        devices,
    }
}

//! GPU control plane: pool selector/mutator, node marker, and capacity
//! publication (spec §4.6, §4.7).

pub mod mutator;
pub mod node_marker;
pub mod reconcile;
pub mod selector;
mod status;

pub use mutator::{plan_assignment_mutations, plan_release_mutations, DeviceMutation, PoolRefChange};
pub use node_marker::{nodes_hosting, plan_for_node, NodeMarkerPlan};
pub use reconcile::{reconcile_pool, PoolReconcileOutcome};
pub use selector::{
    differs_from_target, is_candidate, matches_device_selector, matches_node_selector, select_and_cap,
    units_per_device,
};

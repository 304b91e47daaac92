//! GPU control plane: bootstrap evaluator deriving per-node readiness
//! conditions from validator signals and device counters (spec §4.8).

pub mod evaluator;
pub mod reconcile;
mod status;
pub mod sync;

pub use evaluator::{evaluate, BootstrapInput, BootstrapVerdicts, DeviceSummary, Verdict};
pub use reconcile::{reconcile_node_state, BootstrapOutcome};
pub use sync::next_state;

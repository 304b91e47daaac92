//! GPU control plane: feature-gate drift tracker and the degraded
//! resource-slice builder it feeds (spec §4.10).

pub mod builder;
pub mod tracker;

pub use builder::{build_slice, SliceDeviceInput};
pub use tracker::{EventRecorder, Feature, FeatureGateTracker, ObserveOutcome};

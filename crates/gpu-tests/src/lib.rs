//! Cross-crate scenario and property tests: a library crate whose modules
//! are each `#[cfg(test)]`-only, importing the other crates' public types
//! directly rather than a `tests/` integration-test directory.
//!
//! Individual crates already unit-test their own pure functions in
//! isolation; the modules here instead compose two or more crates the way a
//! real reconcile pass would, to catch integration seams a single-crate test
//! can't see.

pub mod property_patch_and_merge;
pub mod property_state_machine;
pub mod scenario_s1_pool_selection;
pub mod scenario_s2_mig_reuse;
pub mod scenario_s3_vfio_rebind;
pub mod scenario_s4_conflict_retry;
pub mod scenario_s5_ready_for_pooling;
pub mod scenario_s6_feature_gate_fallback;

//! Annotation, label, and prefix constants shared by every component.
//!
//! Kept in one module so the selector, mutator, webhook, and node marker
//! never disagree on a key spelling.

/// Namespaced-pool assignment annotation: value is the target pool name.
pub const ANNOTATION_ASSIGNMENT: &str = "gpu.deckhouse.io/assignment";
/// Cluster-pool assignment annotation: value is the target cluster pool name.
pub const ANNOTATION_CLUSTER_ASSIGNMENT: &str = "gpu.deckhouse.io/cluster-assignment";
/// When present with value "true", the device participates in no pool.
pub const ANNOTATION_IGNORE: &str = "gpu.deckhouse.io/ignore";
/// Human-readable PCI vendor identifier, derived at discovery time.
pub const ANNOTATION_VENDOR: &str = "gpu.deckhouse.io/vendor";
/// Human-readable PCI device identifier, derived at discovery time.
pub const ANNOTATION_DEVICE: &str = "gpu.deckhouse.io/device";
/// JSON-encoded device_id -> CDI device name map, mirrored onto the claim's
/// metadata so the kubelet plugin can read it without waiting on a status
/// informer resync.
pub const ANNOTATION_PREPARED_DEVICES: &str = "gpu.deckhouse.io/prepared-devices";
/// Finalizer held by the preparation orchestrator while hardware state
/// backing a claim is live.
pub const FINALIZER_PREPARE: &str = "gpu.deckhouse.io/prepare";

/// Node-label prefix used for namespaced pool membership labels.
pub const NAMESPACED_LABEL_PREFIX: &str = "gpu-pool.deckhouse.io";
/// Node-label prefix used for cluster pool membership labels.
pub const CLUSTER_LABEL_PREFIX: &str = "gpu-cluster-pool.deckhouse.io";

/// Returns the per-pool node label key for the given prefix and pool name.
pub fn node_label_key(prefix: &str, pool_name: &str) -> String {
    format!("{prefix}/{pool_name}")
}

/// Returns `true` if the annotation value indicates an ignored device.
pub fn is_ignore_value(v: &str) -> bool {
    v.eq_ignore_ascii_case("true")
}

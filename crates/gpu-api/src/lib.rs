#![warn(missing_docs)]

//! GPU control plane: CRD type definitions, conditions, and the
//! annotation/label constants shared by every component crate.

/// ResourceClaim preparation record and its prepared-hardware status shape.
pub mod claim;
/// Shared condition type and the set-if-transitioned helper.
pub mod conditions;
/// Annotation, label, and prefix constants.
pub mod constants;
/// GPU device inventory record.
pub mod device;
/// Errors shared across this crate's modules.
pub mod error;
/// Node label/taint helpers (the node object itself is external).
pub mod node;
/// Per-node bootstrap/readiness record.
pub mod node_state;
/// Namespaced and cluster GPU pool records.
pub mod pool;
/// Resource slice / inventory snapshot shapes for DRA publishing.
pub mod slice;

pub use claim::{
    ClaimDeviceRequest, ClaimStatus, DeviceRequestType, GpuResourceClaim, GpuResourceClaimSpec,
    MpsConfig, PreparedMig, PreparedMps, PreparedVfio,
};
pub use conditions::{set_condition, Condition, ConditionStatus, ConditionType};
pub use constants::node_label_key;
pub use device::{
    DeviceState, GpuDevice, GpuDeviceSpec, GpuDeviceStatus, HardwareInfo, MigProfile,
    PoolReference,
};
pub use error::ApiError;
pub use node_state::{GpuNodeState, GpuNodeStateSpec, GpuNodeStateStatus, ValidatorStatus};
pub use pool::{
    DeviceSelector, GpuClusterPool, GpuClusterPoolSpec, GpuPool, GpuPoolSpec, NodeSelector,
    PoolCapacity, PoolLike, PoolSpecBody, PoolStatus, ResourceUnit, SchedulingFlags,
};

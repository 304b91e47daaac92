//! Hardware adapters for MIG, MPS, VFIO, and CDI spec emission (spec §4.4).

pub mod cdi;
pub mod error;
pub mod mig;
pub mod mps;
pub mod vendor;
pub mod vfio;

pub use cdi::{
    CdiCache, CdiDeviceEntry, CdiDeviceRequest, CdiSpecDocument, CompositeCdiWriter, ContainerEdits,
    StandardCdiWriter, VfioCdiWriter,
};
pub use error::HwError;
pub use mig::MigAdapter;
pub use mps::{MpsAdapter, MpsDirs, MpsStartRequest};
pub use vendor::{
    ci_profile_for_slice_count, ComputeInstanceInfo, DeviceHandle, GpuInstanceInfo, InstanceProfile,
    LibraryLease, MigLibrary, MigModeState, Placement,
};
pub use vfio::{VfioAdapter, VFIO_DRIVER};

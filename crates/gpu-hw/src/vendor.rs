//! The vendor GPU-management library boundary (spec §9 "Global vendor
//! library state"): a process-wide resource with idempotent `init`/
//! `shutdown`, modeled here as a trait so the concrete bindings — explicitly
//! out of scope (spec §1) — can be swapped in by the binary crate.
//!
//! `LibraryLease` is the acquisition-count coordinator: every adapter
//! operation acquires a lease for its duration; the first concurrent
//! acquirer runs `init`, the last one to drop runs `shutdown`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HwError;

/// Opaque handle to a resolved device. The vendor library's actual handle
/// type never crosses this boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceHandle(pub String);

/// Result of ensuring MIG mode is enabled on a device (spec §4.4.1 step 4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigModeState {
    Enabled,
    Pending,
}

/// A resolved GPU-instance profile (spec §4.4.1 step 5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstanceProfile {
    pub profile_id: i32,
    pub memory_mib: u64,
    pub slice_count: u32,
}

/// A requested or existing slice placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Placement {
    pub start: u32,
    pub size: u32,
}

/// A created or reused GPU instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuInstanceInfo {
    pub id: i32,
    pub placement: Placement,
}

/// A created or reused compute instance within a GPU instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComputeInstanceInfo {
    pub id: i32,
    pub slice_count: u32,
}

/// The vendor GPU-management library's MIG-relevant surface. Concrete
/// bindings (e.g. to the vendor's management library) are supplied by the
/// binary crate; this interface is the whole contract the MIG adapter needs.
#[async_trait]
pub trait MigLibrary: Send + Sync {
    async fn init(&self) -> Result<(), HwError>;
    fn shutdown(&self);

    async fn device_handle(&self, pci_address: &str) -> Result<DeviceHandle, HwError>;
    /// Ensures MIG mode is enabled, requesting activation if it is currently
    /// disabled. Returns `Pending` when activation requires a reset/reboot.
    async fn ensure_mig_mode(&self, handle: &DeviceHandle) -> Result<MigModeState, HwError>;
    async fn instance_profile(
        &self,
        handle: &DeviceHandle,
        profile_id: i32,
    ) -> Result<InstanceProfile, HwError>;
    async fn list_gpu_instances(
        &self,
        handle: &DeviceHandle,
        profile_id: i32,
    ) -> Result<Vec<GpuInstanceInfo>, HwError>;
    async fn create_gpu_instance(
        &self,
        handle: &DeviceHandle,
        profile_id: i32,
        placement: Placement,
    ) -> Result<GpuInstanceInfo, HwError>;
    async fn destroy_gpu_instance(
        &self,
        handle: &DeviceHandle,
        gpu_instance_id: i32,
    ) -> Result<(), HwError>;
    async fn list_compute_instances(
        &self,
        handle: &DeviceHandle,
        gpu_instance: &GpuInstanceInfo,
    ) -> Result<Vec<ComputeInstanceInfo>, HwError>;
    async fn create_compute_instance(
        &self,
        handle: &DeviceHandle,
        gpu_instance: &GpuInstanceInfo,
        ci_profile_id: i32,
        placement: Placement,
    ) -> Result<ComputeInstanceInfo, HwError>;
    async fn destroy_compute_instance(
        &self,
        handle: &DeviceHandle,
        gpu_instance: &GpuInstanceInfo,
        compute_instance_id: i32,
    ) -> Result<(), HwError>;
    async fn device_uuid(&self, handle: &DeviceHandle) -> Result<String, HwError>;
    async fn compute_instance_uuid(
        &self,
        handle: &DeviceHandle,
        gpu_instance: &GpuInstanceInfo,
        compute_instance_id: i32,
    ) -> Result<String, HwError>;
}

/// RAII lease over the process-wide library acquisition count. Holding one
/// guarantees the library is initialized; dropping the last lease shuts it
/// down.
pub struct LibraryLease {
    library: Arc<dyn MigLibrary>,
    count: Arc<AtomicUsize>,
}

impl LibraryLease {
    pub async fn acquire(
        library: Arc<dyn MigLibrary>,
        count: Arc<AtomicUsize>,
    ) -> Result<Self, HwError> {
        let previous = count.fetch_add(1, Ordering::SeqCst);
        if previous == 0 {
            if let Err(e) = library.init().await {
                count.fetch_sub(1, Ordering::SeqCst);
                return Err(e);
            }
        }
        Ok(LibraryLease { library, count })
    }
}

impl Drop for LibraryLease {
    fn drop(&mut self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.library.shutdown();
        }
    }
}

/// Maps a MIG slice count to its compute-instance profile id (spec §4.4.1
/// step 7, "choose the compute-instance profile by slice count from the
/// table {1,2,3,4,6,7,8}"). Ids follow the vendor library's
/// `COMPUTE_INSTANCE_PROFILE_*_SLICE` enumeration.
pub fn ci_profile_for_slice_count(slice_count: u32) -> Result<i32, HwError> {
    match slice_count {
        1 => Ok(0),
        2 => Ok(1),
        3 => Ok(2),
        4 => Ok(3),
        6 => Ok(4),
        7 => Ok(5),
        8 => Ok(6),
        other => Err(HwError::UnsupportedSliceCount(other)),
    }
}

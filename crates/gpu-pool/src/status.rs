//! `HasStatus` adapters wiring both pool kinds into the generic resource
//! wrapper.

use gpu_api::{GpuClusterPool, GpuPool, PoolStatus};
use gpu_runtime::HasStatus;

impl HasStatus for GpuPool {
    type Status = PoolStatus;

    fn status(&self) -> &Option<Self::Status> {
        &self.status
    }

    fn set_status(&mut self, status: Option<Self::Status>) {
        self.status = status;
    }
}

impl HasStatus for GpuClusterPool {
    type Status = PoolStatus;

    fn status(&self) -> &Option<Self::Status> {
        &self.status
    }

    fn set_status(&mut self, status: Option<Self::Status>) {
        self.status = status;
    }
}

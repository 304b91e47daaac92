//! `HasStatus` adapter wiring `GpuDevice` into the generic resource wrapper.

use gpu_api::{GpuDevice, GpuDeviceStatus};
use gpu_runtime::HasStatus;

impl HasStatus for GpuDevice {
    type Status = GpuDeviceStatus;

    fn status(&self) -> &Option<Self::Status> {
        &self.status
    }

    fn set_status(&mut self, status: Option<Self::Status>) {
        self.status = status;
    }
}

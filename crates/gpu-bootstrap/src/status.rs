//! `HasStatus` adapter wiring `GpuNodeState` into the generic resource
//! wrapper.

use gpu_api::{GpuNodeState, GpuNodeStateStatus};
use gpu_runtime::HasStatus;

impl HasStatus for GpuNodeState {
    type Status = GpuNodeStateStatus;

    fn status(&self) -> &Option<Self::Status> {
        &self.status
    }

    fn set_status(&mut self, status: Option<Self::Status>) {
        self.status = status;
    }
}

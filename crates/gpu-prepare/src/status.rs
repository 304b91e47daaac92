//! `HasStatus` adapter wiring `GpuResourceClaim` into the generic resource
//! wrapper.

use gpu_api::{ClaimStatus, GpuResourceClaim};
use gpu_runtime::HasStatus;

impl HasStatus for GpuResourceClaim {
    type Status = ClaimStatus;

    fn status(&self) -> &Option<Self::Status> {
        &self.status
    }

    fn set_status(&mut self, status: Option<Self::Status>) {
        self.status = status;
    }
}

//! MIG adapter: `Prepare`/`Unprepare` for a single GPU-instance + compute-
//! instance pair (spec §4.4.1).

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use gpu_api::{ClaimDeviceRequest, PreparedMig};

use crate::error::HwError;
use crate::vendor::{ci_profile_for_slice_count, GpuInstanceInfo, LibraryLease, MigLibrary, MigModeState, Placement};

pub struct MigAdapter {
    library: Arc<dyn MigLibrary>,
    acquisitions: Arc<AtomicUsize>,
}

impl MigAdapter {
    pub fn new(library: Arc<dyn MigLibrary>) -> Self {
        MigAdapter {
            library,
            acquisitions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates or reuses a MIG GPU instance + compute instance for `req`
    /// (spec §4.4.1 "Prepare algorithm").
    pub async fn prepare(&self, req: &ClaimDeviceRequest) -> Result<PreparedMig, HwError> {
        if req.pci_address.is_empty() {
            return Err(HwError::InvalidRequest("pci_address must be non-empty".into()));
        }
        let slice_size = req
            .slice_size
            .filter(|&s| s > 0)
            .ok_or_else(|| HwError::InvalidRequest("slice_size must be > 0".into()))?;
        let profile_id = req
            .mig_profile_id
            .ok_or_else(|| HwError::InvalidRequest("mig_profile_id is required".into()))?;
        let slice_start = req.slice_start.unwrap_or(0);
        let placement = Placement {
            start: slice_start,
            size: slice_size,
        };

        let _lease = LibraryLease::acquire(self.library.clone(), self.acquisitions.clone()).await?;
        let handle = self.library.device_handle(&req.pci_address).await?;

        match self.library.ensure_mig_mode(&handle).await? {
            MigModeState::Enabled => {}
            MigModeState::Pending => return Err(HwError::MigActivationPending),
        }

        let _profile = self.library.instance_profile(&handle, profile_id).await?;

        if let Some((gi, ci)) = self.find_reusable(&handle, profile_id, placement, slice_size).await? {
            let device_uuid = self
                .library
                .compute_instance_uuid(&handle, &gi, ci.id)
                .await?;
            return Ok(PreparedMig {
                pci_address: req.pci_address.clone(),
                profile_id,
                slice_start: placement.start,
                slice_size: placement.size,
                gpu_instance_id: gi.id,
                compute_instance_id: ci.id,
                device_uuid,
            });
        }

        self.create(&handle, req, profile_id, placement, slice_size).await
    }

    async fn find_reusable(
        &self,
        handle: &crate::vendor::DeviceHandle,
        profile_id: i32,
        placement: Placement,
        slice_size: u32,
    ) -> Result<Option<(GpuInstanceInfo, crate::vendor::ComputeInstanceInfo)>, HwError> {
        let instances = self.library.list_gpu_instances(handle, profile_id).await?;
        for gi in instances.into_iter().filter(|gi| gi.placement == placement) {
            let compute_instances = self.library.list_compute_instances(handle, &gi).await?;
            // Open question preserved from the source: match by slice count
            // only, not by a more specific compute-instance profile id.
            if let Some(ci) = compute_instances
                .into_iter()
                .find(|ci| ci.slice_count == slice_size)
            {
                return Ok(Some((gi, ci)));
            }
        }
        Ok(None)
    }

    async fn create(
        &self,
        handle: &crate::vendor::DeviceHandle,
        req: &ClaimDeviceRequest,
        profile_id: i32,
        placement: Placement,
        slice_size: u32,
    ) -> Result<PreparedMig, HwError> {
        let gpu_instance = self
            .library
            .create_gpu_instance(handle, profile_id, placement)
            .await?;

        let result: Result<PreparedMig, HwError> = async {
            let ci_profile_id = ci_profile_for_slice_count(slice_size)?;
            let compute_instance = self
                .library
                .create_compute_instance(
                    handle,
                    &gpu_instance,
                    ci_profile_id,
                    Placement { start: 0, size: slice_size },
                )
                .await?;
            // Spec §4.4.1 step 7: fetch both infos and the compute-instance
            // device UUID — the UUID recorded on the prepared record is the
            // compute instance's, not the parent GPU's.
            let device_uuid = self
                .library
                .compute_instance_uuid(handle, &gpu_instance, compute_instance.id)
                .await?;
            Ok(PreparedMig {
                pci_address: req.pci_address.clone(),
                profile_id,
                slice_start: placement.start,
                slice_size: placement.size,
                gpu_instance_id: gpu_instance.id,
                compute_instance_id: compute_instance.id,
                device_uuid,
            })
        }
        .await;

        if result.is_err() {
            let _ = self.library.destroy_gpu_instance(handle, gpu_instance.id).await;
        }
        result
    }

    /// Tears down a previously-prepared GPU instance + compute instance
    /// (spec §4.4.1 "Unprepare algorithm"). Not-found at any step is treated
    /// as idempotent success.
    pub async fn unprepare(&self, prepared: &PreparedMig) -> Result<(), HwError> {
        let _lease = LibraryLease::acquire(self.library.clone(), self.acquisitions.clone()).await?;
        let handle = self.library.device_handle(&prepared.pci_address).await?;

        let gpu_instance = GpuInstanceInfo {
            id: prepared.gpu_instance_id,
            placement: Placement {
                start: prepared.slice_start,
                size: prepared.slice_size,
            },
        };

        match self
            .library
            .destroy_compute_instance(&handle, &gpu_instance, prepared.compute_instance_id)
            .await
        {
            Ok(()) | Err(HwError::NotFound) => {}
            Err(e) => return Err(e),
        }

        match self
            .library
            .destroy_gpu_instance(&handle, prepared.gpu_instance_id)
            .await
        {
            Ok(()) | Err(HwError::NotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::{ComputeInstanceInfo, DeviceHandle, InstanceProfile};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeLibrary {
        existing_instances: Mutex<Vec<GpuInstanceInfo>>,
        existing_compute: Mutex<Vec<(i32, ComputeInstanceInfo)>>,
        created_gpu_instances: Mutex<Vec<i32>>,
        next_id: Mutex<i32>,
        init_calls: Mutex<u32>,
        shutdown_calls: Mutex<u32>,
    }

    #[async_trait]
    impl MigLibrary for FakeLibrary {
        async fn init(&self) -> Result<(), HwError> {
            *self.init_calls.lock().unwrap() += 1;
            Ok(())
        }
        fn shutdown(&self) {
            *self.shutdown_calls.lock().unwrap() += 1;
        }
        async fn device_handle(&self, pci_address: &str) -> Result<DeviceHandle, HwError> {
            Ok(DeviceHandle(pci_address.to_string()))
        }
        async fn ensure_mig_mode(&self, _handle: &DeviceHandle) -> Result<MigModeState, HwError> {
            Ok(MigModeState::Enabled)
        }
        async fn instance_profile(
            &self,
            _handle: &DeviceHandle,
            profile_id: i32,
        ) -> Result<InstanceProfile, HwError> {
            Ok(InstanceProfile {
                profile_id,
                memory_mib: 4096,
                slice_count: 4,
            })
        }
        async fn list_gpu_instances(
            &self,
            _handle: &DeviceHandle,
            _profile_id: i32,
        ) -> Result<Vec<GpuInstanceInfo>, HwError> {
            Ok(self.existing_instances.lock().unwrap().clone())
        }
        async fn create_gpu_instance(
            &self,
            _handle: &DeviceHandle,
            _profile_id: i32,
            placement: Placement,
        ) -> Result<GpuInstanceInfo, HwError> {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            let gi = GpuInstanceInfo { id: *next, placement };
            self.created_gpu_instances.lock().unwrap().push(gi.id);
            Ok(gi)
        }
        async fn destroy_gpu_instance(
            &self,
            _handle: &DeviceHandle,
            _gpu_instance_id: i32,
        ) -> Result<(), HwError> {
            Ok(())
        }
        async fn list_compute_instances(
            &self,
            _handle: &DeviceHandle,
            gpu_instance: &GpuInstanceInfo,
        ) -> Result<Vec<ComputeInstanceInfo>, HwError> {
            Ok(self
                .existing_compute
                .lock()
                .unwrap()
                .iter()
                .filter(|(gi_id, _)| *gi_id == gpu_instance.id)
                .map(|(_, ci)| *ci)
                .collect())
        }
        async fn create_compute_instance(
            &self,
            _handle: &DeviceHandle,
            _gpu_instance: &GpuInstanceInfo,
            _ci_profile_id: i32,
            placement: Placement,
        ) -> Result<ComputeInstanceInfo, HwError> {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            Ok(ComputeInstanceInfo {
                id: *next,
                slice_count: placement.size,
            })
        }
        async fn destroy_compute_instance(
            &self,
            _handle: &DeviceHandle,
            _gpu_instance: &GpuInstanceInfo,
            _compute_instance_id: i32,
        ) -> Result<(), HwError> {
            Ok(())
        }
        async fn device_uuid(&self, handle: &DeviceHandle) -> Result<String, HwError> {
            Ok(format!("GPU-{}", handle.0))
        }
        async fn compute_instance_uuid(
            &self,
            _handle: &DeviceHandle,
            _gpu_instance: &GpuInstanceInfo,
            compute_instance_id: i32,
        ) -> Result<String, HwError> {
            Ok(format!("MIG-CI-{compute_instance_id}"))
        }
    }

    fn request() -> ClaimDeviceRequest {
        ClaimDeviceRequest {
            device_id: "dev-0".to_string(),
            pci_address: "0000:01:00.0".to_string(),
            request_type: gpu_api::DeviceRequestType::Mig,
            mig_profile_id: Some(19),
            slice_start: Some(4),
            slice_size: Some(4),
        }
    }

    #[tokio::test]
    async fn rejects_empty_pci_address() {
        let adapter = MigAdapter::new(Arc::new(FakeLibrary::default()));
        let mut req = request();
        req.pci_address = String::new();
        let err = adapter.prepare(&req).await.unwrap_err();
        assert!(matches!(err, HwError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn rejects_zero_slice_size() {
        let adapter = MigAdapter::new(Arc::new(FakeLibrary::default()));
        let mut req = request();
        req.slice_size = Some(0);
        let err = adapter.prepare(&req).await.unwrap_err();
        assert!(matches!(err, HwError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn creates_new_instance_when_none_reusable() {
        let lib = Arc::new(FakeLibrary::default());
        let adapter = MigAdapter::new(lib.clone());
        let prepared = adapter.prepare(&request()).await.unwrap();
        assert_eq!(prepared.slice_start, 4);
        assert_eq!(prepared.slice_size, 4);
        assert_eq!(lib.created_gpu_instances.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reuses_matching_existing_instance_s2() {
        let lib = Arc::new(FakeLibrary::default());
        lib.existing_instances.lock().unwrap().push(GpuInstanceInfo {
            id: 7,
            placement: Placement { start: 4, size: 4 },
        });
        lib.existing_compute.lock().unwrap().push((
            7,
            ComputeInstanceInfo { id: 70, slice_count: 4 },
        ));
        let adapter = MigAdapter::new(lib.clone());
        let prepared = adapter.prepare(&request()).await.unwrap();
        assert_eq!(prepared.gpu_instance_id, 7);
        assert_eq!(prepared.compute_instance_id, 70);
        assert!(lib.created_gpu_instances.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unprepare_tolerates_not_found() {
        struct AlwaysNotFound;
        #[async_trait]
        impl MigLibrary for AlwaysNotFound {
            async fn init(&self) -> Result<(), HwError> {
                Ok(())
            }
            fn shutdown(&self) {}
            async fn device_handle(&self, pci_address: &str) -> Result<DeviceHandle, HwError> {
                Ok(DeviceHandle(pci_address.to_string()))
            }
            async fn ensure_mig_mode(&self, _: &DeviceHandle) -> Result<MigModeState, HwError> {
                Ok(MigModeState::Enabled)
            }
            async fn instance_profile(&self, _: &DeviceHandle, _: i32) -> Result<InstanceProfile, HwError> {
                unimplemented!()
            }
            async fn list_gpu_instances(&self, _: &DeviceHandle, _: i32) -> Result<Vec<GpuInstanceInfo>, HwError> {
                unimplemented!()
            }
            async fn create_gpu_instance(&self, _: &DeviceHandle, _: i32, _: Placement) -> Result<GpuInstanceInfo, HwError> {
                unimplemented!()
            }
            async fn destroy_gpu_instance(&self, _: &DeviceHandle, _: i32) -> Result<(), HwError> {
                Err(HwError::NotFound)
            }
            async fn list_compute_instances(&self, _: &DeviceHandle, _: &GpuInstanceInfo) -> Result<Vec<ComputeInstanceInfo>, HwError> {
                unimplemented!()
            }
            async fn create_compute_instance(&self, _: &DeviceHandle, _: &GpuInstanceInfo, _: i32, _: Placement) -> Result<ComputeInstanceInfo, HwError> {
                unimplemented!()
            }
            async fn destroy_compute_instance(&self, _: &DeviceHandle, _: &GpuInstanceInfo, _: i32) -> Result<(), HwError> {
                Err(HwError::NotFound)
            }
            async fn device_uuid(&self, _: &DeviceHandle) -> Result<String, HwError> {
                unimplemented!()
            }
            async fn compute_instance_uuid(&self, _: &DeviceHandle, _: &GpuInstanceInfo, _: i32) -> Result<String, HwError> {
                unimplemented!()
            }
        }

        let adapter = MigAdapter::new(Arc::new(AlwaysNotFound));
        let prepared = PreparedMig {
            pci_address: "0000:01:00.0".into(),
            profile_id: 19,
            slice_start: 0,
            slice_size: 4,
            gpu_instance_id: 1,
            compute_instance_id: 2,
            device_uuid: "GPU-x".into(),
        };
        adapter.unprepare(&prepared).await.unwrap();
    }
}

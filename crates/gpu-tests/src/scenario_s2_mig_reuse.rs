//! S2: a second claim requesting the same MIG placement and slice size as an
//! already-prepared claim reuses the existing GPU/compute instance instead of
//! creating a new one (spec §8 scenarios, spec §4.4.1 "Open Question" on
//! reuse matching by placement + slice count only).

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use gpu_api::{ClaimDeviceRequest, DeviceRequestType};
    use gpu_hw::{
        ComputeInstanceInfo, DeviceHandle, GpuInstanceInfo, HwError, InstanceProfile, MigAdapter,
        MigLibrary, MigModeState, Placement,
    };
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;
    use std::sync::Mutex;

    /// An in-memory vendor library standing in for the real GPU-management
    /// bindings, tracking created instances like a real device would so a
    /// second `prepare()` call can discover and reuse the first's.
    #[derive(Default)]
    struct StatefulLibrary {
        gpu_instances: Mutex<Vec<GpuInstanceInfo>>,
        compute_instances: Mutex<Vec<(i32, ComputeInstanceInfo)>>,
        next_id: AtomicI32,
        created_gpu_instances: AtomicI32,
    }

    #[async_trait]
    impl MigLibrary for StatefulLibrary {
        async fn init(&self) -> Result<(), HwError> {
            Ok(())
        }
        fn shutdown(&self) {}
        async fn device_handle(&self, pci_address: &str) -> Result<DeviceHandle, HwError> {
            Ok(DeviceHandle(pci_address.to_string()))
        }
        async fn ensure_mig_mode(&self, _handle: &DeviceHandle) -> Result<MigModeState, HwError> {
            Ok(MigModeState::Enabled)
        }
        async fn instance_profile(&self, _handle: &DeviceHandle, profile_id: i32) -> Result<InstanceProfile, HwError> {
            Ok(InstanceProfile {
                profile_id,
                memory_mib: 10240,
                slice_count: 4,
            })
        }
        async fn list_gpu_instances(&self, _handle: &DeviceHandle, _profile_id: i32) -> Result<Vec<GpuInstanceInfo>, HwError> {
            Ok(self.gpu_instances.lock().unwrap().clone())
        }
        async fn create_gpu_instance(&self, _handle: &DeviceHandle, _profile_id: i32, placement: Placement) -> Result<GpuInstanceInfo, HwError> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.created_gpu_instances.fetch_add(1, Ordering::SeqCst);
            let gi = GpuInstanceInfo { id, placement };
            self.gpu_instances.lock().unwrap().push(gi);
            Ok(gi)
        }
        async fn destroy_gpu_instance(&self, _handle: &DeviceHandle, _gpu_instance_id: i32) -> Result<(), HwError> {
            Ok(())
        }
        async fn list_compute_instances(&self, _handle: &DeviceHandle, gpu_instance: &GpuInstanceInfo) -> Result<Vec<ComputeInstanceInfo>, HwError> {
            Ok(self
                .compute_instances
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
            gpu_instance: &GpuInstanceInfo,
            _ci_profile_id: i32,
            placement: Placement,
        ) -> Result<ComputeInstanceInfo, HwError> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let ci = ComputeInstanceInfo { id, slice_count: placement.size };
            self.compute_instances.lock().unwrap().push((gpu_instance.id, ci));
            Ok(ci)
        }
        async fn destroy_compute_instance(&self, _handle: &DeviceHandle, _gpu_instance: &GpuInstanceInfo, _compute_instance_id: i32) -> Result<(), HwError> {
            Ok(())
        }
        async fn device_uuid(&self, handle: &DeviceHandle) -> Result<String, HwError> {
            Ok(format!("GPU-{}", handle.0))
        }
        async fn compute_instance_uuid(&self, _handle: &DeviceHandle, _gpu_instance: &GpuInstanceInfo, compute_instance_id: i32) -> Result<String, HwError> {
            Ok(format!("MIG-CI-{compute_instance_id}"))
        }
    }

    fn request(device_id: &str) -> ClaimDeviceRequest {
        ClaimDeviceRequest {
            device_id: device_id.to_string(),
            pci_address: "0000:04:00.0".to_string(),
            request_type: DeviceRequestType::Mig,
            mig_profile_id: Some(19),
            slice_start: Some(0),
            slice_size: Some(4),
        }
    }

    #[tokio::test]
    async fn scenario_s2_second_claim_reuses_the_first_claims_instance() {
        let library = Arc::new(StatefulLibrary::default());
        let adapter = MigAdapter::new(library.clone());

        let first = adapter.prepare(&request("claim-1")).await.unwrap();
        let second = adapter.prepare(&request("claim-2")).await.unwrap();

        assert_eq!(first.gpu_instance_id, second.gpu_instance_id);
        assert_eq!(first.compute_instance_id, second.compute_instance_id);
        assert_eq!(
            library.created_gpu_instances.load(Ordering::SeqCst),
            1,
            "the second prepare must not create a second GPU instance"
        );
    }
}

//! Documented-fake implementations of the vendor-library seams `gpu-hw`
//! defines (`MigLibrary`, `CdiCache`). Binding to the real vendor GPU-
//! management library and the real CDI cache daemon is out of scope (spec
//! §1); wiring the binary still needs a concrete type behind each trait
//! object, so these return `LibraryUnavailable`/write-through-to-disk
//! behavior instead of linking against vendor code.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use gpu_hw::{
    CdiCache, CdiSpecDocument, ComputeInstanceInfo, DeviceHandle, GpuInstanceInfo, HwError,
    InstanceProfile, MigLibrary, MigModeState, Placement,
};

/// A `MigLibrary` that reports every MIG operation as unavailable. Deployments
/// without real MIG-capable hardware, or running this binary outside its
/// target node, get a clear error instead of a link-time dependency on
/// vendor bindings this crate does not carry.
pub struct UnavailableMigLibrary;

#[async_trait]
impl MigLibrary for UnavailableMigLibrary {
    async fn init(&self) -> Result<(), HwError> {
        Err(HwError::LibraryUnavailable(
            "vendor GPU-management library bindings are not linked into this build".into(),
        ))
    }

    fn shutdown(&self) {}

    async fn device_handle(&self, pci_address: &str) -> Result<DeviceHandle, HwError> {
        Err(HwError::LibraryUnavailable(format!(
            "no vendor binding for device {pci_address}"
        )))
    }

    async fn ensure_mig_mode(&self, _handle: &DeviceHandle) -> Result<MigModeState, HwError> {
        Err(HwError::LibraryUnavailable("ensure_mig_mode".into()))
    }

    async fn instance_profile(
        &self,
        _handle: &DeviceHandle,
        _profile_id: i32,
    ) -> Result<InstanceProfile, HwError> {
        Err(HwError::LibraryUnavailable("instance_profile".into()))
    }

    async fn list_gpu_instances(
        &self,
        _handle: &DeviceHandle,
        _profile_id: i32,
    ) -> Result<Vec<GpuInstanceInfo>, HwError> {
        Err(HwError::LibraryUnavailable("list_gpu_instances".into()))
    }

    async fn create_gpu_instance(
        &self,
        _handle: &DeviceHandle,
        _profile_id: i32,
        _placement: Placement,
    ) -> Result<GpuInstanceInfo, HwError> {
        Err(HwError::LibraryUnavailable("create_gpu_instance".into()))
    }

    async fn destroy_gpu_instance(&self, _handle: &DeviceHandle, _gpu_instance_id: i32) -> Result<(), HwError> {
        Err(HwError::LibraryUnavailable("destroy_gpu_instance".into()))
    }

    async fn list_compute_instances(
        &self,
        _handle: &DeviceHandle,
        _gpu_instance: &GpuInstanceInfo,
    ) -> Result<Vec<ComputeInstanceInfo>, HwError> {
        Err(HwError::LibraryUnavailable("list_compute_instances".into()))
    }

    async fn create_compute_instance(
        &self,
        _handle: &DeviceHandle,
        _gpu_instance: &GpuInstanceInfo,
        _ci_profile_id: i32,
        _placement: Placement,
    ) -> Result<ComputeInstanceInfo, HwError> {
        Err(HwError::LibraryUnavailable("create_compute_instance".into()))
    }

    async fn destroy_compute_instance(
        &self,
        _handle: &DeviceHandle,
        _gpu_instance: &GpuInstanceInfo,
        _compute_instance_id: i32,
    ) -> Result<(), HwError> {
        Err(HwError::LibraryUnavailable("destroy_compute_instance".into()))
    }

    async fn device_uuid(&self, _handle: &DeviceHandle) -> Result<String, HwError> {
        Err(HwError::LibraryUnavailable("device_uuid".into()))
    }

    async fn compute_instance_uuid(
        &self,
        _handle: &DeviceHandle,
        _gpu_instance: &GpuInstanceInfo,
        _compute_instance_id: i32,
    ) -> Result<String, HwError> {
        Err(HwError::LibraryUnavailable("compute_instance_uuid".into()))
    }
}

/// A `CdiCache` that writes specs as JSON files under a configured directory
/// rather than through the vendor CDI library. Functionally equivalent for
/// wiring purposes: `write_spec`/`delete_spec` are the entire contract
/// `gpu-hw`'s writers need.
pub struct FilesystemCdiCache {
    root: PathBuf,
    written: Mutex<BTreeMap<String, ()>>,
}

impl FilesystemCdiCache {
    pub fn new(root: PathBuf) -> Self {
        FilesystemCdiCache {
            root,
            written: Mutex::new(BTreeMap::new()),
        }
    }

    fn path_for(&self, transient_name: &str) -> PathBuf {
        self.root.join(format!("{transient_name}.json"))
    }
}

#[async_trait]
impl CdiCache for FilesystemCdiCache {
    async fn write_spec(&self, transient_name: &str, document: &CdiSpecDocument) -> Result<(), HwError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| HwError::Sysfs {
                path: self.root.display().to_string(),
                source: e,
            })?;
        let path = self.path_for(transient_name);
        let contents = serde_json::to_vec_pretty(document).map_err(|e| HwError::Other(e.into()))?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| HwError::Sysfs {
                path: path.display().to_string(),
                source: e,
            })?;
        self.written.lock().unwrap().insert(transient_name.to_string(), ());
        Ok(())
    }

    async fn delete_spec(&self, transient_name: &str) -> Result<(), HwError> {
        let path = self.path_for(transient_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(HwError::Sysfs {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        }
        self.written.lock().unwrap().remove(transient_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_mig_library_reports_init_failure() {
        let lib = UnavailableMigLibrary;
        let err = lib.init().await.unwrap_err();
        assert!(matches!(err, HwError::LibraryUnavailable(_)));
    }

    #[tokio::test]
    async fn filesystem_cdi_cache_round_trips_a_spec() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = FilesystemCdiCache::new(tmp.path().to_path_buf());
        let doc = CdiSpecDocument {
            cdi_version: "0.6.0".to_string(),
            kind: "nvidia.com/gpu".to_string(),
            devices: vec![],
            container_edits: Default::default(),
        };
        cache.write_spec("nvidia.com_gpu_claim-1", &doc).await.unwrap();
        assert!(tmp.path().join("nvidia.com_gpu_claim-1.json").exists());
        cache.delete_spec("nvidia.com_gpu_claim-1").await.unwrap();
        assert!(!tmp.path().join("nvidia.com_gpu_claim-1.json").exists());
    }

    #[tokio::test]
    async fn deleting_a_missing_spec_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = FilesystemCdiCache::new(tmp.path().to_path_buf());
        cache.delete_spec("never-written").await.unwrap();
    }
}

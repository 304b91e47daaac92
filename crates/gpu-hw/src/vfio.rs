//! VFIO driver-rebind adapter (spec §4.4.3). Reads/writes the standard Linux
//! sysfs driver-bind protocol; never touches the device itself beyond that.

use std::path::{Path, PathBuf};

use tokio::fs;

use gpu_api::PreparedVfio;

use crate::error::HwError;

pub const VFIO_DRIVER: &str = "vfio-pci";
const DEFAULT_DRIVER: &str = "nvidia";

pub struct VfioAdapter {
    sysfs_root: PathBuf,
    drivers_root: PathBuf,
}

impl VfioAdapter {
    pub fn new(sysfs_root: impl Into<PathBuf>, drivers_root: impl Into<PathBuf>) -> Self {
        VfioAdapter {
            sysfs_root: sysfs_root.into(),
            drivers_root: drivers_root.into(),
        }
    }

    /// Rebinds `pci_address` to `vfio-pci`, or returns its current state if
    /// already bound there (spec §4.4.3 "Prepare").
    pub async fn prepare(&self, pci_address: &str) -> Result<PreparedVfio, HwError> {
        let current_driver = self.current_driver(pci_address).await?;
        let iommu_group = self.iommu_group(pci_address).await?;

        if current_driver == VFIO_DRIVER {
            return Ok(PreparedVfio {
                pci_address: pci_address.to_string(),
                original_driver: current_driver,
                iommu_group,
            });
        }

        if current_driver != DEFAULT_DRIVER {
            return Err(HwError::UnexpectedDriver(current_driver));
        }

        self.rebind(pci_address, &current_driver, VFIO_DRIVER).await?;

        Ok(PreparedVfio {
            pci_address: pci_address.to_string(),
            original_driver: current_driver,
            iommu_group,
        })
    }

    /// Rebinds back to the original driver, defaulting to `nvidia` when
    /// unknown (spec §4.4.3 "Unprepare"). Idempotent when already bound
    /// there.
    pub async fn unprepare(&self, prepared: &PreparedVfio) -> Result<(), HwError> {
        let target = if prepared.original_driver.is_empty() {
            DEFAULT_DRIVER
        } else {
            &prepared.original_driver
        };

        let current_driver = self.current_driver(&prepared.pci_address).await?;
        if current_driver == target {
            return Ok(());
        }

        self.rebind(&prepared.pci_address, &current_driver, target).await
    }

    async fn current_driver(&self, pci_address: &str) -> Result<String, HwError> {
        let link = self.device_path(pci_address).join("driver");
        let target = fs::read_link(&link).await.map_err(|e| sysfs_err(&link, e))?;
        basename(&target).ok_or_else(|| HwError::Sysfs {
            path: link.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "driver symlink has no basename"),
        })
    }

    async fn iommu_group(&self, pci_address: &str) -> Result<u32, HwError> {
        let link = self.device_path(pci_address).join("iommu_group");
        let target = fs::read_link(&link).await.map_err(|e| sysfs_err(&link, e))?;
        let name = basename(&target).ok_or_else(|| HwError::Sysfs {
            path: link.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "iommu_group symlink has no basename"),
        })?;
        name.parse::<u32>().map_err(|_| HwError::Sysfs {
            path: link.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "iommu_group is not numeric"),
        })
    }

    /// The standard four-write sysfs rebind sequence (spec §4.4.3 "Prepare"
    /// step (a)-(d)).
    async fn rebind(&self, pci_address: &str, from_driver: &str, to_driver: &str) -> Result<(), HwError> {
        let device_dir = self.device_path(pci_address);
        let override_path = device_dir.join("driver_override");
        write_sysfs(&override_path, to_driver).await?;

        let unbind_path = self.drivers_root.join(from_driver).join("unbind");
        write_sysfs(&unbind_path, pci_address).await?;

        let bind_path = self.drivers_root.join(to_driver).join("bind");
        write_sysfs(&bind_path, pci_address).await?;

        write_sysfs(&override_path, "").await
    }

    fn device_path(&self, pci_address: &str) -> PathBuf {
        self.sysfs_root.join(pci_address)
    }
}

async fn write_sysfs(path: &Path, contents: &str) -> Result<(), HwError> {
    fs::write(path, contents).await.map_err(|e| sysfs_err(path, e))
}

fn sysfs_err(path: &Path, source: std::io::Error) -> HwError {
    HwError::Sysfs {
        path: path.display().to_string(),
        source,
    }
}

fn basename(path: &Path) -> Option<String> {
    path.file_name().map(|s| s.to_string_lossy().to_string())
}

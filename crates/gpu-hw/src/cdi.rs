//! CDI spec emission (spec §4.4.4): a composite writer that picks between a
//! VFIO-shaped spec and a vendor-specific "standard" spec based on the
//! claim's VFIO flag, and writes through an external CDI cache abstraction.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HwError;

/// The CDI cache: a directory protected by the vendor's CDI library (spec
/// §5 "Shared resources"). Writers must tolerate concurrent removals, so
/// `delete_spec` is idempotent.
#[async_trait]
pub trait CdiCache: Send + Sync {
    async fn write_spec(&self, transient_name: &str, document: &CdiSpecDocument) -> Result<(), HwError>;
    async fn delete_spec(&self, transient_name: &str) -> Result<(), HwError>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CdiDeviceEntry {
    pub name: String,
    pub device_nodes: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContainerEdits {
    pub device_nodes: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CdiSpecDocument {
    pub cdi_version: String,
    pub kind: String,
    pub devices: Vec<CdiDeviceEntry>,
    #[serde(default)]
    pub container_edits: ContainerEdits,
}

/// One device this system asks a CDI writer to emit.
#[derive(Clone, Debug)]
pub struct CdiDeviceRequest {
    pub device_name: String,
    /// VFIO writer: IOMMU group. Standard writer: host device path.
    pub locator: String,
}

fn transient_spec_name(vendor: &str, class: &str, claim_uid: &str) -> String {
    format!("{vendor}_{class}_{claim_uid}")
}

fn qualified_device_id(vendor: &str, class: &str, name: &str) -> String {
    format!("{vendor}/{class}={name}")
}

/// Emits `/dev/vfio/<group>` device nodes plus the shared `/dev/vfio/vfio`
/// container-wide edit (spec §4.4.4 "The VFIO writer").
pub struct VfioCdiWriter {
    cache: std::sync::Arc<dyn CdiCache>,
    vendor: String,
    class: String,
}

impl VfioCdiWriter {
    pub fn new(cache: std::sync::Arc<dyn CdiCache>, vendor: impl Into<String>, class: impl Into<String>) -> Self {
        VfioCdiWriter {
            cache,
            vendor: vendor.into(),
            class: class.into(),
        }
    }

    pub async fn write(
        &self,
        claim_uid: &str,
        devices: &[(String, u32)],
    ) -> Result<BTreeMap<String, String>, HwError> {
        let mut entries = Vec::with_capacity(devices.len());
        let mut mapping = BTreeMap::new();
        for (device_name, iommu_group) in devices {
            let cdi_name = format!("{claim_uid}-{device_name}");
            entries.push(CdiDeviceEntry {
                name: cdi_name.clone(),
                device_nodes: vec![format!("/dev/vfio/{iommu_group}")],
            });
            mapping.insert(
                device_name.clone(),
                qualified_device_id(&self.vendor, &self.class, &cdi_name),
            );
        }

        let document = CdiSpecDocument {
            cdi_version: minimum_cdi_version(true).to_string(),
            kind: format!("{}/{}", self.vendor, self.class),
            devices: entries,
            container_edits: ContainerEdits {
                device_nodes: vec!["/dev/vfio/vfio".to_string()],
            },
        };

        let name = transient_spec_name(&self.vendor, &self.class, claim_uid);
        self.cache.write_spec(&name, &document).await?;
        Ok(mapping)
    }

    pub async fn delete(&self, claim_uid: &str) -> Result<(), HwError> {
        let name = transient_spec_name(&self.vendor, &self.class, claim_uid);
        self.cache.delete_spec(&name).await
    }
}

/// Vendor-specific writer for non-VFIO devices: transforms host device
/// paths into the container-visible path before emitting (spec §4.4.4 "The
/// standard writer").
pub struct StandardCdiWriter {
    cache: std::sync::Arc<dyn CdiCache>,
    vendor: String,
    class: String,
    transform_path: Box<dyn Fn(&str) -> String + Send + Sync>,
}

impl StandardCdiWriter {
    pub fn new(
        cache: std::sync::Arc<dyn CdiCache>,
        vendor: impl Into<String>,
        class: impl Into<String>,
        transform_path: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        StandardCdiWriter {
            cache,
            vendor: vendor.into(),
            class: class.into(),
            transform_path: Box::new(transform_path),
        }
    }

    pub async fn write(
        &self,
        claim_uid: &str,
        devices: &[(String, String)],
    ) -> Result<BTreeMap<String, String>, HwError> {
        let mut entries = Vec::with_capacity(devices.len());
        let mut mapping = BTreeMap::new();
        for (device_name, host_path) in devices {
            let cdi_name = format!("{claim_uid}-{device_name}");
            let target_path = (self.transform_path)(host_path);
            entries.push(CdiDeviceEntry {
                name: cdi_name.clone(),
                device_nodes: vec![target_path],
            });
            mapping.insert(
                device_name.clone(),
                qualified_device_id(&self.vendor, &self.class, &cdi_name),
            );
        }

        let document = CdiSpecDocument {
            cdi_version: minimum_cdi_version(false).to_string(),
            kind: format!("{}/{}", self.vendor, self.class),
            devices: entries,
            container_edits: ContainerEdits::default(),
        };

        let name = transient_spec_name(&self.vendor, &self.class, claim_uid);
        self.cache.write_spec(&name, &document).await?;
        Ok(mapping)
    }

    pub async fn delete(&self, claim_uid: &str) -> Result<(), HwError> {
        let name = transient_spec_name(&self.vendor, &self.class, claim_uid);
        self.cache.delete_spec(&name).await
    }
}

/// The minimum CDI spec version the generated structure requires. Container-
/// wide edits (used by the VFIO shape) were only formalized in CDI 0.6.0;
/// device-only specs are expressible since 0.5.0.
fn minimum_cdi_version(has_container_wide_edits: bool) -> &'static str {
    if has_container_wide_edits {
        "0.6.0"
    } else {
        "0.5.0"
    }
}

/// Accumulates up to one error per backend so a composite delete can try
/// both even when only one was actually used to write (open question §9:
/// preserved source behavior).
#[derive(Debug, Default)]
struct CompositeError(Vec<HwError>);

impl fmt::Display for CompositeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msgs: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", msgs.join("; "))
    }
}

impl std::error::Error for CompositeError {}

/// Selects between the VFIO and standard writer per-claim (spec §4.4.4 "A
/// composite writer").
pub struct CompositeCdiWriter {
    standard: StandardCdiWriter,
    vfio: VfioCdiWriter,
}

impl CompositeCdiWriter {
    pub fn new(standard: StandardCdiWriter, vfio: VfioCdiWriter) -> Self {
        CompositeCdiWriter { standard, vfio }
    }

    pub async fn write_vfio(
        &self,
        claim_uid: &str,
        devices: &[(String, u32)],
    ) -> Result<BTreeMap<String, String>, HwError> {
        self.vfio.write(claim_uid, devices).await
    }

    pub async fn write_standard(
        &self,
        claim_uid: &str,
        devices: &[(String, String)],
    ) -> Result<BTreeMap<String, String>, HwError> {
        self.standard.write(claim_uid, devices).await
    }

    /// Deletes from both backends unconditionally, accumulating up to two
    /// errors rather than stopping at the first (open question §9).
    pub async fn delete(&self, claim_uid: &str) -> Result<(), HwError> {
        let mut errors = CompositeError::default();
        if let Err(e) = self.vfio.delete(claim_uid).await {
            errors.0.push(e);
        }
        if let Err(e) = self.standard.delete(claim_uid).await {
            errors.0.push(e);
        }
        if errors.0.is_empty() {
            Ok(())
        } else {
            Err(HwError::Other(anyhow::Error::new(errors)))
        }
    }
}

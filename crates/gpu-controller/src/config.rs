//! Controller configuration: everything the binary needs to know before it
//! can start reconciling that a CRD field wouldn't carry (watch scope,
//! resync cadence, host filesystem roots).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Per-process configuration loaded once at startup and optionally
/// overridden by CLI flags (see `crate::cli::Cli`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Namespaces to watch `GpuPool`/`GpuResourceClaim` objects in. Empty
    /// means cluster-wide.
    #[serde(default)]
    pub watch_namespaces: Vec<String>,
    /// Resync period for the polling reconcile loop.
    #[serde(default = "default_resync_period_secs")]
    pub resync_period_secs: u64,
    /// Known feature names the feature-gate tracker should treat as
    /// degradable rather than fatal (spec §4.10 "known").
    #[serde(default = "default_known_features")]
    pub known_features: Vec<String>,

    /// Sysfs root for VFIO driver rebinding (spec §6 "Sysfs paths"). Tests
    /// point this at a tempdir.
    pub sysfs_root: PathBuf,
    /// Drivers root (`<driversRoot>/<driver>/{bind,unbind}`).
    pub drivers_root: PathBuf,

    /// MPS control-daemon binary path.
    pub mps_control_binary: PathBuf,
    /// Plugin root MPS pipe/log/shm directories are created under.
    pub mps_plugin_root: PathBuf,
    /// Driver-root library directories prefixed onto `LD_LIBRARY_PATH`
    /// (spec §4.4.2 step 4), filtered to those that exist on disk.
    #[serde(default)]
    pub mps_driver_library_dirs: Vec<PathBuf>,

    /// CDI vendor/class strings used to build qualified device ids
    /// (`<vendor>/<class>=<name>`).
    #[serde(default = "default_cdi_vendor")]
    pub cdi_vendor: String,
    #[serde(default = "default_cdi_class")]
    pub cdi_class: String,
}

fn default_resync_period_secs() -> u64 {
    30
}

fn default_known_features() -> Vec<String> {
    vec!["partitionable".to_string(), "time-slicing".to_string(), "mps".to_string()]
}

fn default_cdi_vendor() -> String {
    "gpu.deckhouse.io".to_string()
}

fn default_cdi_class() -> String {
    "gpu".to_string()
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            watch_namespaces: Vec::new(),
            resync_period_secs: default_resync_period_secs(),
            known_features: default_known_features(),
            sysfs_root: PathBuf::from("/sys/bus/pci/devices"),
            drivers_root: PathBuf::from("/sys/bus/pci/drivers"),
            mps_control_binary: PathBuf::from("/usr/bin/nvidia-cuda-mps-control"),
            mps_plugin_root: PathBuf::from("/var/lib/gpu-control-plane"),
            mps_driver_library_dirs: Vec::new(),
            cdi_vendor: default_cdi_vendor(),
            cdi_class: default_cdi_class(),
        }
    }
}

impl ControllerConfig {
    /// Loads configuration from a TOML or JSON file, selected by extension.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        match ext.to_lowercase().as_str() {
            "toml" => Ok(toml::from_str(&contents)?),
            "json" => Ok(serde_json::from_str(&contents)?),
            other => anyhow::bail!("unsupported config file extension: {other}"),
        }
    }
}

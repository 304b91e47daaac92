//! Preparation plan computation (spec §4.5 step (i)): decides, for each
//! requested device, whether it is rebound to `vfio-pci`, carved into a MIG
//! instance, or passed through directly (optionally behind a shared MPS
//! control daemon).

use gpu_api::{ClaimDeviceRequest, DeviceRequestType, GpuResourceClaimSpec, MpsConfig};

/// The target preparation for one claim, computed once per reconcile and
/// consumed by the adapter-invocation step.
#[derive(Clone, Debug, Default)]
pub struct PreparationPlan {
    /// When set, every requested device is rebound to `vfio-pci` instead of
    /// going through MIG/MPS (spec §4.5: the claim's `vfio` flag takes
    /// priority over per-device request types).
    pub vfio_devices: Vec<ClaimDeviceRequest>,
    pub mig_devices: Vec<ClaimDeviceRequest>,
    /// Devices that are neither VFIO nor MIG: passed through as-is, shared
    /// via MPS when `mps_config` is set.
    pub passthrough_devices: Vec<ClaimDeviceRequest>,
    pub mps_config: Option<MpsConfig>,
}

impl PreparationPlan {
    pub fn is_empty(&self) -> bool {
        self.vfio_devices.is_empty() && self.mig_devices.is_empty() && self.passthrough_devices.is_empty()
    }
}

pub fn compute_plan(spec: &GpuResourceClaimSpec) -> PreparationPlan {
    if spec.vfio {
        return PreparationPlan {
            vfio_devices: spec.devices.clone(),
            mig_devices: Vec::new(),
            passthrough_devices: Vec::new(),
            mps_config: None,
        };
    }

    let mut mig_devices = Vec::new();
    let mut passthrough_devices = Vec::new();
    for device in &spec.devices {
        match device.request_type {
            DeviceRequestType::Mig => mig_devices.push(device.clone()),
            DeviceRequestType::Physical | DeviceRequestType::Share => {
                passthrough_devices.push(device.clone())
            }
        }
    }

    PreparationPlan {
        vfio_devices: Vec::new(),
        mig_devices,
        passthrough_devices,
        mps_config: spec.mps.clone(),
    }
}

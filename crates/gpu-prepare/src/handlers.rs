//! Chain steps driving one `GpuResourceClaim` reconcile (spec §4.5).

use async_trait::async_trait;
use gpu_api::constants::{ANNOTATION_PREPARED_DEVICES, FINALIZER_PREPARE};
use gpu_api::{ClaimStatus, PreparedMps};
use gpu_hw::mps::MpsStartRequest;
use gpu_runtime::error::HandlerError;
use gpu_runtime::handler::{Handler, ResourceUpdater};
use gpu_runtime::result::ReconcileResult;
use kube::ResourceExt;

use crate::ctx::PrepareCtx;
use crate::plan::compute_plan;

fn hw_err(e: gpu_hw::HwError) -> HandlerError {
    HandlerError::Other(anyhow::Error::new(e))
}

/// Adds our finalizer to a not-yet-deleting claim, or tears down every
/// prepared hardware artifact and drops the finalizer when the claim is
/// being deleted (spec §4.1 step 3 "deleting object", §5 "Adapters must
/// release partially-created... instances on error paths").
pub struct TeardownOrAdmit;

#[async_trait]
impl Handler<PrepareCtx> for TeardownOrAdmit {
    fn name(&self) -> Option<&str> {
        Some("teardown_or_admit")
    }

    async fn execute(&self, ctx: &mut PrepareCtx) -> Result<ReconcileResult, HandlerError> {
        let Some(current) = ctx.claim.current().cloned() else {
            return Ok(ReconcileResult::ZERO);
        };

        let deleting = current.meta().deletion_timestamp.is_some();
        let has_finalizer = current.finalizers().iter().any(|f| f == FINALIZER_PREPARE);

        if !deleting {
            if let Some(changed) = ctx.claim.changed() {
                if !has_finalizer {
                    changed.finalizers_mut().push(FINALIZER_PREPARE.to_string());
                }
            }
            return Ok(ReconcileResult::ZERO);
        }

        if !has_finalizer {
            // Nothing of ours left to release; let the object finish deleting.
            return Err(HandlerError::StopChain(ReconcileResult::ZERO));
        }

        let claim_uid = current.uid().unwrap_or_default();
        let status = current.status.clone().unwrap_or_default();

        for prepared in &status.prepared_mig {
            if let Err(e) = ctx.adapters.mig.unprepare(prepared).await {
                if !e.is_not_found() {
                    return Err(hw_err(e));
                }
            }
        }
        for prepared in &status.prepared_vfio {
            if let Err(e) = ctx.adapters.vfio.unprepare(prepared).await {
                if !e.is_not_found() {
                    return Err(hw_err(e));
                }
            }
        }
        if let Some(mps) = &status.prepared_mps {
            ctx.adapters
                .mps
                .stop(
                    &ctx.adapters.mps_env.control_binary,
                    &ctx.adapters.mps_env.plugin_root,
                    &mps.control_id,
                )
                .await
                .map_err(hw_err)?;
        }
        ctx.adapters.cdi.delete(&claim_uid).await.map_err(hw_err)?;

        if let Some(changed) = ctx.claim.changed() {
            changed.status = Some(ClaimStatus::default());
            changed.finalizers_mut().retain(|f| f != FINALIZER_PREPARE);
        }

        Err(HandlerError::StopChain(ReconcileResult::ZERO))
    }
}

/// Computes the target preparation plan (spec §4.5 step (i)).
pub struct ComputePlan;

#[async_trait]
impl Handler<PrepareCtx> for ComputePlan {
    fn name(&self) -> Option<&str> {
        Some("compute_plan")
    }

    async fn execute(&self, ctx: &mut PrepareCtx) -> Result<ReconcileResult, HandlerError> {
        let Some(current) = ctx.claim.current() else {
            return Ok(ReconcileResult::ZERO);
        };
        if current.meta().deletion_timestamp.is_some() {
            return Ok(ReconcileResult::ZERO);
        }
        ctx.plan = Some(compute_plan(&current.spec));
        Ok(ReconcileResult::ZERO)
    }
}

/// Invokes the MIG/MPS/VFIO adapters per the computed plan (spec §4.5 step
/// (ii)).
pub struct InvokeAdapters;

#[async_trait]
impl Handler<PrepareCtx> for InvokeAdapters {
    fn name(&self) -> Option<&str> {
        Some("invoke_adapters")
    }

    async fn execute(&self, ctx: &mut PrepareCtx) -> Result<ReconcileResult, HandlerError> {
        let Some(plan) = ctx.plan.clone() else {
            return Ok(ReconcileResult::ZERO);
        };
        let Some(claim_uid) = ctx.claim.current().and_then(|c| c.uid()) else {
            return Ok(ReconcileResult::ZERO);
        };

        for req in &plan.mig_devices {
            let prepared = ctx.adapters.mig.prepare(req).await.map_err(hw_err)?;
            ctx.prepared.prepared_mig.push(prepared);
        }

        for req in &plan.vfio_devices {
            let prepared = ctx
                .adapters
                .vfio
                .prepare(&req.pci_address)
                .await
                .map_err(hw_err)?;
            ctx.prepared.prepared_vfio.push(prepared);
        }

        if let Some(config) = plan.mps_config.filter(|_| !plan.passthrough_devices.is_empty()) {
            let device_uuids: Vec<String> = plan
                .passthrough_devices
                .iter()
                .map(|d| d.device_id.clone())
                .collect();
            let req = MpsStartRequest {
                control_binary: ctx.adapters.mps_env.control_binary.clone(),
                plugin_root: ctx.adapters.mps_env.plugin_root.clone(),
                control_id: claim_uid.clone(),
                device_uuids,
                config,
                driver_library_dirs: ctx.adapters.mps_env.driver_library_dirs.clone(),
            };
            let dirs = ctx.adapters.mps.start(&req).await.map_err(hw_err)?;
            ctx.prepared.prepared_mps = Some(PreparedMps {
                control_id: claim_uid,
                pipe_dir: dirs.pipe_dir.to_string_lossy().to_string(),
                log_dir: dirs.log_dir.to_string_lossy().to_string(),
                shm_dir: String::new(),
            });
        }

        ctx.prepared.passthrough_devices = plan.passthrough_devices;

        Ok(ReconcileResult::ZERO)
    }
}

/// Emits CDI device specs for whatever the adapter step prepared (spec §4.5
/// step (iii)).
pub struct EmitCdi;

#[async_trait]
impl Handler<PrepareCtx> for EmitCdi {
    fn name(&self) -> Option<&str> {
        Some("emit_cdi")
    }

    async fn execute(&self, ctx: &mut PrepareCtx) -> Result<ReconcileResult, HandlerError> {
        let Some(claim_uid) = ctx.claim.current().and_then(|c| c.uid()) else {
            return Ok(ReconcileResult::ZERO);
        };

        if !ctx.prepared.prepared_vfio.is_empty() {
            let devices: Vec<(String, u32)> = ctx
                .prepared
                .prepared_vfio
                .iter()
                .map(|p| (p.pci_address.clone(), p.iommu_group))
                .collect();
            let mapping = ctx
                .adapters
                .cdi
                .write_vfio(&claim_uid, &devices)
                .await
                .map_err(hw_err)?;
            ctx.prepared.cdi_devices.extend(mapping);
        }

        if !ctx.prepared.prepared_mig.is_empty() {
            let devices: Vec<(String, String)> = ctx
                .prepared
                .prepared_mig
                .iter()
                .map(|p| (p.pci_address.clone(), p.device_uuid.clone()))
                .collect();
            let mapping = ctx
                .adapters
                .cdi
                .write_standard(&claim_uid, &devices)
                .await
                .map_err(hw_err)?;
            ctx.prepared.cdi_devices.extend(mapping);
        }

        if !ctx.prepared.passthrough_devices.is_empty() {
            let devices: Vec<(String, String)> = ctx
                .prepared
                .passthrough_devices
                .iter()
                .map(|d| (d.device_id.clone(), d.pci_address.clone()))
                .collect();
            let mapping = ctx
                .adapters
                .cdi
                .write_standard(&claim_uid, &devices)
                .await
                .map_err(hw_err)?;
            ctx.prepared.cdi_devices.extend(mapping);
        }

        Ok(ReconcileResult::ZERO)
    }
}

/// Folds the prepared outcome into the claim's status and annotations (spec
/// §4.5 step (iv)).
pub struct Annotate;

#[async_trait]
impl Handler<PrepareCtx> for Annotate {
    fn name(&self) -> Option<&str> {
        Some("annotate")
    }

    async fn execute(&self, ctx: &mut PrepareCtx) -> Result<ReconcileResult, HandlerError> {
        if ctx.plan.is_none() {
            return Ok(ReconcileResult::ZERO);
        }
        let cdi_devices = ctx.prepared.cdi_devices.clone();
        let prepared_mig = ctx.prepared.prepared_mig.clone();
        let prepared_vfio = ctx.prepared.prepared_vfio.clone();
        let prepared_mps = ctx.prepared.prepared_mps.clone();

        let Some(changed) = ctx.claim.changed() else {
            return Ok(ReconcileResult::ZERO);
        };

        let mut status = changed.status.clone().unwrap_or_default();
        status.prepared_mig = prepared_mig;
        status.prepared_vfio = prepared_vfio;
        status.prepared_mps = prepared_mps;
        status.cdi_devices = cdi_devices.clone();
        changed.status = Some(status);

        let encoded = serde_json::to_string(&cdi_devices).unwrap_or_default();
        changed
            .annotations_mut()
            .insert(ANNOTATION_PREPARED_DEVICES.to_string(), encoded);

        Ok(ReconcileResult::ZERO)
    }
}

/// Commits the working copy via the typed wrapper (spec §4.1 step 3, §4.2).
pub struct ClaimUpdater;

#[async_trait]
impl ResourceUpdater<PrepareCtx> for ClaimUpdater {
    async fn update(&self, ctx: &mut PrepareCtx) -> Result<ReconcileResult, HandlerError> {
        ctx.claim.update().await?;
        Ok(ReconcileResult::ZERO)
    }
}

//! Preparation orchestrator (spec §4.5): a handler chain that, per
//! `GpuResourceClaim`, computes a preparation plan, drives the MIG/MPS/VFIO
//! adapters, emits CDI artifacts, and annotates the claim with prepared
//! identifiers.

pub mod ctx;
pub mod handlers;
pub mod plan;
mod status;

use gpu_api::GpuResourceClaim;
use gpu_runtime::chain::Chain;
use gpu_runtime::resource::ResourceWrapper;
use kube::Api;
use std::sync::Arc;

pub use ctx::{Adapters, MpsEnvironment, PrepareCtx, PreparedOutcome};
pub use plan::{compute_plan, PreparationPlan};

/// Builds the per-claim handler chain (spec §4.5: "construct a handler
/// chain... watchers... are set up once on controller start" — this
/// function is that one-time construction; `reconcile_claim` runs it per
/// object).
pub fn build_chain() -> Chain<PrepareCtx> {
    Chain::new(
        vec![
            Box::new(handlers::TeardownOrAdmit),
            Box::new(handlers::ComputePlan),
            Box::new(handlers::InvokeAdapters),
            Box::new(handlers::EmitCdi),
            Box::new(handlers::Annotate),
        ],
        Box::new(handlers::ClaimUpdater),
    )
}

/// Runs one reconcile for the named claim: fetch via the typed wrapper, exit
/// if empty, otherwise drive the chain (spec §4.5 "Each reconcile: fetch the
/// claim via the typed wrapper; if empty, exit").
pub async fn reconcile_claim(
    api: Api<GpuResourceClaim>,
    name: &str,
    adapters: Arc<Adapters>,
    chain: &Chain<PrepareCtx>,
) -> Result<gpu_runtime::result::ReconcileResult, gpu_runtime::error::HandlerError> {
    let mut wrapper = ResourceWrapper::new(api, name);
    wrapper
        .fetch()
        .await
        .map_err(gpu_runtime::error::HandlerError::classify_handler_error)?;
    if wrapper.is_empty() {
        return Ok(gpu_runtime::result::ReconcileResult::ZERO);
    }

    let mut prepare_ctx = PrepareCtx::new(wrapper, adapters);
    chain.reconcile(&mut prepare_ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_chain_has_five_steps_and_an_updater() {
        // Smoke test: building the chain does not panic and produces a
        // value usable as `&Chain<PrepareCtx>`.
        let chain = build_chain();
        let _: &Chain<PrepareCtx> = &chain;
    }
}

//! A single step in a reconcile chain (spec §4.1).
//!
//! Handlers are a flat trait with two optional capabilities discovered at
//! runtime — a stable `name()` for log/event correlation, and an
//! `is_finalizer()` flag marking the step for a second pass after the
//! subject update — rather than a type hierarchy (spec §9 "Handler
//! polymorphism").

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::result::ReconcileResult;

#[async_trait]
pub trait Handler<Ctx>: Send + Sync
where
    Ctx: Send,
{
    /// Runs this step. A `StopChain` error still carries a result to merge
    /// (spec §4.1 step 2); any other error is classified by the runtime.
    async fn execute(&self, ctx: &mut Ctx) -> Result<ReconcileResult, HandlerError>;

    /// Stable name used for the per-handler logger context (spec §4.1 step
    /// 2a). Handlers that don't need log correlation can leave this unset.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Marks this handler for the finalizer pass run after a successful
    /// resource update (spec §4.1 step 5).
    fn is_finalizer(&self) -> bool {
        false
    }

    /// Runs in the finalizer pass, separate from `execute` (spec §4.1 step
    /// 5). Default no-op; handlers with `is_finalizer() == true` override
    /// this instead of re-running `execute`'s side effects a second time.
    async fn finalize(&self, _ctx: &mut Ctx) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Mutates the reconciled object and returns the minimal patch result, or
/// classifies its own failure (spec §4.1 step 3, §4.2).
#[async_trait]
pub trait ResourceUpdater<Ctx>: Send + Sync
where
    Ctx: Send,
{
    async fn update(&self, ctx: &mut Ctx) -> Result<ReconcileResult, HandlerError>;
}

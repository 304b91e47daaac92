//! The handler-chain executor (spec §4.1 "Algorithm (precise)").

use std::fmt;
use std::time::Duration;

use crate::error::HandlerError;
use crate::handler::{Handler, ResourceUpdater};
use crate::result::{merge, ReconcileResult};

const CONFLICT_REQUEUE_AFTER: Duration = Duration::from_micros(100);
const DELETING_OBJECT_REQUEUE_AFTER: Duration = Duration::from_secs(1);

/// Accumulates non-recoverable handler errors so a single failing handler
/// doesn't hide failures from handlers that ran after it (spec §4.1 step 2
/// "other: ... accumulate into a joined error").
#[derive(Debug, Default)]
struct JoinedError(Vec<anyhow::Error>);

impl JoinedError {
    fn push(&mut self, err: anyhow::Error) {
        self.0.push(err);
    }

    fn into_result(self) -> Option<anyhow::Error> {
        if self.0.is_empty() {
            return None;
        }
        Some(anyhow::Error::new(self))
    }
}

impl fmt::Display for JoinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msgs: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", msgs.join("; "))
    }
}

impl std::error::Error for JoinedError {}

/// An ordered sequence of handlers plus the resource updater that commits
/// their combined effect (spec §4.1).
pub struct Chain<Ctx> {
    handlers: Vec<Box<dyn Handler<Ctx>>>,
    updater: Option<Box<dyn ResourceUpdater<Ctx>>>,
}

impl<Ctx: Send> Chain<Ctx> {
    pub fn new(handlers: Vec<Box<dyn Handler<Ctx>>>, updater: Box<dyn ResourceUpdater<Ctx>>) -> Self {
        Chain {
            handlers,
            updater: Some(updater),
        }
    }

    /// Builds a chain with no resource updater configured, which makes every
    /// `reconcile` call fail fast with `NotConfigured` (spec §4.1 step 1,
    /// spec §7 "Fatal configuration error").
    pub fn unconfigured(handlers: Vec<Box<dyn Handler<Ctx>>>) -> Self {
        Chain {
            handlers,
            updater: None,
        }
    }

    /// Runs the chain to completion against `ctx` (spec §4.1 steps 1–6).
    pub async fn reconcile(&self, ctx: &mut Ctx) -> Result<ReconcileResult, HandlerError> {
        let Some(updater) = self.updater.as_deref() else {
            return Err(HandlerError::NotConfigured(
                "resource updater is not configured".to_string(),
            ));
        };

        let mut acc = ReconcileResult::ZERO;
        let mut joined = JoinedError::default();

        for h in &self.handlers {
            let span = h
                .name()
                .map(|name| tracing::info_span!("handler", name = %name));
            let _entered = span.as_ref().map(|s| s.enter());

            match h.execute(ctx).await {
                Ok(r) => acc = merge(acc, r),
                Err(HandlerError::StopChain(r)) => {
                    acc = merge(acc, r);
                    break;
                }
                Err(HandlerError::Conflict(e)) => {
                    tracing::debug!(error = %e, "transient conflict, requeuing");
                    acc = merge(acc, ReconcileResult::after(CONFLICT_REQUEUE_AFTER));
                }
                Err(HandlerError::DeletingObject(e)) => {
                    // Not expected from a plain handler, but treat the same
                    // as from the updater rather than losing the signal.
                    tracing::warn!(error = %e, "deleting object race in handler");
                    acc = merge(acc, ReconcileResult::after(DELETING_OBJECT_REQUEUE_AFTER));
                }
                Err(HandlerError::NotConfigured(msg)) => {
                    return Err(HandlerError::NotConfigured(msg));
                }
                Err(HandlerError::Other(e)) => {
                    tracing::warn!(error = %e, "handler failed");
                    joined.push(e);
                }
            }
        }

        match updater.update(ctx).await {
            Ok(r) => acc = merge(acc, r),
            Err(HandlerError::Conflict(e)) => {
                tracing::debug!(error = %e, "resource update conflict, requeuing");
                acc = merge(acc, ReconcileResult::after(CONFLICT_REQUEUE_AFTER));
            }
            Err(HandlerError::DeletingObject(e)) => {
                tracing::warn!(error = %e, "cannot add finalizers to a deleting object");
                acc = merge(acc, ReconcileResult::after(DELETING_OBJECT_REQUEUE_AFTER));
            }
            Err(HandlerError::StopChain(r)) => acc = merge(acc, r),
            Err(HandlerError::NotConfigured(msg)) => {
                return Err(HandlerError::NotConfigured(msg));
            }
            Err(HandlerError::Other(e)) => joined.push(e),
        }

        if let Some(err) = joined.into_result() {
            return Err(HandlerError::Other(err));
        }

        for h in self.handlers.iter().filter(|h| h.is_finalizer()) {
            h.finalize(ctx).await?;
        }

        Ok(acc)
    }
}

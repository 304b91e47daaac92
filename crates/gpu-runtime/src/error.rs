//! Error classification for the handler runtime (spec §4.1 step 2/3, §7).
//!
//! The runtime never needs to know *which* handler failed in what domain
//! way — only which of a small number of recovery classes the failure falls
//! into. `classify_handler_error`/`classify_updater_error` are the two
//! places that map a raw `kube::Error` into one of those classes, using a
//! classify-and-route pattern.

use thiserror::Error;

use crate::result::ReconcileResult;

/// Error (or non-error control signal) a handler or the resource updater can
/// return. `StopChain` is not really a failure — it carries the result the
/// handler still wants merged before the chain halts (spec §4.1 step 2).
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Sentinel asking the chain to stop after merging `0`'s result (spec
    /// §4.1 step 2 "sentinel stop chain", property 4).
    #[error("stop chain")]
    StopChain(ReconcileResult),

    /// The external client reported an optimistic-concurrency conflict
    /// (HTTP 409). Recovered locally: the runtime requeues after a short
    /// fixed backoff rather than surfacing this as an error (spec §7).
    #[error("transient conflict: {0}")]
    Conflict(#[source] kube::Error),

    /// The object is being deleted and we tried to mutate finalizers on it;
    /// recovered as a warning with a 1s requeue (spec §4.1 step 3).
    #[error("cannot add finalizers to a deleting object: {0}")]
    DeletingObject(#[source] kube::Error),

    /// A fatal configuration error: fail the reconcile, no requeue (spec §7
    /// "Fatal configuration error").
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// Everything else: surfaces as a reconcile error, subject to the
    /// runtime's ordinary retry (workqueue backoff, not the runtime itself).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    /// Classifies an error raised while executing a single handler (spec
    /// §4.1 step 2). Handlers never hit the "deleting object" special case;
    /// that only applies to the resource updater (step 3).
    pub fn classify_handler_error(err: kube::Error) -> Self {
        if is_conflict(&err) {
            HandlerError::Conflict(err)
        } else {
            HandlerError::Other(anyhow::anyhow!(err))
        }
    }

    /// Classifies an error raised by the resource updater itself (spec §4.1
    /// step 3). `deleting_with_no_finalizers` must reflect whether the
    /// subject currently has a deletion timestamp set and empty finalizers —
    /// only then does a "not found" response count as the deletion race
    /// rather than an ordinary not-found error.
    pub fn classify_updater_error(err: kube::Error, deleting_with_no_finalizers: bool) -> Self {
        if is_conflict(&err) {
            return HandlerError::Conflict(err);
        }
        if deleting_with_no_finalizers && is_not_found(&err) {
            return HandlerError::DeletingObject(err);
        }
        HandlerError::Other(anyhow::anyhow!(err))
    }
}

fn is_conflict(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(resp) => resp.code == 409,
        _ => false,
    }
}

pub(crate) fn is_not_found(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(resp) => resp.code == 404,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_err(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: "boom".into(),
            reason: "".into(),
            code,
        })
    }

    #[test]
    fn conflict_is_classified_as_conflict() {
        let e = HandlerError::classify_handler_error(api_err(409));
        assert!(matches!(e, HandlerError::Conflict(_)));
    }

    #[test]
    fn not_found_during_deletion_is_deletion_race() {
        let e = HandlerError::classify_updater_error(api_err(404), true);
        assert!(matches!(e, HandlerError::DeletingObject(_)));
    }

    #[test]
    fn not_found_outside_deletion_is_other() {
        let e = HandlerError::classify_updater_error(api_err(404), false);
        assert!(matches!(e, HandlerError::Other(_)));
    }

    #[test]
    fn not_found_on_handler_path_is_always_other() {
        let e = HandlerError::classify_handler_error(api_err(404));
        assert!(matches!(e, HandlerError::Other(_)));
    }
}

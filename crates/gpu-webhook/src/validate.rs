//! Synchronous admission decision function for `GpuDevice` create/update
//! (spec §4.9). This module is a pure function over a snapshot — no I/O, no
//! HTTP serving (the webhook HTTP listener is an out-of-scope collaborator,
//! spec §1) — so it can be unit tested without a live API server.

use gpu_api::{DeviceSelector, DeviceState, GpuDevice};
use thiserror::Error;

/// One namespaced or cluster pool's admission-relevant shape — everything
/// the validator needs to know about a candidate target pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub name: String,
    pub namespace: Option<String>,
    pub device_selector: DeviceSelector,
}

/// Result of resolving a pool name through the lookup index (spec §4.9
/// "Missing index on the name field falls back to a scan with a wrapped
/// error", "An ambiguous pool name... is rejected").
pub enum LookupOutcome {
    NotFound,
    Unique(PoolSnapshot),
    /// The name matched pools in more than one namespace and the device's
    /// own namespace didn't uniquely pick one out.
    Ambiguous(Vec<Option<String>>),
}

/// Abstracts the pool-name lookup so this module never depends on a live
/// `kube::Api` — supplied by the caller from an indexed cache (or, when that
/// index is missing, a linear scan; either way a lookup failure at that
/// layer surfaces here as `Err`, which this function wraps with context per
/// the "wrapped error" fallback behavior in spec §4.9).
pub trait PoolIndex {
    fn lookup_namespaced(&self, name: &str) -> Result<LookupOutcome, anyhow::Error>;
    fn lookup_cluster(&self, name: &str) -> Result<LookupOutcome, anyhow::Error>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("device carries both the namespaced and cluster assignment annotations")]
    ConflictingAnnotations,
    #[error("target pool {0:?} not found")]
    PoolNotFound(String),
    #[error("pool name {0:?} is ambiguous across namespaces {1:?}; no namespace disambiguation available")]
    AmbiguousPool(String, Vec<Option<String>>),
    #[error("device carries the ignore label and cannot be assigned to a pool")]
    DeviceIgnored,
    #[error("device is not Ready (current state: {0:?})")]
    DeviceNotReady(DeviceState),
    #[error("device does not match target pool's device selector")]
    SelectorMismatch,
    #[error("pool lookup failed: {0}")]
    LookupFailed(String),
}

/// Validates one `GpuDevice` admission request (spec §4.9 full algorithm).
pub fn validate_device(device: &GpuDevice, index: &dyn PoolIndex) -> Result<(), ValidationError> {
    if device.has_conflicting_assignment_annotations() {
        return Err(ValidationError::ConflictingAnnotations);
    }

    let (pool_name, lookup): (&str, Result<LookupOutcome, anyhow::Error>) =
        if let Some(name) = device.namespaced_assignment() {
            (name, index.lookup_namespaced(name))
        } else if let Some(name) = device.cluster_assignment() {
            (name, index.lookup_cluster(name))
        } else {
            // No assignment annotation: nothing further to validate.
            return Ok(());
        };

    let outcome = lookup.map_err(|e| ValidationError::LookupFailed(format!("{e:#}")))?;
    let pool = match outcome {
        LookupOutcome::NotFound => return Err(ValidationError::PoolNotFound(pool_name.to_string())),
        LookupOutcome::Ambiguous(namespaces) => {
            return Err(ValidationError::AmbiguousPool(pool_name.to_string(), namespaces))
        }
        LookupOutcome::Unique(pool) => pool,
    };

    if device.is_ignored() {
        return Err(ValidationError::DeviceIgnored);
    }

    let state = device.status.as_ref().map(|s| s.state).unwrap_or_default();
    if state != DeviceState::Ready {
        return Err(ValidationError::DeviceNotReady(state));
    }

    if !gpu_pool::matches_device_selector(device, &pool.device_selector) {
        return Err(ValidationError::SelectorMismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpu_api::{GpuDeviceSpec, GpuDeviceStatus, HardwareInfo};
    use kube::core::ObjectMeta;
    use std::collections::BTreeMap;

    struct FakeIndex {
        namespaced: Option<LookupOutcome>,
        cluster: Option<LookupOutcome>,
    }

    impl PoolIndex for FakeIndex {
        fn lookup_namespaced(&self, _name: &str) -> Result<LookupOutcome, anyhow::Error> {
            match &self.namespaced {
                Some(LookupOutcome::NotFound) => Ok(LookupOutcome::NotFound),
                Some(LookupOutcome::Unique(p)) => Ok(LookupOutcome::Unique(p.clone())),
                Some(LookupOutcome::Ambiguous(ns)) => Ok(LookupOutcome::Ambiguous(ns.clone())),
                None => Ok(LookupOutcome::NotFound),
            }
        }
        fn lookup_cluster(&self, _name: &str) -> Result<LookupOutcome, anyhow::Error> {
            match &self.cluster {
                Some(LookupOutcome::NotFound) => Ok(LookupOutcome::NotFound),
                Some(LookupOutcome::Unique(p)) => Ok(LookupOutcome::Unique(p.clone())),
                Some(LookupOutcome::Ambiguous(ns)) => Ok(LookupOutcome::Ambiguous(ns.clone())),
                None => Ok(LookupOutcome::NotFound),
            }
        }
    }

    fn device(annotations: BTreeMap<String, String>, state: DeviceState) -> GpuDevice {
        GpuDevice {
            metadata: ObjectMeta {
                name: Some("gpu-0".to_string()),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: GpuDeviceSpec {
                node_name: "node-a".to_string(),
                hardware: HardwareInfo::default(),
            },
            status: Some(GpuDeviceStatus {
                state,
                ..Default::default()
            }),
        }
    }

    fn pool(name: &str) -> PoolSnapshot {
        PoolSnapshot {
            name: name.to_string(),
            namespace: Some("team-a".to_string()),
            device_selector: DeviceSelector::default(),
        }
    }

    #[test]
    fn both_annotations_set_is_rejected() {
        let d = device(
            BTreeMap::from([
                ("gpu.deckhouse.io/assignment".to_string(), "pool-a".to_string()),
                ("gpu.deckhouse.io/cluster-assignment".to_string(), "pool-a".to_string()),
            ]),
            DeviceState::Ready,
        );
        let index = FakeIndex { namespaced: None, cluster: None };
        assert_eq!(validate_device(&d, &index), Err(ValidationError::ConflictingAnnotations));
    }

    #[test]
    fn no_assignment_annotation_is_always_valid() {
        let d = device(BTreeMap::new(), DeviceState::Discovered);
        let index = FakeIndex { namespaced: None, cluster: None };
        assert_eq!(validate_device(&d, &index), Ok(()));
    }

    #[test]
    fn missing_pool_is_rejected() {
        let d = device(
            BTreeMap::from([("gpu.deckhouse.io/assignment".to_string(), "pool-a".to_string())]),
            DeviceState::Ready,
        );
        let index = FakeIndex {
            namespaced: Some(LookupOutcome::NotFound),
            cluster: None,
        };
        assert_eq!(
            validate_device(&d, &index),
            Err(ValidationError::PoolNotFound("pool-a".to_string()))
        );
    }

    #[test]
    fn ambiguous_pool_name_is_rejected() {
        let d = device(
            BTreeMap::from([("gpu.deckhouse.io/assignment".to_string(), "pool-a".to_string())]),
            DeviceState::Ready,
        );
        let index = FakeIndex {
            namespaced: Some(LookupOutcome::Ambiguous(vec![
                Some("team-a".to_string()),
                Some("team-b".to_string()),
            ])),
            cluster: None,
        };
        assert!(matches!(
            validate_device(&d, &index),
            Err(ValidationError::AmbiguousPool(_, _))
        ));
    }

    #[test]
    fn non_ready_device_is_rejected() {
        let d = device(
            BTreeMap::from([("gpu.deckhouse.io/assignment".to_string(), "pool-a".to_string())]),
            DeviceState::Discovered,
        );
        let index = FakeIndex {
            namespaced: Some(LookupOutcome::Unique(pool("pool-a"))),
            cluster: None,
        };
        assert_eq!(
            validate_device(&d, &index),
            Err(ValidationError::DeviceNotReady(DeviceState::Discovered))
        );
    }

    #[test]
    fn ignored_device_is_rejected_even_with_a_valid_pool() {
        let mut d = device(
            BTreeMap::from([("gpu.deckhouse.io/assignment".to_string(), "pool-a".to_string())]),
            DeviceState::Ready,
        );
        d.metadata.labels = Some(BTreeMap::from([(
            "gpu.deckhouse.io/ignore".to_string(),
            "true".to_string(),
        )]));
        let index = FakeIndex {
            namespaced: Some(LookupOutcome::Unique(pool("pool-a"))),
            cluster: None,
        };
        assert_eq!(validate_device(&d, &index), Err(ValidationError::DeviceIgnored));
    }

    #[test]
    fn matching_ready_device_is_admitted() {
        let d = device(
            BTreeMap::from([("gpu.deckhouse.io/assignment".to_string(), "pool-a".to_string())]),
            DeviceState::Ready,
        );
        let index = FakeIndex {
            namespaced: Some(LookupOutcome::Unique(pool("pool-a"))),
            cluster: None,
        };
        assert_eq!(validate_device(&d, &index), Ok(()));
    }

    #[test]
    fn lookup_failure_is_wrapped() {
        struct ErrIndex;
        impl PoolIndex for ErrIndex {
            fn lookup_namespaced(&self, _name: &str) -> Result<LookupOutcome, anyhow::Error> {
                Err(anyhow::anyhow!("index unavailable"))
            }
            fn lookup_cluster(&self, _name: &str) -> Result<LookupOutcome, anyhow::Error> {
                Err(anyhow::anyhow!("index unavailable"))
            }
        }
        let d = device(
            BTreeMap::from([("gpu.deckhouse.io/assignment".to_string(), "pool-a".to_string())]),
            DeviceState::Ready,
        );
        let err = validate_device(&d, &ErrIndex).unwrap_err();
        assert!(matches!(err, ValidationError::LookupFailed(_)));
    }
}

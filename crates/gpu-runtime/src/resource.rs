//! The typed resource wrapper (spec §4.2): fetch-modify-patch a single
//! namespaced object, computing the minimal status/metadata mutation rather
//! than re-submitting the whole object.
//!
//! Combines an optimistic-version-compare conflict check with
//! diff-before-write discipline, using a "two-type value parameter plus
//! explicit status extractor" shape (spec §9) in place of a pointer-y
//! generic wrapper with an implicit emptiness flag.

use kube::api::{Patch, PatchParams};
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{is_not_found, HandlerError};
use crate::patch::{diff_finalizers, diff_map, PatchOp};

/// Implemented by every CRD status type so the wrapper can diff it
/// structurally without depending on any particular CRD crate.
pub trait HasStatus {
    type Status: Serialize + DeserializeOwned + PartialEq + Clone + Send + Sync;

    fn status(&self) -> &Option<Self::Status>;
    fn set_status(&mut self, status: Option<Self::Status>);
}

/// Fetch-modify-patch wrapper around one namespaced object addressed by
/// name (spec §4.2).
pub struct ResourceWrapper<T>
where
    T: Resource<DynamicType = ()>
        + ResourceExt
        + HasStatus
        + Clone
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    api: Api<T>,
    name: String,
    /// The object as read from the server. `None` means no object exists.
    current: Option<T>,
    /// The mutable working copy handlers mutate in place.
    changed: Option<T>,
}

impl<T> ResourceWrapper<T>
where
    T: Resource<DynamicType = ()>
        + ResourceExt
        + HasStatus
        + Clone
        + Serialize
        + DeserializeOwned
        + std::fmt::Debug
        + Send
        + Sync
        + 'static,
{
    pub fn new(api: Api<T>, name: impl Into<String>) -> Self {
        ResourceWrapper {
            api,
            name: name.into(),
            current: None,
            changed: None,
        }
    }

    /// Reads the current object; absence is not an error (spec §4.2
    /// "Fetch").
    pub async fn fetch(&mut self) -> Result<(), kube::Error> {
        match self.api.get(&self.name).await {
            Ok(obj) => {
                self.current = Some(obj.clone());
                self.changed = Some(obj);
                Ok(())
            }
            Err(kube::Error::Api(e)) if e.code == 404 => {
                self.current = None;
                self.changed = None;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// `true` iff `fetch` found no object (spec §4.2 "IsEmpty").
    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// The original, unmodified view as read by `fetch`.
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// The mutable working view handlers mutate in place.
    pub fn changed(&mut self) -> Option<&mut T> {
        self.changed.as_mut()
    }

    pub fn changed_ref(&self) -> Option<&T> {
        self.changed.as_ref()
    }

    /// Computes and submits the minimal external mutation implied by the
    /// difference between `current` and `changed` (spec §4.2 "Update").
    ///
    /// Returns `true` if any external call was made (property 1: for every
    /// `Update` where neither status nor metadata differ, no call happens).
    /// Errors are pre-classified into `HandlerError` exactly as the handler
    /// runtime's resource-updater step requires (spec §4.1 step 3).
    pub async fn update(&mut self) -> Result<bool, HandlerError> {
        let Some(current) = self.current.clone() else {
            return Ok(false);
        };
        let Some(changed) = self.changed.clone() else {
            return Ok(false);
        };

        let mut did_call = false;

        if current.status() != changed.status() {
            did_call = true;
            self.submit_status_update(&changed).await?;
        }

        let patch_ops = self.build_metadata_patch(&current, &changed);
        if patch_ops.is_empty() {
            return Ok(did_call);
        }

        did_call = true;
        self.submit_metadata_patch(&current, patch_ops).await?;
        Ok(did_call)
    }

    async fn submit_status_update(&mut self, desired: &T) -> Result<(), HandlerError> {
        // Snapshot the metadata fields the server's status-subresource
        // response is known to sometimes strip, so we can restore them
        // afterward (spec §4.2 step 1).
        let pre_finalizers = desired.finalizers().to_vec();
        let pre_labels = desired.labels().clone();
        let pre_annotations = desired.annotations().clone();

        let body = serde_json::json!({ "status": desired.status() });
        let pp = PatchParams::default();
        let result = self
            .api
            .patch_status(&self.name, &pp, &Patch::Merge(&body))
            .await
            .map_err(|e| {
                tracing::warn!(name = %self.name, payload = %body, error = %e, "status update failed");
                HandlerError::classify_updater_error(e, false)
            })?;

        let mut restored = result;
        let finalizers_slot = &mut restored.meta_mut().finalizers;
        if pre_finalizers.is_empty() {
            *finalizers_slot = None;
        } else {
            *finalizers_slot = Some(pre_finalizers);
        }
        restored.meta_mut().labels = pre_labels;
        restored.meta_mut().annotations = pre_annotations;

        self.changed = Some(restored);
        Ok(())
    }

    fn build_metadata_patch(&self, current: &T, changed: &T) -> Vec<PatchOp> {
        let mut ops: Vec<PatchOp> = diff_finalizers(
            current.finalizers(),
            changed.finalizers(),
            "/metadata/finalizers",
        )
        .into_iter()
        .collect();

        ops.extend(diff_map(
            "/metadata/annotations",
            current.meta().annotations.as_ref(),
            changed.meta().annotations.as_ref(),
        ));
        ops.extend(diff_map(
            "/metadata/labels",
            current.meta().labels.as_ref(),
            changed.meta().labels.as_ref(),
        ));
        ops
    }

    async fn submit_metadata_patch(
        &mut self,
        current: &T,
        ops: Vec<PatchOp>,
    ) -> Result<(), HandlerError> {
        let value = serde_json::to_value(&ops).expect("patch ops always serialize");
        let json_patch: json_patch::Patch = serde_json::from_value(value.clone())
            .expect("our PatchOp shape matches RFC 6902 JSON");
        let pp = PatchParams::default();
        let is_deleting_with_no_finalizers =
            current.meta().deletion_timestamp.is_some() && current.finalizers().is_empty();

        match self.api.patch(&self.name, &pp, &Patch::Json(json_patch)).await {
            Ok(obj) => {
                self.changed = Some(obj);
                Ok(())
            }
            Err(e) if is_deleting_with_no_finalizers && is_not_found(&e) => {
                // The object was deleted out from under us while we had no
                // finalizers left to hold it; there is nothing left to patch
                // (spec §4.2 step 3).
                Ok(())
            }
            Err(e) => {
                tracing::warn!(name = %self.name, payload = %value, error = %e, "metadata patch failed");
                Err(HandlerError::classify_updater_error(
                    e,
                    is_deleting_with_no_finalizers,
                ))
            }
        }
    }
}

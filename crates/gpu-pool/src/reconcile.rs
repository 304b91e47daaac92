//! Per-pool reconciler tying the selector, mutator, node marker, and
//! capacity publication together (spec §4.6, §4.7).
//!
//! Unlike the single-object reconcilers in `gpu-prepare`/`gpu-catalog`, one
//! pool reconcile touches many objects — the pool itself, every mutated
//! device, and every affected node — so it isn't expressed as a
//! `gpu_runtime::Chain`; it's async orchestration code that uses
//! `ResourceWrapper` once per object instead.

use std::collections::{BTreeSet, HashSet};

use k8s_openapi::api::core::v1::Node;
use kube::api::{Patch, PatchParams};
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use gpu_api::{GpuDevice, PoolCapacity, PoolLike, PoolReference, PoolStatus};
use gpu_catalog::DeviceCatalog;
use gpu_runtime::{HandlerError, HasStatus, ReconcileResult, ResourceWrapper};

use crate::mutator::{plan_assignment_mutations, plan_release_mutations, DeviceMutation, PoolRefChange};
use crate::node_marker::{nodes_hosting, plan_for_node, taint_for};
use crate::selector::{is_candidate, matches_device_selector, select_and_cap};

/// Summary of one pool reconcile, for logging/tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolReconcileOutcome {
    pub accepted_devices: usize,
    pub capacity_total: u32,
    pub capacity_used: u32,
    pub device_patches: usize,
    pub node_patches: usize,
}

/// Reconciles one pool object: selects candidate devices, applies
/// assignment/release mutations, marks affected nodes, and publishes
/// capacity onto the pool's own status.
///
/// `other_label_key` maps a pool name to the *other* pool kind's node label
/// key, used to strip a stale taint left by a pool-kind switch (spec §4.7).
pub async fn reconcile_pool<P>(
    pool: &mut ResourceWrapper<P>,
    catalog: &DeviceCatalog,
    device_api: &Api<GpuDevice>,
    node_api: &Api<Node>,
    other_label_key: impl Fn(&str) -> Option<String>,
) -> Result<(ReconcileResult, PoolReconcileOutcome), HandlerError>
where
    P: PoolLike
        + Resource<DynamicType = ()>
        + ResourceExt
        + HasStatus<Status = PoolStatus>
        + Clone
        + Serialize
        + DeserializeOwned
        + std::fmt::Debug
        + Send
        + Sync
        + 'static,
{
    let Some(current) = pool.current().cloned() else {
        return Ok((ReconcileResult::ZERO, PoolReconcileOutcome::default()));
    };

    let body = current.body().clone();
    let assignment_key = current.assignment_annotation_key();
    let label_prefix = current.label_prefix();
    let pool_name = current.pool_name().to_string();
    let pool_namespace = current.pool_namespace().map(str::to_string);

    let preselected: Vec<&GpuDevice> = catalog
        .iter()
        .filter(|d| is_candidate(d, assignment_key, &pool_name, pool_namespace.as_deref()))
        .filter(|d| matches_device_selector(d, &body.device_selector))
        .collect();

    let mut node_label_cache: std::collections::HashMap<String, std::collections::BTreeMap<String, String>> =
        std::collections::HashMap::new();
    for node_name in preselected.iter().map(|d| d.spec.node_name.clone()).collect::<BTreeSet<_>>() {
        if let Some(node) = node_api
            .get_opt(&node_name)
            .await
            .map_err(HandlerError::classify_handler_error)?
        {
            node_label_cache.insert(node_name, node.metadata.labels.clone().unwrap_or_default());
        }
    }

    let candidates: Vec<&GpuDevice> = preselected
        .into_iter()
        .filter(|d| {
            node_label_cache
                .get(&d.spec.node_name)
                .map(|labels| crate::selector::matches_node_selector(labels, &body.node_selector))
                .unwrap_or(false)
        })
        .collect();

    let (accepted, capacity_total) = select_and_cap(candidates, &body);
    let accepted_names: HashSet<&str> = accepted.iter().map(|d| d.inventory_id()).collect();

    let pool_ref = PoolReference {
        name: pool_name.clone(),
        namespace: pool_namespace.clone(),
    };
    let referencing = catalog.list_by_pool_reference(&pool_ref);

    let mut mutations = plan_assignment_mutations(&accepted, &pool_name, pool_namespace.as_deref());
    mutations.extend(plan_release_mutations(
        &referencing,
        &accepted_names,
        assignment_key,
        &pool_name,
    ));

    let mut device_results = Vec::with_capacity(mutations.len());
    for mutation in &mutations {
        device_results.push(apply_device_mutation(device_api, mutation).await?);
    }

    let hosting = nodes_hosting(&accepted);
    let mut candidate_nodes: BTreeSet<String> = hosting.clone();
    for d in &referencing {
        candidate_nodes.insert(d.spec.node_name.clone());
    }

    let label_key = gpu_api::node_label_key(label_prefix, &pool_name);
    let mut node_patches = 0usize;
    for node_name in &candidate_nodes {
        let node = match node_api.get_opt(node_name).await.map_err(HandlerError::classify_handler_error)? {
            Some(n) => n,
            None => continue,
        };
        let node_labels = node.metadata.labels.clone().unwrap_or_default();
        let node_taints = node.spec.as_ref().and_then(|s| s.taints.clone()).unwrap_or_default();
        let plan = plan_for_node(
            node_name,
            &node_labels,
            &node_taints,
            hosting.contains(node_name),
            &label_key,
            &pool_name,
            body.scheduling.taints_enabled,
            other_label_key(&pool_name).as_deref(),
        );
        if apply_node_plan(node_api, node_name, &node_taints, &plan, &label_key, &pool_name).await? {
            node_patches += 1;
        }
    }

    let used = accepted
        .iter()
        .filter(|d| {
            d.status
                .as_ref()
                .map(|s| matches!(s.state, gpu_api::DeviceState::Assigned | gpu_api::DeviceState::Reserved | gpu_api::DeviceState::InUse))
                .unwrap_or(false)
        })
        .map(|d| crate::selector::units_per_device(d, &body))
        .sum();

    if let Some(changed) = pool.changed() {
        changed.set_status(Some(PoolStatus {
            capacity: PoolCapacity {
                total: capacity_total,
                used,
            },
            conditions: changed.status().clone().map(|s| s.conditions).unwrap_or_default(),
        }));
    }
    pool.update().await?;

    let outcome = PoolReconcileOutcome {
        accepted_devices: accepted.len(),
        capacity_total,
        capacity_used: used,
        device_patches: device_results.iter().filter(|r| **r).count(),
        node_patches,
    };

    Ok((ReconcileResult::ZERO, outcome))
}

async fn apply_device_mutation(
    device_api: &Api<GpuDevice>,
    mutation: &DeviceMutation,
) -> Result<bool, HandlerError> {
    let mut wrapper = ResourceWrapper::new(device_api.clone(), mutation.device_name.clone());
    wrapper.fetch().await.map_err(HandlerError::classify_handler_error)?;
    if wrapper.is_empty() {
        return Ok(false);
    }
    if let Some(changed) = wrapper.changed() {
        let mut status = changed.status.clone().unwrap_or_default();
        match &mutation.pool_ref {
            PoolRefChange::Set(r) => status.pool_ref = Some(r.clone()),
            PoolRefChange::Clear => status.pool_ref = None,
        }
        if let Some(new_state) = mutation.new_state {
            status.state = new_state;
        }
        changed.status = Some(status);
    }
    wrapper.update().await
}

async fn apply_node_plan(
    node_api: &Api<Node>,
    node_name: &str,
    current_taints: &[k8s_openapi::api::core::v1::Taint],
    plan: &crate::node_marker::NodeMarkerPlan,
    label_key: &str,
    pool_name: &str,
) -> Result<bool, HandlerError> {
    if plan.label_additions.is_empty() && plan.label_removals.is_empty() && !plan.add_taint && !plan.remove_taint {
        return Ok(false);
    }

    let mut labels_patch = serde_json::Map::new();
    for key in &plan.label_additions {
        labels_patch.insert(key.clone(), serde_json::Value::String(pool_name.to_string()));
    }
    for key in &plan.label_removals {
        labels_patch.insert(key.clone(), serde_json::Value::Null);
    }

    let mut body = serde_json::json!({ "metadata": { "labels": labels_patch } });

    if plan.add_taint || plan.remove_taint {
        let mut taints: Vec<_> = current_taints
            .iter()
            .filter(|t| t.key != label_key)
            .cloned()
            .collect();
        if plan.add_taint {
            taints.push(taint_for(label_key, pool_name));
        }
        body["spec"] = serde_json::json!({ "taints": taints });
    }

    let pp = PatchParams::default();
    node_api
        .patch(node_name, &pp, &Patch::Merge(&body))
        .await
        .map_err(HandlerError::classify_handler_error)?;
    Ok(true)
}

//! Node label/taint marking (spec §4.7): every node hosting at least one
//! device owned by a pool gets a per-pool label; when the pool enables
//! scheduling taints, those nodes also get a `NoSchedule` taint under the
//! same key. Both are removed once a node stops hosting owned devices.

use std::collections::{BTreeMap, BTreeSet};

use gpu_api::node::{has_no_schedule_taint, no_schedule_taint};
use gpu_api::{node_label_key, GpuDevice};
use k8s_openapi::api::core::v1::Taint;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeMarkerPlan {
    pub label_additions: BTreeSet<String>,
    pub label_removals: BTreeSet<String>,
    pub add_taint: bool,
    pub remove_taint: bool,
}

impl NodeMarkerPlan {
    fn is_noop(&self) -> bool {
        self.label_additions.is_empty() && self.label_removals.is_empty() && !self.add_taint && !self.remove_taint
    }
}

/// Nodes that currently host at least one pool-owned device, derived from
/// the accepted device set (spec §4.7 "nodes hosting owned devices").
pub fn nodes_hosting(accepted: &[&GpuDevice]) -> BTreeSet<String> {
    accepted.iter().map(|d| d.spec.node_name.clone()).collect()
}

/// Computes the label/taint mutation for one node, given every node
/// currently labeled for this pool (from a prior label listing) and whether
/// `node_name` is still hosting an owned device.
///
/// `other_prefix` is the *other* pool kind's label prefix (namespaced vs
/// cluster): taints are removed under both prefixes for a departing node,
/// since a node may carry a stale taint from a pool kind switch (spec §4.7
/// "also remove taints under the alternate prefix").
pub fn plan_for_node(
    node_name: &str,
    node_labels: &BTreeMap<String, String>,
    node_taints: &[Taint],
    currently_hosting: bool,
    label_key: &str,
    pool_name: &str,
    taints_enabled: bool,
    other_label_key: Option<&str>,
) -> NodeMarkerPlan {
    let _ = node_name;
    let mut plan = NodeMarkerPlan::default();
    let has_label = node_labels.get(label_key).is_some_and(|v| v == pool_name);

    if currently_hosting {
        if !has_label {
            plan.label_additions.insert(label_key.to_string());
        }
        let has_taint = has_no_schedule_taint(node_taints, label_key);
        if taints_enabled && !has_taint {
            plan.add_taint = true;
        } else if !taints_enabled && has_taint {
            plan.remove_taint = true;
        }
    } else {
        if has_label {
            plan.label_removals.insert(label_key.to_string());
        }
        if has_no_schedule_taint(node_taints, label_key) {
            plan.remove_taint = true;
        }
    }

    if !currently_hosting {
        if let Some(other_key) = other_label_key {
            if has_no_schedule_taint(node_taints, other_key) {
                plan.remove_taint = true;
            }
        }
    }

    plan
}

/// Builds the label to apply (`<prefix>/<pool>` => pool name) and the taint
/// to add, for callers applying an accepted plan via a `Patch`.
pub fn label_entry(label_key_prefix: &str, pool_name: &str) -> (String, String) {
    (node_label_key(label_key_prefix, pool_name), pool_name.to_string())
}

pub fn taint_for(label_key: &str, pool_name: &str) -> Taint {
    no_schedule_taint(label_key, pool_name)
}

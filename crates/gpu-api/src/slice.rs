//! Resource slice / inventory snapshot shapes used when publishing pool
//! capacity to DRA-aware schedulers (spec §3).
//!
//! These are plain data types, not CRDs — they are assembled by
//! `gpu-featuregate`/`gpu-pool` and handed to the external DRA publishing
//! client (out of scope: the client itself is a sketched collaborator).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named, typed attribute attached to a published device entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Bool(bool),
}

/// A group of slice counters a device can consume from (spec §3, MIG
/// placement accounting).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CounterSet {
    pub name: String,
    /// counter name -> total capacity.
    pub counters: BTreeMap<String, u64>,
}

/// Which slice indices on a device a published offer occupies.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeviceCounterConsumption {
    pub counter_set: String,
    pub counter: String,
    pub amount: u64,
}

/// One publishable device entry within a resource slice.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SliceDevice {
    pub name: String,
    pub attributes: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    pub consumes_counters: Vec<DeviceCounterConsumption>,
}

/// A full resource slice snapshot for one pool on one node.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResourceSlice {
    pub pool_name: String,
    pub node_name: String,
    pub counter_sets: Vec<CounterSet>,
    pub devices: Vec<SliceDevice>,
}

//! S6: the external API server drops the `partitionable` field for a pool's
//! scope; the tracker disables partitioning and the slice builder responds
//! by publishing only whole-card offers, dropping MIG-only devices and
//! counter sets entirely, with events emitted exactly once per affected
//! device (spec §8 scenarios, spec §4.10).

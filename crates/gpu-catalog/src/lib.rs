//! Device catalog (spec §4.3): an in-memory index over `GpuDevice` records
//! keyed by node and `(node, PCI address)`, plus the `HasStatus` adapter that
//! lets `gpu_runtime::ResourceWrapper` patch a device's status/metadata.

mod catalog;
mod status;

pub use catalog::DeviceCatalog;

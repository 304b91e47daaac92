//! Generic handler-chain executor and typed resource wrapper shared by every
//! reconciler in the GPU control plane (spec §4.1, §4.2).
//!
//! This crate knows nothing about GPUs, pools, or devices — it only knows
//! how to run an ordered list of handlers against an opaque context, merge
//! their requeue signals, and patch a Kubernetes object with the minimal
//! diff implied by a caller's in-place edits. `gpu-catalog`, `gpu-pool`,
//! `gpu-bootstrap` and friends build their domain reconcilers on top of it.

pub mod chain;
pub mod error;
pub mod handler;
pub mod patch;
pub mod resource;
pub mod result;

pub use chain::Chain;
pub use error::HandlerError;
pub use handler::{Handler, ResourceUpdater};
pub use patch::{diff_finalizers, diff_map, escape_pointer_token, PatchOp};
pub use resource::{HasStatus, ResourceWrapper};
pub use result::{merge, merge_all, ReconcileResult};

//! GPU control plane: synchronous admission decision function for device
//! assignment annotations (spec §4.9). No HTTP serving — that listener is
//! an out-of-scope collaborator (spec §1); this crate is the pure decision
//! function a webhook handler calls into.

pub mod validate;

pub use validate::{validate_device, LookupOutcome, PoolIndex, PoolSnapshot, ValidationError};

//! Error type shared by every module in this crate. Leaf data-model crates
//! rarely fail, but selector construction and condition math do have
//! rejectable inputs (spec §7 "Fatal configuration error").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("ambiguous pool name {name:?}: matched {count} namespaces")]
    AmbiguousPoolName { name: String, count: usize },
}

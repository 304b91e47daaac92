//! Hardware adapter error kinds (spec §4.4, §7 "Adapter hardware error").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("vendor library unavailable: {0}")]
    LibraryUnavailable(String),

    #[error("MIG mode activation is pending on this device")]
    MigActivationPending,

    #[error("GPU instance profile {0} not found")]
    ProfileNotFound(i32),

    #[error("no compute-instance profile for slice count {0}")]
    UnsupportedSliceCount(u32),

    #[error("not found")]
    NotFound,

    #[error("sysfs I/O error on {path}: {source}")]
    Sysfs {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("device is bound to unexpected driver {0:?}")]
    UnexpectedDriver(String),

    #[error("MPS control daemon error: {0}")]
    MpsControl(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HwError {
    /// `true` for the "not found" shape adapters treat as an idempotent
    /// success on teardown paths (spec §4.4.1 Unprepare steps 2-4).
    pub fn is_not_found(&self) -> bool {
        matches!(self, HwError::NotFound)
    }
}

//! Error kinds for every fallible operation in the sysroot manager.
//!
//! One enum, one variant per kind named in the design's error handling
//! section. Callers at the CLI boundary wrap this in `anyhow::Error` for
//! context chaining; internal code always returns `Result<T, SysrootError>`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SysrootError {
    #[error("unsupported architecture: {0}")]
    UnsupportedArch(String),

    #[error("unknown architecture: {0}")]
    UnknownArch(String),

    #[error("no static emulator found on $PATH for architecture {0}")]
    MissingEmulator(String),

    #[error("system root already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("system root not found: {0}")]
    NotFound(String),

    #[error("malformed sysroot store at {0}: {1}")]
    MalformedStore(PathBuf, String),

    #[error("malformed sysroot configuration at {0}: {1}")]
    MalformedConfig(PathBuf, String),

    #[error("sysroot configuration missing at {0}")]
    MissingConfig(PathBuf),

    #[error("root privileges are required for this operation")]
    PermissionDenied,

    #[error("kernel binfmt_misc facility is unavailable at {0}")]
    KernelBinFmtUnavailable(PathBuf),

    #[error("activation failed while mounting {0}")]
    ActivationFailed(String),

    #[error("{0} is still mounted")]
    StillMounted(String),

    #[error("sysroot is in use: current directory is inside {0}")]
    SysrootInUse(PathBuf),

    #[error("external tool '{0}' failed with exit code {1}")]
    ExternalToolFailed(String, i32),

    #[error("i/o failure at {0}: {1}")]
    IoFailure(PathBuf, String),

    #[error("no default system root has been configured")]
    NoDefault,
}

pub type Result<T> = std::result::Result<T, SysrootError>;

impl SysrootError {
    /// Wraps a `std::io::Error` with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        SysrootError::IoFailure(path.into(), err.to_string())
    }
}

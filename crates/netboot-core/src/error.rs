//! Error taxonomy for the netboot build.
//!
//! Nothing is retried: every variant ends the build, and the binary maps it
//! to a process exit code with [`NetbootError::exit_code`].

use std::path::PathBuf;

use toolchain_probe::ProbeError;

#[derive(Debug, thiserror::Error)]
pub enum NetbootError {
    #[error(transparent)]
    Toolchain(#[from] ProbeError),

    #[error("{message} (`{command}`)")]
    RepositoryOperationFailed { message: String, command: String },

    #[error("Failed to apply patch {}: {reason}", patch.display())]
    PatchApplyFailed { patch: PathBuf, reason: String },

    #[error("Build BaseTools failed, please check required build environment and utilities !")]
    BaseToolsBuildFailed,

    #[error("Failed to download NetBoot.efi: {0}")]
    DownloadFailed(String),

    #[error("Error in running process:\n  {command}")]
    BuildProcessFailed { command: String, code: Option<i32> },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetbootError {
    /// Process exit code for this failure: -1 for toolchain verification, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            NetbootError::Toolchain(_) => -1,
            _ => 1,
        }
    }
}

impl From<reqwest::Error> for NetbootError {
    fn from(err: reqwest::Error) -> Self {
        NetbootError::DownloadFailed(err.to_string())
    }
}

/// Result type for netboot operations.
pub type Result<T> = std::result::Result<T, NetbootError>;

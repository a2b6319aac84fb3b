//! Error types for toolchain-probe

use thiserror::Error;

/// Errors that can occur while verifying or selecting host toolchains
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Preference string does not name a Visual Studio toolchain
    #[error("Invalid visual studio toolchain type '{0}'")]
    InvalidToolchainType(String),

    /// Preference names a Visual Studio release this build does not support
    #[error("Unsupported toolchain version '{0}'")]
    UnsupportedToolchainVersion(String),

    /// No installation of the toolchain family could be located
    #[error("No usable {0} toolchain found")]
    ToolchainNotFound(String),

    /// Toolchain located but older than the required minimum
    #[error("{toolchain} version '{version}' is below the required {minimum}")]
    ToolchainTooOld {
        toolchain: String,
        version: String,
        minimum: String,
    },

    /// The Visual Studio installation locator could not be run
    #[error("Visual Studio locator failed: {0}")]
    LocatorFailed(String),

    /// One or more required tools failed verification
    #[error("Toolchain verification failed: {}", failed.join(", "))]
    VerificationFailed { failed: Vec<String> },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

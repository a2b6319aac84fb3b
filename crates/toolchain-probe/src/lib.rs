//! Toolchain-Probe: host tool detection for the netboot payload build
//!
//! This crate answers one question before any firmware is built: does the
//! host carry every tool the EDK II build needs, at a recent enough version,
//! and which C toolchain should the build use?
//!
//! ## Key Components
//!
//! - [`Version`] / [`Verdict`]: dotted-version ordering and the PASS/RECOMMEND/FAIL verdict
//! - [`Probe`]: runs each tool with its version flag and checks it against [`REQUIREMENTS`]
//! - [`ToolchainDescriptor`]: the toolchain picked for the build (GCC5, CLANGPDB, XCODE5, VS20xx)
//! - [`BuildEnv`]: the environment handed to every child process
//! - [`CommandRunner`]: the seam through which every external program runs

mod env;
mod error;
pub mod exec;
pub mod fakes;
pub mod msvc;
mod platform;
pub mod probe;
pub mod selector;
pub mod version;

pub use env::BuildEnv;
pub use error::ProbeError;
pub use exec::{CommandRunner, Invocation, Outcome, OutputMode, SystemRunner};
pub use platform::Platform;
pub use probe::{verify_toolchains, Probe, ToolReport, VerificationReport, VersionFormat};
pub use selector::ToolchainDescriptor;
pub use version::{
    minimum_version, normalize_tool_name, ToolRequirement, Verdict, Version, REQUIREMENTS,
};

/// Result type for toolchain-probe operations
pub type Result<T> = std::result::Result<T, ProbeError>;

//! Netboot Core Library
//!
//! Builds the EDK II UEFI payload with the iPXE network-boot client enabled:
//! checks out EDK II at a pinned tag, applies the NetBoot patch, verifies the
//! host toolchain, prepares the EDK II environment and runs `build`.

pub mod config;
pub mod driver;
pub mod error;
pub mod fakes;
pub mod fetch;
pub mod prepare;
pub mod repo;
pub mod telemetry;

pub use config::NetbootConfig;
pub use driver::{BuildDriver, BuildOptions};
pub use error::{NetbootError, Result};
pub use fetch::{ArtifactFetcher, HttpFetcher};
pub use prepare::EnvironmentPreparer;
pub use repo::WorkingCopy;
pub use telemetry::init_tracing;

pub use toolchain_probe::{BuildEnv, CommandRunner, Platform, SystemRunner, ToolchainDescriptor};

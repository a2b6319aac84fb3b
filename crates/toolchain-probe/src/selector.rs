//! C toolchain selection
//!
//! Exactly one compiler suite is chosen per build:
//!
//! 1. a preference starting with `clang` selects CLANGPDB on any host,
//! 2. macOS uses XCODE5 as-is,
//! 3. other POSIX hosts use GCC5,
//! 4. Windows asks the Visual Studio detector ([`crate::msvc`]).

use crate::env::BuildEnv;
use crate::error::ProbeError;
use crate::msvc;
use crate::probe::{join_prefix, Probe, ToolReport, VersionFormat};
use crate::Result;
use serde::Serialize;
use tracing::info;

pub const GCC_TOOLCHAIN: &str = "GCC5";
pub const CLANG_TOOLCHAIN: &str = "CLANGPDB";
pub const XCODE_TOOLCHAIN: &str = "XCODE5";

const CLANG_WINDOWS_DIR: &str = r"C:\Program Files\LLVM\bin\";

/// The toolchain chosen for this build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainDescriptor {
    /// EDK II tag name passed as `--tagname` (`GCC5`, `VS2019`, ...)
    pub id: String,
    /// Variable naming the installation directory (`CLANG_BIN`, `VS2019_PREFIX`)
    pub prefix_var: Option<String>,
    pub install_path: Option<String>,
    pub version: String,
}

impl ToolchainDescriptor {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        ToolchainDescriptor {
            id: id.into(),
            prefix_var: None,
            install_path: None,
            version: version.into(),
        }
    }

    pub fn with_prefix(mut self, var: impl Into<String>, path: impl Into<String>) -> Self {
        self.prefix_var = Some(var.into());
        self.install_path = Some(path.into());
        self
    }

    /// Export `TOOL_CHAIN` and the prefix variable
    pub fn apply(&self, env: &mut BuildEnv) {
        env.set("TOOL_CHAIN", self.id.as_str());
        if let (Some(var), Some(path)) = (&self.prefix_var, &self.install_path) {
            env.set(var.as_str(), path.as_str());
        }
    }
}

impl Probe<'_> {
    /// Pick the toolchain for this host and preference.
    ///
    /// Fails when the chosen suite is missing or below its minimum version.
    pub fn select_toolchain(&self, preference: &str, env: &mut BuildEnv) -> Result<ToolchainDescriptor> {
        let normalized = preference.trim().to_ascii_lowercase();
        let platform = self.platform();

        if normalized.starts_with("clang") {
            self.clang(env)
        } else if platform == crate::Platform::Darwin {
            info!("Using platform toolchain {}", XCODE_TOOLCHAIN);
            Ok(ToolchainDescriptor::new(XCODE_TOOLCHAIN, ""))
        } else if platform.is_posix() {
            self.gcc(env)
        } else {
            msvc::detect(self, preference, env)
        }
    }

    fn gcc(&self, env: &BuildEnv) -> Result<ToolchainDescriptor> {
        let cmd = "gcc";
        let version = self
            .query_version(cmd, &["-dumpfullversion"], VersionFormat::Trimmed, env)
            .unwrap_or_default();
        let report = self.check_tool("gcc", cmd, &version, false, env);
        accept(&report, GCC_TOOLCHAIN)?;
        Ok(ToolchainDescriptor::new(GCC_TOOLCHAIN, version))
    }

    fn clang(&self, env: &mut BuildEnv) -> Result<ToolchainDescriptor> {
        let install_dir = if self.platform().is_windows() {
            // nmake still comes from Visual Studio when building with clang on Windows
            let vs = msvc::detect(self, "", env)?;
            let vs_path = vs.install_path.unwrap_or_default();
            env.set("CLANG_HOST_BIN", format!("{vs_path}bin\\Hostx64\\x64\\"));
            CLANG_WINDOWS_DIR.to_string()
        } else {
            String::new()
        };

        let cmd = join_prefix(&install_dir, "clang", self.platform());
        let version = self
            .query_version(&cmd, &["--version"], VersionFormat::VersionKeyword, env)
            .unwrap_or_default();
        let report = self.check_tool("clang", &cmd, &version, false, env);
        accept(&report, CLANG_TOOLCHAIN)?;

        Ok(ToolchainDescriptor::new(CLANG_TOOLCHAIN, version).with_prefix("CLANG_BIN", install_dir))
    }
}

/// Turn a failing compiler report into the matching error
pub(crate) fn accept(report: &ToolReport, toolchain: &str) -> Result<()> {
    if report.passed() {
        Ok(())
    } else if report.version.is_empty() {
        Err(ProbeError::ToolchainNotFound(toolchain.to_string()))
    } else {
        Err(ProbeError::ToolchainTooOld {
            toolchain: toolchain.to_string(),
            version: report.version.clone(),
            minimum: report.minimum.clone(),
        })
    }
}

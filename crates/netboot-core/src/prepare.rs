//! EDK II build environment preparation
//!
//! Verifies the host toolchain, exports the variables the EDK II `build`
//! front end expects, seeds `Conf/` from the BaseTools templates and makes
//! sure the native BaseTools binaries exist.

use std::path::{Path, PathBuf};

use toolchain_probe::exec::Invocation;
use toolchain_probe::probe::VerificationReport;
use toolchain_probe::{verify_toolchains, BuildEnv, CommandRunner, Platform};
use tracing::{debug, info, warn};

use crate::error::NetbootError;
use crate::Result;

/// Configuration files generated from `BaseTools/Conf/<name>.template`
pub const CONF_FILES: &[&str] = &["target", "tools_def", "build_rule"];

/// Native tools that must exist before `build` can run
pub const BASE_TOOLS: &[&str] = &[
    "GenFfs",
    "GenFv",
    "GenFw",
    "GenSec",
    "LzmaCompress",
    "TianoCompress",
    "VfrCompile",
];

const WINSDK_RC_EXE_DIR: &str = r"C:\Program Files (x86)\Windows Kits\8.1\bin\x86";

/// Prepares an EDK II workspace for building
pub struct EnvironmentPreparer<'a> {
    runner: &'a dyn CommandRunner,
    platform: Platform,
}

impl<'a> EnvironmentPreparer<'a> {
    pub fn new(runner: &'a dyn CommandRunner, platform: Platform) -> Self {
        EnvironmentPreparer { runner, platform }
    }

    /// Verify toolchains, then set up `root` for building.
    pub fn prepare(
        &self,
        root: &Path,
        preference: &str,
        env: &mut BuildEnv,
    ) -> Result<VerificationReport> {
        let report = verify_toolchains(self.runner, self.platform, preference, env)?;
        if let Ok(json) = serde_json::to_string(&report) {
            debug!("Toolchain report: {}", json);
        }

        self.export_paths(root, env);
        create_conf(root)?;
        self.build_base_tools(root, env)?;
        Ok(report)
    }

    /// Set WORKSPACE, tool search paths and the configuration directory.
    pub fn export_paths(&self, root: &Path, env: &mut BuildEnv) {
        let base_tools = root.join("BaseTools");

        env.set("WORKSPACE", root.display().to_string());
        if self.platform.is_windows() {
            env.append_path(&base_tools.join("Bin").join("Win32"), self.platform);
            env.append_path(
                &base_tools.join("BinWrappers").join("WindowsLike"),
                self.platform,
            );
            env.set(
                "PYTHONPATH",
                base_tools.join("Source").join("Python").display().to_string(),
            );
            env.set("WINSDK_PATH_FOR_RC_EXE", WINSDK_RC_EXE_DIR);
        } else {
            env.append_path(
                &base_tools.join("BinWrappers").join("PosixLike"),
                self.platform,
            );
        }

        env.set("EDK_TOOLS_PATH", base_tools.display().to_string());
        env.set("BASE_TOOLS_PATH", base_tools.display().to_string());
        env.set("CONF_PATH", root.join("Conf").display().to_string());
    }

    /// BaseTools binaries that are not present yet
    pub fn missing_base_tools(&self, root: &Path) -> Vec<PathBuf> {
        let bin_dir = if self.platform.is_windows() {
            root.join("BaseTools").join("Bin").join("Win32")
        } else {
            root.join("BaseTools").join("Source").join("C").join("bin")
        };
        BASE_TOOLS
            .iter()
            .map(|tool| bin_dir.join(self.platform.exe_name(tool)))
            .filter(|path| !path.exists())
            .collect()
    }

    /// Rebuild BaseTools when any binary is missing. Returns whether a rebuild ran.
    pub fn build_base_tools(&self, root: &Path, env: &BuildEnv) -> Result<bool> {
        let missing = self.missing_base_tools(root);
        if missing.is_empty() {
            return Ok(false);
        }
        debug!("Missing BaseTools binaries: {:?}", missing);

        let rebuild = if self.platform.is_windows() {
            info!("Could not find pre-built BaseTools binaries, try to rebuild BaseTools ...");
            let toolsetup = root.join("BaseTools").join("toolsetup.bat");
            Invocation::new(toolsetup.display().to_string()).arg("forcerebuild")
        } else {
            info!("Building BaseTools ...");
            Invocation::new("make").args(["-C", "BaseTools"])
        };
        let invocation = rebuild.current_dir(root);

        match self.runner.run(&invocation, env) {
            Ok(outcome) if outcome.success() => Ok(true),
            Ok(outcome) => {
                warn!("{} exited with {:?}", invocation.command_line(), outcome.code);
                Err(NetbootError::BaseToolsBuildFailed)
            }
            Err(e) => {
                warn!("{} could not be run: {}", invocation.command_line(), e);
                Err(NetbootError::BaseToolsBuildFailed)
            }
        }
    }
}

/// Copy the `Conf/` templates, never touching files that already exist.
///
/// Returns the files that were created.
pub fn create_conf(root: &Path) -> Result<Vec<PathBuf>> {
    let conf_dir = root.join("Conf");
    std::fs::create_dir_all(&conf_dir)?;

    let templates = root.join("BaseTools").join("Conf");
    let mut created = Vec::new();
    for name in CONF_FILES {
        let target = conf_dir.join(format!("{name}.txt"));
        if target.exists() {
            continue;
        }
        std::fs::copy(templates.join(format!("{name}.template")), &target)?;
        created.push(target);
    }
    Ok(created)
}

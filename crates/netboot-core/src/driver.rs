//! The `build` flow
//!
//! Source checkout and patching, environment preparation, iPXE download and
//! finally the EDK II `build` invocation, in that order. Each step either
//! completes or ends the build with a [`NetbootError`].

use std::num::NonZeroUsize;

use toolchain_probe::exec::Invocation;
use toolchain_probe::{BuildEnv, CommandRunner, Platform};
use tracing::{debug, info};

use crate::config::NetbootConfig;
use crate::error::NetbootError;
use crate::fetch::ArtifactFetcher;
use crate::prepare::EnvironmentPreparer;
use crate::repo::WorkingCopy;
use crate::Result;

/// Options accepted by the `build` command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Build RELEASE instead of DEBUG
    pub release: bool,
    /// Toolchain preference (`""`, `clang...`, `vs2019`, ...)
    pub toolchain: String,
}

impl BuildOptions {
    pub fn target(&self) -> &'static str {
        if self.release {
            "RELEASE"
        } else {
            "DEBUG"
        }
    }
}

/// Runs the full payload build
pub struct BuildDriver<'a> {
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn ArtifactFetcher,
    platform: Platform,
    jobs: usize,
}

impl<'a> BuildDriver<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn ArtifactFetcher,
        platform: Platform,
    ) -> Self {
        let jobs = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        BuildDriver {
            runner,
            fetcher,
            platform,
            jobs,
        }
    }

    /// Override the `-n` worker count passed to `build`
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Build the payload. Returns the `build` invocation that succeeded.
    pub async fn build(
        &self,
        config: &NetbootConfig,
        options: &BuildOptions,
        env: &mut BuildEnv,
    ) -> Result<Invocation> {
        self.sync_source(config, env)?;

        let workspace = config.workspace();
        let report = EnvironmentPreparer::new(self.runner, self.platform).prepare(
            workspace,
            &options.toolchain,
            env,
        )?;

        self.fetch_netboot(config).await?;

        let tool_chain = env
            .get_non_empty("TOOL_CHAIN")
            .unwrap_or(report.toolchain.id.as_str())
            .to_string();
        let invocation = self.build_invocation(config, options, &tool_chain);

        info!("Building UEFI payload ({}, {}) ...", options.target(), tool_chain);
        let outcome = self.runner.run(&invocation, env).map_err(|e| {
            debug!("{} could not be run: {}", invocation.command_line(), e);
            NetbootError::BuildProcessFailed {
                command: invocation.command_line(),
                code: None,
            }
        })?;
        if !outcome.success() {
            return Err(NetbootError::BuildProcessFailed {
                command: invocation.command_line(),
                code: outcome.code,
            });
        }

        info!("Done!");
        Ok(invocation)
    }

    /// Get the working copy to the pinned ref with exactly the NetBoot patch on top.
    pub fn sync_source(&self, config: &NetbootConfig, env: &BuildEnv) -> Result<()> {
        let working_copy = WorkingCopy::new(self.runner, env, &config.edk2_dir);
        if config.edk2_dir.exists() {
            // Regenerated by the patch; `git am` refuses to overwrite it.
            let inf = config.netboot_inf_path();
            if inf.exists() {
                debug!("Removing {}", inf.display());
                std::fs::remove_file(&inf)?;
            }
        } else {
            working_copy.ensure(&config.repo_url, &config.branch)?;
        }
        working_copy.apply_patch(&config.patch_file, &config.branch)
    }

    /// Download the iPXE binary unless it is already in place.
    ///
    /// Returns whether a download happened.
    pub async fn fetch_netboot(&self, config: &NetbootConfig) -> Result<bool> {
        let dest = config.netboot_efi_path();
        if let Some(dir) = dest.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        if dest.exists() {
            debug!("{} already present", dest.display());
            return Ok(false);
        }
        self.fetcher.fetch(&config.netboot_url, &dest).await?;
        Ok(true)
    }

    /// The EDK II `build` command line for this configuration
    pub fn build_invocation(
        &self,
        config: &NetbootConfig,
        options: &BuildOptions,
        tool_chain: &str,
    ) -> Invocation {
        let program = if self.platform.is_windows() {
            "build.bat"
        } else {
            "build"
        };
        Invocation::new(program)
            .args(["--platform", config.platform_dsc.as_str()])
            .args(["-b", options.target()])
            .args(["--arch", config.arch.as_str()])
            .args(["--tagname", tool_chain])
            .args(["-n".to_string(), self.jobs.to_string()])
            .current_dir(config.workspace())
    }
}

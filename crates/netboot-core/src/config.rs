//! Build configuration
//!
//! Everything the build pins (EDK II repository and tag, patch, iPXE binary
//! source) lives here so the driver never hard-codes a location.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use toolchain_probe::BuildEnv;

pub const DEFAULT_REPO_URL: &str = "http://github.com/tianocore/edk2.git";
pub const DEFAULT_BRANCH: &str = "edk2-stable202102";
pub const DEFAULT_NETBOOT_URL: &str = "https://boot.netboot.xyz/ipxe/netboot.xyz.efi";

const EDK2_DIR: &str = "Edk2";
const PATCH_FILE: &str = "Patch/0001-Enable-iPXE-in-UEFI-Payload.patch";

/// Configuration for one payload build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetbootConfig {
    /// Directory the build was started from
    pub root: PathBuf,
    /// EDK II working copy
    pub edk2_dir: PathBuf,
    pub repo_url: String,
    /// Branch or tag checked out before patching
    pub branch: String,
    pub patch_file: PathBuf,
    pub netboot_url: String,
    /// Prebuilt iPXE binary, relative to the working copy
    pub netboot_efi: PathBuf,
    /// File generated by the patch, relative to the working copy
    pub netboot_inf: PathBuf,
    /// Platform description passed to `build --platform`
    pub platform_dsc: String,
    pub arch: String,
}

impl NetbootConfig {
    /// Default configuration rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        NetbootConfig {
            edk2_dir: root.join(EDK2_DIR),
            patch_file: root.join(PATCH_FILE),
            root,
            repo_url: DEFAULT_REPO_URL.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            netboot_url: DEFAULT_NETBOOT_URL.to_string(),
            netboot_efi: ["UefiPayloadPkg", "NetBoot", "X64", "NetBoot.efi"].iter().collect(),
            netboot_inf: ["UefiPayloadPkg", "NetBoot", "NetBoot.inf"].iter().collect(),
            platform_dsc: "UefiPayloadPkg/UefiPayloadPkg.dsc".to_string(),
            arch: "X64".to_string(),
        }
    }

    /// Defaults, overridden by `EDK2_REPO_URL`, `EDK2_BRANCH` and `NETBOOT_EFI_URL`
    pub fn from_env(root: impl Into<PathBuf>, env: &BuildEnv) -> Self {
        let mut config = Self::new(root);
        if let Some(url) = env.get_non_empty("EDK2_REPO_URL") {
            config.repo_url = url.to_string();
        }
        if let Some(branch) = env.get_non_empty("EDK2_BRANCH") {
            config.branch = branch.to_string();
        }
        if let Some(url) = env.get_non_empty("NETBOOT_EFI_URL") {
            config.netboot_url = url.to_string();
        }
        config
    }

    pub fn netboot_efi_path(&self) -> PathBuf {
        self.edk2_dir.join(&self.netboot_efi)
    }

    pub fn netboot_inf_path(&self) -> PathBuf {
        self.edk2_dir.join(&self.netboot_inf)
    }

    pub fn workspace(&self) -> &Path {
        &self.edk2_dir
    }
}

use serde::Serialize;
use std::fmt;

/// Host operating-system family, as far as the EDK II build cares.
///
/// Passed explicitly instead of read from `cfg!` at each decision so every
/// branch can be exercised on any host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Linux and other POSIX hosts
    Posix,
    /// macOS
    Darwin,
    Windows,
}

impl Platform {
    /// The platform this binary was compiled for
    pub fn host() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::Darwin
        } else {
            Platform::Posix
        }
    }

    pub fn is_windows(self) -> bool {
        self == Platform::Windows
    }

    /// Darwin counts as POSIX for paths and BaseTools builds
    pub fn is_posix(self) -> bool {
        !self.is_windows()
    }

    /// Separator between entries of `PATH`
    pub fn path_list_separator(self) -> char {
        if self.is_windows() {
            ';'
        } else {
            ':'
        }
    }

    /// Executable file name for `base` on this platform
    pub fn exe_name(self, base: &str) -> String {
        if self.is_windows() {
            format!("{base}.exe")
        } else {
            base.to_string()
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Posix => write!(f, "posix"),
            Platform::Darwin => write!(f, "darwin"),
            Platform::Windows => write!(f, "windows"),
        }
    }
}

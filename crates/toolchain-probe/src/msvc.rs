//! Visual Studio detection (Windows)
//!
//! Current releases are found through `vswhere.exe`; legacy releases only
//! advertise themselves through the `VS1x0COMNTOOLS` variables.

use crate::env::BuildEnv;
use crate::error::ProbeError;
use crate::exec::Invocation;
use crate::probe::Probe;
use crate::selector::{accept, ToolchainDescriptor};
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Releases located through vswhere, newest first
pub const CURRENT_YEARS: &[&str] = &["2019", "2017"];
/// Releases located through their COMNTOOLS variable
pub const LEGACY_YEARS: &[&str] = &["2015", "2013"];

const VSWHERE: &str = "Microsoft Visual Studio/Installer/vswhere.exe";
const VC_TOOLS_VERSION_FILE: &str = "VC/Auxiliary/Build/Microsoft.VCToolsVersion.default.txt";
const VS_NODE: &str = "Microsoft Visual Studio";

/// Years to search, split into (current, legacy)
pub fn search_years(preference: &str) -> Result<(Vec<&'static str>, Vec<&'static str>)> {
    let preference = preference.trim().to_ascii_lowercase();
    if preference.is_empty() {
        return Ok((CURRENT_YEARS.to_vec(), LEGACY_YEARS.to_vec()));
    }

    let Some(year) = preference.strip_prefix("vs") else {
        return Err(ProbeError::InvalidToolchainType(preference));
    };

    if let Some(y) = CURRENT_YEARS.iter().find(|y| **y == year) {
        Ok((vec![*y], Vec::new()))
    } else if let Some(y) = LEGACY_YEARS.iter().find(|y| **y == year) {
        Ok((Vec::new(), vec![*y]))
    } else {
        Err(ProbeError::UnsupportedToolchainVersion(preference))
    }
}

/// Year of a Visual Studio installation, from the path component following
/// `Microsoft Visual Studio` (`...\Microsoft Visual Studio\2019\Community`).
pub fn install_year(install: &str) -> Option<&str> {
    let mut parts = install.split(['\\', '/']);
    parts.find(|p| *p == VS_NODE)?;
    parts.next().filter(|y| !y.is_empty())
}

/// Version embedded in a legacy COMNTOOLS path (`Microsoft Visual Studio 14.0`)
fn legacy_version(comntools: &str) -> Option<&str> {
    comntools
        .split('\\')
        .find_map(|part| part.strip_prefix("Microsoft Visual Studio "))
}

/// Installation paths reported by vswhere, when it is installed
fn installations(probe: &Probe<'_>, env: &BuildEnv) -> Result<Vec<String>> {
    let Some(program_files) = env.get_non_empty("ProgramFiles(x86)") else {
        return Ok(Vec::new());
    };
    let vswhere = Path::new(program_files).join(VSWHERE);
    if !vswhere.exists() {
        debug!("vswhere not found at {}", vswhere.display());
        return Ok(Vec::new());
    }

    let invocation = Invocation::new(vswhere.display().to_string())
        .args(["-all", "-property", "installationPath"])
        .capture();
    let outcome = probe
        .runner()
        .run(&invocation, env)
        .map_err(|e| ProbeError::LocatorFailed(e.to_string()))?;
    if !outcome.success() {
        return Err(ProbeError::LocatorFailed(format!(
            "{} exited with {:?}",
            invocation.command_line(),
            outcome.code
        )));
    }

    Ok(outcome
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && Path::new(line).is_dir())
        .map(str::to_string)
        .collect())
}

fn from_installations(years: &[&str], installs: &[String]) -> Result<Option<(String, ToolchainDescriptor)>> {
    for year in years {
        for install in installs {
            let version_file = PathBuf::from(install).join(VC_TOOLS_VERSION_FILE);
            if !version_file.exists() || install_year(install) != Some(*year) {
                continue;
            }
            let version = std::fs::read_to_string(&version_file)?.trim().to_string();
            let install_path = format!(
                "{}\\VC\\Tools\\MSVC\\{}\\",
                install.trim_end_matches(['\\', '/']),
                version
            );
            let descriptor = ToolchainDescriptor::new(format!("VS{year}"), version)
                .with_prefix(format!("VS{year}_PREFIX"), install_path);
            return Ok(Some((year.to_string(), descriptor)));
        }
    }
    Ok(None)
}

fn from_comntools(years: &[&str], env: &BuildEnv) -> Option<(String, ToolchainDescriptor)> {
    years.iter().find_map(|year| {
        let var = match *year {
            "2015" => "VS140COMNTOOLS",
            "2013" => "VS120COMNTOOLS",
            _ => return None,
        };
        let comntools = env.get_non_empty(var)?;
        let version = legacy_version(comntools).unwrap_or(*year);
        let install_path = format!("{}\\..\\..\\", comntools.trim_end_matches('\\'));
        let descriptor = ToolchainDescriptor::new(format!("VS{year}x86"), version)
            .with_prefix(format!("VS{year}_PREFIX"), install_path);
        Some((year.to_string(), descriptor))
    })
}

/// Find a Visual Studio installation matching `preference` (`""`, `vs2019`, ...).
///
/// The detected release year is checked against the `vs` minimum.
pub fn detect(probe: &Probe<'_>, preference: &str, env: &BuildEnv) -> Result<ToolchainDescriptor> {
    let (current, legacy) = search_years(preference)?;

    let mut found = None;
    if !current.is_empty() {
        let installs = installations(probe, env)?;
        found = from_installations(&current, &installs)?;
    }
    if found.is_none() {
        found = from_comntools(&legacy, env);
    }

    let year = found.as_ref().map(|(y, _)| y.as_str()).unwrap_or_default();
    let report = probe.check_tool("vs", "vs", year, false, env);
    accept(&report, "Visual Studio")?;
    found
        .map(|(_, descriptor)| descriptor)
        .ok_or_else(|| ProbeError::ToolchainNotFound("Visual Studio".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{touch, ScriptedRunner};
    use crate::Platform;

    #[test]
    fn test_search_years_default() {
        let (current, legacy) = search_years("").unwrap();
        assert_eq!(current, vec!["2019", "2017"]);
        assert_eq!(legacy, vec!["2015", "2013"]);
    }

    #[test]
    fn test_search_years_explicit() {
        let none: Vec<&str> = Vec::new();
        assert_eq!(search_years("VS2017").unwrap(), (vec!["2017"], none.clone()));
        assert_eq!(search_years("vs2015").unwrap(), (none, vec!["2015"]));
    }

    #[test]
    fn test_search_years_rejects_bad_preferences() {
        assert!(matches!(
            search_years("gcc9"),
            Err(ProbeError::InvalidToolchainType(_))
        ));
        assert!(matches!(
            search_years("vs2022"),
            Err(ProbeError::UnsupportedToolchainVersion(_))
        ));
    }

    #[test]
    fn test_install_year() {
        assert_eq!(
            install_year(r"C:\Program Files (x86)\Microsoft Visual Studio\2019\Community"),
            Some("2019")
        );
        assert_eq!(install_year("/tmp/x/Microsoft Visual Studio/2017/BuildTools"), Some("2017"));
        assert_eq!(install_year(r"C:\Tools\VS"), None);
    }

    #[test]
    fn test_legacy_version() {
        assert_eq!(
            legacy_version(r"C:\Program Files (x86)\Microsoft Visual Studio 14.0\Common7\Tools\"),
            Some("14.0")
        );
    }

    #[test]
    fn test_detect_via_vswhere() {
        let program_files = tempfile::tempdir().unwrap();
        touch(&program_files.path().join(VSWHERE));

        let install = program_files
            .path()
            .join("Microsoft Visual Studio")
            .join("2019")
            .join("Community");
        touch(&install.join(VC_TOOLS_VERSION_FILE));
        std::fs::write(install.join(VC_TOOLS_VERSION_FILE), "14.29.30133\n").unwrap();

        let runner = ScriptedRunner::new().prints(
            "vswhere -all -property installationPath",
            &format!("{}\n", install.display()),
        );
        let probe = Probe::new(&runner, Platform::Windows);
        let env: BuildEnv = [("ProgramFiles(x86)", program_files.path().display().to_string())]
            .into_iter()
            .collect();

        let tc = detect(&probe, "", &env).unwrap();
        assert_eq!(tc.id, "VS2019");
        assert_eq!(tc.version, "14.29.30133");
        assert_eq!(tc.prefix_var.as_deref(), Some("VS2019_PREFIX"));
        assert!(tc
            .install_path
            .unwrap()
            .ends_with("\\VC\\Tools\\MSVC\\14.29.30133\\"));
    }

    #[test]
    fn test_detect_legacy_from_comntools() {
        let runner = ScriptedRunner::new();
        let probe = Probe::new(&runner, Platform::Windows);
        let env: BuildEnv = [(
            "VS140COMNTOOLS",
            r"C:\Program Files (x86)\Microsoft Visual Studio 14.0\Common7\Tools\",
        )]
        .into_iter()
        .collect();

        let tc = detect(&probe, "vs2015", &env).unwrap();
        assert_eq!(tc.id, "VS2015x86");
        assert_eq!(tc.version, "14.0");
        assert_eq!(
            tc.install_path.as_deref(),
            Some(r"C:\Program Files (x86)\Microsoft Visual Studio 14.0\Common7\Tools\..\..\")
        );
    }

    #[test]
    fn test_vs2013_is_below_minimum() {
        let runner = ScriptedRunner::new();
        let probe = Probe::new(&runner, Platform::Windows);
        let env: BuildEnv = [(
            "VS120COMNTOOLS",
            r"C:\Program Files (x86)\Microsoft Visual Studio 12.0\Common7\Tools\",
        )]
        .into_iter()
        .collect();

        let err = detect(&probe, "vs2013", &env).unwrap_err();
        assert!(matches!(err, ProbeError::ToolchainTooOld { .. }));
    }

    #[test]
    fn test_nothing_installed() {
        let runner = ScriptedRunner::new();
        let probe = Probe::new(&runner, Platform::Windows);
        let err = detect(&probe, "", &BuildEnv::new()).unwrap_err();
        assert!(matches!(err, ProbeError::ToolchainNotFound(_)));
    }
}

//! Required tool checks
//!
//! Five tools are checked on every build: python, openssl, nasm, iasl and
//! git. Each is located, run with its version flag, and compared against
//! [`crate::REQUIREMENTS`]. A missing tool is reported and checking moves on;
//! the verdicts are combined at the end by [`verify_toolchains`].

use crate::env::BuildEnv;
use crate::error::ProbeError;
use crate::exec::{CommandRunner, Invocation};
use crate::platform::Platform;
use crate::selector::ToolchainDescriptor;
use crate::version::{minimum_version, Verdict};
use crate::Result;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// How a tool reports its version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionFormat {
    /// First dotted-numeric run after the word `version` (nasm, iasl, git, clang)
    VersionKeyword,
    /// Last whitespace-delimited token (`Python 3.8.10`)
    LastToken,
    /// Second whitespace-delimited token (`OpenSSL 1.1.1k  25 Mar 2021`)
    SecondToken,
    /// The whole trimmed output (`gcc -dumpfullversion`)
    Trimmed,
}

fn version_keyword() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"version\s*([\d.]+)").ok())
        .as_ref()
}

impl VersionFormat {
    pub fn extract(self, output: &str) -> Option<String> {
        let output = output.trim();
        let token = match self {
            VersionFormat::VersionKeyword => version_keyword()?
                .captures(output)?
                .get(1)
                .map(|m| m.as_str()),
            VersionFormat::LastToken => output.split_whitespace().last(),
            VersionFormat::SecondToken => output.split_whitespace().nth(1),
            VersionFormat::Trimmed => Some(output),
        };
        token.filter(|t| !t.is_empty()).map(str::to_string)
    }
}

/// Result of checking one tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolReport {
    /// Normalized tool name (`python`, `nasm`, ...)
    pub tool: String,
    /// Command as shown to the user (PATH-resolved where possible)
    pub command: String,
    /// Detected version, empty when the tool could not be queried
    pub version: String,
    pub minimum: String,
    pub verdict: Verdict,
}

impl ToolReport {
    pub fn passed(&self) -> bool {
        self.verdict.is_acceptable()
    }
}

/// Outcome of a successful [`verify_toolchains`] run
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub tools: Vec<ToolReport>,
    pub toolchain: ToolchainDescriptor,
}

/// Checks host tools through a [`CommandRunner`]
pub struct Probe<'a> {
    runner: &'a dyn CommandRunner,
    platform: Platform,
}

impl<'a> Probe<'a> {
    pub fn new(runner: &'a dyn CommandRunner, platform: Platform) -> Self {
        Probe { runner, platform }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn runner(&self) -> &'a dyn CommandRunner {
        self.runner
    }

    /// Run `cmd args...` and pull a version out of its stdout
    pub fn query_version(
        &self,
        cmd: &str,
        args: &[&str],
        format: VersionFormat,
        env: &BuildEnv,
    ) -> Option<String> {
        let invocation = Invocation::new(cmd).args(args.iter().copied());
        self.runner
            .capture_stdout(&invocation, env)
            .and_then(|out| format.extract(&out))
    }

    /// Compare `version` against the minimum for the `tool` requirement and
    /// print the verdict line for `cmd`
    pub fn check_tool(
        &self,
        tool: &str,
        cmd: &str,
        version: &str,
        optional: bool,
        env: &BuildEnv,
    ) -> ToolReport {
        let minimum = minimum_version(tool);
        let verdict = match minimum {
            Some(minimum) => Verdict::evaluate(version, minimum, optional),
            None => {
                warn!("No minimum version is defined for {}", tool);
                Verdict::Fail
            }
        };
        let minimum = minimum.unwrap_or("?").to_string();
        let command = self.display_command(cmd, env);

        info!(
            "- {}: Version {} (>= {}) [{}]",
            command, version, minimum, verdict
        );

        ToolReport {
            tool: tool.to_string(),
            command,
            version: version.to_string(),
            minimum,
            verdict,
        }
    }

    /// Locate `name` on the `PATH` carried by `env`
    pub fn locate(&self, name: &str, env: &BuildEnv) -> Option<String> {
        let path = env.get_non_empty("PATH")?;
        which::which_in(name, Some(path), ".")
            .ok()
            .map(|p| p.display().to_string())
    }

    fn display_command(&self, cmd: &str, env: &BuildEnv) -> String {
        if self.platform.is_posix() && !cmd.contains(['/', '\\']) {
            if let Some(found) = self.locate(cmd, env) {
                return found;
            }
        }
        cmd.to_string()
    }

    pub fn check_python(&self, env: &mut BuildEnv) -> ToolReport {
        let cmd = match env.get_non_empty("PYTHON_COMMAND") {
            Some(cmd) => cmd.to_string(),
            None => {
                let name = if self.platform.is_windows() {
                    "python"
                } else {
                    "python3"
                };
                self.locate(name, env).unwrap_or_else(|| name.to_string())
            }
        };
        env.set("PYTHON_COMMAND", cmd.as_str());

        let version = self
            .query_version(&cmd, &["--version"], VersionFormat::LastToken, env)
            .unwrap_or_else(|| {
                warn!("ERROR: Python not available. Please set PYTHON_COMMAND.");
                String::new()
            });
        self.check_tool("python", &cmd, &version, false, env)
    }

    pub fn check_openssl(&self, env: &mut BuildEnv) -> ToolReport {
        let cmd = self.openssl_command(env);
        let version = self
            .query_version(&cmd, &["version"], VersionFormat::SecondToken, env)
            .unwrap_or_else(|| {
                warn!("ERROR: OpenSSL not available. Please set OPENSSL_PATH.");
                String::new()
            });
        self.check_tool("openssl", &cmd, &version, false, env)
    }

    /// Resolve the openssl executable, filling in Windows defaults for
    /// `OPENSSL_PATH` and `OPENSSL_CONF` when they are unset.
    pub fn openssl_command(&self, env: &mut BuildEnv) -> String {
        let exe = self.platform.exe_name("openssl");

        if self.platform.is_windows() && !env.contains("OPENSSL_PATH") {
            let bin_dir = r"C:\Openssl\bin\";
            if Path::new(bin_dir).exists() {
                env.set("OPENSSL_PATH", bin_dir);
            } else {
                env.set("OPENSSL_PATH", r"C:\Openssl\");
                let cfg = r"C:\Openssl\openssl.cfg";
                if !env.contains("OPENSSL_CONF") && Path::new(cfg).exists() {
                    env.set("OPENSSL_CONF", cfg);
                }
            }
        }

        match env.get_non_empty("OPENSSL_PATH") {
            Some(dir) => join_prefix(dir, &exe, self.platform),
            None => self.locate("openssl", env).unwrap_or(exe),
        }
    }

    pub fn check_nasm(&self, env: &mut BuildEnv) -> ToolReport {
        self.check_prefixed(env, "nasm", "NASM_PREFIX", r"C:\Nasm\", "NASM")
    }

    pub fn check_iasl(&self, env: &mut BuildEnv) -> ToolReport {
        self.check_prefixed(env, "iasl", "IASL_PREFIX", r"C:\ASL\", "iasl")
    }

    fn check_prefixed(
        &self,
        env: &mut BuildEnv,
        name: &str,
        prefix_var: &str,
        windows_default: &str,
        label: &str,
    ) -> ToolReport {
        if self.platform.is_windows() && !env.contains(prefix_var) {
            env.set(prefix_var, windows_default);
        }
        let prefix = env.get(prefix_var).unwrap_or_default().to_string();
        let cmd = join_prefix(&prefix, name, self.platform);

        let version = self
            .query_version(&cmd, &["-v"], VersionFormat::VersionKeyword, env)
            .unwrap_or_else(|| {
                warn!("ERROR: {} not available. Please set {}.", label, prefix_var);
                String::new()
            });
        self.check_tool(name, &cmd, &version, false, env)
    }

    /// git is optional: an old or missing git is a recommendation, not a failure
    pub fn check_git(&self, env: &BuildEnv) -> ToolReport {
        let version = self
            .query_version("git", &["--version"], VersionFormat::VersionKeyword, env)
            .unwrap_or_else(|| {
                warn!(
                    "ERROR: Git not found. Please install Git or check if Git is in the PATH environment variable."
                );
                String::new()
            });
        self.check_tool("git", "git", &version, true, env)
    }
}

/// Join an installation prefix and an executable name the way the prefix
/// variables expect: an empty prefix means "look it up on PATH".
pub(crate) fn join_prefix(prefix: &str, leaf: &str, platform: Platform) -> String {
    if prefix.is_empty() {
        leaf.to_string()
    } else if prefix.ends_with(['/', '\\']) {
        format!("{prefix}{leaf}")
    } else if platform.is_windows() {
        format!("{prefix}\\{leaf}")
    } else {
        format!("{prefix}/{leaf}")
    }
}

/// Check every required tool and select the C toolchain.
///
/// All checks run even after a failure so the user sees the complete
/// picture. On success the selected toolchain has been written into `env`
/// (`TOOL_CHAIN` and its prefix variable).
pub fn verify_toolchains(
    runner: &dyn CommandRunner,
    platform: Platform,
    preference: &str,
    env: &mut BuildEnv,
) -> Result<VerificationReport> {
    info!("Checking Toolchain Versions...");

    let probe = Probe::new(runner, platform);
    let tools = vec![
        probe.check_python(env),
        probe.check_openssl(env),
        probe.check_nasm(env),
        probe.check_iasl(env),
        probe.check_git(env),
    ];
    let selection = probe.select_toolchain(preference, env);

    let mut failed: Vec<String> = tools
        .iter()
        .filter(|t| !t.passed())
        .map(|t| t.tool.clone())
        .collect();

    match selection {
        Ok(toolchain) if failed.is_empty() => {
            toolchain.apply(env);
            info!("...Done!");
            Ok(VerificationReport { tools, toolchain })
        }
        Ok(_) => {
            error!("...Failed! Please check toolchain versions!");
            Err(ProbeError::VerificationFailed { failed })
        }
        Err(e) => {
            warn!("{}", e);
            failed.push("toolchain".to_string());
            error!("...Failed! Please check toolchain versions!");
            Err(ProbeError::VerificationFailed { failed })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Outcome;
    use crate::fakes::ScriptedRunner;

    #[test]
    fn test_extract_version_keyword() {
        let nasm = "NASM version 2.15.05 compiled on Sep 24 2020";
        assert_eq!(
            VersionFormat::VersionKeyword.extract(nasm).as_deref(),
            Some("2.15.05")
        );
        let iasl = "\nIntel ACPI Component Architecture\nASL+ Optimizing Compiler/Disassembler version 20200925\n";
        assert_eq!(
            VersionFormat::VersionKeyword.extract(iasl).as_deref(),
            Some("20200925")
        );
        assert_eq!(VersionFormat::VersionKeyword.extract("no digits here"), None);
    }

    #[test]
    fn test_extract_tokens() {
        assert_eq!(
            VersionFormat::LastToken.extract("Python 3.8.10\n").as_deref(),
            Some("3.8.10")
        );
        assert_eq!(
            VersionFormat::SecondToken
                .extract("OpenSSL 1.1.1k  25 Mar 2021")
                .as_deref(),
            Some("1.1.1k")
        );
        assert_eq!(VersionFormat::SecondToken.extract("OpenSSL"), None);
        assert_eq!(VersionFormat::Trimmed.extract("  9.4.0\n").as_deref(), Some("9.4.0"));
        assert_eq!(VersionFormat::Trimmed.extract("   "), None);
    }

    #[test]
    fn test_join_prefix() {
        assert_eq!(join_prefix("", "nasm", Platform::Posix), "nasm");
        assert_eq!(join_prefix("/opt/nasm", "nasm", Platform::Posix), "/opt/nasm/nasm");
        assert_eq!(join_prefix("/opt/nasm/", "nasm", Platform::Posix), "/opt/nasm/nasm");
        assert_eq!(join_prefix(r"C:\Nasm\", "nasm", Platform::Windows), r"C:\Nasm\nasm");
        assert_eq!(join_prefix(r"C:\ASL", "iasl", Platform::Windows), r"C:\ASL\iasl");
    }

    #[test]
    fn test_nasm_prefix_is_honoured() {
        let runner = ScriptedRunner::new().prints("nasm -v", "NASM version 2.15.05");
        let probe = Probe::new(&runner, Platform::Posix);
        let mut env: BuildEnv = [("NASM_PREFIX", "/opt/nasm")].into_iter().collect();

        let report = probe.check_nasm(&mut env);
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(runner.calls()[0].invocation.program, "/opt/nasm/nasm");
    }

    #[test]
    fn test_windows_defaults_fill_prefix_variables() {
        let runner = ScriptedRunner::new();
        let probe = Probe::new(&runner, Platform::Windows);
        let mut env = BuildEnv::new();

        let report = probe.check_iasl(&mut env);
        assert_eq!(env.get("IASL_PREFIX"), Some(r"C:\ASL\"));
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(runner.calls()[0].invocation.program, r"C:\ASL\iasl");
    }

    #[test]
    fn test_openssl_path_variable() {
        let runner = ScriptedRunner::new().prints("openssl version", "OpenSSL 1.1.1k  25 Mar 2021");
        let probe = Probe::new(&runner, Platform::Posix);
        let mut env: BuildEnv = [("OPENSSL_PATH", "/opt/ssl/bin")].into_iter().collect();

        let report = probe.check_openssl(&mut env);
        assert_eq!(report.version, "1.1.1k");
        assert!(report.passed());
        assert_eq!(runner.calls()[0].invocation.program, "/opt/ssl/bin/openssl");
    }

    #[test]
    fn test_python_command_is_exported() {
        let runner = ScriptedRunner::new().prints("python3 --version", "Python 3.9.2");
        let probe = Probe::new(&runner, Platform::Posix);
        let mut env = BuildEnv::new();

        let report = probe.check_python(&mut env);
        assert_eq!(env.get("PYTHON_COMMAND"), Some("python3"));
        assert_eq!(report.tool, "python");
        assert_eq!(report.version, "3.9.2");
        assert!(report.passed());
    }

    #[test]
    fn test_python_command_with_unrelated_name() {
        let runner = ScriptedRunner::new().prints("py --version", "Python 3.11.2");
        let probe = Probe::new(&runner, Platform::Posix);
        let mut env: BuildEnv = [("PYTHON_COMMAND", "/usr/bin/py")].into_iter().collect();

        let report = probe.check_python(&mut env);
        assert_eq!(report.tool, "python");
        assert_eq!(report.command, "/usr/bin/py");
        assert_eq!(report.minimum, "3.6.0");
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(runner.calls()[0].invocation.program, "/usr/bin/py");
    }

    #[test]
    fn test_git_missing_is_recommend() {
        let runner = ScriptedRunner::new();
        let probe = Probe::new(&runner, Platform::Posix);
        let report = probe.check_git(&BuildEnv::new());
        assert_eq!(report.verdict, Verdict::Recommend);
        assert!(report.passed());
    }

    #[test]
    fn test_non_zero_exit_counts_as_missing() {
        let runner = ScriptedRunner::new().on(
            "nasm -v",
            Outcome::exited(2).with_stdout("NASM version 2.15.05"),
        );
        let probe = Probe::new(&runner, Platform::Posix);
        let report = probe.check_nasm(&mut BuildEnv::new());
        assert_eq!(report.version, "");
        assert_eq!(report.verdict, Verdict::Fail);
    }
}

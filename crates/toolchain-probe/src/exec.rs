//! External process execution
//!
//! Every program this build touches (git, compilers, `make`, `build`) runs
//! through a [`CommandRunner`]. [`SystemRunner`] spawns real processes; tests
//! substitute [`crate::fakes::ScriptedRunner`].

use crate::env::BuildEnv;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// What happens to a child's standard output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Stream to the console
    #[default]
    Inherit,
    /// Collect stdout into [`Outcome::stdout`]; stderr is dropped
    Capture,
    /// Send stdout and stderr to the null device
    Discard,
}

/// A single external program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub output: OutputMode,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            output: OutputMode::Inherit,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn capture(mut self) -> Self {
        self.output = OutputMode::Capture;
        self
    }

    pub fn discard_output(mut self) -> Self {
        self.output = OutputMode::Discard;
        self
    }

    /// Space-joined command line, for logs and diagnostics
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a finished invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Exit code; `None` when the process was terminated by a signal
    pub code: Option<i32>,
    /// Captured stdout (empty unless [`OutputMode::Capture`])
    pub stdout: String,
}

impl Outcome {
    /// Successful exit with no output
    pub fn ok() -> Self {
        Self::exited(0)
    }

    pub fn exited(code: i32) -> Self {
        Outcome {
            code: Some(code),
            stdout: String::new(),
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external programs.
///
/// An `Err` means the program could not be started at all; a program that
/// started and exited non-zero is an `Ok` with a failing [`Outcome`].
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation, env: &BuildEnv) -> std::io::Result<Outcome>;

    /// Run and return trimmed stdout, or `None` if the program is missing or exits non-zero
    fn capture_stdout(&self, invocation: &Invocation, env: &BuildEnv) -> Option<String> {
        let invocation = invocation.clone().capture();
        match self.run(&invocation, env) {
            Ok(outcome) if outcome.success() => Some(outcome.stdout.trim().to_string()),
            Ok(outcome) => {
                debug!(
                    "{} exited with {:?}",
                    invocation.command_line(),
                    outcome.code
                );
                None
            }
            Err(e) => {
                debug!("{} could not be run: {}", invocation.command_line(), e);
                None
            }
        }
    }
}

/// Spawns real processes with the [`BuildEnv`] layered over the inherited environment
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    // A bare `build` on Windows should pick up `build.exe` when it exists.
    fn resolve_program(program: &str) -> String {
        if cfg!(windows) {
            let path = Path::new(program);
            let exe = format!("{program}.exe");
            if path.extension().is_none() && Path::new(&exe).exists() {
                return exe;
            }
        }
        program.to_string()
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation, env: &BuildEnv) -> std::io::Result<Outcome> {
        debug!("Running: {}", invocation.command_line());

        let mut cmd = Command::new(Self::resolve_program(&invocation.program));
        cmd.args(&invocation.args).envs(env.iter());
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        match invocation.output {
            OutputMode::Inherit => {
                let status = cmd.status()?;
                Ok(Outcome {
                    code: status.code(),
                    stdout: String::new(),
                })
            }
            OutputMode::Capture => {
                let output = cmd.stdin(Stdio::null()).stderr(Stdio::null()).output()?;
                Ok(Outcome {
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                })
            }
            OutputMode::Discard => {
                let status = cmd
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()?;
                Ok(Outcome {
                    code: status.code(),
                    stdout: String::new(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let inv = Invocation::new("git")
            .args(["checkout", "edk2-stable202102"])
            .arg("-f");
        assert_eq!(inv.command_line(), "git checkout edk2-stable202102 -f");
        assert_eq!(inv.output, OutputMode::Inherit);
    }

    #[test]
    fn test_outcome_success() {
        assert!(Outcome::ok().success());
        assert!(!Outcome::exited(1).success());
        assert!(!Outcome::default().success());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_stdout() {
        let runner = SystemRunner;
        let inv = Invocation::new("echo").arg("hello").capture();
        let outcome = runner.run(&inv, &BuildEnv::from_process()).unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_passes_build_env() {
        let runner = SystemRunner;
        let mut env = BuildEnv::from_process();
        env.set("TOOL_CHAIN", "GCC5");
        let inv = Invocation::new("sh").args(["-c", "echo $TOOL_CHAIN"]);
        assert_eq!(runner.capture_stdout(&inv, &env).as_deref(), Some("GCC5"));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_reports_exit_code() {
        let runner = SystemRunner;
        let inv = Invocation::new("false").discard_output();
        let outcome = runner.run(&inv, &BuildEnv::from_process()).unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.code, Some(1));
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let runner = SystemRunner;
        let inv = Invocation::new("definitely-not-a-real-tool-7f3a").capture();
        assert!(runner.run(&inv, &BuildEnv::from_process()).is_err());
        assert_eq!(runner.capture_stdout(&inv, &BuildEnv::from_process()), None);
    }
}

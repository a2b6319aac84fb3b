//! EDK II working copy management
//!
//! Clones or updates the repository, pins it to a branch or tag and applies
//! the NetBoot patch. Every git call goes through a [`CommandRunner`] and
//! any non-zero exit is fatal.

use std::path::{Path, PathBuf};

use toolchain_probe::exec::Invocation;
use toolchain_probe::{BuildEnv, CommandRunner};
use tracing::{debug, info};

use crate::error::NetbootError;
use crate::Result;

/// A git working copy bound to one directory
pub struct WorkingCopy<'a> {
    runner: &'a dyn CommandRunner,
    env: &'a BuildEnv,
    dir: PathBuf,
}

impl<'a> WorkingCopy<'a> {
    pub fn new(runner: &'a dyn CommandRunner, env: &'a BuildEnv, dir: impl Into<PathBuf>) -> Self {
        WorkingCopy {
            runner,
            env,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_cloned(&self) -> bool {
        self.dir.join(".git").exists()
    }

    /// Clone (or fetch) `repo_url` and check out `reference` with submodules.
    pub fn ensure(&self, repo_url: &str, reference: &str) -> Result<()> {
        if self.is_cloned() {
            info!("Update the repo ...");
            self.git(["fetch", "origin"], "Failed to update repo")?;
        } else {
            info!("Cloning the repo ... {}", repo_url);
            let dir = self.dir.display().to_string();
            let invocation = Invocation::new("git").args(["clone", repo_url, dir.as_str()]);
            self.require(
                &invocation,
                format!("Failed to clone repo to directory {dir} !"),
            )?;
        }

        info!("Checking out specified version ... {}", reference);
        self.git(["checkout", reference, "-f"], "Failed to check out specified branch !")?;
        self.git(["submodule", "init"], "Failed to init submodules !")?;
        self.git(["submodule", "update"], "Failed to update submodules !")?;
        Ok(())
    }

    /// Reset to `reference` and apply `patch` as a single commit.
    pub fn apply_patch(&self, patch: &Path, reference: &str) -> Result<()> {
        info!("Applying patch {} ...", patch.display());
        if !patch.is_file() {
            return Err(NetbootError::PatchApplyFailed {
                patch: patch.to_path_buf(),
                reason: "patch file not found".to_string(),
            });
        }

        self.git(["checkout", reference, "-f"], "Failed to check out specified branch !")?;
        self.abort_pending_patch();

        let patch_arg = patch.display().to_string();
        let invocation = self
            .in_dir(Invocation::new("git"))
            .args(["am", "--keep-cr", "--whitespace=nowarn", patch_arg.as_str()]);
        let reason = match self.runner.run(&invocation, self.env) {
            Ok(outcome) if outcome.success() => return Ok(()),
            Ok(outcome) => format!("git am exited with {:?}", outcome.code),
            Err(e) => e.to_string(),
        };
        Err(NetbootError::PatchApplyFailed {
            patch: patch.to_path_buf(),
            reason,
        })
    }

    // Leftover state from an interrupted `git am` blocks the next one.
    // Failing here is the normal case when nothing is in progress.
    fn abort_pending_patch(&self) {
        let invocation = self
            .in_dir(Invocation::new("git"))
            .args(["am", "--abort"])
            .discard_output();
        if let Err(e) = self.runner.run(&invocation, self.env) {
            debug!("git am --abort could not be run: {}", e);
        }
    }

    fn in_dir(&self, invocation: Invocation) -> Invocation {
        invocation.current_dir(&self.dir)
    }

    fn git<const N: usize>(&self, args: [&str; N], message: &str) -> Result<()> {
        let invocation = self.in_dir(Invocation::new("git")).args(args);
        self.require(&invocation, message.to_string())
    }

    fn require(&self, invocation: &Invocation, message: String) -> Result<()> {
        let succeeded = match self.runner.run(invocation, self.env) {
            Ok(outcome) => outcome.success(),
            Err(e) => {
                debug!("{} could not be run: {}", invocation.command_line(), e);
                false
            }
        };
        if succeeded {
            Ok(())
        } else {
            Err(NetbootError::RepositoryOperationFailed {
                message,
                command: invocation.command_line(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use toolchain_probe::exec::Outcome;
    use toolchain_probe::fakes::{touch, ScriptedRunner};
    use toolchain_probe::SystemRunner;

    fn clone_creates_git_dir() -> ScriptedRunner {
        ScriptedRunner::new()
            .on("git", Outcome::ok())
            .on_with("git clone", Outcome::ok(), |inv| {
                std::fs::create_dir_all(Path::new(&inv.args[2]).join(".git")).unwrap();
            })
    }

    #[test]
    fn test_ensure_clones_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("Edk2");
        let runner = clone_creates_git_dir();
        let env = BuildEnv::new();

        WorkingCopy::new(&runner, &env, &dir)
            .ensure("http://example.com/edk2.git", "edk2-stable202102")
            .unwrap();

        let lines = runner.command_lines();
        assert_eq!(
            lines,
            vec![
                format!("git clone http://example.com/edk2.git {}", dir.display()),
                "git checkout edk2-stable202102 -f".to_string(),
                "git submodule init".to_string(),
                "git submodule update".to_string(),
            ]
        );
        let checkout = runner.last_call("git checkout").unwrap();
        assert_eq!(checkout.invocation.cwd.as_deref(), Some(dir.as_path()));
    }

    #[test]
    fn test_ensure_fetches_existing_checkout() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("Edk2");
        let runner = clone_creates_git_dir();
        let env = BuildEnv::new();
        let wc = WorkingCopy::new(&runner, &env, &dir);

        wc.ensure("http://example.com/edk2.git", "main").unwrap();
        wc.ensure("http://example.com/edk2.git", "main").unwrap();

        assert_eq!(runner.count("git clone"), 1);
        assert_eq!(runner.count("git fetch origin"), 1);
    }

    #[test]
    fn test_git_failure_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let runner = clone_creates_git_dir().on("git submodule update", Outcome::exited(128));
        let env = BuildEnv::new();

        let err = WorkingCopy::new(&runner, &env, root.path().join("Edk2"))
            .ensure("http://example.com/edk2.git", "main")
            .unwrap_err();
        match err {
            NetbootError::RepositoryOperationFailed { message, command } => {
                assert_eq!(message, "Failed to update submodules !");
                assert_eq!(command, "git submodule update");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_git_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let env = BuildEnv::new();

        let err = WorkingCopy::new(&runner, &env, root.path().join("Edk2"))
            .ensure("http://example.com/edk2.git", "main")
            .unwrap_err();
        assert!(matches!(err, NetbootError::RepositoryOperationFailed { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_apply_patch_sequence() {
        let root = tempfile::tempdir().unwrap();
        let patch = root.path().join("Patch").join("0001-test.patch");
        touch(&patch);
        // No `git am` in progress: --abort fails and is ignored
        let runner = ScriptedRunner::new()
            .on("git", Outcome::ok())
            .on("git am --abort", Outcome::exited(128));
        let env = BuildEnv::new();

        WorkingCopy::new(&runner, &env, root.path())
            .apply_patch(&patch, "edk2-stable202102")
            .unwrap();

        assert_eq!(
            runner.command_lines(),
            vec![
                "git checkout edk2-stable202102 -f".to_string(),
                "git am --abort".to_string(),
                format!("git am --keep-cr --whitespace=nowarn {}", patch.display()),
            ]
        );
        let abort = runner.last_call("git am --abort").unwrap();
        assert_eq!(
            abort.invocation.output,
            toolchain_probe::OutputMode::Discard
        );
    }

    #[test]
    fn test_apply_patch_failure() {
        let root = tempfile::tempdir().unwrap();
        let patch = root.path().join("broken.patch");
        touch(&patch);
        let runner = ScriptedRunner::new()
            .on("git", Outcome::ok())
            .on("git am --keep-cr", Outcome::exited(1));
        let env = BuildEnv::new();

        let err = WorkingCopy::new(&runner, &env, root.path())
            .apply_patch(&patch, "main")
            .unwrap_err();
        assert!(matches!(err, NetbootError::PatchApplyFailed { .. }));
    }

    #[test]
    fn test_apply_missing_patch_runs_nothing() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().on("git", Outcome::ok());
        let env = BuildEnv::new();

        let err = WorkingCopy::new(&runner, &env, root.path())
            .apply_patch(&root.path().join("missing.patch"), "main")
            .unwrap_err();
        assert!(err.to_string().contains("patch file not found"));
        assert!(runner.calls().is_empty());
    }

    fn run_git(dir: &Path, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    #[test]
    fn test_ensure_against_local_repository() {
        let upstream = tempfile::tempdir().unwrap();
        run_git(upstream.path(), &["init"]);
        run_git(upstream.path(), &["config", "user.name", "test-user"]);
        run_git(upstream.path(), &["config", "user.email", "test@example.com"]);
        run_git(upstream.path(), &["commit", "--allow-empty", "-m", "initial"]);
        run_git(upstream.path(), &["tag", "stable"]);

        let work = tempfile::tempdir().unwrap();
        let dir = work.path().join("Edk2");
        let env = BuildEnv::from_process();
        let url = upstream.path().display().to_string();
        let wc = WorkingCopy::new(&SystemRunner, &env, &dir);

        wc.ensure(&url, "stable").unwrap();
        assert!(wc.is_cloned());

        // Second run updates in place
        wc.ensure(&url, "stable").unwrap();

        let err = wc.ensure(&url, "no-such-tag").unwrap_err();
        assert!(err.to_string().contains("Failed to check out specified branch"));
    }
}

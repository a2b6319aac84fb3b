//! In-memory command runner (testing only)
//!
//! [`ScriptedRunner`] answers invocations from a table of command-line
//! prefixes and records every call together with the environment it saw.

use std::io;
use std::path::Path;
use std::sync::Mutex;

use crate::env::BuildEnv;
use crate::exec::{CommandRunner, Invocation, Outcome};

type Effect = Box<dyn Fn(&Invocation) + Send + Sync>;

struct Rule {
    pattern: String,
    outcome: Outcome,
    effect: Option<Effect>,
}

/// A call recorded by [`ScriptedRunner`]
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub invocation: Invocation,
    pub env: BuildEnv,
}

impl RecordedCall {
    /// Command line with the program reduced to its file name
    pub fn command_line(&self) -> String {
        normalized_command_line(&self.invocation)
    }
}

/// Runner that answers from scripted rules.
///
/// A rule matches when the invocation's command line, with the program
/// reduced to its file name and any `.exe` removed, starts with the rule's
/// pattern. The longest matching pattern wins. Unmatched invocations fail
/// with `NotFound`, like a missing executable.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer invocations starting with `pattern` with `outcome`
    pub fn on(mut self, pattern: &str, outcome: Outcome) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            outcome,
            effect: None,
        });
        self
    }

    /// Like [`ScriptedRunner::on`], also running `effect` (e.g. creating files a clone would)
    pub fn on_with<F>(mut self, pattern: &str, outcome: Outcome, effect: F) -> Self
    where
        F: Fn(&Invocation) + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            outcome,
            effect: Some(Box::new(effect)),
        });
        self
    }

    /// Answer `pattern` with a zero exit and the given stdout
    pub fn prints(self, pattern: &str, stdout: &str) -> Self {
        self.on(pattern, Outcome::ok().with_stdout(stdout))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(RecordedCall::command_line).collect()
    }

    /// The most recent call whose command line starts with `pattern`
    pub fn last_call(&self, pattern: &str) -> Option<RecordedCall> {
        self.calls()
            .into_iter()
            .rev()
            .find(|c| c.command_line().starts_with(pattern))
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.starts_with(pattern))
            .count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation, env: &BuildEnv) -> io::Result<Outcome> {
        self.calls.lock().unwrap().push(RecordedCall {
            invocation: invocation.clone(),
            env: env.clone(),
        });

        let line = normalized_command_line(invocation);
        let rule = self
            .rules
            .iter()
            .filter(|r| line.starts_with(&r.pattern))
            .max_by_key(|r| r.pattern.len());

        match rule {
            Some(rule) => {
                if let Some(effect) = &rule.effect {
                    effect(invocation);
                }
                Ok(rule.outcome.clone())
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no scripted response for `{line}`"),
            )),
        }
    }
}

fn normalized_command_line(invocation: &Invocation) -> String {
    let program = invocation
        .program
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(&invocation.program);
    let program = program.strip_suffix(".exe").unwrap_or(program);
    let mut normalized = invocation.clone();
    normalized.program = program.to_string();
    normalized.command_line()
}

/// Create an empty file, including missing parent directories
pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"").unwrap();
}

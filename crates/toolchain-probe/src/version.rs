//! Version ordering and the minimum-version table
//!
//! Versions are compared component by component. A component is a run of
//! digits (compared numerically) or a run of letters (compared as text), so
//! `1.1.1k` sorts above `1.1.0g` and `2.12.02` equals `2.12.2`.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Minimum version required for one tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolRequirement {
    pub name: &'static str,
    pub minimum: &'static str,
}

/// Minimum toolchain requirements, keyed by normalized tool name
pub const REQUIREMENTS: &[ToolRequirement] = &[
    ToolRequirement { name: "python", minimum: "3.6.0" },
    ToolRequirement { name: "nasm", minimum: "2.12.02" },
    ToolRequirement { name: "iasl", minimum: "20160422" },
    ToolRequirement { name: "openssl", minimum: "1.1.0g" },
    ToolRequirement { name: "git", minimum: "2.20.0" },
    ToolRequirement { name: "vs", minimum: "2015" },
    ToolRequirement { name: "gcc", minimum: "7.3" },
    ToolRequirement { name: "clang", minimum: "9.0.0" },
];

/// Reduce an executable path to its requirement key.
///
/// Takes the file name, cuts it at the first `.` and drops every digit, so
/// `/usr/bin/python3.8` and `C:\Nasm\nasm.exe` map to `python` and `nasm`.
pub fn normalize_tool_name(cmd: &str) -> String {
    let base = cmd.rsplit(['/', '\\']).next().unwrap_or(cmd);
    let stem = base.split('.').next().unwrap_or(base);
    stem.chars().filter(|c| !c.is_ascii_digit()).collect()
}

/// Look up the minimum version for a tool name or executable path
pub fn minimum_version(cmd: &str) -> Option<&'static str> {
    let name = normalize_tool_name(cmd);
    REQUIREMENTS
        .iter()
        .find(|req| req.name == name)
        .map(|req| req.minimum)
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Component {
    Number(u64),
    Text(String),
}

/// A parsed, comparable version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    components: Vec<Component>,
}

impl Version {
    /// Parse a reported version.
    ///
    /// Returns `None` for empty strings and for strings that do not start
    /// with a digit; those never satisfy a minimum.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if !raw.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }

        let mut components = Vec::new();
        let mut chars = raw.chars().peekable();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() {
                let mut run = String::new();
                while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    run.push(d);
                    chars.next();
                }
                // A run too long for u64 stays text, which orders above every number.
                components.push(match run.parse::<u64>() {
                    Ok(n) => Component::Number(n),
                    Err(_) => Component::Text(run),
                });
            } else if c.is_ascii_alphabetic() {
                let mut run = String::new();
                while let Some(&a) = chars.peek().filter(|a| a.is_ascii_alphabetic()) {
                    run.push(a);
                    chars.next();
                }
                components.push(Component::Text(run));
            } else {
                chars.next();
            }
        }

        Some(Version { components })
    }

    /// True iff `current` parses and is at least `minimum`
    pub fn meets_minimum(current: &str, minimum: &str) -> bool {
        match (Version::parse(current), Version::parse(minimum)) {
            (Some(current), Some(minimum)) => current >= minimum,
            _ => false,
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

/// Outcome of a single tool check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    /// Below the minimum, but the tool is optional
    Recommend,
    Fail,
}

impl Verdict {
    pub fn evaluate(current: &str, minimum: &str, optional: bool) -> Self {
        if Version::meets_minimum(current, minimum) {
            Verdict::Pass
        } else if optional {
            Verdict::Recommend
        } else {
            Verdict::Fail
        }
    }

    /// Whether this verdict lets verification continue
    pub fn is_acceptable(self) -> bool {
        !matches!(self, Verdict::Fail)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Recommend => write!(f, "RECOMMEND"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

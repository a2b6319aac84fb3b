//! Build environment state
//!
//! The EDK II build is driven almost entirely through environment variables
//! (WORKSPACE, TOOL_CHAIN, NASM_PREFIX, ...). Rather than mutating the
//! process environment, every step reads and writes a [`BuildEnv`] that is
//! seeded from the process once and then applied to each child process.

use crate::platform::Platform;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
    vars: BTreeMap<String, String>,
}

impl BuildEnv {
    /// An empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment (non-UTF-8 entries are skipped)
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        BuildEnv { vars }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.key_of(key)
            .and_then(|k| self.vars.get(k))
            .map(String::as_str)
    }

    /// Value of `key`, treating an empty value as unset
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.key_of(key).is_some()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let key = self.key_of(&key).map(str::to_string).unwrap_or(key);
        self.vars.insert(key, value.into());
    }

    /// Append `entry` to `PATH` using the platform separator
    pub fn append_path(&mut self, entry: &Path, platform: Platform) {
        let entry = entry.display().to_string();
        let value = match self.get_non_empty("PATH") {
            Some(existing) => format!("{existing}{}{entry}", platform.path_list_separator()),
            None => entry,
        };
        self.set("PATH", value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    // Windows variable names are case-insensitive (`Path` vs `PATH`).
    fn key_of(&self, key: &str) -> Option<&str> {
        if let Some((k, _)) = self.vars.get_key_value(key) {
            return Some(k.as_str());
        }
        if cfg!(windows) {
            return self
                .vars
                .keys()
                .find(|k| k.eq_ignore_ascii_case(key))
                .map(String::as_str);
        }
        None
    }
}

impl<K, V> FromIterator<(K, V)> for BuildEnv
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut env = BuildEnv::new();
        for (k, v) in iter {
            env.set(k, v);
        }
        env
    }
}

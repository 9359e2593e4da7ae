use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level configuration from `.capscan.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Where the derived policy is stored.
    #[serde(default = "default_policy_file")]
    pub file: PathBuf,
    /// Trace specific members of modules and globals.
    #[serde(default)]
    pub member_access_tracing: bool,
    /// Keep non-builtin module specifiers in the policy.
    #[serde(default)]
    pub include_external_modules: bool,
    /// Module names the enforcing runtime treats as builtin beyond the
    /// platform snapshot. Both sides must agree on the list.
    #[serde(default)]
    pub extra_builtin_modules: BTreeSet<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            file: default_policy_file(),
            member_access_tracing: false,
            include_external_modules: false,
            extra_builtin_modules: BTreeSet::new(),
        }
    }
}

fn default_policy_file() -> PathBuf {
    PathBuf::from("/tmp/node_policy.json")
}

impl Config {
    /// Load config from a TOML file. Returns defaults if the file doesn't
    /// exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_absent() {
        let config = Config::load(Path::new("tests/fixtures/no-such.toml")).unwrap();
        assert_eq!(config.policy.file, PathBuf::from("/tmp/node_policy.json"));
        assert!(!config.policy.member_access_tracing);
    }

    #[test]
    fn parses_policy_table() {
        let config: Config = toml::from_str(
            r#"
            [policy]
            file = "/var/lib/capscan/policy.json"
            member_access_tracing = true
            extra_builtin_modules = ["electron"]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.policy.file,
            PathBuf::from("/var/lib/capscan/policy.json")
        );
        assert!(config.policy.member_access_tracing);
        assert!(config.policy.extra_builtin_modules.contains("electron"));
    }
}

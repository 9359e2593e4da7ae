//! npm lockfile schemas.
//!
//! Version 1 carries a recursive tree under `dependencies`; versions 2 and
//! 3 carry a flat map under `packages` keyed by path relative to the root
//! (v2 files carry both for backward compatibility; the flat map wins).

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    #[serde(default)]
    pub lockfile_version: u64,
    /// v1 recursive tree.
    #[serde(default)]
    pub dependencies: BTreeMap<String, V1Entry>,
    /// v2/v3 flat map; the empty key denotes the root package.
    #[serde(default)]
    pub packages: BTreeMap<String, PackageEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V1Entry {
    #[serde(default)]
    pub optional: bool,
    /// name → version-range of the entry's own dependencies.
    #[serde(default)]
    pub requires: BTreeMap<String, String>,
    /// Nested installs under this entry's `node_modules`.
    #[serde(default)]
    pub dependencies: BTreeMap<String, V1Entry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageEntry {
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl Lockfile {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Canonical package name of a v2/v3 `packages` key: the substring after
/// the last `node_modules/` segment. The empty key is the root.
pub fn name_from_packages_key(key: &str) -> Option<&str> {
    if key.is_empty() {
        return None;
    }
    match key.rfind("node_modules/") {
        Some(pos) => Some(&key[pos + "node_modules/".len()..]),
        None => Some(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_v1_tree() {
        let lock = Lockfile::parse(
            r#"{
                "lockfileVersion": 1,
                "dependencies": {
                    "a": {
                        "requires": { "b": "^1.0.0" },
                        "dependencies": { "b": {} }
                    }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(lock.lockfile_version, 1);
        let a = &lock.dependencies["a"];
        assert!(a.requires.contains_key("b"));
        assert!(a.dependencies.contains_key("b"));
    }

    #[test]
    fn parses_v3_flat_map() {
        let lock = Lockfile::parse(
            r#"{
                "lockfileVersion": 3,
                "packages": {
                    "": { "dependencies": { "a": "^1.0.0" } },
                    "node_modules/a": { "optional": true }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(lock.lockfile_version, 3);
        assert!(lock.packages["node_modules/a"].optional);
    }

    #[test]
    fn names_from_keys() {
        assert_eq!(name_from_packages_key(""), None);
        assert_eq!(name_from_packages_key("node_modules/a"), Some("a"));
        assert_eq!(
            name_from_packages_key("node_modules/a/node_modules/@scope/b"),
            Some("@scope/b")
        );
    }
}

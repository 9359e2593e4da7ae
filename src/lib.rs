//! capscan — static capability policy generator for npm package trees.
//!
//! Analyzes a package and every installed dependency, recording which
//! builtin modules, module members, and ambient globals each package's
//! code can reach. The derived policy is consumed by a runtime that
//! refuses capabilities beyond those listed, so a malicious update to a
//! transitive dependency cannot silently acquire new powers without a
//! visible policy diff.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use capscan::{generate_policy, ScanOptions};
//!
//! let options = ScanOptions::default();
//! let policy = generate_policy(Path::new("./my-app"), &options).unwrap();
//! println!("{} package(s) analyzed", policy.policy_coarse.len());
//! ```

pub mod analysis;
pub mod builtins;
pub mod config;
pub mod deps;
pub mod error;
pub mod output;
pub mod parser;
pub mod policy;
pub mod scope;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use error::Result;
use policy::{CapabilitySet, Policy};

/// Options for a policy derivation run.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Record specific members of modules and globals.
    pub member_access_tracing: bool,
    /// Log the source location of every recorded capability (debug aid).
    pub include_locations: bool,
    /// Keep non-builtin module specifiers instead of filtering to the
    /// platform builtin set.
    pub include_external_modules: bool,
    /// Extra names treated as builtin, beyond the platform snapshot.
    pub extra_builtin_modules: BTreeSet<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            member_access_tracing: false,
            include_locations: false,
            include_external_modules: false,
            extra_builtin_modules: BTreeSet::new(),
        }
    }
}

/// Derive the capability policy for the package tree rooted at `root`.
///
/// The dependency mapper defines the analysis units; each package's source
/// files are parsed and traversed, per-package sets are unioned across
/// installed copies keyed by canonical package name, and the result is
/// filtered to the builtin-module set unless external modules were asked
/// for.
pub fn generate_policy(root: &Path, options: &ScanOptions) -> Result<Policy> {
    let map = deps::map_packages(root)?;

    let mut by_name: BTreeMap<String, CapabilitySet> = BTreeMap::new();
    for path in map.keys() {
        let caps = analyze_package(path, options)?;
        let name = if path == root {
            root_package_name(root)
        } else {
            deps::package_name_from_path(path)
        };
        by_name.entry(name).or_default().union_with(&caps);
    }

    if !options.include_external_modules {
        for caps in by_name.values_mut() {
            caps.retain_builtin_modules(&options.extra_builtin_modules);
        }
    }

    Ok(Policy::from_packages(&by_name, options.member_access_tracing))
}

/// Extract the unioned capability set of every source file in one package.
/// Files that fail to read or parse are reported and skipped.
pub fn analyze_package(path: &Path, options: &ScanOptions) -> Result<CapabilitySet> {
    let mut caps = CapabilitySet::new();

    for file in deps::enumerate_sources(path) {
        let source = match std::fs::read_to_string(&file) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "unreadable file skipped");
                continue;
            }
        };
        match analysis::extract_source(&source, &file, options.include_locations)? {
            Some(file_caps) => caps.union_with(&file_caps),
            None => {
                tracing::warn!(file = %file.display(), "parse failure; file skipped");
            }
        }
    }

    Ok(caps)
}

/// Root package identity: the manifest `name`, falling back to the
/// directory name.
fn root_package_name(root: &Path) -> String {
    std::fs::read_to_string(root.join("package.json"))
        .ok()
        .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
        .and_then(|manifest| manifest.get("name").and_then(|n| n.as_str()).map(String::from))
        .unwrap_or_else(|| deps::package_name_from_path(root))
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::path::Path;

    fn fine_options() -> ScanOptions {
        ScanOptions {
            member_access_tracing: true,
            ..Default::default()
        }
    }

    #[test]
    fn sample_app_policy() {
        let policy = generate_policy(Path::new("tests/fixtures/sample_app"), &fine_options())
            .unwrap();

        let root = &policy.policy_coarse["sample-app"];
        assert!(root.modules.contains("fs"));
        assert!(root.globals.contains("console"));
        // Non-builtin dependency specifiers are filtered by default.
        assert!(!root.modules.contains("left-pad"));

        let fine = &policy.policy_fine["sample-app"];
        assert!(fine.modules.contains("fs.readFileSync"));
        assert!(fine.globals.contains("console.log"));
    }

    #[test]
    fn duplicate_installs_union_under_one_name() {
        let policy = generate_policy(Path::new("tests/fixtures/sample_app"), &fine_options())
            .unwrap();

        // Two installed copies of left-pad use path and os respectively.
        let left_pad = &policy.policy_coarse["left-pad"];
        assert!(left_pad.modules.contains("path"));
        assert!(left_pad.modules.contains("os"));
    }

    #[test]
    fn scoped_package_keeps_node_prefixed_specifier() {
        let policy = generate_policy(Path::new("tests/fixtures/sample_app"), &fine_options())
            .unwrap();

        // `node:fs` passes the builtin filter but is stored verbatim.
        let probe = &policy.policy_coarse["@tools/probe"];
        assert!(probe.modules.contains("node:fs"));
        assert!(policy.policy_fine["@tools/probe"]
            .modules
            .contains("node:fs.readFile"));
    }

    #[test]
    fn hidden_directories_do_not_leak_capabilities() {
        let policy = generate_policy(Path::new("tests/fixtures/sample_app"), &fine_options())
            .unwrap();
        // .cache/skipme.js spawns child_process; it must never be analyzed.
        let root = &policy.policy_coarse["sample-app"];
        assert!(!root.modules.contains("child_process"));
    }

    #[test]
    fn external_modules_appear_on_request() {
        let options = ScanOptions {
            include_external_modules: true,
            ..fine_options()
        };
        let policy =
            generate_policy(Path::new("tests/fixtures/sample_app"), &options).unwrap();
        assert!(policy.policy_coarse["tiny-log"].modules.contains("left-pad"));
    }

    #[test]
    fn member_containment_invariants() {
        let policy = generate_policy(Path::new("tests/fixtures/sample_app"), &fine_options())
            .unwrap();

        for (name, fine) in &policy.policy_fine {
            let coarse = &policy.policy_coarse[name];
            for member in &fine.modules {
                let owner = crate::policy::MemberAccess::parse(member).unwrap().owner;
                assert!(coarse.modules.contains(&owner), "{member} lacks {owner}");
            }
            for member in &fine.globals {
                let owner = crate::policy::MemberAccess::parse(member).unwrap().owner;
                assert!(coarse.globals.contains(&owner), "{member} lacks {owner}");
            }
        }
    }

    #[test]
    fn repeated_runs_are_byte_identical() {
        let root = Path::new("tests/fixtures/sample_app");
        let first = generate_policy(root, &fine_options()).unwrap();
        let second = generate_policy(root, &fine_options()).unwrap();
        assert_eq!(
            output::json::render(&first).unwrap(),
            output::json::render(&second).unwrap()
        );
    }

    #[test]
    fn legacy_v1_lockfile_tree() {
        let policy = generate_policy(Path::new("tests/fixtures/legacy_app"), &fine_options())
            .unwrap();
        assert!(policy.policy_coarse.contains_key("alpha"));
        assert!(policy.policy_coarse.contains_key("beta"));
        assert!(!policy.policy_coarse.contains_key("gamma"));
        assert!(policy.policy_coarse["beta"].modules.contains("crypto"));
    }

    #[test]
    fn coarse_only_without_member_tracing() {
        let policy = generate_policy(
            Path::new("tests/fixtures/sample_app"),
            &ScanOptions::default(),
        )
        .unwrap();
        assert!(!policy.member_access_tracing);
        assert!(policy.policy_fine.is_empty());
    }
}

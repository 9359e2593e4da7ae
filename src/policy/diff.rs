//! Policy diffing.
//!
//! A malicious update shows up here: the per-package added/removed sets of
//! a diff against the stored policy are the visible record of a dependency
//! acquiring new powers.

use std::collections::{BTreeMap, BTreeSet};

use super::Policy;

/// Added/removed entries of one string set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDelta {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl SetDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

fn set_delta(old: &BTreeSet<String>, new: &BTreeSet<String>) -> SetDelta {
    SetDelta {
        added: new.difference(old).cloned().collect(),
        removed: old.difference(new).cloned().collect(),
    }
}

/// All deltas for one package name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDelta {
    pub modules: SetDelta,
    pub globals: SetDelta,
    pub module_members: SetDelta,
    pub global_members: SetDelta,
}

impl PackageDelta {
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
            && self.globals.is_empty()
            && self.module_members.is_empty()
            && self.global_members.is_empty()
    }
}

/// Diff between a stored policy and a freshly derived one. Only packages
/// with a non-empty delta appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDiff {
    pub packages: BTreeMap<String, PackageDelta>,
}

impl PolicyDiff {
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Compute the per-package diff of `new` against `old`.
pub fn diff(old: &Policy, new: &Policy) -> PolicyDiff {
    let empty_coarse = super::CoarseCapabilities::default();
    let empty_fine = super::FineCapabilities::default();

    let mut names: BTreeSet<&String> = old.policy_coarse.keys().collect();
    names.extend(new.policy_coarse.keys());

    let mut out = PolicyDiff::default();
    for name in names {
        let old_coarse = old.policy_coarse.get(name).unwrap_or(&empty_coarse);
        let new_coarse = new.policy_coarse.get(name).unwrap_or(&empty_coarse);
        let old_fine = old.policy_fine.get(name).unwrap_or(&empty_fine);
        let new_fine = new.policy_fine.get(name).unwrap_or(&empty_fine);

        let delta = PackageDelta {
            modules: set_delta(&old_coarse.modules, &new_coarse.modules),
            globals: set_delta(&old_coarse.globals, &new_coarse.globals),
            module_members: set_delta(&old_fine.modules, &new_fine.modules),
            global_members: set_delta(&old_fine.globals, &new_fine.globals),
        };
        if !delta.is_empty() {
            out.packages.insert(name.clone(), delta);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{CapabilitySet, Policy};
    use std::collections::BTreeMap;

    fn policy_with(name: &str, modules: &[&str]) -> Policy {
        let mut caps = CapabilitySet::new();
        for m in modules {
            caps.record_module(m);
        }
        let packages = BTreeMap::from([(name.to_string(), caps)]);
        Policy::from_packages(&packages, false)
    }

    #[test]
    fn identical_policies_diff_empty() {
        let a = policy_with("pkg", &["fs"]);
        let b = policy_with("pkg", &["fs"]);
        assert!(diff(&a, &b).is_empty());
    }

    #[test]
    fn new_module_is_reported_added() {
        let old = policy_with("pkg", &["fs"]);
        let new = policy_with("pkg", &["fs", "child_process"]);
        let d = diff(&old, &new);
        let delta = &d.packages["pkg"];
        assert!(delta.modules.added.contains("child_process"));
        assert!(delta.modules.removed.is_empty());
    }

    #[test]
    fn removed_package_shows_removals() {
        let old = policy_with("pkg", &["fs"]);
        let new = Policy::default();
        let d = diff(&old, &new);
        assert!(d.packages["pkg"].modules.removed.contains("fs"));
    }
}

//! Capability sets and the persisted policy.
//!
//! A package's capabilities are recorded at two granularities: coarse
//! (module specifiers and global identifiers) and fine (specific members of
//! those modules and globals). All containers are ordered so the emitted
//! JSON is deterministic and diffs stay stable.

pub mod diff;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::builtins;

/// A member read off a module or a global: canonical text
/// `"<owner>.<member>"`. When the owner itself contains dots (scoped or
/// subpath specifiers), splitting is on the right-most dot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemberAccess {
    pub owner: String,
    pub member: String,
}

impl MemberAccess {
    pub fn new(owner: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            member: member.into(),
        }
    }

    pub fn canonical(&self) -> String {
        format!("{}.{}", self.owner, self.member)
    }

    pub fn parse(text: &str) -> Option<Self> {
        let (owner, member) = text.rsplit_once('.')?;
        if owner.is_empty() || member.is_empty() {
            return None;
        }
        Some(Self::new(owner, member))
    }
}

impl std::fmt::Display for MemberAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.owner, self.member)
    }
}

/// Accumulated capabilities of one analysis unit.
///
/// Recording a member also records its owner, so the containment invariant
/// (every fine member's owner appears in the coarse set) holds by
/// construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    pub modules: BTreeSet<String>,
    pub globals: BTreeSet<String>,
    pub module_members: BTreeSet<MemberAccess>,
    pub global_members: BTreeSet<MemberAccess>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_module(&mut self, module: &str) {
        self.modules.insert(module.to_string());
    }

    pub fn record_global(&mut self, global: &str) {
        self.globals.insert(global.to_string());
    }

    pub fn record_module_member(&mut self, module: &str, member: &str) {
        self.modules.insert(module.to_string());
        self.module_members.insert(MemberAccess::new(module, member));
    }

    pub fn record_global_member(&mut self, global: &str, member: &str) {
        self.globals.insert(global.to_string());
        self.global_members.insert(MemberAccess::new(global, member));
    }

    /// Union another set into this one (commutative over repeated merges).
    pub fn union_with(&mut self, other: &CapabilitySet) {
        self.modules.extend(other.modules.iter().cloned());
        self.globals.extend(other.globals.iter().cloned());
        self.module_members
            .extend(other.module_members.iter().cloned());
        self.global_members
            .extend(other.global_members.iter().cloned());
    }

    /// Intersect the module sets with the platform builtin list (plus any
    /// operator-supplied extras). Members of dropped modules go with them.
    pub fn retain_builtin_modules(&mut self, extra: &BTreeSet<String>) {
        self.modules
            .retain(|m| builtins::is_builtin_module(m) || extra.contains(m));
        let kept = self.modules.clone();
        self.module_members.retain(|ma| kept.contains(&ma.owner));
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
            && self.globals.is_empty()
            && self.module_members.is_empty()
            && self.global_members.is_empty()
    }
}

/// Coarse per-package record: which modules and globals are reachable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoarseCapabilities {
    pub modules: BTreeSet<String>,
    pub globals: BTreeSet<String>,
}

/// Fine per-package record: canonical member strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineCapabilities {
    pub modules: BTreeSet<String>,
    pub globals: BTreeSet<String>,
}

/// The persisted policy artifact, keyed by canonical package name. Multiple
/// installed copies of one package are unioned before this is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub member_access_tracing: bool,
    pub policy_coarse: BTreeMap<String, CoarseCapabilities>,
    pub policy_fine: BTreeMap<String, FineCapabilities>,
}

impl Policy {
    /// Assemble a policy from per-package-name capability sets.
    pub fn from_packages(
        packages: &BTreeMap<String, CapabilitySet>,
        member_access_tracing: bool,
    ) -> Self {
        let mut policy = Policy {
            member_access_tracing,
            ..Default::default()
        };

        for (name, caps) in packages {
            policy.policy_coarse.insert(
                name.clone(),
                CoarseCapabilities {
                    modules: caps.modules.clone(),
                    globals: caps.globals.clone(),
                },
            );
            if member_access_tracing {
                policy.policy_fine.insert(
                    name.clone(),
                    FineCapabilities {
                        modules: caps
                            .module_members
                            .iter()
                            .map(MemberAccess::canonical)
                            .collect(),
                        globals: caps
                            .global_members
                            .iter()
                            .map(MemberAccess::canonical)
                            .collect(),
                    },
                );
            }
        }

        policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_recording_implies_owner() {
        let mut caps = CapabilitySet::new();
        caps.record_module_member("fs", "readFile");
        caps.record_global_member("console", "log");
        assert!(caps.modules.contains("fs"));
        assert!(caps.globals.contains("console"));
    }

    #[test]
    fn rightmost_dot_split() {
        let ma = MemberAccess::parse("node:fs.readFile").unwrap();
        assert_eq!(ma.owner, "node:fs");
        assert_eq!(ma.member, "readFile");

        let dotted = MemberAccess::parse("lib.sub.member").unwrap();
        assert_eq!(dotted.owner, "lib.sub");
        assert_eq!(dotted.member, "member");
    }

    #[test]
    fn builtin_filter_drops_members_with_module() {
        let mut caps = CapabilitySet::new();
        caps.record_module_member("fs", "readFile");
        caps.record_module_member("left-pad", "pad");
        caps.retain_builtin_modules(&BTreeSet::new());
        assert!(caps.modules.contains("fs"));
        assert!(!caps.modules.contains("left-pad"));
        assert!(!caps
            .module_members
            .iter()
            .any(|ma| ma.owner == "left-pad"));
    }

    #[test]
    fn extra_builtins_survive_filter() {
        let mut caps = CapabilitySet::new();
        caps.record_module("electron");
        let extra = BTreeSet::from(["electron".to_string()]);
        caps.retain_builtin_modules(&extra);
        assert!(caps.modules.contains("electron"));
    }

    #[test]
    fn union_is_duplicate_free() {
        let mut a = CapabilitySet::new();
        a.record_module("fs");
        let mut b = CapabilitySet::new();
        b.record_module("fs");
        b.record_module("path");
        a.union_with(&b);
        assert_eq!(a.modules.len(), 2);
    }

    #[test]
    fn policy_json_shape() {
        let mut caps = CapabilitySet::new();
        caps.record_module_member("fs", "readFile");
        caps.record_global_member("console", "log");
        let packages = BTreeMap::from([("demo".to_string(), caps)]);
        let policy = Policy::from_packages(&packages, true);
        let json = serde_json::to_value(&policy).unwrap();

        assert_eq!(json["memberAccessTracing"], true);
        assert_eq!(json["policyCoarse"]["demo"]["modules"][0], "fs");
        assert_eq!(json["policyFine"]["demo"]["modules"][0], "fs.readFile");
        assert_eq!(json["policyFine"]["demo"]["globals"][0], "console.log");
    }

    #[test]
    fn fine_map_empty_without_tracing() {
        let mut caps = CapabilitySet::new();
        caps.record_module_member("fs", "readFile");
        let packages = BTreeMap::from([("demo".to_string(), caps)]);
        let policy = Policy::from_packages(&packages, false);
        assert!(policy.policy_fine.is_empty());
        assert!(!policy.policy_coarse.is_empty());
    }
}

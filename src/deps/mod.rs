//! Package dependency mapping.
//!
//! Walks the root lockfile and the installed `node_modules` layout to
//! produce the set of analysis units: a mapping from package path to the
//! paths of that package's dependencies. The policy is keyed by package
//! name, so multiple installed copies of one name all surface here and are
//! unioned later.

pub mod lockfile;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{CapscanError, Result};
use self::lockfile::{Lockfile, PackageEntry, V1Entry};

/// Mapping view: package path → dependency package paths. The root package
/// is always present.
pub type DependencyMap = BTreeMap<PathBuf, Vec<PathBuf>>;

/// Build the dependency map for the package tree rooted at `root`.
///
/// A shrinkwrap file wins over the standard lockfile. Unsupported schema
/// versions degrade to a root-only map with a warning.
pub fn map_packages(root: &Path) -> Result<DependencyMap> {
    let manifest_path = root.join("package.json");
    if !manifest_path.exists() {
        return Err(CapscanError::MissingManifest(manifest_path));
    }

    let lock_path = ["npm-shrinkwrap.json", "package-lock.json"]
        .iter()
        .map(|name| root.join(name))
        .find(|p| p.exists())
        .ok_or_else(|| {
            CapscanError::Lockfile(format!(
                "no npm-shrinkwrap.json or package-lock.json under {}",
                root.display()
            ))
        })?;
    let lock = Lockfile::parse(&std::fs::read_to_string(&lock_path)?)?;

    // name → every installed path of that name, plus each entry's declared
    // dependency names for the edge pass.
    let mut name_paths: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let mut entry_deps: Vec<(PathBuf, Vec<String>)> = Vec::new();

    match lock.lockfile_version {
        1 => walk_v1(&lock.dependencies, root, &mut name_paths, &mut entry_deps),
        2 | 3 => collect_v2(&lock.packages, root, &mut name_paths, &mut entry_deps),
        other => {
            tracing::warn!(
                version = other,
                lockfile = %lock_path.display(),
                "unsupported lockfile version; analyzing root package only"
            );
        }
    }

    let mut map: DependencyMap = BTreeMap::new();
    for paths in name_paths.values() {
        for path in paths {
            map.entry(path.clone()).or_default();
        }
    }

    // Dependency names resolve to every installed copy of that name; names
    // the installer never materialized are skipped.
    for (path, dep_names) in entry_deps {
        let edges = resolve_edges(&dep_names, &name_paths);
        map.insert(path, edges);
    }

    // The root's edges come from its own manifest.
    let manifest: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&manifest_path)?)?;
    let root_dep_names: Vec<String> = manifest
        .get("dependencies")
        .and_then(|d| d.as_object())
        .map(|d| d.keys().cloned().collect())
        .unwrap_or_default();
    let mut root_edges = resolve_edges(&root_dep_names, &name_paths);
    for name in &root_dep_names {
        if !name_paths.contains_key(name) {
            let fallback = root.join("node_modules").join(name);
            if fallback.exists() {
                root_edges.push(fallback);
            }
        }
    }
    root_edges.sort();
    root_edges.dedup();
    map.insert(root.to_path_buf(), root_edges);

    Ok(map)
}

fn resolve_edges(dep_names: &[String], name_paths: &BTreeMap<String, Vec<PathBuf>>) -> Vec<PathBuf> {
    let mut edges: Vec<PathBuf> = dep_names
        .iter()
        .filter_map(|name| name_paths.get(name))
        .flatten()
        .cloned()
        .collect();
    edges.sort();
    edges.dedup();
    edges
}

fn walk_v1(
    entries: &BTreeMap<String, V1Entry>,
    parent: &Path,
    name_paths: &mut BTreeMap<String, Vec<PathBuf>>,
    entry_deps: &mut Vec<(PathBuf, Vec<String>)>,
) {
    for (name, entry) in entries {
        let path = parent.join("node_modules").join(name);
        if !path.exists() {
            if !entry.optional {
                tracing::warn!(package = %name, path = %path.display(), "listed install missing on disk");
            }
            continue;
        }
        name_paths.entry(name.clone()).or_default().push(path.clone());
        entry_deps.push((path.clone(), entry.requires.keys().cloned().collect()));
        walk_v1(&entry.dependencies, &path, name_paths, entry_deps);
    }
}

fn collect_v2(
    packages: &BTreeMap<String, PackageEntry>,
    root: &Path,
    name_paths: &mut BTreeMap<String, Vec<PathBuf>>,
    entry_deps: &mut Vec<(PathBuf, Vec<String>)>,
) {
    for (key, entry) in packages {
        // The empty key is the root; its edges come from the manifest.
        let Some(name) = lockfile::name_from_packages_key(key) else {
            continue;
        };
        let path = root.join(key);
        if !path.exists() {
            tracing::debug!(package = %name, path = %path.display(), "lockfile entry not installed; skipped");
            continue;
        }
        name_paths
            .entry(name.to_string())
            .or_default()
            .push(path.clone());
        entry_deps.push((path, entry.dependencies.keys().cloned().collect()));
    }
}

/// Canonical package name of an installed path: the segment after the last
/// `node_modules`, keeping the `@scope/` prefix together.
pub fn package_name_from_path(path: &Path) -> String {
    let components: Vec<&str> = path.iter().filter_map(|c| c.to_str()).collect();
    if let Some(pos) = components.iter().rposition(|c| *c == "node_modules") {
        match &components[pos + 1..] {
            [scope, name, ..] if scope.starts_with('@') => return format!("{scope}/{name}"),
            [name, ..] => return (*name).to_string(),
            [] => {}
        }
    }
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".into())
}

/// Index of a node in a [`PackageGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug)]
pub struct PackageNode {
    pub path: PathBuf,
    pub name: String,
    pub dependencies: Vec<NodeId>,
}

/// Graph view over the dependency map. Nodes hold indices rather than
/// references: hoisted installs can produce cycles, so consumers walk with
/// a visited set instead of recursing.
#[derive(Debug, Default)]
pub struct PackageGraph {
    nodes: Vec<PackageNode>,
    index: BTreeMap<PathBuf, NodeId>,
}

impl PackageGraph {
    pub fn from_map(map: &DependencyMap) -> Self {
        let mut graph = Self::default();
        for path in map.keys() {
            let id = NodeId(graph.nodes.len());
            graph.nodes.push(PackageNode {
                path: path.clone(),
                name: package_name_from_path(path),
                dependencies: Vec::new(),
            });
            graph.index.insert(path.clone(), id);
        }
        for (path, deps) in map {
            let id = graph.index[path];
            graph.nodes[id.0].dependencies = deps
                .iter()
                .filter_map(|dep| graph.index.get(dep).copied())
                .collect();
        }
        graph
    }

    pub fn node(&self, id: NodeId) -> &PackageNode {
        &self.nodes[id.0]
    }

    pub fn lookup(&self, path: &Path) -> Option<NodeId> {
        self.index.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &PackageNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// All nodes reachable from `start`, iteratively; safe on cycles.
    pub fn reachable_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![start];
        let mut out = Vec::new();
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut visited[id.0], true) {
                continue;
            }
            out.push(id);
            stack.extend(self.nodes[id.0].dependencies.iter().copied());
        }
        out.sort();
        out
    }
}

/// Source files of one package: `.js`, `.mjs`, `.cjs` under the package
/// directory, never descending into `node_modules` or hidden directories.
/// Sorted for deterministic analysis order.
pub fn enumerate_sources(package: &Path) -> Vec<PathBuf> {
    let walker = ignore::WalkBuilder::new(package)
        .hidden(true)
        .ignore(false)
        .parents(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .filter_entry(|entry| entry.file_name() != "node_modules")
        .build();

    let mut files = Vec::new();
    for entry in walker.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_source = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| matches!(ext, "js" | "mjs" | "cjs"));
        if !is_source {
            continue;
        }
        // Skip files larger than 1MB.
        if let Ok(metadata) = std::fs::metadata(path) {
            if metadata.len() > 1_048_576 {
                continue;
            }
        }
        files.push(path.to_path_buf());
    }
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from("tests/fixtures").join(name)
    }

    #[test]
    fn names_from_paths() {
        assert_eq!(
            package_name_from_path(Path::new("/app/node_modules/left-pad")),
            "left-pad"
        );
        assert_eq!(
            package_name_from_path(Path::new("/app/node_modules/@scope/pkg")),
            "@scope/pkg"
        );
        assert_eq!(
            package_name_from_path(Path::new(
                "/app/node_modules/a/node_modules/b"
            )),
            "b"
        );
        assert_eq!(package_name_from_path(Path::new("/srv/my-app")), "my-app");
    }

    #[test]
    fn v3_map_includes_installed_copies_and_skips_missing() {
        let root = fixture("sample_app");
        let map = map_packages(&root).unwrap();

        assert!(map.contains_key(&root));
        assert!(map.contains_key(&root.join("node_modules/left-pad")));
        assert!(map.contains_key(&root.join("node_modules/tiny-log")));
        // Second installed copy under a nested node_modules.
        assert!(map.contains_key(&root.join("node_modules/tiny-log/node_modules/left-pad")));
        // Listed but absent on disk.
        assert!(!map.contains_key(&root.join("node_modules/missing-opt")));
        assert!(!map.contains_key(&root.join("node_modules/ghost")));
    }

    #[test]
    fn v3_edges_resolve_against_all_copies() {
        let root = fixture("sample_app");
        let map = map_packages(&root).unwrap();
        let edges = &map[&root.join("node_modules/tiny-log")];
        // tiny-log depends on left-pad; both installed copies count.
        assert!(edges.contains(&root.join("node_modules/left-pad")));
        assert!(edges.contains(&root.join("node_modules/tiny-log/node_modules/left-pad")));
    }

    #[test]
    fn root_edges_come_from_manifest() {
        let root = fixture("sample_app");
        let map = map_packages(&root).unwrap();
        let edges = &map[&root];
        assert!(edges.contains(&root.join("node_modules/left-pad")));
        assert!(edges.contains(&root.join("node_modules/tiny-log")));
    }

    #[test]
    fn v1_tree_walk() {
        let root = fixture("legacy_app");
        let map = map_packages(&root).unwrap();

        let alpha = root.join("node_modules/alpha");
        let beta = root.join("node_modules/alpha/node_modules/beta");
        assert!(map.contains_key(&alpha));
        assert!(map.contains_key(&beta));
        // Optional entry with no directory is excluded.
        assert!(!map.contains_key(&root.join("node_modules/gamma")));
        // requires edge resolved through the path map.
        assert!(map[&alpha].contains(&beta));
    }

    #[test]
    fn missing_manifest_fails() {
        let err = map_packages(Path::new("tests/fixtures/nowhere")).unwrap_err();
        assert!(matches!(err, CapscanError::MissingManifest(_)));
    }

    #[test]
    fn graph_handles_cycles() {
        let a = PathBuf::from("/x/a");
        let b = PathBuf::from("/x/b");
        let map = DependencyMap::from([
            (a.clone(), vec![b.clone()]),
            (b.clone(), vec![a.clone()]),
        ]);
        let graph = PackageGraph::from_map(&map);
        let start = graph.lookup(&a).unwrap();
        let reachable = graph.reachable_from(start);
        assert_eq!(reachable.len(), 2);
    }

    #[test]
    fn source_enumeration_skips_node_modules_and_hidden() {
        let root = fixture("sample_app");
        let files = enumerate_sources(&root);
        assert!(files.iter().any(|f| f.ends_with("index.js")));
        assert!(!files
            .iter()
            .any(|f| f.components().any(|c| c.as_os_str() == "node_modules")));
        assert!(!files.iter().any(|f| f.components().any(|c| {
            c.as_os_str()
                .to_str()
                .is_some_and(|s| s.starts_with('.') && s.len() > 1)
        })));
    }
}

//! Lexical scope and binding model.
//!
//! Scopes form a tree held in an arena; the traversal driver owns the
//! arena and a pointer to the active scope. A binding optionally carries a
//! module annotation, set once by the import recognizer when the binding is
//! recognized as holding an imported module. Lookup walks outward and
//! returns the nearest binding of a name.

use std::path::Path;

use tree_sitter::Node;

use crate::error::{CapscanError, Result};

/// Index of a scope in its [`Environment`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Program,
    Function,
    Method,
    Block,
}

impl ScopeKind {
    /// Scopes that receive function-scoped (`var`) declarations.
    fn anchors_var(self) -> bool {
        matches!(self, Self::Program | Self::Function | Self::Method)
    }
}

/// A name introduced in some lexical scope.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    /// When set, the binding is known to hold the given imported module.
    pub module: Option<String>,
}

impl Binding {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: None,
        }
    }
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    bindings: Vec<Binding>,
}

/// Arena of scopes for one file's traversal. Scopes are never removed;
/// popping is a matter of the driver moving its active pointer back to the
/// parent, after which the child's bindings are unreachable.
#[derive(Debug, Default)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scope(
        &mut self,
        kind: ScopeKind,
        parent: Option<ScopeId>,
        initial: Vec<Binding>,
    ) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            kind,
            parent,
            bindings: initial,
        });
        id
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    pub fn add_binding(&mut self, scope: ScopeId, binding: Binding) {
        self.scopes[scope.0].bindings.push(binding);
    }

    /// Insert into the nearest enclosing Function, Method, or Program scope.
    pub fn add_binding_function_scoped(&mut self, scope: ScopeId, binding: Binding) {
        let mut target = scope;
        while !self.scopes[target.0].kind.anchors_var() {
            match self.scopes[target.0].parent {
                Some(parent) => target = parent,
                None => break,
            }
        }
        self.scopes[target.0].bindings.push(binding);
    }

    /// Nearest enclosing binding of `name`, searching the given scope then
    /// its ancestors. Within a scope, later declarations shadow earlier.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Binding> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.0];
            if let Some(b) = s.bindings.iter().rev().find(|b| b.name == name) {
                return Some(b);
            }
            current = s.parent;
        }
        None
    }

    /// Like [`lookup`](Self::lookup), but only module-referencing bindings
    /// count. Returns the module specifier.
    pub fn lookup_module_ref(&self, scope: ScopeId, name: &str) -> Option<&str> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.0];
            if let Some(b) = s
                .bindings
                .iter()
                .rev()
                .find(|b| b.name == name && b.module.is_some())
            {
                return b.module.as_deref();
            }
            current = s.parent;
        }
        None
    }

    pub fn has_binding(&self, scope: ScopeId, name: &str) -> bool {
        self.lookup(scope, name).is_some()
    }

    /// Record that the nearest binding of `name` holds `module`. No-op when
    /// the name is unbound (the recognizer only annotates names it just saw
    /// declared).
    pub fn annotate_module(&mut self, scope: ScopeId, name: &str, module: String) {
        let mut current = Some(scope);
        while let Some(id) = current {
            let parent = self.scopes[id.0].parent;
            if let Some(b) = self.scopes[id.0]
                .bindings
                .iter_mut()
                .rev()
                .find(|b| b.name == name)
            {
                b.module = Some(module);
                return;
            }
            current = parent;
        }
    }
}

/// Reduce a binding target to its bound identifier nodes, recursing
/// structurally through destructuring patterns. A shape outside the modeled
/// set is a hard error: silently continuing would understate capabilities.
pub fn pattern_identifiers<'t>(node: Node<'t>, file: &Path) -> Result<Vec<Node<'t>>> {
    let mut out = Vec::new();
    collect_pattern_identifiers(node, file, &mut out)?;
    Ok(out)
}

fn collect_pattern_identifiers<'t>(
    node: Node<'t>,
    file: &Path,
    out: &mut Vec<Node<'t>>,
) -> Result<()> {
    match node.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => {
            out.push(node);
            Ok(())
        }
        "rest_pattern" => match node.named_child(0) {
            Some(inner) => collect_pattern_identifiers(inner, file, out),
            None => Ok(()),
        },
        "assignment_pattern" | "object_assignment_pattern" => {
            let left = node.child_by_field_name("left").ok_or_else(|| {
                CapscanError::Internal("assignment pattern without left side".into())
            })?;
            collect_pattern_identifiers(left, file, out)
        }
        "object_pattern" | "array_pattern" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_pattern_identifiers(child, file, out)?;
            }
            Ok(())
        }
        "pair_pattern" => {
            let value = node
                .child_by_field_name("value")
                .ok_or_else(|| CapscanError::Internal("pair pattern without value".into()))?;
            collect_pattern_identifiers(value, file, out)
        }
        "update_expression" | "unary_expression" => match node.child_by_field_name("argument") {
            Some(arg) => collect_pattern_identifiers(arg, file, out),
            None => Ok(()),
        },
        "comment" => Ok(()),
        kind => Err(CapscanError::UnsupportedPattern {
            kind: kind.to_string(),
            file: file.display().to_string(),
        }),
    }
}

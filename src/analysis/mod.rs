//! Capability extraction over a parsed source file.
//!
//! The traversal driver walks the tree depth-first, keeping two pieces of
//! ambient state: the active scope pointer and (through tree-sitter's
//! parent links) the ancestry of the node under inspection. Per node it
//! dispatches in a fixed order (scope update, binding declarations, import
//! recognition, globals collection, member-access collection), then recurses
//! into every named child, so no subexpression that can contain an
//! identifier is skipped. Analyzers observe the node, its ancestors, and the
//! environment; all writes go to the `CapabilitySet` accumulator.

pub mod globals;
pub mod imports;
pub mod members;

use std::path::Path;

use tree_sitter::Node;

use crate::error::Result;
use crate::parser::{self, ParsedSource};
use crate::policy::CapabilitySet;
use crate::scope::{pattern_identifiers, Binding, Environment, ScopeId, ScopeKind};

/// Node kinds whose `statement_block` body opens a Function scope.
const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "function_expression",
    "function",
    "generator_function",
    "generator_function_declaration",
    "arrow_function",
];

pub(crate) struct Analyzer<'a> {
    pub(crate) file: &'a Path,
    pub(crate) source: &'a str,
    pub(crate) env: Environment,
    pub(crate) current: ScopeId,
    pub(crate) include_locations: bool,
}

/// Extract the capability set of one parsed file.
pub fn extract(
    parsed: &ParsedSource,
    file: &Path,
    include_locations: bool,
) -> Result<CapabilitySet> {
    let mut env = Environment::new();
    let current = env.push_scope(ScopeKind::Program, None, vec![]);

    let mut analyzer = Analyzer {
        file,
        source: &parsed.text,
        env,
        current,
        include_locations,
    };

    let mut caps = CapabilitySet::new();
    analyzer.walk(parsed.tree.root_node(), &mut caps)?;
    Ok(caps)
}

/// Parse and extract in one step. `None` when the file does not parse; the
/// caller decides how to report the skip.
pub fn extract_source(
    source: &str,
    file: &Path,
    include_locations: bool,
) -> Result<Option<CapabilitySet>> {
    match parser::parse_source(source) {
        Some(parsed) => extract(&parsed, file, include_locations).map(Some),
        None => Ok(None),
    }
}

impl<'a> Analyzer<'a> {
    pub(crate) fn text(&self, node: Node) -> &'a str {
        parser::node_text(node, self.source)
    }

    pub(crate) fn string_value(&self, node: Node) -> Option<String> {
        parser::string_value(node, self.source)
    }

    pub(crate) fn lookup_module_ref(&self, name: &str) -> Option<&str> {
        self.env.lookup_module_ref(self.current, name)
    }

    pub(crate) fn debug_site(&self, what: &str, name: &str, node: Node) {
        if self.include_locations {
            tracing::debug!(
                site = %parser::loc(self.file, node),
                "{what} {name}"
            );
        }
    }

    fn walk(&mut self, node: Node, caps: &mut CapabilitySet) -> Result<()> {
        let restore = self.enter_block_scope(node)?;

        self.declare_bindings(node)?;
        imports::recognize(self, node, caps);
        globals::collect(self, node, caps)?;
        members::trace(self, node, caps)?;

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.walk(child, caps)?;
        }

        // Only block nodes pop the environment; program and function scopes
        // live exactly as long as their block body.
        if let Some(previous) = restore {
            self.current = previous;
        }

        Ok(())
    }

    /// At a block node, open the scope its syntactic role calls for:
    /// Function (pre-populated with parameter bindings) when the block is a
    /// function body, Method for method bodies, plain Block otherwise.
    /// Returns the scope to restore on exit.
    fn enter_block_scope(&mut self, node: Node) -> Result<Option<ScopeId>> {
        if node.kind() != "statement_block" {
            return Ok(None);
        }

        let (kind, params) = match node.parent() {
            Some(parent) if FUNCTION_KINDS.contains(&parent.kind()) => {
                (ScopeKind::Function, self.parameter_bindings(parent)?)
            }
            Some(parent) if parent.kind() == "method_definition" => {
                (ScopeKind::Method, self.parameter_bindings(parent)?)
            }
            _ => (ScopeKind::Block, Vec::new()),
        };

        let previous = self.current;
        self.current = self.env.push_scope(kind, Some(previous), params);
        Ok(Some(previous))
    }

    fn parameter_bindings(&self, function: Node) -> Result<Vec<Binding>> {
        let mut bindings = Vec::new();

        if let Some(params) = function.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.named_children(&mut cursor) {
                for ident in pattern_identifiers(param, self.file)? {
                    bindings.push(Binding::plain(self.text(ident)));
                }
            }
        } else if let Some(param) = function.child_by_field_name("parameter") {
            // Single-identifier arrow parameter without parentheses.
            bindings.push(Binding::plain(self.text(param)));
        }

        Ok(bindings)
    }

    fn declare_bindings(&mut self, node: Node) -> Result<()> {
        match node.kind() {
            // `var` declarations hoist to the nearest function-like scope.
            "variable_declaration" => self.declare_variable_declarators(node, true),
            "lexical_declaration" => self.declare_variable_declarators(node, false),
            "for_in_statement" => {
                let Some(kind) = node.child_by_field_name("kind") else {
                    return Ok(());
                };
                let Some(left) = node.child_by_field_name("left") else {
                    return Ok(());
                };
                let function_scoped = self.text(kind) == "var";
                for ident in pattern_identifiers(left, self.file)? {
                    let binding = Binding::plain(self.text(ident));
                    if function_scoped {
                        self.env.add_binding_function_scoped(self.current, binding);
                    } else {
                        self.env.add_binding(self.current, binding);
                    }
                }
                Ok(())
            }
            "import_statement" => {
                self.declare_import_locals(node);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn declare_variable_declarators(&mut self, node: Node, function_scoped: bool) -> Result<()> {
        let mut cursor = node.walk();
        for declarator in node.named_children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = declarator.child_by_field_name("name") else {
                continue;
            };
            for ident in pattern_identifiers(name, self.file)? {
                let binding = Binding::plain(self.text(ident));
                if function_scoped {
                    self.env.add_binding_function_scoped(self.current, binding);
                } else {
                    self.env.add_binding(self.current, binding);
                }
            }
        }
        Ok(())
    }

    /// Every import specifier binds its local name; the recognizer then
    /// annotates default and namespace locals with their module.
    fn declare_import_locals(&mut self, node: Node) {
        let Some(clause) = node
            .named_children(&mut node.walk())
            .find(|c| c.kind() == "import_clause")
        else {
            return;
        };

        let mut cursor = clause.walk();
        for child in clause.named_children(&mut cursor) {
            match child.kind() {
                "identifier" => {
                    let binding = Binding::plain(self.text(child));
                    self.env.add_binding(self.current, binding);
                }
                "namespace_import" => {
                    if let Some(local) = child
                        .named_children(&mut child.walk())
                        .find(|c| c.kind() == "identifier")
                    {
                        let binding = Binding::plain(self.text(local));
                        self.env.add_binding(self.current, binding);
                    }
                }
                "named_imports" => {
                    let mut specs = child.walk();
                    for specifier in child.named_children(&mut specs) {
                        if specifier.kind() != "import_specifier" {
                            continue;
                        }
                        let local = specifier
                            .child_by_field_name("alias")
                            .or_else(|| specifier.child_by_field_name("name"));
                        if let Some(local) = local {
                            if local.kind() == "identifier" {
                                let binding = Binding::plain(self.text(local));
                                self.env.add_binding(self.current, binding);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

/// The member name read by a member or subscript expression: a property
/// identifier, or a string/number subscript. `None` for computed or private
/// accesses, which cannot be resolved statically.
pub(crate) fn accessed_member(analyzer: &Analyzer, node: Node) -> Option<String> {
    match node.kind() {
        "member_expression" => {
            let prop = node.child_by_field_name("property")?;
            (prop.kind() == "property_identifier").then(|| analyzer.text(prop).to_string())
        }
        "subscript_expression" => {
            let index = node.child_by_field_name("index")?;
            match index.kind() {
                "string" => analyzer.string_value(index),
                "number" => Some(analyzer.text(index).to_string()),
                _ => None,
            }
        }
        _ => None,
    }
}

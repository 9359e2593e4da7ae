//! Ambient global detection.
//!
//! An identifier denotes a global iff its name is in the platform table,
//! no binding of that name is visible in the environment chain, and its
//! syntactic position is a referring use rather than a declaring or
//! member-selector use.

use tree_sitter::Node;

use super::{accessed_member, members, Analyzer};
use crate::builtins;
use crate::error::Result;
use crate::policy::CapabilitySet;

pub(crate) fn collect(analyzer: &Analyzer, node: Node, caps: &mut CapabilitySet) -> Result<()> {
    match node.kind() {
        // Shorthand object values ({ process }) reference the identifier
        // even though the grammar gives them their own kind.
        "identifier" | "shorthand_property_identifier" => {
            if is_free_global(analyzer, node) {
                let name = analyzer.text(node);
                caps.record_global(name);
                analyzer.debug_site("global", name, node);
            }
            Ok(())
        }
        "member_expression" | "subscript_expression" => {
            let Some(object) = node.child_by_field_name("object") else {
                return Ok(());
            };
            if object.kind() == "identifier" && is_free_global(analyzer, object) {
                if let Some(member) = accessed_member(analyzer, node) {
                    caps.record_global_member(analyzer.text(object), &member);
                }
            }
            Ok(())
        }
        // const { a, b } = G; destructures members off a global.
        "variable_declarator" => {
            let Some(value) = node.child_by_field_name("value") else {
                return Ok(());
            };
            if value.kind() != "identifier" || !is_free_global(analyzer, value) {
                return Ok(());
            }
            let Some(name) = node.child_by_field_name("name") else {
                return Ok(());
            };
            let global = analyzer.text(value);
            for member in members::destructured_members(analyzer, name)? {
                caps.record_global_member(global, &member);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn is_free_global(analyzer: &Analyzer, node: Node) -> bool {
    let name = analyzer.text(node);
    builtins::is_global_name(name)
        && !analyzer.env.has_binding(analyzer.current, name)
        && is_referring_use(node)
}

/// Syntactic filter: declaring positions and member-selector positions are
/// not references. A node with no parent is unconditionally a reference.
fn is_referring_use(node: Node) -> bool {
    let Some(parent) = node.parent() else {
        return true;
    };
    match parent.kind() {
        "member_expression" => parent.child_by_field_name("property") != Some(node),
        "method_definition" => parent.child_by_field_name("name") != Some(node),
        "function_declaration" | "function_expression" | "function" | "generator_function"
        | "generator_function_declaration" | "class_declaration" | "class" => {
            parent.child_by_field_name("name") != Some(node)
        }
        "variable_declarator" => parent.child_by_field_name("name") != Some(node),
        // Pattern positions declare names rather than reference them.
        "array_pattern" | "rest_pattern" | "formal_parameters" | "pair_pattern" => false,
        "assignment_pattern" | "object_assignment_pattern" => {
            parent.child_by_field_name("left") != Some(node)
        }
        "arrow_function" => parent.child_by_field_name("parameter") != Some(node),
        _ => true,
    }
}

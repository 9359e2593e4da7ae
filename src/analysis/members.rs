//! Member-access tracing on modules.
//!
//! Records which members of an imported module a file reaches: named
//! imports and re-exports, property reads off module-referencing bindings
//! or directly off require calls, and destructuring of either.

use tree_sitter::Node;

use super::{accessed_member, imports, Analyzer};
use crate::error::{CapscanError, Result};
use crate::policy::CapabilitySet;

pub(crate) fn trace(analyzer: &Analyzer, node: Node, caps: &mut CapabilitySet) -> Result<()> {
    match node.kind() {
        "import_statement" => {
            trace_import(analyzer, node, caps);
            Ok(())
        }
        "export_statement" => {
            trace_export(analyzer, node, caps);
            Ok(())
        }
        "member_expression" | "subscript_expression" => {
            trace_member_expression(analyzer, node, caps);
            Ok(())
        }
        "variable_declarator" => trace_destructured_declarator(analyzer, node, caps),
        _ => Ok(()),
    }
}

/// `import { x } from "m"` reaches `m.x`. The imported name counts, not
/// the local alias.
fn trace_import(analyzer: &Analyzer, node: Node, caps: &mut CapabilitySet) {
    let Some(module) = node
        .child_by_field_name("source")
        .and_then(|s| analyzer.string_value(s))
    else {
        return;
    };

    let Some(clause) = node
        .named_children(&mut node.walk())
        .find(|c| c.kind() == "import_clause")
    else {
        return;
    };
    let Some(named) = clause
        .named_children(&mut clause.walk())
        .find(|c| c.kind() == "named_imports")
    else {
        return;
    };

    let mut cursor = named.walk();
    for specifier in named.named_children(&mut cursor) {
        if specifier.kind() != "import_specifier" {
            continue;
        }
        let Some(name) = specifier.child_by_field_name("name") else {
            continue;
        };
        let imported = match name.kind() {
            "identifier" => Some(analyzer.text(name).to_string()),
            "string" => analyzer.string_value(name),
            _ => None,
        };
        if let Some(imported) = imported {
            caps.record_module_member(&module, &imported);
        }
    }
}

/// Re-exports with a source: `export { x } from "m"` reaches `m.x`.
/// `export * from "m"` makes the module reachable but its members cannot
/// be enumerated, so only the coarse record is kept.
fn trace_export(analyzer: &Analyzer, node: Node, caps: &mut CapabilitySet) {
    let Some(module) = node
        .child_by_field_name("source")
        .and_then(|s| analyzer.string_value(s))
    else {
        return;
    };
    caps.record_module(&module);

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "export_clause" => {
                let mut specs = child.walk();
                for specifier in child.named_children(&mut specs) {
                    if specifier.kind() != "export_specifier" {
                        continue;
                    }
                    let Some(name) = specifier.child_by_field_name("name") else {
                        continue;
                    };
                    let exported = match name.kind() {
                        "identifier" => Some(analyzer.text(name).to_string()),
                        "string" => analyzer.string_value(name),
                        _ => None,
                    };
                    if let Some(exported) = exported {
                        caps.record_module_member(&module, &exported);
                    }
                }
            }
            "*" | "namespace_export" => {
                tracing::warn!(
                    module = %module,
                    file = %analyzer.file.display(),
                    "re-export-all: members cannot be traced through it"
                );
            }
            _ => {}
        }
    }
}

/// `v.x` off a module-referencing binding, or `require("m").x` directly.
fn trace_member_expression(analyzer: &Analyzer, node: Node, caps: &mut CapabilitySet) {
    let Some(object) = node.child_by_field_name("object") else {
        return;
    };
    let module = match object.kind() {
        "identifier" => analyzer
            .lookup_module_ref(analyzer.text(object))
            .map(str::to_string),
        "call_expression" | "new_expression" => imports::require_literal(analyzer, object),
        _ => None,
    };
    let (Some(module), Some(member)) = (module, accessed_member(analyzer, node)) else {
        return;
    };
    caps.record_module_member(&module, &member);
    analyzer.debug_site("member", &member, node);
}

/// `const { x, y } = require("m")` (or `= v` for a module-referencing `v`)
/// reaches `m.x`, `m.y`; array patterns reach members by index.
fn trace_destructured_declarator(
    analyzer: &Analyzer,
    node: Node,
    caps: &mut CapabilitySet,
) -> Result<()> {
    let Some(name) = node.child_by_field_name("name") else {
        return Ok(());
    };
    if !matches!(name.kind(), "object_pattern" | "array_pattern") {
        return Ok(());
    }
    let Some(value) = node.child_by_field_name("value") else {
        return Ok(());
    };

    let module = match value.kind() {
        "identifier" => analyzer
            .lookup_module_ref(analyzer.text(value))
            .map(str::to_string),
        "call_expression" | "new_expression" => imports::require_literal(analyzer, value),
        _ => None,
    };
    let Some(module) = module else {
        return Ok(());
    };

    for member in destructured_members(analyzer, name)? {
        caps.record_module_member(&module, &member);
    }
    Ok(())
}

/// The member names a destructuring pattern reads off its source: property
/// keys for object patterns, element indices for array patterns. Rest
/// elements are not expanded; computed keys cannot be resolved statically
/// and are skipped. A property of any other shape is a hard error.
pub(crate) fn destructured_members(analyzer: &Analyzer, pattern: Node) -> Result<Vec<String>> {
    match pattern.kind() {
        "object_pattern" => {
            let mut out = Vec::new();
            let mut cursor = pattern.walk();
            for prop in pattern.named_children(&mut cursor) {
                match prop.kind() {
                    "shorthand_property_identifier_pattern" => {
                        out.push(analyzer.text(prop).to_string());
                    }
                    "pair_pattern" => {
                        let Some(key) = prop.child_by_field_name("key") else {
                            continue;
                        };
                        match key.kind() {
                            "property_identifier" => out.push(analyzer.text(key).to_string()),
                            "string" => {
                                if let Some(value) = analyzer.string_value(key) {
                                    out.push(value);
                                }
                            }
                            "number" => out.push(analyzer.text(key).to_string()),
                            "computed_property_name" => {
                                tracing::debug!(
                                    file = %analyzer.file.display(),
                                    "computed destructuring key skipped"
                                );
                            }
                            _ => {}
                        }
                    }
                    // { a = 1 } defaults a shorthand property.
                    "object_assignment_pattern" => {
                        if let Some(left) = prop.child_by_field_name("left") {
                            if left.kind() == "shorthand_property_identifier_pattern" {
                                out.push(analyzer.text(left).to_string());
                            }
                        }
                    }
                    "rest_pattern" | "comment" => {}
                    kind => {
                        return Err(CapscanError::UnsupportedPattern {
                            kind: kind.to_string(),
                            file: analyzer.file.display().to_string(),
                        })
                    }
                }
            }
            Ok(out)
        }
        "array_pattern" => {
            let mut out = Vec::new();
            let mut slot = 0usize;
            let mut cursor = pattern.walk();
            for child in pattern.children(&mut cursor) {
                if child.is_named() {
                    if !matches!(child.kind(), "rest_pattern" | "comment") {
                        out.push(slot.to_string());
                    }
                } else if child.kind() == "," {
                    slot += 1;
                }
            }
            Ok(out)
        }
        _ => Ok(Vec::new()),
    }
}

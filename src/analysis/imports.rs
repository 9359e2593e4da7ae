//! Import and require recognition.
//!
//! Annotates bindings that are known to hold an imported module, and
//! records every literal module specifier (require call, declarative or
//! dynamic import, side-effect import) in the coarse module set.

use tree_sitter::Node;

use super::Analyzer;
use crate::policy::CapabilitySet;

/// Literal module specifier of a require-style call or new-expression:
/// `require("m")` / `new require("m")`.
pub(crate) fn require_literal(analyzer: &Analyzer, node: Node) -> Option<String> {
    let callee = match node.kind() {
        "call_expression" => node.child_by_field_name("function")?,
        "new_expression" => node.child_by_field_name("constructor")?,
        _ => return None,
    };
    if callee.kind() != "identifier" || analyzer.text(callee) != "require" {
        return None;
    }
    first_string_argument(analyzer, node)
}

/// Literal specifier of a dynamic `import("m")` expression.
fn dynamic_import_literal(analyzer: &Analyzer, node: Node) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    let callee = node.child_by_field_name("function")?;
    if callee.kind() != "import" {
        return None;
    }
    first_string_argument(analyzer, node)
}

fn first_string_argument(analyzer: &Analyzer, call: Node) -> Option<String> {
    let args = call.child_by_field_name("arguments")?;
    analyzer.string_value(args.named_child(0)?)
}

pub(crate) fn recognize(analyzer: &mut Analyzer, node: Node, caps: &mut CapabilitySet) {
    match node.kind() {
        "call_expression" | "new_expression" => {
            let module = require_literal(analyzer, node)
                .or_else(|| dynamic_import_literal(analyzer, node));
            if let Some(module) = module {
                caps.record_module(&module);
                analyzer.debug_site("module", &module, node);
            }
        }
        "variable_declarator" => recognize_declarator(analyzer, node),
        "import_statement" => recognize_import(analyzer, node, caps),
        _ => {}
    }
}

/// `const v = require("m")` annotates `v`; `const w = v` propagates the
/// annotation of a module-referencing `v`. Destructuring targets stay
/// plain bindings; those accesses belong to the member tracer.
fn recognize_declarator(analyzer: &mut Analyzer, node: Node) {
    let Some(name) = node.child_by_field_name("name") else {
        return;
    };
    if name.kind() != "identifier" {
        return;
    }
    let Some(value) = node.child_by_field_name("value") else {
        return;
    };

    let module = require_literal(analyzer, value).or_else(|| {
        if value.kind() == "identifier" {
            analyzer
                .lookup_module_ref(analyzer.text(value))
                .map(str::to_string)
        } else {
            None
        }
    });

    if let Some(module) = module {
        let local = analyzer.text(name).to_string();
        analyzer
            .env
            .annotate_module(analyzer.current, &local, module);
    }
}

/// Declarative imports: the source always lands in the coarse module set;
/// default and namespace specifiers make their local a module-referencing
/// binding. Named specifiers bind members, not modules.
fn recognize_import(analyzer: &mut Analyzer, node: Node, caps: &mut CapabilitySet) {
    let Some(source) = node.child_by_field_name("source") else {
        return;
    };
    let Some(module) = analyzer.string_value(source) else {
        return;
    };
    caps.record_module(&module);
    analyzer.debug_site("module", &module, node);

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
                let local = analyzer.text(child).to_string();
                analyzer
                    .env
                    .annotate_module(analyzer.current, &local, module.clone());
            }
            "namespace_import" => {
                if let Some(ident) = child
                    .named_children(&mut child.walk())
                    .find(|c| c.kind() == "identifier")
                {
                    let local = analyzer.text(ident).to_string();
                    analyzer
                        .env
                        .annotate_module(analyzer.current, &local, module.clone());
                }
            }
            _ => {}
        }
    }
}

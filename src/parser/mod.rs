//! AST parser adapter.
//!
//! Wraps the tree-sitter JavaScript grammar behind a small surface: shebang
//! tolerance, parse-failure-as-`None`, and the node helpers the analyzers
//! share. Parse failure is non-fatal to a run; the caller logs and skips
//! the file.

use std::path::{Path, PathBuf};

use tree_sitter::{Node, Tree};

/// Location in source code, 1-indexed lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// Parsed source: the tree plus the text it was parsed from. Every node
/// lookup needs the bytes back.
pub struct ParsedSource {
    pub tree: Tree,
    pub text: String,
}

/// Parse JavaScript source. Returns `None` when the parser fails or the
/// resulting tree contains syntax errors.
///
/// A leading `#!` line is blanked rather than removed so byte offsets and
/// line numbers stay aligned with the original file.
pub fn parse_source(source: &str) -> Option<ParsedSource> {
    let text = strip_shebang(source);

    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_javascript::LANGUAGE.into())
        .ok()?;

    let tree = parser.parse(&text, None)?;
    if tree.root_node().has_error() {
        return None;
    }

    Some(ParsedSource { tree, text })
}

fn strip_shebang(source: &str) -> String {
    if !source.starts_with("#!") {
        return source.to_string();
    }
    match source.find('\n') {
        Some(pos) => {
            let mut text = " ".repeat(pos);
            text.push_str(&source[pos..]);
            text
        }
        None => " ".repeat(source.len()),
    }
}

/// Text of a node.
pub fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Value of a `string` literal node, without quotes. `None` for any other
/// node kind (template strings are not literals for our purposes).
pub fn string_value(node: Node, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let raw = node_text(node, source);
    Some(raw.trim_matches(|c| c == '"' || c == '\'').to_string())
}

/// Build a SourceLocation from a node (1-indexed lines).
pub fn loc(file: &Path, node: Node) -> SourceLocation {
    let start = node.start_position();
    SourceLocation {
        file: file.to_path_buf(),
        line: start.row + 1,
        column: start.column,
    }
}

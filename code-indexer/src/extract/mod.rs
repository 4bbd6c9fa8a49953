//! Symbol and reference extraction via tree-sitter.
//!
//! Each language walker pushes declarations and references into a shared
//! output shape; the dispatcher owns parser setup. A failed parse is an
//! error the caller logs per file, never a run failure.

mod javascript;
mod python;
mod rust;
mod typescript;

use tree_sitter::Node;

use crate::errors::{IndexerError, IndexerResult};
use crate::language::Language;
use store::RefKind;

/// One extracted declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSymbol {
    pub name: String,
    /// `function | method | class | struct | interface | enum`
    pub kind: String,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: String,
}

/// One extracted reference (call target, import spec, or export name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRef {
    pub name: String,
    pub line: usize,
    pub kind: RefKind,
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub symbols: Vec<ExtractedSymbol>,
    pub refs: Vec<ExtractedRef>,
}

/// Parse `code` and run the language walker.
pub fn extract(lang: Language, code: &str) -> IndexerResult<Extraction> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&lang.grammar())
        .map_err(|e| IndexerError::Parser(e.to_string()))?;
    let tree = parser
        .parse(code, None)
        .ok_or_else(|| IndexerError::Parser("parse returned no tree".into()))?;

    let mut out = Extraction::default();
    match lang {
        Language::Rust => rust::walk(&tree, code, &mut out),
        Language::Python => python::walk(&tree, code, &mut out),
        Language::Typescript | Language::Tsx => typescript::walk(&tree, code, &mut out),
        Language::Javascript => javascript::walk(&tree, code, &mut out),
    }

    // Deterministic order over the same content.
    out.symbols
        .sort_by(|a, b| (a.start_line, &a.name).cmp(&(b.start_line, &b.name)));
    out.refs
        .sort_by(|a, b| (a.line, &a.name).cmp(&(b.line, &b.name)));
    Ok(out)
}

pub(crate) fn text(code: &str, node: Node) -> String {
    code[node.byte_range()].to_string()
}

/// First declaration line, clamped — enough for prompts and embeddings.
pub(crate) fn signature_of(code: &str, node: Node) -> String {
    let raw = &code[node.byte_range()];
    let first = raw.lines().next().unwrap_or("").trim();
    let mut sig: String = first.chars().take(160).collect();
    if sig.len() < first.len() {
        sig.push('…');
    }
    sig
}

pub(crate) fn line_of(node: Node) -> usize {
    node.start_position().row + 1
}

pub(crate) fn push_symbol(out: &mut Extraction, code: &str, node: Node, name: String, kind: &str) {
    out.symbols.push(ExtractedSymbol {
        name,
        kind: kind.to_string(),
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        signature: signature_of(code, node),
    });
}

pub(crate) fn push_ref(out: &mut Extraction, node: Node, name: String, kind: RefKind) {
    if name.is_empty() {
        return;
    }
    out.refs.push(ExtractedRef {
        name,
        line: line_of(node),
        kind,
    });
}

/// Find the first string literal under `node`, unquoted (import sources).
pub(crate) fn first_string_literal(node: Node, code: &str) -> Option<String> {
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if n.kind() == "string" {
            let raw = text(code, n);
            let t = raw.trim();
            let t = t.trim_matches(|c| c == '"' || c == '\'' || c == '`');
            return Some(t.to_string());
        }
        let mut w = n.walk();
        for c in n.children(&mut w) {
            stack.push(c);
        }
    }
    None
}

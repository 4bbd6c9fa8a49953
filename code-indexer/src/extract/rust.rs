//! Rust walker: structs/enums/traits, functions (methods inside `impl`),
//! `use` imports, and call expressions.

use tree_sitter::{Node, Tree};

use store::RefKind;

use super::{push_ref, push_symbol, text, Extraction};

pub fn walk(tree: &Tree, code: &str, out: &mut Extraction) {
    // Carry the impl's self type for method labeling.
    let mut stack: Vec<(Node, Option<String>)> = vec![(tree.root_node(), None)];

    while let Some((node, owner)) = stack.pop() {
        let mut owner_for_children = owner.clone();

        match node.kind() {
            "struct_item" => {
                if let Some(name) = node.child_by_field_name("name") {
                    push_symbol(out, code, node, text(code, name), "struct");
                }
            }
            "enum_item" => {
                if let Some(name) = node.child_by_field_name("name") {
                    push_symbol(out, code, node, text(code, name), "enum");
                }
            }
            "trait_item" => {
                if let Some(name) = node.child_by_field_name("name") {
                    push_symbol(out, code, node, text(code, name), "interface");
                }
            }
            "impl_item" => {
                if let Some(tnode) = node.child_by_field_name("type") {
                    owner_for_children = Some(text(code, tnode));
                }
            }
            "function_item" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let kind = if owner.is_some() { "method" } else { "function" };
                    push_symbol(out, code, node, text(code, name), kind);
                }
            }
            "use_declaration" => {
                if let Some(arg) = node.child_by_field_name("argument") {
                    let path = text(code, arg);
                    // `use a::b::{c, d}` → keep the stable prefix
                    let prefix = path.split('{').next().unwrap_or(&path);
                    let name = prefix.trim().trim_end_matches("::").to_string();
                    push_ref(out, node, name, RefKind::Import);
                }
            }
            "call_expression" => {
                if let Some(f) = node.child_by_field_name("function") {
                    if let Some(name) = callee_name(code, f) {
                        push_ref(out, node, name, RefKind::Call);
                    }
                }
            }
            _ => {}
        }

        let mut w = node.walk();
        for c in node.children(&mut w) {
            stack.push((c, owner_for_children.clone()));
        }
    }
}

/// Last path segment of the callee: `a::b::f` → `f`, `x.method` → `method`.
fn callee_name(code: &str, f: Node) -> Option<String> {
    match f.kind() {
        "identifier" => Some(text(code, f)),
        "scoped_identifier" => f.child_by_field_name("name").map(|n| text(code, n)),
        "field_expression" => f.child_by_field_name("field").map(|n| text(code, n)),
        "generic_function" => f
            .child_by_field_name("function")
            .and_then(|inner| callee_name(code, inner)),
        _ => None,
    }
}

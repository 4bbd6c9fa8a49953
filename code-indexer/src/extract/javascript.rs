//! JavaScript/JSX walker. The productions mirror the TypeScript walker minus
//! the type declarations; the grammar differs, so it gets its own entry.

use tree_sitter::{Node, Tree};

use store::RefKind;

use super::typescript::exported_names;
use super::{first_string_literal, push_ref, push_symbol, text, Extraction};

pub fn walk(tree: &Tree, code: &str, out: &mut Extraction) {
    let mut stack: Vec<(Node, Option<String>)> = vec![(tree.root_node(), None)];

    while let Some((node, owner)) = stack.pop() {
        let mut owner_for_children = owner.clone();

        match node.kind() {
            "class_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let cls = text(code, name);
                    push_symbol(out, code, node, cls.clone(), "class");
                    owner_for_children = Some(cls);
                }
            }
            "function_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let kind = if owner.is_some() { "method" } else { "function" };
                    push_symbol(out, code, node, text(code, name), kind);
                }
            }
            "method_definition" => {
                if let Some(name) = node.child_by_field_name("name") {
                    push_symbol(out, code, node, text(code, name), "method");
                }
            }
            "variable_declarator" => {
                if let (Some(name), Some(value)) = (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("value"),
                ) {
                    if matches!(value.kind(), "arrow_function" | "function_expression") {
                        push_symbol(out, code, node, text(code, name), "function");
                    }
                }
            }
            "import_statement" => {
                if let Some(source) = first_string_literal(node, code) {
                    push_ref(out, node, source, RefKind::Import);
                }
            }
            "export_statement" => {
                for name in exported_names(node, code) {
                    push_ref(out, node, name, RefKind::Export);
                }
            }
            "call_expression" => {
                if let Some(f) = node.child_by_field_name("function") {
                    let name = match f.kind() {
                        "identifier" => Some(text(code, f)),
                        "member_expression" => {
                            f.child_by_field_name("property").map(|n| text(code, n))
                        }
                        _ => None,
                    };
                    if let Some(name) = name {
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

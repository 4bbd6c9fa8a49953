//! TypeScript/TSX walker: classes, interfaces, enums, functions (including
//! named arrow functions), methods, imports, exports, calls.

use tree_sitter::{Node, Tree};

use store::RefKind;

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
            "interface_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    push_symbol(out, code, node, text(code, name), "interface");
                }
            }
            "enum_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    push_symbol(out, code, node, text(code, name), "enum");
                }
            }
            "function_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let kind = if owner.is_some() { "method" } else { "function" };
                    push_symbol(out, code, node, text(code, name), kind);
                }
            }
            "method_definition" => {
                if let Some(name) = method_name(node) {
                    push_symbol(out, code, node, text(code, name), "method");
                }
            }
            // const foo = () => {} | function () {}
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

fn method_name(node: Node) -> Option<Node> {
    if let Some(n) = node.child_by_field_name("name") {
        return Some(n);
    }
    let mut w = node.walk();
    node.children(&mut w)
        .find(|c| matches!(c.kind(), "property_identifier" | "private_property_identifier"))
}

/// Names introduced by an export statement: the declared symbol for
/// `export function f` / `export class C`, or each alias in `export { a, b }`.
pub(crate) fn exported_names(node: Node, code: &str) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(decl) = node.child_by_field_name("declaration") {
        if let Some(n) = decl.child_by_field_name("name") {
            names.push(text(code, n));
        } else if decl.kind() == "lexical_declaration" {
            let mut w = decl.walk();
            for c in decl.children(&mut w) {
                if c.kind() == "variable_declarator" {
                    if let Some(n) = c.child_by_field_name("name") {
                        names.push(text(code, n));
                    }
                }
            }
        }
        return names;
    }
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if n.kind() == "export_specifier" {
            if let Some(name) = n.child_by_field_name("name") {
                names.push(text(code, name));
            }
            continue;
        }
        let mut w = n.walk();
        for c in n.children(&mut w) {
            stack.push(c);
        }
    }
    names
}

//! Python walker: classes, functions/methods, imports, calls.

use tree_sitter::{Node, Tree};

use store::RefKind;

use super::{push_ref, push_symbol, text, Extraction};

pub fn walk(tree: &Tree, code: &str, out: &mut Extraction) {
    let mut stack: Vec<(Node, Option<String>)> = vec![(tree.root_node(), None)];

    while let Some((node, owner)) = stack.pop() {
        let mut owner_for_children = owner.clone();

        match node.kind() {
            "class_definition" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let cls = text(code, name);
                    push_symbol(out, code, node, cls.clone(), "class");
                    owner_for_children = Some(cls);
                }
            }
            "function_definition" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let kind = if owner.is_some() { "method" } else { "function" };
                    push_symbol(out, code, node, text(code, name), kind);
                }
            }
            "import_statement" => {
                // `import a.b, c` → one ref per dotted name
                let mut w = node.walk();
                for c in node.children(&mut w) {
                    match c.kind() {
                        "dotted_name" => push_ref(out, node, text(code, c), RefKind::Import),
                        "aliased_import" => {
                            if let Some(n) = c.child_by_field_name("name") {
                                push_ref(out, node, text(code, n), RefKind::Import);
                            }
                        }
                        _ => {}
                    }
                }
            }
            "import_from_statement" => {
                if let Some(module) = node.child_by_field_name("module_name") {
                    push_ref(out, node, text(code, module), RefKind::Import);
                }
            }
            "call" => {
                if let Some(f) = node.child_by_field_name("function") {
                    let name = match f.kind() {
                        "identifier" => Some(text(code, f)),
                        "attribute" => f.child_by_field_name("attribute").map(|n| text(code, n)),
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

//! Graph builder behavior over a small indexed fixture.

use code_graph::{build_graph, CodeGraph, EdgeType};
use store::{
    BundleRef, BundleSymbol, FileBundle, GraphNodeType, RefKind, RepoUpsert, Store,
};

fn seed_repo(store: &Store) -> i64 {
    let provider_id = store.upsert_provider("github", "https://api.github.com").unwrap();
    store
        .upsert_repo(&RepoUpsert {
            provider_id,
            external_id: "1".into(),
            owner: "acme".into(),
            name: "widgets".into(),
            full_name: "acme/widgets".into(),
            default_branch: "main".into(),
        })
        .unwrap()
        .id
}

fn bundle(path: &str, symbols: Vec<BundleSymbol>, refs: Vec<BundleRef>) -> FileBundle {
    FileBundle {
        path: path.into(),
        language: Some("typescript".into()),
        content_hash: format!("hash-{path}"),
        size: 100,
        is_pattern: false,
        symbols,
        refs,
        embeddings: vec![],
    }
}

fn sym(name: &str, kind: &str, start: i64, end: i64) -> BundleSymbol {
    BundleSymbol {
        name: name.into(),
        kind: kind.into(),
        start_line: start,
        end_line: end,
        signature: format!("{kind} {name}"),
        hash: String::new(),
    }
}

fn reference(name: &str, line: i64, kind: RefKind) -> BundleRef {
    BundleRef {
        ref_name: name.into(),
        line,
        kind,
    }
}

/// `src/app.ts` imports `./util` and calls `helper` (declared in util) three
/// times; `src/util.ts` exports `helper`.
fn build_fixture(store: &Store, repo_id: i64) {
    store
        .replace_file_bundle(
            repo_id,
            &bundle(
                "src/app.ts",
                vec![sym("App", "class", 3, 30), sym("boot", "method", 5, 12)],
                vec![
                    reference("./util", 1, RefKind::Import),
                    reference("helper", 6, RefKind::Call),
                    reference("helper", 8, RefKind::Call),
                    reference("react", 2, RefKind::Import),
                ],
            ),
        )
        .unwrap();
    store
        .replace_file_bundle(
            repo_id,
            &bundle(
                "src/util.ts",
                vec![sym("helper", "function", 1, 9)],
                vec![reference("helper", 1, RefKind::Export)],
            ),
        )
        .unwrap();
}

#[test]
fn builds_nodes_edges_and_promotions() {
    let store = Store::in_memory().unwrap();
    let repo_id = seed_repo(&store);
    build_fixture(&store, repo_id);

    let summary = build_graph(&store, repo_id).unwrap();
    assert!(summary.nodes >= 6); // 2 files, 1 dir, 1 module, 3 symbols, 1 external
    assert_eq!(summary.promoted_deps, 1); // helper called twice → promoted dep

    let graph = CodeGraph::load(&store, repo_id).unwrap();
    let app = graph.file("src/app.ts").expect("file node");
    let util = graph.file("src/util.ts").expect("file node");

    // Import produced a direct file_dep app → util.
    let neighbors = graph.neighbors(app);
    assert!(neighbors
        .iter()
        .any(|n| n.target == util && n.edge_type == EdgeType::FileDep));

    // Unresolved `react` import became an external node.
    assert!(graph.find(GraphNodeType::External, "react").is_some());

    // Directory and module containers exist.
    assert!(graph.find(GraphNodeType::Directory, "src").is_some());
    assert!(graph.find(GraphNodeType::Module, "src").is_some());

    // The promoted inferred dep is visible in the dep-edge listing.
    let deps = graph.file_dep_edges();
    assert!(deps
        .iter()
        .any(|(f, t, attrs)| *f == app && *t == util && attrs.source.as_deref() == Some("inferred")));
    // And the raw inferred edge carries a call example with its line.
    assert!(deps.iter().any(|(_, _, attrs)| {
        attrs.edge_type == EdgeType::FileDepInferred
            && attrs.examples.iter().any(|e| e.starts_with("helper@L"))
    }));
}

#[test]
fn containment_uses_class_variant_and_spans() {
    let store = Store::in_memory().unwrap();
    let repo_id = seed_repo(&store);
    build_fixture(&store, repo_id);
    build_graph(&store, repo_id).unwrap();

    let graph = CodeGraph::load(&store, repo_id).unwrap();
    let spans = graph.symbols_in_file("src/app.ts");
    assert_eq!(spans.len(), 2);

    // `boot` (5..12) nests inside class `App` (3..30).
    let class_ix = graph
        .find(GraphNodeType::Symbol, "src/app.ts#App@3")
        .unwrap();
    let method_ix = graph
        .find(GraphNodeType::Symbol, "src/app.ts#boot@5")
        .unwrap();
    let out = graph.neighbors(class_ix);
    assert!(out
        .iter()
        .any(|n| n.target == method_ix && n.edge_type == EdgeType::ClassContainsSymbol));
}

#[test]
fn rebuild_replaces_prior_graph() {
    let store = Store::in_memory().unwrap();
    let repo_id = seed_repo(&store);
    build_fixture(&store, repo_id);
    build_graph(&store, repo_id).unwrap();
    let first = store.load_graph_nodes(repo_id).unwrap().len();

    build_graph(&store, repo_id).unwrap();
    let second = store.load_graph_nodes(repo_id).unwrap().len();
    assert_eq!(first, second);
}

//! End-to-end persistence round trips over an in-memory database.

use store::{
    BundleEmbedding, BundleRef, BundleSymbol, CommentKind, EmbeddingKind, FileBundle,
    FindingStatus, FindingUpdate, NewFinding, NewGraphEdge, NewGraphNode, GraphNodeType,
    PullRequestUpsert, RefKind, RepoUpsert, RunJsonColumn, RunStatus, Store,
};

fn seed_repo(store: &Store) -> (i64, i64) {
    let provider_id = store.upsert_provider("github", "https://api.github.com").unwrap();
    let repo = store
        .upsert_repo(&RepoUpsert {
            provider_id,
            external_id: "4242".into(),
            owner: "acme".into(),
            name: "widgets".into(),
            full_name: "acme/widgets".into(),
            default_branch: "main".into(),
        })
        .unwrap();
    let pr = store
        .upsert_pull_request(&PullRequestUpsert {
            repo_id: repo.id,
            number: 7,
            external_id: "pr-7".into(),
            title: "Add null check".into(),
            body: String::new(),
            state: "open".into(),
            base_ref: "main".into(),
            head_ref: "fix/null".into(),
            base_sha: "a".repeat(40),
            head_sha: "b".repeat(40),
            draft: false,
            author_id: None,
        })
        .unwrap();
    (repo.id, pr.id)
}

#[test]
fn pull_request_upsert_is_keyed_by_repo_and_number() {
    let store = Store::in_memory().unwrap();
    let (repo_id, pr_id) = seed_repo(&store);

    let again = store
        .upsert_pull_request(&PullRequestUpsert {
            repo_id,
            number: 7,
            external_id: "pr-7".into(),
            title: "Add null check (v2)".into(),
            body: "updated".into(),
            state: "open".into(),
            base_ref: "main".into(),
            head_ref: "fix/null".into(),
            base_sha: "a".repeat(40),
            head_sha: "c".repeat(40),
            draft: false,
            author_id: None,
        })
        .unwrap();

    assert_eq!(again.id, pr_id);
    assert_eq!(again.title, "Add null check (v2)");
    assert_eq!(again.head_sha, "c".repeat(40));
}

#[test]
fn run_lifecycle_and_stage_json() {
    let store = Store::in_memory().unwrap();
    let (_, pr_id) = seed_repo(&store);

    let run = store.create_run(pr_id, &"b".repeat(40), "webhook").unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert!(!store.completed_run_exists(pr_id, &"b".repeat(40)).unwrap());

    store
        .set_run_json(run.id, RunJsonColumn::Draft, r#"{"comments":[]}"#)
        .unwrap();
    store.finish_run(run.id, RunStatus::Completed).unwrap();

    let reread = store.get_run(run.id).unwrap();
    assert_eq!(reread.status, RunStatus::Completed);
    assert_eq!(reread.draft_json.as_deref(), Some(r#"{"comments":[]}"#));
    assert!(reread.completed_at.is_some());
    assert!(store.completed_run_exists(pr_id, &"b".repeat(40)).unwrap());

    let latest = store.latest_completed_run(pr_id).unwrap().unwrap();
    assert_eq!(latest.id, run.id);
}

#[test]
fn finding_update_keeps_first_seen_run() {
    let store = Store::in_memory().unwrap();
    let (_, pr_id) = seed_repo(&store);
    let run1 = store.create_run(pr_id, "sha1", "webhook").unwrap();

    let finding = store
        .insert_finding(&NewFinding {
            pull_request_id: pr_id,
            run_id: run1.id,
            fingerprint: "fp".into(),
            hunk_hash: "hh".into(),
            context_hash: "ch".into(),
            comment_key: "key".into(),
            path: "src/foo.ts".into(),
            line: 42,
            side: "RIGHT".into(),
            severity: "blocking".into(),
            category: "bug".into(),
            title: "Possible null deref".into(),
            body: "…".into(),
            evidence: "foo".into(),
            suggested_patch: None,
            rule_id: None,
            comment_type: CommentKind::Inline,
        })
        .unwrap();
    assert_eq!(finding.status, FindingStatus::Open);
    assert_eq!(finding.comment_type, CommentKind::Inline);

    let run2 = store.create_run(pr_id, "sha2", "webhook").unwrap();
    store
        .update_matched_finding(
            finding.id,
            run2.id,
            &FindingUpdate {
                line: 47,
                side: "RIGHT".into(),
                severity: "important".into(),
                body: "new body".into(),
                evidence: "foo".into(),
                suggested_patch: Some("patch".into()),
                rule_id: None,
                hunk_hash: "hh2".into(),
                context_hash: "ch2".into(),
                comment_type: CommentKind::Summary,
            },
        )
        .unwrap();

    let reread = store.get_finding(finding.id).unwrap();
    assert_eq!(reread.run_id, run1.id);
    assert_eq!(reread.last_seen_run_id, run2.id);
    assert_eq!(reread.line, 47);
    assert_eq!(reread.severity, "important");
    assert_eq!(reread.comment_type, CommentKind::Summary);

    store
        .set_finding_status(finding.id, FindingStatus::Fixed)
        .unwrap();
    assert!(store.open_findings_for_pr(pr_id).unwrap().is_empty());
}

#[test]
fn file_bundle_replacement_is_atomic_per_path() {
    let store = Store::in_memory().unwrap();
    let (repo_id, _) = seed_repo(&store);

    let bundle = FileBundle {
        path: "src/lib.rs".into(),
        language: Some("rust".into()),
        content_hash: "h1".into(),
        size: 120,
        is_pattern: false,
        symbols: vec![BundleSymbol {
            name: "parse".into(),
            kind: "function".into(),
            start_line: 1,
            end_line: 10,
            signature: "fn parse()".into(),
            hash: "s1".into(),
        }],
        refs: vec![BundleRef {
            ref_name: "serde_json".into(),
            line: 1,
            kind: RefKind::Import,
        }],
        embeddings: vec![
            BundleEmbedding {
                kind: EmbeddingKind::File,
                symbol_index: None,
                vector: vec![1.0, 0.0],
                text: "src/lib.rs".into(),
            },
            BundleEmbedding {
                kind: EmbeddingKind::Symbol,
                symbol_index: Some(0),
                vector: vec![0.0, 1.0],
                text: "parse fn parse()".into(),
            },
        ],
    };
    store.replace_file_bundle(repo_id, &bundle).unwrap();
    store.replace_file_bundle(repo_id, &bundle).unwrap();

    let files = store.list_files(repo_id).unwrap();
    assert_eq!(files.len(), 1);
    let symbols = store.symbols_for_repo(repo_id).unwrap();
    assert_eq!(symbols.len(), 1);

    let page = store.page_embeddings(repo_id, None, 10).unwrap();
    assert_eq!(page.len(), 2);
    // Descending id order.
    assert!(page[0].id > page[1].id);
    let symbol_emb = page
        .iter()
        .find(|e| e.kind == EmbeddingKind::Symbol)
        .unwrap();
    assert_eq!(symbol_emb.symbol_name.as_deref(), Some("parse"));
    assert_eq!(symbol_emb.path.as_deref(), Some("src/lib.rs"));
    assert_eq!(symbol_emb.vector, vec![0.0, 1.0]);
}

#[test]
fn graph_replace_drops_prior_rows() {
    let store = Store::in_memory().unwrap();
    let (repo_id, _) = seed_repo(&store);

    let nodes = vec![
        NewGraphNode {
            node_type: GraphNodeType::File,
            key: "src/a.rs".into(),
            file_id: None,
            symbol_id: None,
            data: serde_json::json!({}),
        },
        NewGraphNode {
            node_type: GraphNodeType::File,
            key: "src/b.rs".into(),
            file_id: None,
            symbol_id: None,
            data: serde_json::json!({}),
        },
    ];
    let edges = vec![NewGraphEdge {
        from_index: 0,
        to_index: 1,
        edge_type: "file_dep".into(),
        weight: 2,
        examples: vec!["use b".into()],
        source: None,
    }];
    store.replace_graph(repo_id, &nodes, &edges).unwrap();
    store.replace_graph(repo_id, &nodes, &edges).unwrap();

    assert_eq!(store.load_graph_nodes(repo_id).unwrap().len(), 2);
    let loaded = store.load_graph_edges(repo_id).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].weight, 2);
    assert_eq!(loaded[0].examples, vec!["use b".to_string()]);
}

#[test]
fn summary_comment_upsert_is_idempotent() {
    let store = Store::in_memory().unwrap();
    let (_, pr_id) = seed_repo(&store);

    store
        .upsert_review_comment(pr_id, None, CommentKind::Summary, "c-1", "first", None)
        .unwrap();
    store
        .upsert_review_comment(pr_id, None, CommentKind::Summary, "c-1", "second", None)
        .unwrap();

    let summary = store.find_summary_comment(pr_id).unwrap().unwrap();
    assert_eq!(summary.body, "second");
    assert_eq!(summary.provider_comment_id, "c-1");
}

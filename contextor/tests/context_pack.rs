//! Context pack assembly over an indexed fixture with the hash embedder.

use code_graph::build_graph;
use code_indexer::embedding::EmbeddingClient;
use contextor::{build_context_pack, ContextConfig, ContextRequest};
use diff_index::DiffIndex;
use store::{
    BundleEmbedding, BundleRef, BundleSymbol, CommentKind, EmbeddingKind, FileBundle, NewFinding,
    RefKind, RepoUpsert, PullRequestUpsert, Store,
};

const DIFF: &str = "\
diff --git a/src/app.ts b/src/app.ts
--- a/src/app.ts
+++ b/src/app.ts
@@ -4,6 +4,7 @@ export class App {
   boot() {
     const user = helper();
+    if (user == null) return;
     render(user);
   }
 }
";

async fn embed(client: &EmbeddingClient, text: &str) -> Vec<f32> {
    client.embed_one(text).await.unwrap()
}

async fn fixture(store: &Store) -> i64 {
    let provider_id = store.upsert_provider("github", "https://api.github.com").unwrap();
    let repo = store
        .upsert_repo(&RepoUpsert {
            provider_id,
            external_id: "1".into(),
            owner: "acme".into(),
            name: "widgets".into(),
            full_name: "acme/widgets".into(),
            default_branch: "main".into(),
        })
        .unwrap();

    let client = EmbeddingClient::Hash;
    let files: Vec<(&str, Vec<BundleSymbol>, Vec<BundleRef>, &str)> = vec![
        (
            "src/app.ts",
            vec![
                BundleSymbol {
                    name: "App".into(),
                    kind: "class".into(),
                    start_line: 3,
                    end_line: 9,
                    signature: "export class App".into(),
                    hash: String::new(),
                },
                BundleSymbol {
                    name: "boot".into(),
                    kind: "method".into(),
                    start_line: 4,
                    end_line: 8,
                    signature: "boot()".into(),
                    hash: String::new(),
                },
            ],
            vec![
                BundleRef {
                    ref_name: "./util".into(),
                    line: 1,
                    kind: RefKind::Import,
                },
                BundleRef {
                    ref_name: "helper".into(),
                    line: 5,
                    kind: RefKind::Call,
                },
            ],
            "app boot renders the current user",
        ),
        (
            "src/util.ts",
            vec![BundleSymbol {
                name: "helper".into(),
                kind: "function".into(),
                start_line: 1,
                end_line: 6,
                signature: "export function helper()".into(),
                hash: String::new(),
            }],
            vec![],
            "helper returns the current user or null",
        ),
        (
            "src/render.ts",
            vec![BundleSymbol {
                name: "render".into(),
                kind: "function".into(),
                start_line: 1,
                end_line: 4,
                signature: "export function render(user)".into(),
                hash: String::new(),
            }],
            vec![],
            "render prints a user to the page",
        ),
    ];

    for (path, symbols, refs, text) in files {
        let file_vec = embed(&client, &format!("{path}\n{text}")).await;
        let mut embeddings = vec![BundleEmbedding {
            kind: EmbeddingKind::File,
            symbol_index: None,
            vector: file_vec,
            text: format!("{path}\n{text}"),
        }];
        for (i, s) in symbols.iter().enumerate() {
            embeddings.push(BundleEmbedding {
                kind: EmbeddingKind::Symbol,
                symbol_index: Some(i),
                vector: embed(&client, &format!("{} {}", s.name, s.signature)).await,
                text: format!("{} {}", s.name, s.signature),
            });
        }
        store
            .replace_file_bundle(
                repo.id,
                &FileBundle {
                    path: path.into(),
                    language: Some("typescript".into()),
                    content_hash: format!("h-{path}"),
                    size: 64,
                    is_pattern: false,
                    symbols,
                    refs,
                    embeddings,
                },
            )
            .unwrap();
    }

    build_graph(store, repo.id).unwrap();
    repo.id
}

#[tokio::test]
async fn pack_respects_budgets_and_finds_related_files() {
    let store = Store::in_memory().unwrap();
    let repo_id = fixture(&store).await;

    let diff = DiffIndex::parse(DIFF);
    let changed = diff.file_stats();
    let cfg = ContextConfig::default();
    let embedder = EmbeddingClient::Hash;

    let pack = build_context_pack(
        &store,
        &embedder,
        ContextRequest {
            repo_id,
            diff: &diff,
            diff_text: DIFF,
            changed: &changed,
            pr_title: Some("Handle null user in boot"),
            pr_body: Some("helper can return null"),
            prior_findings: &[],
        },
        &cfg,
    )
    .await
    .unwrap();

    // Budgets hold.
    assert!(pack.related_files.len() <= cfg.graph.max_related_files);
    assert!(pack.graph_links.len() <= cfg.graph.max_graph_links);
    assert!(pack.graph_debug.visited_nodes <= cfg.graph.max_nodes_visited);
    assert!(pack.graph_debug.seeds > 0);

    // The imported dependency is surfaced as related, not the changed file.
    let related_paths: Vec<&str> = pack.related_files.iter().map(|r| r.path.as_str()).collect();
    assert!(related_paths.contains(&"src/util.ts"));
    assert!(!related_paths.contains(&"src/app.ts"));

    // Retrieval found something and the query carries PR signal.
    assert!(!pack.retrieved.is_empty());
    assert!(pack.query.contains("Handle null user in boot"));
    assert!(pack.changed_file_stats.len() == 1);
}

#[tokio::test]
async fn hotspots_and_focus_reflect_prior_findings() {
    let store = Store::in_memory().unwrap();
    let repo_id = fixture(&store).await;

    let pr = store
        .upsert_pull_request(&PullRequestUpsert {
            repo_id,
            number: 1,
            external_id: "x".into(),
            title: "t".into(),
            body: String::new(),
            state: "open".into(),
            base_ref: "main".into(),
            head_ref: "h".into(),
            base_sha: "a".repeat(40),
            head_sha: "b".repeat(40),
            draft: false,
            author_id: None,
        })
        .unwrap();
    let run = store.create_run(pr.id, &"b".repeat(40), "webhook").unwrap();
    store
        .insert_finding(&NewFinding {
            pull_request_id: pr.id,
            run_id: run.id,
            fingerprint: "fp".into(),
            hunk_hash: "hh".into(),
            context_hash: "ch".into(),
            comment_key: "k".into(),
            path: "src/util.ts".into(),
            line: 2,
            side: "RIGHT".into(),
            severity: "important".into(),
            category: "bug".into(),
            title: "helper may return null".into(),
            body: "…".into(),
            evidence: "return null".into(),
            suggested_patch: None,
            rule_id: None,
            comment_type: CommentKind::Inline,
        })
        .unwrap();

    let prior = store.findings_for_pr(pr.id).unwrap();
    let diff = DiffIndex::parse(DIFF);
    let changed = diff.file_stats();
    let embedder = EmbeddingClient::Hash;

    let pack = build_context_pack(
        &store,
        &embedder,
        ContextRequest {
            repo_id,
            diff: &diff,
            diff_text: DIFF,
            changed: &changed,
            pr_title: None,
            pr_body: None,
            prior_findings: &prior,
        },
        &ContextConfig::default(),
    )
    .await
    .unwrap();

    let hotspot = pack
        .hotspots
        .iter()
        .find(|h| h.path == "src/util.ts")
        .expect("hotspot for util");
    assert_eq!(hotspot.open_findings, 1);
    assert_eq!(hotspot.top_categories, vec!["bug".to_string()]);

    assert!(pack
        .review_focus
        .iter()
        .any(|f| f.contains("src/util.ts") && f.contains("open finding")));
    assert!(pack.review_focus.len() <= 14);
}

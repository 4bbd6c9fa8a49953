//! Indexing a synthetic checkout end to end with the hash embedder.

use std::fs;

use code_indexer::embedding::EmbeddingClient;
use code_indexer::{index_repo, IndexOptions};
use store::{RefKind, RepoUpsert, Store};

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

const TS_FILE: &str = r#"
import { helper } from "./util";

export function handle(input: string): string {
    return helper(input);
}

export class Runner {
    run(): void {
        handle("x");
    }
}
"#;

const RS_FILE: &str = r#"
use crate::parsing;

pub struct Config {
    pub depth: usize,
}

impl Config {
    pub fn load(path: &str) -> Self {
        parsing::read(path)
    }
}

pub fn resolve(cfg: &Config) -> usize {
    cfg.depth
}
"#;

#[tokio::test]
async fn indexes_symbols_refs_and_embeddings() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/app.ts"), TS_FILE).unwrap();
    fs::write(dir.path().join("src/config.rs"), RS_FILE).unwrap();
    fs::write(dir.path().join("notes.txt"), "free-form notes").unwrap();

    let store = Store::in_memory().unwrap();
    let repo_id = seed_repo(&store);
    let embedder = EmbeddingClient::Hash;

    let summary = index_repo(&store, repo_id, dir.path(), &embedder, &IndexOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.files_indexed, 3);
    assert_eq!(summary.files_skipped, 0);

    let symbols = store.symbols_for_repo(repo_id).unwrap();
    let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"handle"));
    assert!(names.contains(&"Runner"));
    assert!(names.contains(&"Config"));
    assert!(names.contains(&"resolve"));

    // Methods carry their own kind.
    let run = symbols.iter().find(|s| s.name == "run").unwrap();
    assert_eq!(run.kind, "method");
    let load = symbols.iter().find(|s| s.name == "load").unwrap();
    assert_eq!(load.kind, "method");

    let refs = store.refs_for_repo(repo_id).unwrap();
    assert!(refs
        .iter()
        .any(|r| r.kind == RefKind::Import && r.ref_name == "./util"));
    assert!(refs
        .iter()
        .any(|r| r.kind == RefKind::Export && r.ref_name == "handle"));
    assert!(refs
        .iter()
        .any(|r| r.kind == RefKind::Call && r.ref_name == "helper"));

    // One file embedding per file, plus symbol and chunk embeddings.
    let page = store.page_embeddings(repo_id, None, 1000).unwrap();
    let file_embeddings = page
        .iter()
        .filter(|e| e.kind == store::EmbeddingKind::File)
        .count();
    assert_eq!(file_embeddings, 3);
    assert!(page.len() > 3);
}

#[tokio::test]
async fn unchanged_files_are_not_reindexed() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lib.rs"), RS_FILE).unwrap();

    let store = Store::in_memory().unwrap();
    let repo_id = seed_repo(&store);
    let embedder = EmbeddingClient::Hash;
    let opts = IndexOptions::default();

    let first = index_repo(&store, repo_id, dir.path(), &embedder, &opts)
        .await
        .unwrap();
    assert_eq!(first.files_indexed, 1);

    let second = index_repo(&store, repo_id, dir.path(), &embedder, &opts)
        .await
        .unwrap();
    assert_eq!(second.files_indexed, 0);
    assert_eq!(second.files_unchanged, 1);

    // force re-embeds regardless.
    let forced = IndexOptions {
        force: true,
        ..IndexOptions::default()
    };
    let third = index_repo(&store, repo_id, dir.path(), &embedder, &forced)
        .await
        .unwrap();
    assert_eq!(third.files_indexed, 1);
}

#[tokio::test]
async fn removed_and_binary_files_are_handled() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("keep.rs"), RS_FILE).unwrap();
    fs::write(dir.path().join("gone.rs"), "pub fn gone() {}").unwrap();
    fs::write(dir.path().join("blob.bin"), [0u8, 159, 146, 150]).unwrap();

    let store = Store::in_memory().unwrap();
    let repo_id = seed_repo(&store);
    let embedder = EmbeddingClient::Hash;
    let opts = IndexOptions::default();

    let first = index_repo(&store, repo_id, dir.path(), &embedder, &opts)
        .await
        .unwrap();
    assert_eq!(first.files_indexed, 2);
    assert_eq!(first.files_skipped, 1); // NUL byte gate

    fs::remove_file(dir.path().join("gone.rs")).unwrap();
    let second = index_repo(&store, repo_id, dir.path(), &embedder, &opts)
        .await
        .unwrap();
    assert_eq!(second.files_removed, 1);

    let files = store.list_files(repo_id).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "keep.rs");
}

//! Checkout lifecycle against a local origin repository.

use std::path::Path;

use repo_store::{git::run_git, RepoStore};

async fn init_origin(dir: &Path) -> String {
    run_git(dir, &["init", "--initial-branch=main", "."]).await.unwrap();
    run_git(dir, &["config", "user.email", "test@example.com"]).await.unwrap();
    run_git(dir, &["config", "user.name", "Test"]).await.unwrap();
    std::fs::write(dir.join("lib.rs"), "pub fn v1() {}\n").unwrap();
    run_git(dir, &["add", "."]).await.unwrap();
    run_git(dir, &["commit", "-m", "initial"]).await.unwrap();
    run_git(dir, &["rev-parse", "HEAD"]).await.unwrap()
}

#[tokio::test]
async fn creates_detached_worktree_at_sha() {
    let origin = tempfile::tempdir().unwrap();
    let sha = init_origin(origin.path()).await;

    let root = tempfile::tempdir().unwrap();
    let store = RepoStore::new(root.path());
    let url = origin.path().to_str().unwrap().to_string();

    let worktree = store
        .ensure_checkout("acme", "widgets", &sha, &url)
        .await
        .unwrap();
    assert!(worktree.join("lib.rs").exists());
    assert!(worktree
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with(&format!("{sha}-")));

    // A second call reuses the clone and makes another worktree.
    let worktree2 = store
        .ensure_checkout("acme", "widgets", &sha, &url)
        .await
        .unwrap();
    assert_ne!(worktree, worktree2);
    assert!(worktree2.join("lib.rs").exists());
}

#[tokio::test]
async fn local_diff_and_commit_subject() {
    let origin = tempfile::tempdir().unwrap();
    let base_sha = init_origin(origin.path()).await;

    std::fs::write(origin.path().join("lib.rs"), "pub fn v2() {}\n").unwrap();
    run_git(origin.path(), &["add", "."]).await.unwrap();
    run_git(origin.path(), &["commit", "-m", "Apply suggestion from review"])
        .await
        .unwrap();
    let head_sha = run_git(origin.path(), &["rev-parse", "HEAD"]).await.unwrap();

    let root = tempfile::tempdir().unwrap();
    let store = RepoStore::new(root.path());
    let url = origin.path().to_str().unwrap().to_string();
    store
        .ensure_checkout("acme", "widgets", &head_sha, &url)
        .await
        .unwrap();

    let diff = store
        .local_diff("acme", "widgets", &base_sha, &head_sha)
        .await
        .unwrap();
    assert!(diff.contains("-pub fn v1() {}"));
    assert!(diff.contains("+pub fn v2() {}"));

    let subject = store
        .commit_subject("acme", "widgets", &head_sha)
        .await
        .unwrap();
    assert_eq!(subject, "Apply suggestion from review");
}

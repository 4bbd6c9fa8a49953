//! Full pipeline runs against a local git origin, the in-memory forge, and
//! canned stage outputs.

use std::path::Path;

use serde_json::json;

use code_indexer::embedding::EmbeddingClient;
use forge_client::{CheckConclusion, ForgeState, MemoryForge, RemotePullRequest, RemoteUser};
use pr_reviewer::{run_review_job, ForgeFactory, ReviewDeps, ReviewEnv};
use repo_store::{git::run_git, RepoStore};
use scheduler::{QueueSet, ReviewJob};
use stage_runner::{Stage, StageRunner, StaticStages};
use store::{PullRequestUpsert, RepoUpsert, Store};

fn base_file() -> String {
    let mut lines: Vec<String> = (1..=40).map(|i| format!("// filler {i:02}")).collect();
    lines.push("const user = lookup(parsed);".to_string()); // line 41
    lines.push("return user.name;".to_string()); // line 42
    lines.extend((43..=50).map(|i| format!("// filler {i:02}")));
    lines.join("\n") + "\n"
}

fn fixed_file() -> String {
    let mut lines: Vec<String> = (1..=40).map(|i| format!("// filler {i:02}")).collect();
    lines.push("const user = lookup(parsed);".to_string());
    lines.push("if (user == null) return null;".to_string()); // line 42 added
    lines.push("return user.name;".to_string());
    lines.extend((43..=50).map(|i| format!("// filler {i:02}")));
    lines.join("\n") + "\n"
}

async fn commit_all(dir: &Path, message: &str) -> String {
    run_git(dir, &["add", "."]).await.unwrap();
    run_git(dir, &["commit", "-m", message]).await.unwrap();
    run_git(dir, &["rev-parse", "HEAD"]).await.unwrap()
}

struct Fixture {
    _origin: tempfile::TempDir,
    _root: tempfile::TempDir,
    origin_path: String,
    project_root: std::path::PathBuf,
    store: Store,
    forge: MemoryForge,
    base_sha: String,
    head_sha: String,
    repo_id: i64,
    pr_id: i64,
}

async fn fixture(repo_config: Option<&str>) -> Fixture {
    let origin = tempfile::tempdir().unwrap();
    run_git(origin.path(), &["init", "--initial-branch=main", "."]).await.unwrap();
    run_git(origin.path(), &["config", "user.email", "t@example.com"]).await.unwrap();
    run_git(origin.path(), &["config", "user.name", "T"]).await.unwrap();
    std::fs::create_dir_all(origin.path().join("src")).unwrap();
    std::fs::write(origin.path().join("src/foo.ts"), base_file()).unwrap();
    if let Some(cfg) = repo_config {
        std::fs::write(origin.path().join(".grepiku.json"), cfg).unwrap();
    }
    let base_sha = commit_all(origin.path(), "base").await;

    std::fs::write(origin.path().join("src/foo.ts"), fixed_file()).unwrap();
    let head_sha = commit_all(origin.path(), "add null check").await;

    let store = Store::in_memory().unwrap();
    let provider_id = store.upsert_provider("github", "https://api.github.com").unwrap();
    let repo = store
        .upsert_repo(&RepoUpsert {
            provider_id,
            external_id: "100".into(),
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
            title: "Handle null user".into(),
            body: "Original description.".into(),
            state: "open".into(),
            base_ref: "main".into(),
            head_ref: "fix/null".into(),
            base_sha: base_sha.clone(),
            head_sha: head_sha.clone(),
            draft: false,
            author_id: None,
        })
        .unwrap();

    let forge = MemoryForge::new(ForgeState {
        pull_request: RemotePullRequest {
            external_id: "pr-7".into(),
            number: 7,
            title: "Handle null user".into(),
            body: "Original description.".into(),
            state: "open".into(),
            base_ref: "main".into(),
            head_ref: "fix/null".into(),
            base_sha: base_sha.clone(),
            head_sha: head_sha.clone(),
            draft: false,
            author: RemoteUser {
                external_id: "u1".into(),
                login: "alice".into(),
            },
        },
        ..Default::default()
    });

    let root = tempfile::tempdir().unwrap();
    Fixture {
        origin_path: origin.path().to_str().unwrap().to_string(),
        project_root: root.path().to_path_buf(),
        _origin: origin,
        _root: root,
        store,
        forge,
        base_sha,
        head_sha,
        repo_id: repo.id,
        pr_id: pr.id,
    }
}

fn draft_comment(line: u32) -> serde_json::Value {
    json!({
        "comment_id": "c1",
        "comment_key": "key-c1",
        "path": "src/foo.ts",
        "side": "RIGHT",
        "line": line,
        "severity": "blocking",
        "category": "bug",
        "title": "Possible null deref",
        "body": "`user` can be null here.",
        "evidence": "if (user == null) return null;",
        "suggested_patch": "if (user == null) return null;"
    })
}

fn stages_with_draft(comments: Vec<serde_json::Value>) -> StageRunner {
    StageRunner::Static(
        StaticStages::default()
            .with_stage(
                Stage::Reviewer,
                vec![(
                    "draft_review.json".into(),
                    json!({
                        "summary": { "overview": "Adds a null check.", "risk": "medium", "key_concerns": ["null handling"] },
                        "comments": comments
                    }),
                )],
            )
            .with_stage(
                Stage::Editor,
                vec![
                    (
                        "final_review.json".into(),
                        json!({ "summary": { "overview": "Adds a null check to user lookup.", "risk": "medium" }, "comments": [] }),
                    ),
                    (
                        "verdicts.json".into(),
                        json!({ "verdicts": [{ "comment_id": "c1", "action": "keep" }] }),
                    ),
                ],
            )
            .with_stage(
                Stage::Verifier,
                vec![(
                    "checks.json".into(),
                    json!({
                        "head_sha": "x",
                        "checks": {
                            "lint": { "status": "pass", "summary": "" },
                            "build": { "status": "pass", "summary": "" },
                            "test": { "status": "pass", "summary": "" }
                        }
                    }),
                )],
            ),
    )
}

fn deps_for(fx: &Fixture, runner: StageRunner) -> ReviewDeps {
    let (queues, _r, _c, _i, _a) = QueueSet::new();
    ReviewDeps {
        store: fx.store.clone(),
        repo_store: RepoStore::new(&fx.project_root),
        stage_runner: runner,
        embedder: EmbeddingClient::Hash,
        queues,
        forge: ForgeFactory::Memory(fx.forge.clone()),
        env: ReviewEnv {
            project_root: fx.project_root.clone(),
            bot_login: "grepiku".into(),
            clone_host: "github.com".into(),
            forge_token: "t".into(),
            clone_source_override: Some(fx.origin_path.clone()),
        },
    }
}

fn job(fx: &Fixture, force: bool) -> ReviewJob {
    ReviewJob {
        provider_id: 1,
        installation_id: None,
        repo_id: fx.repo_id,
        pull_request_id: fx.pr_id,
        pr_number: 7,
        head_sha: fx.head_sha.clone(),
        trigger: "webhook".into(),
        force,
        rules_override: None,
    }
}

#[tokio::test]
async fn single_file_fix_posts_one_blocking_finding() {
    let fx = fixture(Some(r#"{ "output": { "destination": "both" } }"#)).await;
    let deps = deps_for(&fx, stages_with_draft(vec![draft_comment(42)]));

    let report = run_review_job(&deps, &job(&fx, false)).await.unwrap();
    assert!(!report.skipped);
    assert_eq!(report.new_findings, 1);
    assert_eq!(report.inline_posted, 1);
    assert_eq!(report.conclusion, Some(CheckConclusion::Failure));

    let state = fx.forge.state();
    assert_eq!(state.inline_comments.len(), 1);
    assert!(state.inline_comments[0].body.contains("<!-- grepiku:"));
    assert_eq!(state.inline_comments[0].line, Some(42));

    // Status comment was upserted over the in-progress placeholder.
    assert_eq!(state.summary_comments.len(), 1);
    assert!(state.summary_comments[0].body.contains("New findings (1)"));

    // PR body gained the summary block.
    assert!(state.pr_body.contains("<!-- grepiku-summary:start -->"));
    assert!(state.pr_body.contains("Original description."));

    // Status check closed as failure (blocking remains, check required).
    let (_, name, conclusion) = state.checks.last().unwrap().clone();
    assert_eq!(name, "Grepiku Review");
    assert_eq!(conclusion.unwrap().0, CheckConclusion::Failure);
}

#[tokio::test]
async fn rerunning_the_same_head_is_idempotent() {
    let fx = fixture(Some(r#"{ "output": { "destination": "both" } }"#)).await;
    let deps = deps_for(&fx, stages_with_draft(vec![draft_comment(42)]));

    run_review_job(&deps, &job(&fx, false)).await.unwrap();
    let body_after_first = fx.forge.state().pr_body.clone();
    let inline_after_first = fx.forge.state().inline_comments.clone();

    // Non-forced duplicate short-circuits.
    let skipped = run_review_job(&deps, &job(&fx, false)).await.unwrap();
    assert!(skipped.skipped);

    // A forced rerun reconciles instead of reposting.
    let deps2 = deps_for(&fx, stages_with_draft(vec![draft_comment(42)]));
    let rerun = run_review_job(&deps2, &job(&fx, true)).await.unwrap();
    assert_eq!(rerun.new_findings, 0);
    assert_eq!(rerun.still_open, 1);
    assert_eq!(rerun.inline_posted, 0);

    let state = fx.forge.state();
    assert_eq!(state.inline_comments.len(), inline_after_first.len());
    assert_eq!(state.inline_comments[0].body, inline_after_first[0].body);
    assert_eq!(state.pr_body, body_after_first);
}

#[tokio::test]
async fn reverted_change_marks_finding_gone_and_resolves_thread() {
    let fx = fixture(None).await;
    let deps = deps_for(&fx, stages_with_draft(vec![draft_comment(42)]));
    run_review_job(&deps, &job(&fx, false)).await.unwrap();
    assert_eq!(fx.store.open_findings_for_pr(fx.pr_id).unwrap().len(), 1);

    // New head reverts the file to its base content: the finding's path
    // drops out of the base...head diff entirely.
    std::fs::write(
        std::path::Path::new(&fx.origin_path).join("src/foo.ts"),
        base_file(),
    )
    .unwrap();
    let head3 = commit_all(std::path::Path::new(&fx.origin_path), "revert").await;
    fx.forge.state().pull_request.head_sha = head3.clone();

    let deps2 = deps_for(
        &fx,
        // No comments this time around.
        stages_with_draft(vec![]),
    );
    let mut j = job(&fx, true);
    j.head_sha = head3;
    let report = run_review_job(&deps2, &j).await.unwrap();

    assert_eq!(report.new_findings, 0);
    assert_eq!(report.obsolete, 1);
    assert_eq!(report.conclusion, Some(CheckConclusion::Success));

    let state = fx.forge.state();
    assert_eq!(state.resolved_threads.len(), 1);
    let last_summary = &state.summary_comments.last().unwrap().body;
    assert!(last_summary.contains("Fixed (1)"));
}

#[tokio::test]
async fn summary_only_mode_posts_no_inline_comments() {
    let fx = fixture(Some(r#"{ "output": { "summaryOnly": true } }"#)).await;
    let deps = deps_for(&fx, stages_with_draft(vec![draft_comment(42)]));

    let report = run_review_job(&deps, &job(&fx, false)).await.unwrap();
    assert_eq!(report.new_findings, 1);
    assert_eq!(report.inline_posted, 0);

    let state = fx.forge.state();
    assert!(state.inline_comments.is_empty());
    let summary = &state.summary_comments.last().unwrap().body;
    assert!(summary.contains("Possible null deref"));
}

#[tokio::test]
async fn off_diff_findings_surface_in_summary_not_inline() {
    let fx = fixture(None).await;
    // Draft anchored far outside any hunk of the diff.
    let deps = deps_for(&fx, stages_with_draft(vec![draft_comment(500)]));

    let report = run_review_job(&deps, &job(&fx, false)).await.unwrap();
    assert_eq!(report.new_findings, 1);
    assert_eq!(report.inline_posted, 0);

    // The refiner's reclassification survives into the stored finding.
    let findings = fx.store.open_findings_for_pr(fx.pr_id).unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].comment_type, store::CommentKind::Summary);

    let state = fx.forge.state();
    assert!(state.inline_comments.is_empty());
    assert!(state
        .summary_comments
        .last()
        .unwrap()
        .body
        .contains("Possible null deref"));
}

#[tokio::test]
async fn permission_denied_writes_do_not_fail_the_run() {
    let fx = fixture(Some(r#"{ "output": { "destination": "both" } }"#)).await;
    fx.forge.state().permission_denied_writes = true;

    let deps = deps_for(&fx, stages_with_draft(vec![draft_comment(42)]));
    let report = run_review_job(&deps, &job(&fx, false)).await.unwrap();

    // The finding is recorded even though nothing could be posted.
    assert_eq!(report.new_findings, 1);
    assert_eq!(report.inline_posted, 0);
    let run = fx.store.get_run(report.run_id).unwrap();
    assert_eq!(run.status, store::RunStatus::Completed);

    let state = fx.forge.state();
    assert!(state.inline_comments.is_empty());
    assert!(state.summary_comments.is_empty());
    assert!(state.pr_body.is_empty());
    assert!(state.checks.is_empty());
}

#[tokio::test]
async fn forge_rejecting_the_diff_still_reviews_via_local_git() {
    let fx = fixture(None).await;
    fx.forge.state().diff_too_large = true;

    let deps = deps_for(&fx, stages_with_draft(vec![draft_comment(42)]));
    let report = run_review_job(&deps, &job(&fx, false)).await.unwrap();
    assert_eq!(report.new_findings, 1);
    assert_eq!(report.conclusion, Some(CheckConclusion::Failure));
}

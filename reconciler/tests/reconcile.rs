//! Reconciliation lifecycle across successive runs.

use diff_index::{DiffIndex, Side};
use reconciler::{reconcile, DraftFinding};
use store::{CommentKind, FindingStatus, PullRequestUpsert, RepoUpsert, Store};

const DIFF_V1: &str = "\
--- a/src/foo.ts
+++ b/src/foo.ts
@@ -40,5 +40,6 @@
 const parsed = parse(input);
 const user = lookup(parsed);
+if (user == null) return null;
 return user.name;
 // trailing
 }
";

// Same hunk body, shifted down five lines by an unrelated edit above.
const DIFF_V2: &str = "\
--- a/src/foo.ts
+++ b/src/foo.ts
@@ -45,5 +45,6 @@
 const parsed = parse(input);
 const user = lookup(parsed);
+if (user == null) return null;
 return user.name;
 // trailing
 }
";

// Reworked hunk: the guard changed shape, so the hunk digest differs.
const DIFF_V2B: &str = "\
--- a/src/foo.ts
+++ b/src/foo.ts
@@ -45,5 +45,6 @@
 const parsed = parse(input);
 const user = lookup(parsed);
+if (user === null || user === undefined) return null;
 return user.name;
 // trailing
 }
";

// The finding's file is gone from the diff entirely.
const DIFF_V3: &str = "\
--- a/src/other.ts
+++ b/src/other.ts
@@ -1,2 +1,2 @@
-let x = 1;
+let x = 2;
 export default x;
";

fn setup() -> (Store, i64) {
    let store = Store::in_memory().unwrap();
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
    let pr = store
        .upsert_pull_request(&PullRequestUpsert {
            repo_id: repo.id,
            number: 1,
            external_id: "pr".into(),
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
    (store, pr.id)
}

fn draft(line: u32, title: &str) -> DraftFinding {
    DraftFinding {
        path: "src/foo.ts".into(),
        line,
        side: Side::Right,
        severity: "blocking".into(),
        category: "bug".into(),
        title: title.into(),
        body: "dereference may fail".into(),
        evidence: "return user.name;".into(),
        suggested_patch: None,
        rule_id: None,
        comment_type: CommentKind::Inline,
    }
}

#[test]
fn first_run_creates_open_findings() {
    let (store, pr_id) = setup();
    let run = store.create_run(pr_id, "sha1", "webhook").unwrap();
    let diff = DiffIndex::parse(DIFF_V1);

    let out = reconcile(&store, pr_id, run.id, &[draft(42, "Possible null deref")], &diff, false)
        .unwrap();
    assert_eq!(out.created.len(), 1);
    assert!(out.still_open.is_empty());
    assert!(out.fixed.is_empty());
    assert_eq!(out.created[0].status, FindingStatus::Open);
    assert_eq!(out.created[0].run_id, run.id);
    assert_eq!(out.created[0].hunk_hash.len(), 16);
}

#[test]
fn rerun_matches_by_hunk_hash_despite_line_shift() {
    let (store, pr_id) = setup();
    let run1 = store.create_run(pr_id, "sha1", "webhook").unwrap();
    let diff1 = DiffIndex::parse(DIFF_V1);
    let out1 =
        reconcile(&store, pr_id, run1.id, &[draft(42, "Possible null deref")], &diff1, false)
            .unwrap();
    let original_id = out1.created[0].id;

    let run2 = store.create_run(pr_id, "sha2", "webhook").unwrap();
    let diff2 = DiffIndex::parse(DIFF_V2);
    let out2 =
        reconcile(&store, pr_id, run2.id, &[draft(47, "Possible null deref")], &diff2, false)
            .unwrap();

    assert!(out2.created.is_empty());
    assert_eq!(out2.still_open.len(), 1);
    assert_eq!(out2.still_open[0].id, original_id);
    assert_eq!(out2.still_open[0].line, 47);
    assert_eq!(out2.still_open[0].last_seen_run_id, run2.id);
}

#[test]
fn semantic_match_handles_retitled_findings() {
    let (store, pr_id) = setup();
    let run1 = store.create_run(pr_id, "sha1", "webhook").unwrap();
    let diff1 = DiffIndex::parse(DIFF_V1);
    reconcile(
        &store,
        pr_id,
        run1.id,
        &[draft(42, "Possible null dereference of user")],
        &diff1,
        false,
    )
    .unwrap();

    // New run, reworked hunk (digest differs), reworded but similar title.
    let run2 = store.create_run(pr_id, "sha2", "webhook").unwrap();
    let diff2 = DiffIndex::parse(DIFF_V2B);
    let out = reconcile(
        &store,
        pr_id,
        run2.id,
        &[draft(47, "Null dereference of user possible")],
        &diff2,
        false,
    )
    .unwrap();
    assert_eq!(out.still_open.len(), 1);
    assert!(out.created.is_empty());
}

#[test]
fn disappearance_marks_fixed_or_obsolete() {
    let (store, pr_id) = setup();
    let run1 = store.create_run(pr_id, "sha1", "webhook").unwrap();
    let diff1 = DiffIndex::parse(DIFF_V1);
    reconcile(&store, pr_id, run1.id, &[draft(42, "Possible null deref")], &diff1, false)
        .unwrap();

    // Path still in diff, draft gone → fixed.
    let run2 = store.create_run(pr_id, "sha2", "webhook").unwrap();
    let out2 = reconcile(&store, pr_id, run2.id, &[], &DiffIndex::parse(DIFF_V1), false).unwrap();
    assert_eq!(out2.fixed.len(), 1);
    assert!(out2.obsolete.is_empty());

    // Fresh finding, then the whole path drops out of the diff → obsolete.
    let run3 = store.create_run(pr_id, "sha3", "webhook").unwrap();
    reconcile(&store, pr_id, run3.id, &[draft(42, "Another issue here")], &diff1, false).unwrap();
    let run4 = store.create_run(pr_id, "sha4", "webhook").unwrap();
    let out4 = reconcile(&store, pr_id, run4.id, &[], &DiffIndex::parse(DIFF_V3), false).unwrap();
    assert_eq!(out4.obsolete.len(), 1);
}

#[test]
fn incremental_sweep_spares_untouched_paths() {
    let (store, pr_id) = setup();
    let run1 = store.create_run(pr_id, "sha1", "webhook").unwrap();
    let diff1 = DiffIndex::parse(DIFF_V1);
    reconcile(&store, pr_id, run1.id, &[draft(42, "Possible null deref")], &diff1, false)
        .unwrap();

    // Incremental run whose diff does not touch src/foo.ts.
    let run2 = store.create_run(pr_id, "sha2", "webhook").unwrap();
    let out = reconcile(&store, pr_id, run2.id, &[], &DiffIndex::parse(DIFF_V3), true).unwrap();
    assert!(out.fixed.is_empty());
    assert!(out.obsolete.is_empty());
    assert_eq!(out.carried_over.len(), 1);
    assert_eq!(store.open_findings_for_pr(pr_id).unwrap().len(), 1);
}

#[test]
fn no_prior_is_claimed_twice_and_nearest_line_wins() {
    let (store, pr_id) = setup();
    let run1 = store.create_run(pr_id, "sha1", "webhook").unwrap();
    let diff1 = DiffIndex::parse(DIFF_V1);
    // Two priors with the same title at different lines.
    reconcile(
        &store,
        pr_id,
        run1.id,
        &[draft(41, "Possible null deref"), draft(44, "Possible null deref")],
        &diff1,
        false,
    )
    .unwrap();

    let run2 = store.create_run(pr_id, "sha2", "webhook").unwrap();
    let out = reconcile(
        &store,
        pr_id,
        run2.id,
        &[draft(44, "Possible null deref"), draft(41, "Possible null deref")],
        &diff1,
        false,
    )
    .unwrap();
    assert_eq!(out.still_open.len(), 2);
    assert!(out.created.is_empty());
    // Distinct priors claimed.
    assert_ne!(out.still_open[0].id, out.still_open[1].id);
}

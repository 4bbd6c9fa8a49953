//! Finding reconciliation.
//!
//! Matches the current run's draft findings against the PR's open findings
//! and assigns each prior a fate: still open (updated in place), fixed, or
//! obsolete. Unmatched drafts become new findings owned by this run.
//!
//! Matching ladder, first hit wins, a claimed prior is never reused:
//! 1. exact match key,
//! 2. same `(path, hunk_hash, category)`, nearest line,
//! 3. same `(path, category)` with title similarity above threshold
//!    (secondary path; only consulted when 1–2 missed), nearest line,
//! 4. same `(path, category, normalized title)`, nearest line.

pub mod identity;

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, info};

use diff_index::{DiffIndex, Side};
use store::{CommentKind, Finding, FindingStatus, FindingUpdate, NewFinding, Store};

use identity::{fingerprint, match_key, normalize_path, normalize_title, title_similarity};

const TITLE_SIMILARITY_THRESHOLD: f64 = 0.55;

pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Store(#[from] store::StoreError),
}

/// A validated draft finding entering reconciliation.
#[derive(Debug, Clone)]
pub struct DraftFinding {
    pub path: String,
    pub line: u32,
    pub side: Side,
    pub severity: String,
    pub category: String,
    pub title: String,
    pub body: String,
    pub evidence: String,
    pub suggested_patch: Option<String>,
    pub rule_id: Option<String>,
    /// Surface chosen by the refinement pass; summary-typed findings are
    /// never posted as inline threads.
    pub comment_type: CommentKind,
}

/// What happened to each finding identity this run.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Prior findings matched by a draft and refreshed in place.
    pub still_open: Vec<Finding>,
    /// Drafts with no prior; inserted as new open findings.
    pub created: Vec<Finding>,
    pub fixed: Vec<Finding>,
    pub obsolete: Vec<Finding>,
    /// Open findings outside the incremental diff, left untouched.
    pub carried_over: Vec<Finding>,
}

/// Reconcile `drafts` for `run_id` against the PR's open findings.
///
/// `incremental` restricts the fixed-sweep to findings whose path appears in
/// the current diff; everything else is carried over untouched.
pub fn reconcile(
    store: &Store,
    pull_request_id: i64,
    run_id: i64,
    drafts: &[DraftFinding],
    diff: &DiffIndex,
    incremental: bool,
) -> ReconcileResult<ReconcileOutcome> {
    let prior = store.open_findings_for_pr(pull_request_id)?;
    let mut outcome = ReconcileOutcome::default();
    let mut claimed: HashSet<i64> = HashSet::new();

    // Keys of the current draft set, consulted by the sweep.
    let mut current_keys: HashSet<(String, String, String)> = HashSet::new();

    for draft in drafts {
        let norm_path = normalize_path(&draft.path);
        current_keys.insert((
            norm_path.clone(),
            draft.category.clone(),
            normalize_title(&draft.title),
        ));

        let fp = fingerprint(&draft.category, &draft.title, &norm_path);
        let hunk = diff
            .hunk_hash(&norm_path, draft.line, draft.side)
            .unwrap_or_default();
        let context = diff
            .context_hash(&norm_path, draft.line, draft.side)
            .unwrap_or_default();
        let key = match_key(&fp, &norm_path, &hunk, &draft.title);

        let matched = find_match(&prior, &claimed, draft, &norm_path, &hunk, &key);

        match matched {
            Some(prior_id) => {
                claimed.insert(prior_id);
                store.update_matched_finding(
                    prior_id,
                    run_id,
                    &FindingUpdate {
                        line: draft.line as i64,
                        side: draft.side.as_str().to_string(),
                        severity: draft.severity.clone(),
                        body: draft.body.clone(),
                        evidence: draft.evidence.clone(),
                        suggested_patch: draft.suggested_patch.clone(),
                        rule_id: draft.rule_id.clone(),
                        hunk_hash: hunk,
                        context_hash: context,
                        comment_type: draft.comment_type,
                    },
                )?;
                outcome.still_open.push(store.get_finding(prior_id)?);
            }
            None => {
                let created = store.insert_finding(&NewFinding {
                    pull_request_id,
                    run_id,
                    fingerprint: fp,
                    hunk_hash: hunk,
                    context_hash: context,
                    comment_key: key,
                    path: norm_path,
                    line: draft.line as i64,
                    side: draft.side.as_str().to_string(),
                    severity: draft.severity.clone(),
                    category: draft.category.clone(),
                    title: draft.title.clone(),
                    body: draft.body.clone(),
                    evidence: draft.evidence.clone(),
                    suggested_patch: draft.suggested_patch.clone(),
                    rule_id: draft.rule_id.clone(),
                    comment_type: draft.comment_type,
                })?;
                outcome.created.push(created);
            }
        }
    }

    // Sweep: unmatched priors that also fell out of the draft key set.
    for f in &prior {
        if claimed.contains(&f.id) {
            continue;
        }
        let key = (
            normalize_path(&f.path),
            f.category.clone(),
            normalize_title(&f.title),
        );
        if current_keys.contains(&key) {
            // Semantically still present; leave it open.
            outcome.carried_over.push(f.clone());
            continue;
        }

        let path_in_diff = diff.contains_path(&normalize_path(&f.path));
        if incremental && !path_in_diff {
            outcome.carried_over.push(f.clone());
            continue;
        }

        if path_in_diff {
            store.set_finding_status(f.id, FindingStatus::Fixed)?;
            outcome.fixed.push(store.get_finding(f.id)?);
        } else {
            store.set_finding_status(f.id, FindingStatus::Obsolete)?;
            outcome.obsolete.push(store.get_finding(f.id)?);
        }
    }

    info!(
        pull_request_id,
        run_id,
        still_open = outcome.still_open.len(),
        created = outcome.created.len(),
        fixed = outcome.fixed.len(),
        obsolete = outcome.obsolete.len(),
        carried_over = outcome.carried_over.len(),
        "reconcile: done"
    );
    Ok(outcome)
}

/// The four-step matching ladder. Returns the claimed prior's id.
fn find_match(
    prior: &[Finding],
    claimed: &HashSet<i64>,
    draft: &DraftFinding,
    norm_path: &str,
    hunk: &str,
    key: &str,
) -> Option<i64> {
    let available = || prior.iter().filter(|f| !claimed.contains(&f.id));

    // 1. exact match key (nearest line when several priors share it)
    if let Some(f) = nearest_line(available().filter(|f| f.comment_key == key), draft.line) {
        debug!(finding = f, "reconcile: matched by key");
        return Some(f);
    }

    // 2. same (path, hunk_hash, category), nearest line
    if !hunk.is_empty() {
        let hit = nearest_line(
            available().filter(|f| {
                normalize_path(&f.path) == norm_path
                    && f.hunk_hash == hunk
                    && f.category == draft.category
            }),
            draft.line,
        );
        if let Some(f) = hit {
            debug!(finding = f, "reconcile: matched by hunk hash");
            return Some(f);
        }
    }

    // 3. secondary semantic path: title similarity within (path, category)
    let hit = nearest_line(
        available().filter(|f| {
            normalize_path(&f.path) == norm_path
                && f.category == draft.category
                && title_similarity(&f.title, &draft.title) >= TITLE_SIMILARITY_THRESHOLD
        }),
        draft.line,
    );
    if let Some(f) = hit {
        debug!(finding = f, "reconcile: matched semantically");
        return Some(f);
    }

    // 4. same (path, category, normalized title), nearest line
    let norm_title = normalize_title(&draft.title);
    nearest_line(
        available().filter(|f| {
            normalize_path(&f.path) == norm_path
                && f.category == draft.category
                && normalize_title(&f.title) == norm_title
        }),
        draft.line,
    )
}

fn nearest_line<'a>(candidates: impl Iterator<Item = &'a Finding>, line: u32) -> Option<i64> {
    let mut by_distance: HashMap<i64, i64> = HashMap::new();
    for f in candidates {
        by_distance.insert(f.id, (f.line - line as i64).abs());
    }
    by_distance
        .into_iter()
        .min_by_key(|&(id, dist)| (dist, id))
        .map(|(id, _)| id)
}

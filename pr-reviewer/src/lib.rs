//! Review pipeline orchestrator.
//!
//! Public entry for running one review job end to end:
//!
//! 1. **Setup** — refresh the PR from the forge, open a `running` review
//!    run, and request a detached worktree at the head SHA.
//! 2. **Config + placeholder** — resolve the per-run config from the
//!    checkout and override layers, open the status check, and post the
//!    in-progress status comment.
//! 3. **Diff + context** — local git diff first (forge fallback, local
//!    re-fallback on too-large), then the context pack over the repo's
//!    indexed artifacts.
//! 4. **Stages** — reviewer (with the verifier overlapped in the
//!    background), editor verdicts, optional coverage, then the local
//!    quality refinement and summary enrichment passes.
//! 5. **Reconcile + post** — match findings against prior runs, post
//!    idempotent inline/summary/body artifacts, join the verifier, close
//!    the status check, and enqueue index + analytics follow-ups.
//!
//! Any stage error marks the run `failed`, closes the status check as
//! `failure`, and re-raises for the queue to retry.

pub mod config;
pub mod errors;
pub mod prompts;
pub mod publish;
pub mod refine;
pub mod reply;
pub mod summary;
pub mod workers;

use std::path::PathBuf;

use tracing::{debug, info, warn};

use code_indexer::embedding::EmbeddingClient;
use contextor::{build_context_pack, ContextRequest};
use diff_index::{DiffIndex, Side};
use forge_client::{CheckConclusion, ForgeError, GithubClient, GithubConfig, MemoryForge, ProviderClient};
use reconciler::DraftFinding;
use repo_store::{https_clone_url, RepoStore};
use scheduler::{AnalyticsJob, IndexJob, Job, QueueSet, ReviewJob};
use stage_runner::{
    load_stage_json, BundlePaths, ChecksOutput, CommentType, CoverageOutput, ReviewCommentOut,
    ReviewOutput, Stage, StageRunner, VerdictAction, VerdictsOutput, VERDICTS_JSON,
};
use store::{Repo, RunJsonColumn, RunStatus, Store};

use config::{ConfigLayers, ResolvedConfig};
use errors::{ReviewError, ReviewResult};

/// Process-level wiring shared by every job.
#[derive(Clone)]
pub struct ReviewEnv {
    pub project_root: PathBuf,
    pub bot_login: String,
    /// Host for token-bearing clone URLs, e.g. `github.com`.
    pub clone_host: String,
    pub forge_token: String,
    /// Clone from this source instead of the forge (tests, mirrors).
    pub clone_source_override: Option<String>,
}

impl ReviewEnv {
    pub fn clone_url(&self, owner: &str, repo: &str) -> String {
        match &self.clone_source_override {
            Some(source) => source.clone(),
            None => https_clone_url(&self.clone_host, owner, repo, &self.forge_token),
        }
    }
}

/// How to build a provider client bound to one PR head.
#[derive(Clone)]
pub enum ForgeFactory {
    Github { base_api: String },
    /// Shared in-memory forge for tests and dry runs.
    Memory(MemoryForge),
}

impl ForgeFactory {
    pub(crate) fn client_for(
        &self,
        env: &ReviewEnv,
        repo: &Repo,
        pr_number: i64,
        head_sha: &str,
    ) -> ReviewResult<ProviderClient> {
        match self {
            ForgeFactory::Github { base_api } => Ok(ProviderClient::Github(GithubClient::new(
                GithubConfig {
                    base_api: base_api.clone(),
                    token: env.forge_token.clone(),
                    owner: repo.owner.clone(),
                    repo: repo.name.clone(),
                    pr_number,
                    head_sha: head_sha.to_string(),
                },
            )?)),
            ForgeFactory::Memory(m) => Ok(ProviderClient::Memory(m.clone())),
        }
    }
}

/// Everything the pipeline needs, passed explicitly (no hidden globals).
#[derive(Clone)]
pub struct ReviewDeps {
    pub store: Store,
    pub repo_store: RepoStore,
    pub stage_runner: StageRunner,
    pub embedder: EmbeddingClient,
    pub queues: QueueSet,
    pub forge: ForgeFactory,
    pub env: ReviewEnv,
}

/// Outcome handed back to the worker (and asserted on by tests).
#[derive(Debug, Default)]
pub struct RunReport {
    pub run_id: i64,
    pub skipped: bool,
    pub incremental: bool,
    pub new_findings: usize,
    pub still_open: usize,
    pub fixed: usize,
    pub obsolete: usize,
    pub carried_over: usize,
    pub inline_posted: usize,
    pub conclusion: Option<CheckConclusion>,
}

/// Run one review job with the crate's failure policy applied.
pub async fn run_review_job(deps: &ReviewDeps, job: &ReviewJob) -> ReviewResult<RunReport> {
    // ---- Step 1: setup (before a run row exists) -------------------------
    let repo = deps.store.get_repo(job.repo_id)?;
    let mut pr = deps.store.get_pull_request(job.pull_request_id)?;

    let forge = deps
        .forge
        .client_for(&deps.env, &repo, pr.number, &job.head_sha)?;
    let remote = forge.fetch_pull_request().await?;
    let author_id = if remote.author.login.is_empty() {
        None
    } else {
        Some(deps.store.upsert_user(
            repo.provider_id,
            &remote.author.external_id,
            &remote.author.login,
        )?)
    };
    pr = deps.store.upsert_pull_request(&store::PullRequestUpsert {
        repo_id: repo.id,
        number: pr.number,
        external_id: remote.external_id.clone(),
        title: remote.title.clone(),
        body: remote.body.clone(),
        state: remote.state.clone(),
        base_ref: remote.base_ref.clone(),
        head_ref: remote.head_ref.clone(),
        base_sha: remote.base_sha.clone(),
        head_sha: remote.head_sha.clone(),
        draft: remote.draft,
        author_id,
    })?;
    let head_sha = if remote.head_sha.is_empty() {
        job.head_sha.clone()
    } else {
        remote.head_sha.clone()
    };

    // Duplicate-completed suppression: the scheduler normally prevents
    // this, but a raced job short-circuits here.
    if !job.force && deps.store.completed_run_exists(pr.id, &head_sha)? {
        info!(pr = pr.number, head = %head_sha, "review: already completed, skipping");
        return Ok(RunReport {
            skipped: true,
            ..RunReport::default()
        });
    }

    // ---- Step 2: open the run -------------------------------------------
    let run = deps.store.create_run(pr.id, &head_sha, &job.trigger)?;
    info!(run = run.id, pr = pr.number, head = %head_sha, "review: run opened");

    let mut check_id: Option<String> = None;

    let result = pipeline(deps, job, &repo, &pr, &head_sha, run.id, &forge, &mut check_id).await;

    match result {
        Ok(report) => Ok(report),
        Err(e) => {
            warn!(run = run.id, "review: failed: {e}");
            deps.store.finish_run(run.id, RunStatus::Failed)?;
            if let Some(id) = &check_id {
                let _ = forge
                    .update_status_check(id, CheckConclusion::Failure, "Review failed")
                    .await;
            }
            Err(e)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn pipeline(
    deps: &ReviewDeps,
    job: &ReviewJob,
    repo: &Repo,
    pr: &store::PullRequest,
    head_sha: &str,
    run_id: i64,
    forge: &ProviderClient,
    check_id: &mut Option<String>,
) -> ReviewResult<RunReport> {
    // ---- Step 3: checkout -----------------------------------------------
    let clone_url = deps.env.clone_url(&repo.owner, &repo.name);
    let worktree = deps
        .repo_store
        .ensure_checkout(&repo.owner, &repo.name, head_sha, &clone_url)
        .await?;

    // ---- Step 4: config resolution --------------------------------------
    let layers = ConfigLayers {
        rules_override: job.rules_override.clone(),
        ..ConfigLayers::default()
    };
    let (cfg, mut warnings) = config::resolve_config(&worktree, &layers);

    // ---- Step 5: status check + placeholder ------------------------------
    *check_id = publish::permission_to_warning(
        forge.create_status_check(&cfg.status_checks.name).await,
        "status check",
        &mut warnings,
    )?;
    if cfg.output.destination.allows_comment() {
        publish::upsert_status_comment(
            &deps.store,
            forge,
            pr.id,
            "🔍 **Grepiku review in progress…**",
            &mut warnings,
        )
        .await?;
    }

    // ---- Step 6: incremental decision ------------------------------------
    let latest_completed = deps.store.latest_completed_run(pr.id)?;
    let manual = job.trigger == "manual";
    let (base_for_diff, incremental) = match &latest_completed {
        Some(prev) if !job.force && !manual && prev.head_sha != head_sha => {
            (prev.head_sha.clone(), true)
        }
        _ => (pr.base_sha.clone(), false),
    };
    debug!(incremental, base = %base_for_diff, "review: diff base chosen");

    // ---- Step 7: diff ----------------------------------------------------
    let diff_text =
        acquire_diff(&deps.repo_store, forge, repo, &base_for_diff, head_sha).await?;
    let diff = DiffIndex::parse(&diff_text);
    let changed = diff.file_stats();

    // ---- Step 8: context pack --------------------------------------------
    let prior_findings = deps.store.findings_for_repo(repo.id)?;
    let pack = build_context_pack(
        &deps.store,
        &deps.embedder,
        ContextRequest {
            repo_id: repo.id,
            diff: &diff,
            diff_text: &diff_text,
            changed: &changed,
            pr_title: Some(&pr.title),
            pr_body: Some(&pr.body),
            prior_findings: &prior_findings,
        },
        &cfg.context,
    )
    .await?;
    deps.store
        .set_run_json(run_id, RunJsonColumn::ContextPack, &serde_json::to_string(&pack)?)?;

    // ---- Step 9: bundle, reviewer ∥ verifier -----------------------------
    let bundle = BundlePaths::create(&deps.env.project_root, run_id)?;
    write_bundle_inputs(&bundle, pr, &diff_text, &changed, &cfg, job, &pack, &warnings)?;

    let feedback = deps.store.feedback_signals_for_repo(repo.id)?;

    let verifier_task = {
        let runner = deps.stage_runner.clone();
        let bundle_dir = bundle.bundle_dir.clone();
        let out_dir = bundle.out_dir.clone();
        let prompt = prompts::verifier_prompt(head_sha);
        tokio::spawn(async move {
            runner
                .run_stage(Stage::Verifier, &bundle_dir, &out_dir, &prompt)
                .await
        })
    };

    let reviewer_prompt = prompts::reviewer_prompt(
        &cfg,
        incremental.then_some(base_for_diff.as_str()),
        &feedback,
    );
    deps.stage_runner
        .run_stage(Stage::Reviewer, &bundle.bundle_dir, &bundle.out_dir, &reviewer_prompt)
        .await?;
    let draft: ReviewOutput =
        load_stage_json(&bundle.out_dir, Stage::Reviewer, Stage::Reviewer.output_file())?;
    deps.store
        .set_run_json(run_id, RunJsonColumn::Draft, &serde_json::to_string(&draft)?)?;

    // ---- Step 10: editor + verdicts --------------------------------------
    let editor_prompt = prompts::editor_prompt(&serde_json::to_string(&draft)?, &cfg);
    deps.stage_runner
        .run_stage(Stage::Editor, &bundle.bundle_dir, &bundle.out_dir, &editor_prompt)
        .await?;
    let final_review: ReviewOutput =
        load_stage_json(&bundle.out_dir, Stage::Editor, Stage::Editor.output_file())?;
    let verdicts: VerdictsOutput =
        load_stage_json(&bundle.out_dir, Stage::Editor, VERDICTS_JSON)?;
    deps.store
        .set_run_json(run_id, RunJsonColumn::Final, &serde_json::to_string(&final_review)?)?;
    deps.store
        .set_run_json(run_id, RunJsonColumn::Verdicts, &serde_json::to_string(&verdicts)?)?;

    let mut comments = apply_verdicts(draft.comments, &verdicts);
    let mut review_summary = if final_review.summary.overview.is_empty() {
        draft.summary
    } else {
        final_review.summary
    };

    // ---- Step 11: coverage ------------------------------------------------
    let coverage_targets: Vec<String> = changed
        .iter()
        .map(|c| c.path.clone())
        .filter(|p| !comments.iter().any(|c| &c.path == p))
        .collect();
    let coverage_should_run = cfg.coverage.should_run
        && !coverage_targets.is_empty()
        && !cfg.output.summary_only
        && cfg.comment_types.allows_inline()
        && comments.len() < cfg.limits.max_inline_comments;
    if coverage_should_run {
        let prompt = prompts::coverage_prompt(&coverage_targets);
        match deps
            .stage_runner
            .run_stage(Stage::Coverage, &bundle.bundle_dir, &bundle.out_dir, &prompt)
            .await
        {
            Ok(()) => {
                let extra: CoverageOutput = load_stage_json(
                    &bundle.out_dir,
                    Stage::Coverage,
                    Stage::Coverage.output_file(),
                )?;
                let merged = merge_coverage(&mut comments, extra.comments);
                if merged > 0 {
                    warnings.push(format!("coverage pass added {merged} finding(s)"));
                }
            }
            Err(e) => {
                // The coverage stage is additive; its absence is a warning.
                warnings.push(format!("coverage stage skipped: {e}"));
            }
        }
    }

    // ---- Step 12: quality refinement --------------------------------------
    let refined = refine::refine(comments, &diff, &cfg, &feedback, changed.len());
    warnings.extend(refined.diagnostics.iter().cloned());

    // ---- Step 13: summary enrichment --------------------------------------
    summary::enrich_summary(&mut review_summary, &refined.comments, &pack, &changed);

    // ---- Step 14: reconcile -----------------------------------------------
    let drafts: Vec<DraftFinding> = refined
        .comments
        .iter()
        .map(|c| DraftFinding {
            path: c.path.clone(),
            line: c.line,
            side: Side::parse(&c.side).unwrap_or(Side::Right),
            severity: c.severity.as_str().to_string(),
            category: c.category.as_str().to_string(),
            title: c.title.clone(),
            body: c.body.clone(),
            evidence: c.evidence.clone(),
            suggested_patch: c.suggested_patch.clone(),
            rule_id: c.rule_id.clone(),
            comment_type: match c.comment_type.unwrap_or(CommentType::Inline) {
                CommentType::Inline => store::CommentKind::Inline,
                CommentType::Summary => store::CommentKind::Summary,
            },
        })
        .collect();
    let outcome = reconciler::reconcile(&deps.store, pr.id, run_id, &drafts, &diff, incremental)?;
    if incremental && outcome.carried_over.len() > 0 {
        warnings.push(format!(
            "incremental review against {}; {} earlier finding(s) carried over",
            &base_for_diff[..base_for_diff.len().min(12)],
            outcome.carried_over.len()
        ));
    }

    // ---- Step 16 (joined here): verifier ----------------------------------
    let checks: Option<ChecksOutput> = match verifier_task.await {
        Ok(Ok(())) => Some(load_stage_json(
            &bundle.out_dir,
            Stage::Verifier,
            Stage::Verifier.output_file(),
        )?),
        Ok(Err(e)) => {
            warnings.push(format!("verifier unavailable: {e}"));
            None
        }
        Err(join_err) => {
            return Err(ReviewError::Invalid(format!(
                "verifier task panicked: {join_err}"
            )))
        }
    };
    if let Some(c) = &checks {
        deps.store
            .set_run_json(run_id, RunJsonColumn::Checks, &serde_json::to_string(c)?)?;
    }

    // ---- Step 15: post side-effects ----------------------------------------
    let summary_md = summary::render_body_summary(&review_summary, cfg.limits.max_key_concerns);
    if !incremental && cfg.output.destination.allows_pr_body() {
        publish::upsert_pr_body(forge, &pr.body, &summary_md, &mut warnings).await?;
    }

    // Obsolete findings are gone from the PR the same way fixed ones are:
    // their threads resolve and they land in the fixed column.
    let resolved_away: Vec<store::Finding> = outcome
        .fixed
        .iter()
        .chain(outcome.obsolete.iter())
        .cloned()
        .collect();

    let inline = publish::post_inline_effects(
        &deps.store,
        forge,
        &cfg,
        pr.id,
        &outcome.created,
        &resolved_away,
        &mut warnings,
    )
    .await?;

    if cfg.output.destination.allows_comment() {
        let status_body = summary::render_status_comment(&summary::StatusReport {
            run_id,
            head_sha,
            summary: &review_summary,
            new_findings: &outcome.created,
            still_open: &outcome.still_open,
            fixed: &resolved_away,
            carried_over: outcome.carried_over.len(),
            warnings: &warnings,
            checks: checks.as_ref(),
            max_key_concerns: cfg.limits.max_key_concerns,
        });
        publish::upsert_status_comment(&deps.store, forge, pr.id, &status_body, &mut warnings)
            .await?;
    }

    // ---- Step 17: finalize -------------------------------------------------
    let blocking_remains = outcome
        .created
        .iter()
        .chain(outcome.still_open.iter())
        .any(|f| f.severity == "blocking");
    let conclusion = if !blocking_remains {
        CheckConclusion::Success
    } else if cfg.status_checks.required {
        CheckConclusion::Failure
    } else {
        CheckConclusion::Neutral
    };
    if let Some(id) = check_id.as_ref() {
        publish::permission_to_warning(
            forge
                .update_status_check(
                    id,
                    conclusion,
                    &format!(
                        "{} new, {} open, {} fixed",
                        outcome.created.len(),
                        outcome.still_open.len(),
                        outcome.fixed.len()
                    ),
                )
                .await,
            "status check close",
            &mut warnings,
        )?;
    }
    deps.store.finish_run(run_id, RunStatus::Completed)?;

    deps.queues.index.enqueue(Job::Index(IndexJob {
        repo_id: repo.id,
        force: false,
    }));
    deps.queues.analytics.enqueue(Job::Analytics(AnalyticsJob {
        repo_id: repo.id,
        run_id,
        findings_new: outcome.created.len() as i64,
        findings_fixed: outcome.fixed.len() as i64,
    }));

    info!(
        run = run_id,
        new = outcome.created.len(),
        open = outcome.still_open.len(),
        fixed = outcome.fixed.len(),
        posted = inline.inline_posted,
        "review: completed"
    );
    Ok(RunReport {
        run_id,
        skipped: false,
        incremental,
        new_findings: outcome.created.len(),
        still_open: outcome.still_open.len(),
        fixed: outcome.fixed.len(),
        obsolete: outcome.obsolete.len(),
        carried_over: outcome.carried_over.len(),
        inline_posted: inline.inline_posted,
        conclusion: Some(conclusion),
    })
}

/// Local diff first; forge fallback; local again when the API refuses.
async fn acquire_diff(
    repos: &RepoStore,
    forge: &ProviderClient,
    repo: &Repo,
    base: &str,
    head: &str,
) -> ReviewResult<String> {
    match repos.local_diff(&repo.owner, &repo.name, base, head).await {
        Ok(d) if !d.trim().is_empty() => return Ok(d),
        Ok(_) => debug!("review: local diff empty, trying forge"),
        Err(e) => debug!("review: local diff failed ({e}), trying forge"),
    }
    match forge.fetch_diff_patch().await {
        Ok(d) => Ok(d),
        Err(ForgeError::DiffTooLarge) => {
            debug!("review: forge diff too large, back to local git");
            Ok(repos.local_diff(&repo.owner, &repo.name, base, head).await?)
        }
        Err(e) => Err(e.into()),
    }
}

#[allow(clippy::too_many_arguments)]
fn write_bundle_inputs(
    bundle: &BundlePaths,
    pr: &store::PullRequest,
    diff_text: &str,
    changed: &[diff_index::FileStat],
    cfg: &ResolvedConfig,
    job: &ReviewJob,
    pack: &contextor::ContextPack,
    warnings: &[String],
) -> ReviewResult<()> {
    bundle.write_input(
        stage_runner::bundle::PR_MD,
        &format!("# {}\n\n{}\n", pr.title, pr.body),
    )?;
    bundle.write_input(stage_runner::bundle::DIFF_PATCH, diff_text)?;
    bundle.write_input(
        stage_runner::bundle::CHANGED_FILES_JSON,
        &serde_json::to_string_pretty(changed)?,
    )?;
    bundle.write_input(
        stage_runner::bundle::BOT_CONFIG_JSON,
        &serde_json::to_string_pretty(cfg)?,
    )?;
    bundle.write_input(
        stage_runner::bundle::RULES_JSON,
        &serde_json::to_string_pretty(&job.rules_override.clone().unwrap_or_default())?,
    )?;
    bundle.write_input(
        stage_runner::bundle::SCOPES_JSON,
        &serde_json::to_string_pretty(&changed.iter().map(|c| &c.path).collect::<Vec<_>>())?,
    )?;
    bundle.write_input(
        stage_runner::bundle::CONTEXT_PACK_JSON,
        &serde_json::to_string_pretty(pack)?,
    )?;
    bundle.write_input(
        stage_runner::bundle::CONFIG_WARNINGS_JSON,
        &serde_json::to_string_pretty(warnings)?,
    )?;
    Ok(())
}

/// Apply the editor's verdicts to the draft comments.
fn apply_verdicts(
    draft: Vec<ReviewCommentOut>,
    verdicts: &VerdictsOutput,
) -> Vec<ReviewCommentOut> {
    let mut out = Vec::with_capacity(draft.len());
    for comment in draft {
        let verdict = verdicts
            .verdicts
            .iter()
            .find(|v| v.comment_id == comment.comment_id);
        match verdict.map(|v| v.action) {
            Some(VerdictAction::Drop) => continue,
            Some(VerdictAction::Revise) => {
                let revised = verdict
                    .and_then(|v| v.revised_comment.clone())
                    .and_then(|raw| serde_json::from_value::<ReviewCommentOut>(raw).ok());
                match revised {
                    // Schema-mismatch in the revision falls back to the draft.
                    Some(r) => out.push(r),
                    None => out.push(comment),
                }
            }
            Some(VerdictAction::Keep) | None => out.push(comment),
        }
    }
    out
}

/// Merge coverage supplements, skipping duplicates of existing findings.
fn merge_coverage(comments: &mut Vec<ReviewCommentOut>, extra: Vec<ReviewCommentOut>) -> usize {
    let norm = |s: &str| {
        s.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    };
    let mut added = 0usize;
    for c in extra {
        let duplicate = comments.iter().any(|existing| {
            existing.path == c.path
                && existing.category == c.category
                && norm(&existing.title) == norm(&c.title)
        });
        if !duplicate {
            comments.push(c);
            added += 1;
        }
    }
    added
}

//! Comment-reply jobs: answer thread replies and mentions in place.

use serde::Deserialize;
use tracing::info;

use scheduler::{CommentReplyJob, MENTION_MARKER};
use stage_runner::{load_stage_json, BundlePaths, Stage};

use crate::errors::ReviewResult;
use crate::prompts;
use crate::ReviewDeps;

#[derive(Debug, Deserialize)]
struct ReplyOutput {
    body: String,
}

/// Compose and post one threaded reply.
pub async fn run_comment_reply(deps: &ReviewDeps, job: &CommentReplyJob) -> ReviewResult<()> {
    let repo = deps.store.get_repo(job.repo_id)?;
    let pr = deps.store.get_pull_request(job.pull_request_id)?;
    let forge = deps
        .forge
        .client_for(&deps.env, &repo, pr.number, &pr.head_sha)?;

    // Context from the finding under discussion, when the thread is ours.
    let finding = deps
        .store
        .find_finding_by_comment_id(pr.id, &job.canonical_comment_id)?;
    let finding_context = finding.as_ref().map(|f| {
        format!(
            "{} ({}:{}, {}): {}\n{}",
            f.title, f.path, f.line, f.severity, f.body, f.evidence
        )
    });

    // The reply stage reuses the latest run's bundle when one exists.
    let run = deps.store.latest_run_for_pr(pr.id)?;
    let bundle = BundlePaths::create(
        &deps.env.project_root,
        run.map(|r| r.id).unwrap_or_default(),
    )?;

    let prompt = prompts::reply_prompt(&job.body, finding_context.as_deref());
    deps.stage_runner
        .run_stage(Stage::Reply, &bundle.bundle_dir, &bundle.out_dir, &prompt)
        .await?;
    let reply: ReplyOutput =
        load_stage_json(&bundle.out_dir, Stage::Reply, Stage::Reply.output_file())?;

    // The marker keeps our own reply from re-triggering the webhook path.
    let body = format!(
        "{}\n\n{}{} -->",
        reply.body.trim(),
        MENTION_MARKER,
        job.comment_id
    );
    forge.reply_to_comment(&job.comment_id, &body).await?;

    info!(
        pr = pr.number,
        comment = %job.comment_id,
        "reply: posted threaded answer"
    );
    Ok(())
}

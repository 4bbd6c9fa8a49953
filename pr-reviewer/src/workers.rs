//! Worker entrypoints for the index and analytics queues, plus the job
//! dispatch glue the binary wires into `scheduler::spawn_workers`.

use tracing::info;

use code_graph::build_graph;
use code_indexer::{index_repo, IndexOptions};
use scheduler::{AnalyticsJob, IndexJob, Job, SchedulerError};

use crate::errors::ReviewResult;
use crate::ReviewDeps;

/// Refresh the repo index from a fresh checkout, then rebuild the graph.
pub async fn run_index_job(deps: &ReviewDeps, job: &IndexJob) -> ReviewResult<()> {
    let repo = deps.store.get_repo(job.repo_id)?;
    let clone_url = deps.env.clone_url(&repo.owner, &repo.name);
    let checkout = deps
        .repo_store
        .ensure_checkout(&repo.owner, &repo.name, &repo.default_branch, &clone_url)
        .await?;

    let opts = IndexOptions {
        force: job.force,
        ..IndexOptions::default()
    };
    let summary = index_repo(&deps.store, repo.id, &checkout, &deps.embedder, &opts)
        .await
        .map_err(|e| crate::errors::ReviewError::Invalid(e.to_string()))?;
    let graph = build_graph(&deps.store, repo.id)
        .map_err(|e| crate::errors::ReviewError::Invalid(e.to_string()))?;

    info!(
        repo = %repo.full_name,
        files = summary.files_indexed,
        nodes = graph.nodes,
        edges = graph.edges,
        "index: refresh complete"
    );
    Ok(())
}

/// Roll one completed run into the per-repo aggregates.
pub async fn run_analytics_job(deps: &ReviewDeps, job: &AnalyticsJob) -> ReviewResult<()> {
    // The orchestrator passes its counts in the payload; the run row is
    // consulted only to confirm the run exists.
    deps.store.get_run(job.run_id)?;

    let signals = deps.store.feedback_signals_for_repo(job.repo_id)?;
    let positive: i64 = signals.iter().map(|s| s.accepted).sum();
    let negative: i64 = signals.iter().map(|s| s.rejected).sum();

    deps.store.roll_repo_analytics(
        job.repo_id,
        job.findings_new,
        job.findings_fixed,
        positive,
        negative,
    )?;
    Ok(())
}

/// Dispatch one queued job; the binary plugs this into `spawn_workers`.
pub async fn dispatch_job(deps: ReviewDeps, job: Job) -> Result<(), SchedulerError> {
    let map_err = |e: crate::errors::ReviewError| SchedulerError::Job(e.to_string());
    match job {
        Job::Review(j) => crate::run_review_job(&deps, &j).await.map(|_| ()).map_err(map_err),
        Job::CommentReply(j) => crate::reply::run_comment_reply(&deps, &j).await.map_err(map_err),
        Job::Index(j) => run_index_job(&deps, &j).await.map_err(map_err),
        Job::Analytics(j) => run_analytics_job(&deps, &j).await.map_err(map_err),
    }
}

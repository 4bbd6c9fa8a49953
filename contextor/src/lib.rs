//! Context-pack builder.
//!
//! Given a diff and the repo's indexed artifacts, assembles the evidence
//! bundle for the reviewer stage: hybrid retrieval over the embedding
//! snapshot, a budgeted best-first walk over the code graph seeded by the
//! change set, and a fusion pass that ranks related files and derives
//! hotspots and review-focus hints.
//!
//! The embedding snapshot and the graph arena are both captured once at the
//! start of a build, so a concurrent re-index cannot shift scores mid-run.

pub mod config;
pub mod errors;
pub mod fusion;
pub mod query;
pub mod retrieval;
pub mod types;
pub mod walk;

use std::collections::HashSet;

use tracing::{debug, info};

use code_graph::CodeGraph;
use code_indexer::embedding::EmbeddingClient;
use diff_index::{DiffIndex, FileStat};
use store::{Finding, Store};

pub use config::{ContextConfig, GraphTraversalConfig, RetrievalConfig};
pub use errors::{ContextorError, ContextorResult};
pub use types::ContextPack;

/// Inputs the orchestrator hands over for one build.
pub struct ContextRequest<'a> {
    pub repo_id: i64,
    pub diff: &'a DiffIndex,
    pub diff_text: &'a str,
    pub changed: &'a [FileStat],
    pub pr_title: Option<&'a str>,
    pub pr_body: Option<&'a str>,
    /// Prior findings for hotspot grouping (all statuses).
    pub prior_findings: &'a [Finding],
}

/// Build the context pack for one review run.
pub async fn build_context_pack(
    store: &Store,
    embedder: &EmbeddingClient,
    req: ContextRequest<'_>,
    cfg: &ContextConfig,
) -> ContextorResult<ContextPack> {
    let query = query::compose_query(req.pr_title, req.pr_body, req.changed, req.diff_text);
    let query_vector = embedder.embed_one(&query).await?;

    let changed_paths: HashSet<String> = req.changed.iter().map(|c| c.path.clone()).collect();
    let retrieval = retrieval::retrieve(
        store,
        req.repo_id,
        &query,
        &query_vector,
        &changed_paths,
        &cfg.retrieval,
    )
    .await?;
    debug!(
        retrieved = retrieval.items.len(),
        paths = retrieval.score_by_path.len(),
        "context: retrieval done"
    );

    let graph = CodeGraph::load(store, req.repo_id)?;
    let changed_list: Vec<String> = req.changed.iter().map(|c| c.path.clone()).collect();
    let walk = walk::walk_graph(&graph, req.diff, &changed_list, &cfg.graph);

    let fused = fusion::fuse(fusion::FusionInput {
        graph: &graph,
        walk: &walk,
        retrieval: &retrieval,
        changed: req.changed,
        prior_findings: req.prior_findings,
        cfg: &cfg.graph,
    });

    info!(
        related = fused.related_files.len(),
        links = fused.graph_links.len(),
        hotspots = fused.hotspots.len(),
        visited = walk.visited_nodes,
        "context: pack assembled"
    );

    Ok(ContextPack {
        query,
        retrieved: retrieval.items,
        related_files: fused.related_files,
        changed_file_stats: req.changed.to_vec(),
        graph_links: fused.graph_links,
        graph_paths: fused.graph_paths,
        graph_debug: types::GraphDebug {
            seeds: walk.seeds,
            visited_nodes: walk.visited_nodes,
            frontier_exhausted: walk.frontier_exhausted,
        },
        hotspots: fused.hotspots,
        review_focus: fused.review_focus,
    })
}

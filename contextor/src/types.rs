//! Context pack output shape, persisted as JSON onto the review run.

use serde::{Deserialize, Serialize};

use diff_index::FileStat;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedItem {
    pub path: String,
    /// `file | symbol | chunk`
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub score: f64,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedFile {
    pub path: String,
    pub score: f64,
    pub graph_score: f64,
    pub retrieval_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    pub hard_included: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLink {
    pub from: String,
    pub to: String,
    pub edge_type: String,
    pub weight: i64,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDebug {
    pub seeds: usize,
    pub visited_nodes: usize,
    pub frontier_exhausted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub path: String,
    pub open_findings: usize,
    pub historical_findings: usize,
    pub top_categories: Vec<String>,
}

/// The evidence bundle handed to the reviewer stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextPack {
    pub query: String,
    pub retrieved: Vec<RetrievedItem>,
    pub related_files: Vec<RelatedFile>,
    pub changed_file_stats: Vec<FileStat>,
    pub graph_links: Vec<GraphLink>,
    pub graph_paths: Vec<String>,
    pub graph_debug: GraphDebug,
    pub hotspots: Vec<Hotspot>,
    pub review_focus: Vec<String>,
}

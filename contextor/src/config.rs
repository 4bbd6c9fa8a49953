//! Retrieval and graph-traversal knobs with their shipped defaults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub max_per_path: usize,
    pub semantic_weight: f64,
    pub lexical_weight: f64,
    pub rrf_weight: f64,
    pub changed_path_boost: f64,
    pub same_directory_boost: f64,
    pub pattern_boost: f64,
    pub symbol_boost: f64,
    pub chunk_boost: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 18,
            max_per_path: 4,
            semantic_weight: 0.62,
            lexical_weight: 0.22,
            rrf_weight: 0.08,
            changed_path_boost: 0.16,
            same_directory_boost: 0.08,
            pattern_boost: 0.03,
            symbol_boost: 0.02,
            chunk_boost: 0.03,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphTraversalConfig {
    pub max_depth: u32,
    pub min_score: f64,
    pub max_related_files: usize,
    pub max_graph_links: usize,
    pub hard_include_files: usize,
    pub max_nodes_visited: usize,
    /// Path prefixes excluded from traversal seeds.
    pub exclude_dirs: Vec<String>,
}

impl Default for GraphTraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            min_score: 0.07,
            max_related_files: 28,
            max_graph_links: 110,
            hard_include_files: 8,
            max_nodes_visited: 2600,
            exclude_dirs: vec!["internal_harness".to_string()],
        }
    }
}

/// Bundle handed to the context-pack builder by the orchestrator's resolved
/// config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub retrieval: RetrievalConfig,
    pub graph: GraphTraversalConfig,
}

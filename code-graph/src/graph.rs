//! In-memory graph arena loaded from persisted rows.
//!
//! The traversal in the context-pack builder works over this snapshot:
//! integer node indices, adjacency through petgraph, and metadata lookups by
//! node key. One arena per repo per run; no sharing across repos.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction as PetDirection;

use store::{GraphNodeRow, GraphNodeType, Store};

use crate::errors::GraphResult;
use crate::model::{Direction, EdgeType};

/// Edge payload kept in the arena.
#[derive(Debug, Clone)]
pub struct EdgeAttrs {
    pub edge_type: EdgeType,
    pub weight: i64,
    pub examples: Vec<String>,
    pub source: Option<String>,
}

/// One traversable step out of a node.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub target: NodeIndex,
    pub edge_type: EdgeType,
    pub weight: i64,
    pub direction: Direction,
}

/// Symbol metadata needed for seeding.
#[derive(Debug, Clone)]
pub struct SymbolSpan {
    pub node: NodeIndex,
    pub start_line: i64,
    pub end_line: i64,
}

pub struct CodeGraph {
    g: DiGraph<GraphNodeRow, EdgeAttrs>,
    by_key: HashMap<(GraphNodeType, String), NodeIndex>,
    symbols_by_path: HashMap<String, Vec<SymbolSpan>>,
}

impl CodeGraph {
    /// Load the persisted graph for `repo_id` into an arena.
    pub fn load(store: &Store, repo_id: i64) -> GraphResult<Self> {
        let node_rows = store.load_graph_nodes(repo_id)?;
        let edge_rows = store.load_graph_edges(repo_id)?;

        let mut g = DiGraph::with_capacity(node_rows.len(), edge_rows.len());
        let mut by_row_id: HashMap<i64, NodeIndex> = HashMap::with_capacity(node_rows.len());
        let mut by_key = HashMap::with_capacity(node_rows.len());
        let mut symbols_by_path: HashMap<String, Vec<SymbolSpan>> = HashMap::new();

        for row in node_rows {
            let row_id = row.id;
            let node_type = row.node_type;
            let key = row.key.clone();
            let path = row.data.get("path").and_then(|v| v.as_str()).map(String::from);
            let span = (
                row.data.get("start_line").and_then(|v| v.as_i64()),
                row.data.get("end_line").and_then(|v| v.as_i64()),
            );
            let ix = g.add_node(row);
            by_row_id.insert(row_id, ix);
            by_key.insert((node_type, key), ix);

            if node_type == GraphNodeType::Symbol {
                if let (Some(path), (Some(start), Some(end))) = (path, span) {
                    symbols_by_path.entry(path).or_default().push(SymbolSpan {
                        node: ix,
                        start_line: start,
                        end_line: end,
                    });
                }
            }
        }

        for row in edge_rows {
            let (Some(&from), Some(&to)) =
                (by_row_id.get(&row.from_node_id), by_row_id.get(&row.to_node_id))
            else {
                continue;
            };
            let Some(edge_type) = EdgeType::parse(&row.edge_type) else {
                continue;
            };
            g.add_edge(
                from,
                to,
                EdgeAttrs {
                    edge_type,
                    weight: row.weight,
                    examples: row.examples,
                    source: row.source,
                },
            );
        }

        Ok(Self {
            g,
            by_key,
            symbols_by_path,
        })
    }

    pub fn node_count(&self) -> usize {
        self.g.node_count()
    }

    pub fn node(&self, ix: NodeIndex) -> &GraphNodeRow {
        &self.g[ix]
    }

    /// Human-readable node label for provenance traces.
    pub fn label(&self, ix: NodeIndex) -> String {
        let row = &self.g[ix];
        match row.node_type {
            GraphNodeType::Symbol => row
                .data
                .get("name")
                .and_then(|v| v.as_str())
                .map(|n| format!("{}:{n}", row.data.get("path").and_then(|v| v.as_str()).unwrap_or("?")))
                .unwrap_or_else(|| row.key.clone()),
            _ => row.key.clone(),
        }
    }

    pub fn find(&self, node_type: GraphNodeType, key: &str) -> Option<NodeIndex> {
        self.by_key.get(&(node_type, key.to_string())).copied()
    }

    pub fn file(&self, path: &str) -> Option<NodeIndex> {
        self.find(GraphNodeType::File, path)
    }

    /// Symbols declared in `path` with their line spans.
    pub fn symbols_in_file(&self, path: &str) -> &[SymbolSpan] {
        self.symbols_by_path
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Traversable neighbors of `ix` in both directions, honoring the
    /// per-type direction policy.
    pub fn neighbors(&self, ix: NodeIndex) -> Vec<Neighbor> {
        let mut out = Vec::new();
        for edge in self.g.edges_directed(ix, PetDirection::Outgoing) {
            let attrs = edge.weight();
            if attrs.edge_type.can_traverse(Direction::Outgoing) {
                out.push(Neighbor {
                    target: edge.target(),
                    edge_type: attrs.edge_type,
                    weight: attrs.weight,
                    direction: Direction::Outgoing,
                });
            }
        }
        for edge in self.g.edges_directed(ix, PetDirection::Incoming) {
            let attrs = edge.weight();
            if attrs.edge_type.can_traverse(Direction::Incoming) {
                out.push(Neighbor {
                    target: edge.source(),
                    edge_type: attrs.edge_type,
                    weight: attrs.weight,
                    direction: Direction::Incoming,
                });
            }
        }
        out
    }

    /// All `file_dep`-family edges as `(from, to, attrs)` triples.
    pub fn file_dep_edges(&self) -> Vec<(NodeIndex, NodeIndex, &EdgeAttrs)> {
        self.g
            .edge_indices()
            .filter_map(|e| {
                let attrs = &self.g[e];
                if !attrs.edge_type.is_file_dep_family() {
                    return None;
                }
                let (from, to) = self.g.edge_endpoints(e)?;
                Some((from, to, attrs))
            })
            .collect()
    }
}

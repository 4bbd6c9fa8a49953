//! Budgeted best-first graph walk seeded from the change set.

use std::collections::{BinaryHeap, HashMap};

use petgraph::graph::NodeIndex;
use tracing::debug;

use code_graph::{CodeGraph, Direction, EdgeType};
use diff_index::DiffIndex;
use store::GraphNodeType;

use crate::config::GraphTraversalConfig;

const WEIGHT_BOOST_CAP: f64 = 1.28;
const IMPROVEMENT_RATIO: f64 = 1.05;
const LOCAL_FANOUT_PER_TYPE: usize = 6;
const PROVENANCE_MAX_HOPS: usize = 8;

/// What the walk learned about one reached node.
#[derive(Debug, Clone, Copy)]
pub struct Reached {
    pub score: f64,
    pub depth: u32,
}

/// Walk result consumed by fusion.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub best: HashMap<NodeIndex, Reached>,
    pub parent: HashMap<NodeIndex, (NodeIndex, EdgeType)>,
    pub seeds: usize,
    pub visited_nodes: usize,
    pub frontier_exhausted: bool,
}

#[derive(Debug)]
struct FrontierEntry {
    score: f64,
    depth: u32,
    node: NodeIndex,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.node == other.node
    }
}
impl Eq for FrontierEntry {}
impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.depth.cmp(&self.depth))
            .then_with(|| other.node.index().cmp(&self.node.index()))
    }
}

/// Seed and run the walk.
pub fn walk_graph(
    graph: &CodeGraph,
    diff: &DiffIndex,
    changed_paths: &[String],
    cfg: &GraphTraversalConfig,
) -> WalkOutcome {
    let mut out = WalkOutcome::default();
    let mut frontier: BinaryHeap<FrontierEntry> = BinaryHeap::new();

    let mut push_seed = |node: NodeIndex, out: &mut WalkOutcome, frontier: &mut BinaryHeap<FrontierEntry>| {
        if out.best.contains_key(&node) {
            return;
        }
        out.best.insert(node, Reached { score: 1.0, depth: 0 });
        frontier.push(FrontierEntry {
            score: 1.0,
            depth: 0,
            node,
        });
        out.seeds += 1;
    };

    for path in changed_paths {
        if cfg
            .exclude_dirs
            .iter()
            .any(|prefix| path == prefix || path.starts_with(&format!("{prefix}/")))
        {
            continue;
        }
        let Some(file_ix) = graph.file(path) else {
            continue;
        };
        push_seed(file_ix, &mut out, &mut frontier);

        // Symbols whose span intersects a changed line; fall back to the two
        // smallest spans when the file has symbols but no changed lines hit.
        let changed_lines = diff.added_lines(path);
        let spans = graph.symbols_in_file(path);
        let mut seeded_symbol = false;
        for span in spans {
            if changed_lines
                .iter()
                .any(|&l| (span.start_line..=span.end_line).contains(&(l as i64)))
            {
                push_seed(span.node, &mut out, &mut frontier);
                seeded_symbol = true;
            }
        }
        if !seeded_symbol && !spans.is_empty() {
            let mut by_span: Vec<_> = spans.iter().collect();
            by_span.sort_by_key(|s| s.end_line - s.start_line);
            for span in by_span.into_iter().take(2) {
                push_seed(span.node, &mut out, &mut frontier);
            }
        }

        // Directory chain and module containers.
        let segments: Vec<&str> = path.split('/').collect();
        for i in 0..segments.len().saturating_sub(1) {
            let dir = segments[..=i].join("/");
            if let Some(ix) = graph.find(GraphNodeType::Directory, &dir) {
                push_seed(ix, &mut out, &mut frontier);
            }
        }
        let module = code_graph::module_of(path);
        if let Some(ix) = graph.find(GraphNodeType::Module, &module) {
            push_seed(ix, &mut out, &mut frontier);
        }
    }

    // Global per-type budgets scale with the node budget.
    let mut global_budget: HashMap<EdgeType, usize> = HashMap::new();
    let budget_for = |ty: EdgeType| -> usize {
        let frac = match ty {
            EdgeType::FileDep => 0.35,
            EdgeType::FileDepInferred | EdgeType::ReferencesSymbol => 0.20,
            EdgeType::ContainsSymbol => 0.25,
            _ => 0.15,
        };
        ((cfg.max_nodes_visited as f64) * frac).ceil() as usize
    };

    while let Some(entry) = frontier.pop() {
        if out.visited_nodes >= cfg.max_nodes_visited {
            return out;
        }
        out.visited_nodes += 1;

        // Stale frontier entries are skipped.
        let Some(current) = out.best.get(&entry.node).copied() else {
            continue;
        };
        if entry.score < current.score * 0.999 && entry.depth > current.depth {
            continue;
        }
        if entry.depth >= cfg.max_depth {
            continue;
        }

        // Collect candidates, rank, then traverse under fanout budgets.
        let mut candidates: Vec<(NodeIndex, EdgeType, f64, f64)> = Vec::new();
        for n in graph.neighbors(entry.node) {
            let weight_boost =
                WEIGHT_BOOST_CAP.min(1.0 + (n.weight.max(1) as f64).log10() * 0.22);
            let next_score = entry.score * n.edge_type.multiplier(n.direction) * weight_boost;
            if next_score < cfg.min_score {
                continue;
            }
            let direction_bias = match n.direction {
                Direction::Outgoing => 1.0,
                Direction::Incoming => 0.98,
            };
            let node_bias = match graph.node(n.target).node_type {
                GraphNodeType::File => 1.08,
                GraphNodeType::Symbol => 0.95,
                GraphNodeType::Module => 0.86,
                GraphNodeType::Directory => 0.80,
                GraphNodeType::External => 0.50,
            };
            let rank = next_score * direction_bias * node_bias;
            candidates.push((n.target, n.edge_type, next_score, rank));
        }
        candidates.sort_by(|a, b| b.3.total_cmp(&a.3));

        let mut local_fanout: HashMap<EdgeType, usize> = HashMap::new();
        for (target, edge_type, next_score, _) in candidates {
            let local = local_fanout.entry(edge_type).or_insert(0);
            if *local >= LOCAL_FANOUT_PER_TYPE {
                continue;
            }
            let global = global_budget.entry(edge_type).or_insert(0);
            if *global >= budget_for(edge_type) {
                continue;
            }

            let next_depth = entry.depth + 1;
            let improved = match out.best.get(&target) {
                None => true,
                Some(prev) => {
                    next_score > prev.score * IMPROVEMENT_RATIO || next_depth < prev.depth
                }
            };
            if !improved {
                continue;
            }

            *local += 1;
            *global += 1;
            let prev = out.best.get(&target).copied();
            out.best.insert(
                target,
                Reached {
                    score: prev.map(|p| p.score.max(next_score)).unwrap_or(next_score),
                    depth: prev
                        .map(|p| p.depth.min(next_depth))
                        .unwrap_or(next_depth),
                },
            );
            out.parent.insert(target, (entry.node, edge_type));
            frontier.push(FrontierEntry {
                score: next_score,
                depth: next_depth,
                node: target,
            });
        }
    }

    out.frontier_exhausted = true;
    debug!(
        seeds = out.seeds,
        visited = out.visited_nodes,
        reached = out.best.len(),
        "graph walk complete"
    );
    out
}

impl WalkOutcome {
    /// `"<label> --edge--> <label>"` chain from a seed to `node`, at most
    /// eight hops.
    pub fn provenance_trace(&self, graph: &CodeGraph, node: NodeIndex) -> String {
        let mut hops: Vec<(NodeIndex, EdgeType)> = Vec::new();
        let mut cursor = node;
        let mut guard = 0;
        while let Some(&(parent, edge)) = self.parent.get(&cursor) {
            hops.push((cursor, edge));
            cursor = parent;
            guard += 1;
            if guard >= PROVENANCE_MAX_HOPS {
                break;
            }
        }
        let mut trace = graph.label(cursor);
        for (n, edge) in hops.into_iter().rev() {
            trace.push_str(&format!(" --{}--> {}", edge.as_str(), graph.label(n)));
        }
        trace
    }
}

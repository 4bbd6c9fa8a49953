//! Fusion of the retrieval and graph channels into the final related-file
//! list, hotspots, and review-focus hints.

use std::collections::{HashMap, HashSet};

use petgraph::graph::NodeIndex;

use code_graph::CodeGraph;
use diff_index::FileStat;
use store::{Finding, FindingStatus, GraphNodeType};

use crate::config::GraphTraversalConfig;
use crate::retrieval::RetrievalOutcome;
use crate::types::{GraphLink, Hotspot, RelatedFile};
use crate::walk::WalkOutcome;

const GRAPH_WEIGHT: f64 = 0.46;
const RETRIEVAL_WEIGHT: f64 = 0.40;
const HOTSPOT_OPEN_BONUS: f64 = 0.06;
const HOTSPOT_HISTORY_BONUS: f64 = 0.03;
const SAME_DIR_BONUS: f64 = 0.03;
const MIN_COMBINED_SCORE: f64 = 0.045;
const GRAPH_ONLY_MAX_DEPTH: u32 = 4;
const GRAPH_ONLY_MIN_SCORE: f64 = 0.16;
const MAX_HOTSPOT_PATHS: usize = 120;
const MAX_FOCUS_ITEMS: usize = 14;
const SMALL_PR_CHANGED_FILES: usize = 5;
const SMALL_PR_RELATED_CAP: usize = 18;

/// One fused candidate before the final cut.
#[derive(Debug, Clone)]
struct Candidate {
    path: String,
    graph_score: f64,
    retrieval_score: f64,
    depth: Option<u32>,
    combined: f64,
    hotspot_open: bool,
    hotspot_history: bool,
}

pub struct FusionInput<'a> {
    pub graph: &'a CodeGraph,
    pub walk: &'a WalkOutcome,
    pub retrieval: &'a RetrievalOutcome,
    pub changed: &'a [FileStat],
    pub prior_findings: &'a [Finding],
    pub cfg: &'a GraphTraversalConfig,
}

pub struct FusionOutput {
    pub related_files: Vec<RelatedFile>,
    pub graph_links: Vec<GraphLink>,
    pub graph_paths: Vec<String>,
    pub hotspots: Vec<Hotspot>,
    pub review_focus: Vec<String>,
}

pub fn fuse(input: FusionInput<'_>) -> FusionOutput {
    let changed_paths: HashSet<&str> = input.changed.iter().map(|c| c.path.as_str()).collect();
    let changed_dirs: HashSet<&str> = changed_paths.iter().map(|p| parent_dir(p)).collect();

    // Graph channel per path: reached file nodes minus the changed set.
    let mut graph_by_path: HashMap<String, (f64, u32, NodeIndex)> = HashMap::new();
    for (&node, reached) in &input.walk.best {
        let row = input.graph.node(node);
        if row.node_type != GraphNodeType::File || reached.score <= 0.0 {
            continue;
        }
        if changed_paths.contains(row.key.as_str()) {
            continue;
        }
        let entry = graph_by_path
            .entry(row.key.clone())
            .or_insert((reached.score, reached.depth, node));
        if reached.score > entry.0 {
            *entry = (reached.score, reached.depth, node);
        }
    }

    // Hotspots over changed ∪ candidate paths.
    let mut hotspot_scope: Vec<String> = changed_paths.iter().map(|p| p.to_string()).collect();
    let mut candidate_paths: Vec<&String> = graph_by_path.keys().collect();
    candidate_paths.sort();
    for p in candidate_paths {
        if hotspot_scope.len() >= MAX_HOTSPOT_PATHS {
            break;
        }
        if !hotspot_scope.contains(p) {
            hotspot_scope.push(p.clone());
        }
    }
    for p in input.retrieval.score_by_path.keys() {
        if hotspot_scope.len() >= MAX_HOTSPOT_PATHS {
            break;
        }
        if !hotspot_scope.contains(p) {
            hotspot_scope.push(p.clone());
        }
    }
    let hotspots = group_hotspots(input.prior_findings, &hotspot_scope);
    let hotspot_by_path: HashMap<&str, &Hotspot> =
        hotspots.iter().map(|h| (h.path.as_str(), h)).collect();

    let max_retrieval = input
        .retrieval
        .score_by_path
        .values()
        .fold(0f64, |acc, &v| acc.max(v))
        .max(f64::EPSILON);

    // Union of candidate paths from both channels.
    let mut all_paths: HashSet<String> = graph_by_path.keys().cloned().collect();
    for p in input.retrieval.score_by_path.keys() {
        if !changed_paths.contains(p.as_str()) {
            all_paths.insert(p.clone());
        }
    }

    let mut candidates: Vec<Candidate> = Vec::new();
    for path in all_paths {
        let graph_entry = graph_by_path.get(&path);
        let graph_score = graph_entry.map(|e| e.0).unwrap_or(0.0);
        let depth = graph_entry.map(|e| e.1);
        let retrieval_score = input
            .retrieval
            .score_by_path
            .get(&path)
            .copied()
            .unwrap_or(0.0);

        let hotspot = hotspot_by_path.get(path.as_str());
        let hotspot_open = hotspot.map(|h| h.open_findings > 0).unwrap_or(false);
        let hotspot_history = hotspot.map(|h| h.historical_findings > 0).unwrap_or(false);

        // Graph-only candidates need either proximity or hotspot signal.
        if retrieval_score == 0.0 {
            let too_deep = depth.map(|d| d > GRAPH_ONLY_MAX_DEPTH).unwrap_or(true);
            let too_weak = graph_score < GRAPH_ONLY_MIN_SCORE;
            if (too_deep || too_weak) && !hotspot_open && !hotspot_history {
                continue;
            }
        }

        let hotspot_bonus = if hotspot_open {
            HOTSPOT_OPEN_BONUS
        } else if hotspot_history {
            HOTSPOT_HISTORY_BONUS
        } else {
            0.0
        };
        let same_dir_bonus = if changed_dirs.contains(parent_dir(&path)) {
            SAME_DIR_BONUS
        } else {
            0.0
        };
        let depth_bonus = match depth {
            Some(0) | Some(1) => 0.08,
            Some(2) => 0.04,
            Some(3) | None => 0.0,
            Some(d) => (-0.06 * ((d as f64) - 3.0)).max(-0.18),
        };

        let combined = GRAPH_WEIGHT * graph_score
            + RETRIEVAL_WEIGHT * (retrieval_score / max_retrieval)
            + hotspot_bonus
            + same_dir_bonus
            + depth_bonus;
        if combined < MIN_COMBINED_SCORE {
            continue;
        }

        candidates.push(Candidate {
            path,
            graph_score,
            retrieval_score,
            depth,
            combined,
            hotspot_open,
            hotspot_history,
        });
    }
    candidates.sort_by(|a, b| b.combined.total_cmp(&a.combined));

    // Hard-include floor: strongest shallow/high-score graph candidates.
    let max_related = if input.changed.len() <= SMALL_PR_CHANGED_FILES {
        input.cfg.max_related_files.min(SMALL_PR_RELATED_CAP)
    } else {
        input.cfg.max_related_files
    };
    let hard_cap = input
        .cfg
        .hard_include_files
        .min(input.cfg.max_related_files / 3);

    let mut hard: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.graph_score > 0.0)
        .filter(|c| c.depth.map(|d| d <= 2).unwrap_or(false) || c.graph_score >= 0.42)
        .take(hard_cap)
        .collect();
    hard.sort_by(|a, b| b.graph_score.total_cmp(&a.graph_score));
    let hard_paths: HashSet<&str> = hard.iter().map(|c| c.path.as_str()).collect();

    let mut related: Vec<RelatedFile> = Vec::with_capacity(max_related);
    for c in &hard {
        related.push(to_related(c, true));
    }
    for c in &candidates {
        if related.len() >= max_related {
            break;
        }
        if hard_paths.contains(c.path.as_str()) {
            continue;
        }
        related.push(to_related(c, false));
    }

    let graph_links = collect_links(&input, &changed_paths);
    let graph_paths = top_traces(&input, &related);
    let review_focus = build_focus(&input, &hotspots, &graph_links, &graph_paths);

    FusionOutput {
        related_files: related,
        graph_links,
        graph_paths,
        hotspots,
        review_focus,
    }
}

fn to_related(c: &Candidate, hard: bool) -> RelatedFile {
    RelatedFile {
        path: c.path.clone(),
        score: c.combined,
        graph_score: c.graph_score,
        retrieval_score: c.retrieval_score,
        depth: c.depth,
        hard_included: hard,
    }
}

/// `file_dep*` edges between reached-or-changed file nodes, deduped keeping
/// the higher-scored link.
fn collect_links(input: &FusionInput<'_>, changed_paths: &HashSet<&str>) -> Vec<GraphLink> {
    let mut links: HashMap<(String, String), GraphLink> = HashMap::new();

    for (from, to, attrs) in input.graph.file_dep_edges() {
        let from_row = input.graph.node(from);
        let to_row = input.graph.node(to);

        let from_reached = input.walk.best.contains_key(&from)
            || changed_paths.contains(from_row.key.as_str());
        let to_reached =
            input.walk.best.contains_key(&to) || changed_paths.contains(to_row.key.as_str());
        if !from_reached || !to_reached {
            continue;
        }

        let score = input
            .walk
            .best
            .get(&from)
            .map(|r| r.score)
            .unwrap_or(1.0)
            .max(input.walk.best.get(&to).map(|r| r.score).unwrap_or(0.0));

        let key = (from_row.key.clone(), to_row.key.clone());
        let link = GraphLink {
            from: from_row.key.clone(),
            to: to_row.key.clone(),
            edge_type: attrs.edge_type.as_str().to_string(),
            weight: attrs.weight,
            score,
        };
        links
            .entry(key)
            .and_modify(|existing| {
                if link.score > existing.score {
                    *existing = link.clone();
                }
            })
            .or_insert(link);
    }

    let mut out: Vec<GraphLink> = links.into_values().collect();
    out.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.from.cmp(&b.from)));
    out.truncate(input.cfg.max_graph_links);
    out
}

/// Provenance traces for the four strongest graph-reached related files.
fn top_traces(input: &FusionInput<'_>, related: &[RelatedFile]) -> Vec<String> {
    let mut traces = Vec::new();
    for rf in related.iter().filter(|r| r.graph_score > 0.0).take(4) {
        if let Some(node) = input.graph.file(&rf.path) {
            if input.walk.parent.contains_key(&node) {
                traces.push(input.walk.provenance_trace(input.graph, node));
            }
        }
    }
    traces
}

fn group_hotspots(findings: &[Finding], scope: &[String]) -> Vec<Hotspot> {
    let scope_set: HashSet<&str> = scope.iter().map(String::as_str).collect();
    let mut by_path: HashMap<&str, (usize, usize, HashMap<&str, usize>)> = HashMap::new();

    for f in findings {
        if !scope_set.contains(f.path.as_str()) {
            continue;
        }
        let entry = by_path.entry(f.path.as_str()).or_default();
        entry.1 += 1;
        if f.status == FindingStatus::Open {
            entry.0 += 1;
        }
        *entry.2.entry(f.category.as_str()).or_insert(0) += 1;
    }

    let mut out: Vec<Hotspot> = by_path
        .into_iter()
        .map(|(path, (open, total, categories))| {
            let mut cats: Vec<(&str, usize)> = categories.into_iter().collect();
            cats.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
            Hotspot {
                path: path.to_string(),
                open_findings: open,
                historical_findings: total,
                top_categories: cats.into_iter().take(2).map(|(c, _)| c.to_string()).collect(),
            }
        })
        .collect();
    out.sort_by(|a, b| {
        b.open_findings
            .cmp(&a.open_findings)
            .then(b.historical_findings.cmp(&a.historical_findings))
            .then(a.path.cmp(&b.path))
    });
    out
}

/// Deduped human-readable hints, capped.
fn build_focus(
    input: &FusionInput<'_>,
    hotspots: &[Hotspot],
    links: &[GraphLink],
    traces: &[String],
) -> Vec<String> {
    let mut focus: Vec<String> = Vec::new();
    let mut push = |s: String, focus: &mut Vec<String>| {
        if focus.len() < MAX_FOCUS_ITEMS && !focus.contains(&s) {
            focus.push(s);
        }
    };

    // (i) churn-heavy changed files
    for stat in input.changed {
        let churn = stat.additions + stat.deletions;
        if churn >= 80 {
            push(
                format!("{} changed heavily ({churn} lines)", stat.path),
                &mut focus,
            );
        } else if churn >= 30 {
            push(
                format!("{} has a sizeable change ({churn} lines)", stat.path),
                &mut focus,
            );
        }
    }

    // (ii) hotspot paths with open findings
    for h in hotspots.iter().filter(|h| h.open_findings > 0) {
        push(
            format!(
                "{} already has {} open finding(s) ({})",
                h.path,
                h.open_findings,
                h.top_categories.join(", ")
            ),
            &mut focus,
        );
    }

    // (iii) strongest cross-file dependencies
    for link in links.iter().take(10) {
        push(
            format!("{} depends on {} (weight {})", link.from, link.to, link.weight),
            &mut focus,
        );
    }

    // (iv) provenance traces
    for t in traces.iter().take(4) {
        push(format!("graph path: {t}"), &mut focus);
    }

    focus
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

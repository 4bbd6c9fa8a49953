//! Graph materialization from indexed rows.
//!
//! The graph is derived state: each build drops the repo's prior nodes and
//! edges and rewrites them from `file_index` + `symbols` + `symbol_refs`.

use std::collections::HashMap;
use std::collections::HashSet;

use serde_json::json;
use tracing::info;

use store::{
    FileIndexRow, GraphNodeType, NewGraphEdge, NewGraphNode, RefKind, Store, SymbolReferenceRow,
    SymbolRow,
};

use crate::errors::GraphResult;
use crate::model::EdgeType;
use crate::resolve::{package_root, resolve_import};

const MAX_EXAMPLES: usize = 5;
const MAX_EXPORT_MATCHES: usize = 5;
const MAX_CALL_CANDIDATES: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct GraphBuildSummary {
    pub nodes: usize,
    pub edges: usize,
    pub promoted_deps: usize,
}

/// Rebuild the persisted graph for `repo_id`.
pub fn build_graph(store: &Store, repo_id: i64) -> GraphResult<GraphBuildSummary> {
    let files: Vec<FileIndexRow> = store
        .list_files(repo_id)?
        .into_iter()
        .filter(|f| !f.is_pattern)
        .collect();
    let symbols = store.symbols_for_repo(repo_id)?;
    let refs = store.refs_for_repo(repo_id)?;

    let mut b = Builder::default();
    b.add_files(&files);
    b.add_symbols(&files, &symbols);
    b.add_refs(&files, &symbols, &refs);
    let (nodes, edges, promoted) = b.finish();

    let summary = GraphBuildSummary {
        nodes: nodes.len(),
        edges: edges.len(),
        promoted_deps: promoted,
    };
    store.replace_graph(repo_id, &nodes, &edges)?;
    info!(
        repo_id,
        nodes = summary.nodes,
        edges = summary.edges,
        promoted = summary.promoted_deps,
        "graph: rebuilt"
    );
    Ok(summary)
}

/// Stable key for a symbol node.
pub fn symbol_key(path: &str, name: &str, start_line: i64) -> String {
    format!("{path}#{name}@{start_line}")
}

/// Module of a path: its first segment, `"(root)"` for top-level files.
pub fn module_of(path: &str) -> String {
    match path.find('/') {
        Some(i) => path[..i].to_string(),
        None => "(root)".to_string(),
    }
}

/// Loose name normalization shared by export matching and call inference.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

#[derive(Default)]
struct Builder {
    nodes: Vec<NewGraphNode>,
    by_key: HashMap<(GraphNodeType, String), usize>,
    edges: HashMap<(usize, usize, EdgeType), (i64, Vec<String>)>,
}

impl Builder {
    fn ensure_node(
        &mut self,
        node_type: GraphNodeType,
        key: &str,
        file_id: Option<i64>,
        symbol_id: Option<i64>,
        data: serde_json::Value,
    ) -> usize {
        if let Some(&ix) = self.by_key.get(&(node_type, key.to_string())) {
            return ix;
        }
        let ix = self.nodes.len();
        self.nodes.push(NewGraphNode {
            node_type,
            key: key.to_string(),
            file_id,
            symbol_id,
            data,
        });
        self.by_key.insert((node_type, key.to_string()), ix);
        ix
    }

    fn find(&self, node_type: GraphNodeType, key: &str) -> Option<usize> {
        self.by_key.get(&(node_type, key.to_string())).copied()
    }

    fn add_edge(&mut self, from: usize, to: usize, ty: EdgeType, example: Option<String>) {
        let entry = self.edges.entry((from, to, ty)).or_insert((0, Vec::new()));
        entry.0 += 1;
        if let Some(ex) = example {
            if entry.1.len() < MAX_EXAMPLES && !entry.1.contains(&ex) {
                entry.1.push(ex);
            }
        }
    }

    fn add_files(&mut self, files: &[FileIndexRow]) {
        for f in files {
            let file_ix = self.ensure_node(
                GraphNodeType::File,
                &f.path,
                Some(f.id),
                None,
                json!({ "language": f.language }),
            );

            // Directory chain: every prefix becomes a node.
            let segments: Vec<&str> = f.path.split('/').collect();
            let mut prev_dir: Option<usize> = None;
            for i in 0..segments.len().saturating_sub(1) {
                let dir_path = segments[..=i].join("/");
                let dir_ix =
                    self.ensure_node(GraphNodeType::Directory, &dir_path, None, None, json!({}));
                if let Some(parent) = prev_dir {
                    self.add_edge(parent, dir_ix, EdgeType::DirContainsDir, None);
                }
                prev_dir = Some(dir_ix);
            }
            if let Some(dir_ix) = prev_dir {
                self.add_edge(dir_ix, file_ix, EdgeType::DirContainsFile, None);
            }

            let module = module_of(&f.path);
            let module_ix = self.ensure_node(GraphNodeType::Module, &module, None, None, json!({}));
            self.add_edge(module_ix, file_ix, EdgeType::ModuleContains, None);
        }
    }

    fn add_symbols(&mut self, files: &[FileIndexRow], symbols: &[SymbolRow]) {
        let path_by_file: HashMap<i64, &str> =
            files.iter().map(|f| (f.id, f.path.as_str())).collect();

        let mut by_file: HashMap<i64, Vec<&SymbolRow>> = HashMap::new();
        for s in symbols {
            by_file.entry(s.file_id).or_default().push(s);
        }

        for (file_id, file_symbols) in &by_file {
            let Some(&path) = path_by_file.get(file_id) else {
                continue;
            };
            let Some(file_ix) = self.find(GraphNodeType::File, path) else {
                continue;
            };

            let mut sym_ix: HashMap<i64, usize> = HashMap::new();
            for s in file_symbols {
                let ix = self.ensure_node(
                    GraphNodeType::Symbol,
                    &symbol_key(path, &s.name, s.start_line),
                    Some(*file_id),
                    Some(s.id),
                    json!({
                        "name": s.name,
                        "kind": s.kind,
                        "path": path,
                        "start_line": s.start_line,
                        "end_line": s.end_line,
                    }),
                );
                sym_ix.insert(s.id, ix);
                self.add_edge(file_ix, ix, EdgeType::ContainsSymbol, None);
            }

            // Smallest strictly-containing symbol becomes the parent.
            for s in file_symbols {
                let parent = file_symbols
                    .iter()
                    .filter(|t| {
                        t.id != s.id
                            && t.start_line <= s.start_line
                            && t.end_line >= s.end_line
                            && (t.end_line - t.start_line) > (s.end_line - s.start_line)
                    })
                    .min_by_key(|t| t.end_line - t.start_line);
                if let Some(p) = parent {
                    let ty = if is_class_like(&p.kind) {
                        EdgeType::ClassContainsSymbol
                    } else {
                        EdgeType::SymbolContainsSymbol
                    };
                    self.add_edge(sym_ix[&p.id], sym_ix[&s.id], ty, None);
                }
            }
        }
    }

    fn add_refs(
        &mut self,
        files: &[FileIndexRow],
        symbols: &[SymbolRow],
        refs: &[SymbolReferenceRow],
    ) {
        let path_by_file: HashMap<i64, &str> =
            files.iter().map(|f| (f.id, f.path.as_str())).collect();
        let path_set: HashSet<String> = files.iter().map(|f| f.path.clone()).collect();

        let mut symbols_by_file: HashMap<i64, Vec<&SymbolRow>> = HashMap::new();
        let mut symbols_by_norm: HashMap<String, Vec<&SymbolRow>> = HashMap::new();
        for s in symbols {
            symbols_by_file.entry(s.file_id).or_default().push(s);
            symbols_by_norm
                .entry(normalize_name(&s.name))
                .or_default()
                .push(s);
        }

        for r in refs {
            let Some(&path) = path_by_file.get(&r.file_id) else {
                continue;
            };
            let Some(file_ix) = self.find(GraphNodeType::File, path) else {
                continue;
            };

            match r.kind {
                RefKind::Import => {
                    if let Some(target) = resolve_import(path, &r.ref_name, &path_set) {
                        if target == path {
                            continue;
                        }
                        let Some(target_ix) = self.find(GraphNodeType::File, &target) else {
                            continue;
                        };
                        self.add_edge(
                            file_ix,
                            target_ix,
                            EdgeType::FileDep,
                            Some(r.ref_name.clone()),
                        );
                        if let Some(origin) = enclosing_symbol(&symbols_by_file, r) {
                            if let Some(sym_ix) = self.find(
                                GraphNodeType::Symbol,
                                &symbol_key(path, &origin.name, origin.start_line),
                            ) {
                                self.add_edge(sym_ix, target_ix, EdgeType::SymbolImportsFile, None);
                            }
                        }
                        let (m1, m2) = (module_of(path), module_of(&target));
                        if m1 != m2 {
                            let from = self.ensure_node(
                                GraphNodeType::Module,
                                &m1,
                                None,
                                None,
                                json!({}),
                            );
                            let to = self.ensure_node(
                                GraphNodeType::Module,
                                &m2,
                                None,
                                None,
                                json!({}),
                            );
                            self.add_edge(from, to, EdgeType::ModuleDep, None);
                        }
                    } else if let Some(root) = package_root(&r.ref_name) {
                        let ext_ix = self.ensure_node(
                            GraphNodeType::External,
                            &root,
                            None,
                            None,
                            json!({}),
                        );
                        self.add_edge(
                            file_ix,
                            ext_ix,
                            EdgeType::ExternalDep,
                            Some(r.ref_name.clone()),
                        );
                    }
                }
                RefKind::Export => {
                    let norm = normalize_name(&r.ref_name);
                    let matches = symbols_by_file
                        .get(&r.file_id)
                        .map(Vec::as_slice)
                        .unwrap_or(&[])
                        .iter()
                        .filter(|s| normalize_name(&s.name) == norm)
                        .take(MAX_EXPORT_MATCHES)
                        .copied()
                        .collect::<Vec<_>>();
                    for s in matches {
                        if let Some(sym_ix) = self.find(
                            GraphNodeType::Symbol,
                            &symbol_key(path, &s.name, s.start_line),
                        ) {
                            self.add_edge(file_ix, sym_ix, EdgeType::ExportsSymbol, None);
                        }
                    }
                }
                RefKind::Call => {
                    let norm = normalize_name(&r.ref_name);
                    let Some(candidates) = symbols_by_norm.get(&norm) else {
                        continue;
                    };
                    if candidates.is_empty() || candidates.len() > MAX_CALL_CANDIDATES {
                        continue;
                    }
                    if !candidates.iter().any(|c| c.file_id != r.file_id) {
                        continue;
                    }
                    let caller = enclosing_symbol(&symbols_by_file, r);
                    for cand in candidates.iter().filter(|c| c.file_id != r.file_id) {
                        let Some(&cand_path) = path_by_file.get(&cand.file_id) else {
                            continue;
                        };
                        let Some(cand_file_ix) = self.find(GraphNodeType::File, cand_path) else {
                            continue;
                        };
                        if let Some(caller) = caller {
                            let from = self.find(
                                GraphNodeType::Symbol,
                                &symbol_key(path, &caller.name, caller.start_line),
                            );
                            let to = self.find(
                                GraphNodeType::Symbol,
                                &symbol_key(cand_path, &cand.name, cand.start_line),
                            );
                            if let (Some(from), Some(to)) = (from, to) {
                                self.add_edge(from, to, EdgeType::ReferencesSymbol, None);
                            }
                        }
                        self.add_edge(
                            file_ix,
                            cand_file_ix,
                            EdgeType::FileDepInferred,
                            Some(format!("{}@L{}", r.ref_name, r.line)),
                        );
                    }
                }
            }
        }
    }

    fn finish(self) -> (Vec<NewGraphNode>, Vec<NewGraphEdge>, usize) {
        let mut edges: Vec<NewGraphEdge> = Vec::with_capacity(self.edges.len());
        let mut promoted = 0usize;

        let mut items: Vec<_> = self.edges.into_iter().collect();
        items.sort_by_key(|((from, to, ty), _)| (*from, *to, ty.as_str()));

        for ((from, to, ty), (weight, examples)) in items {
            // Repeated call inference is strong enough to count as a real dep.
            if ty == EdgeType::FileDepInferred && weight >= 2 {
                edges.push(NewGraphEdge {
                    from_index: from,
                    to_index: to,
                    edge_type: EdgeType::FileDep.as_str().to_string(),
                    weight,
                    examples: examples.clone(),
                    source: Some("inferred".to_string()),
                });
                promoted += 1;
            }
            edges.push(NewGraphEdge {
                from_index: from,
                to_index: to,
                edge_type: ty.as_str().to_string(),
                weight,
                examples,
                source: None,
            });
        }
        (self.nodes, edges, promoted)
    }
}

fn is_class_like(kind: &str) -> bool {
    matches!(kind, "class" | "struct" | "interface" | "enum")
}

fn enclosing_symbol<'a>(
    symbols_by_file: &'a HashMap<i64, Vec<&'a SymbolRow>>,
    r: &SymbolReferenceRow,
) -> Option<&'a SymbolRow> {
    symbols_by_file
        .get(&r.file_id)?
        .iter()
        .filter(|s| s.start_line <= r.line && s.end_line >= r.line)
        .min_by_key(|s| s.end_line - s.start_line)
        .copied()
}

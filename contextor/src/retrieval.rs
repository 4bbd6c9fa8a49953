//! Hybrid retrieval: semantic + lexical channels fused with reciprocal-rank
//! fusion and additive boosts, then anchored selection.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use store::{EmbeddingKind, EmbeddingRecord, Store};

use crate::config::RetrievalConfig;
use crate::errors::ContextorResult;
use crate::query::{path_like_tokens, tokenize, truncate_chars};
use crate::types::RetrievedItem;

const PAGE_SIZE: usize = 2_000;
const MAX_EMBEDDINGS: usize = 80_000;
const RRF_K: f64 = 50.0;
const LEXICAL_TEXT_CAP: usize = 2_252; // ~2.2 KiB of text feeds the lexical channel
const PATH_TOKEN_BOOST: f64 = 0.04;

/// One scored embedding before selection.
#[derive(Debug, Clone)]
pub struct ScoredEmbedding {
    pub path: String,
    pub kind: EmbeddingKind,
    pub symbol: Option<String>,
    pub text: String,
    pub score: f64,
}

/// Output of the retrieval stage: the selected items plus the best retrieval
/// score per path (consumed by fusion).
#[derive(Debug, Clone, Default)]
pub struct RetrievalOutcome {
    pub items: Vec<RetrievedItem>,
    pub score_by_path: HashMap<String, f64>,
}

/// Run hybrid retrieval over the repo's embedding snapshot.
pub async fn retrieve(
    store: &Store,
    repo_id: i64,
    query: &str,
    query_vector: &[f32],
    changed_paths: &HashSet<String>,
    cfg: &RetrievalConfig,
) -> ContextorResult<RetrievalOutcome> {
    // Snapshot: descending-id pages, bounded.
    let mut records: Vec<EmbeddingRecord> = Vec::new();
    let mut cursor: Option<i64> = None;
    loop {
        let page = store.page_embeddings(repo_id, cursor, PAGE_SIZE)?;
        if page.is_empty() {
            break;
        }
        cursor = page.last().map(|r| r.id);
        records.extend(page);
        if records.len() >= MAX_EMBEDDINGS {
            records.truncate(MAX_EMBEDDINGS);
            break;
        }
    }
    debug!(repo_id, embeddings = records.len(), "retrieval: snapshot loaded");
    if records.is_empty() {
        return Ok(RetrievalOutcome::default());
    }

    let query_tokens = tokenize(query);
    let path_tokens = path_like_tokens(&query_tokens);
    let changed_dirs: HashSet<&str> = changed_paths.iter().map(|p| parent_dir(p)).collect();

    // Channel scores.
    let mut semantic = Vec::with_capacity(records.len());
    let mut lexical = Vec::with_capacity(records.len());
    for r in &records {
        semantic.push(normalized_cosine(query_vector, &r.vector));
        lexical.push(lexical_overlap(&query_tokens, r));
    }

    // Ranks for RRF (0-based rank of each record in each channel).
    let rank_of = |scores: &[f64]| -> Vec<usize> {
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        let mut ranks = vec![0usize; scores.len()];
        for (rank, &i) in order.iter().enumerate() {
            ranks[i] = rank;
        }
        ranks
    };
    let sem_rank = rank_of(&semantic);
    let lex_rank = rank_of(&lexical);

    let mut scored: Vec<ScoredEmbedding> = Vec::with_capacity(records.len());
    for (i, r) in records.iter().enumerate() {
        let Some(path) = r.path.clone() else { continue };

        let mut path_boost = 0.0;
        if changed_paths.contains(&path) {
            path_boost += cfg.changed_path_boost;
        } else if changed_dirs.contains(parent_dir(&path)) {
            path_boost += cfg.same_directory_boost;
        }
        if path_tokens.iter().any(|t| path.contains(t.as_str())) {
            path_boost += PATH_TOKEN_BOOST;
        }

        let kind_boost = match r.kind {
            EmbeddingKind::Symbol => cfg.symbol_boost,
            EmbeddingKind::Chunk => cfg.chunk_boost,
            EmbeddingKind::File => 0.0,
        };
        let pattern_boost = if r.is_pattern { cfg.pattern_boost } else { 0.0 };
        let rrf = 1.0 / (RRF_K + sem_rank[i] as f64) + 1.0 / (RRF_K + lex_rank[i] as f64);

        let score = cfg.semantic_weight * semantic[i]
            + cfg.lexical_weight * lexical[i]
            + cfg.rrf_weight * rrf
            + path_boost
            + kind_boost
            + pattern_boost;

        scored.push(ScoredEmbedding {
            path,
            kind: r.kind,
            symbol: r.symbol_name.clone(),
            text: r.text.clone(),
            score,
        });
    }
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));

    Ok(select(scored, changed_paths, cfg))
}

/// Anchored selection: one best item per changed path first, then greedy by
/// score under the per-path cap; overflow fills only a still-short list.
fn select(
    scored: Vec<ScoredEmbedding>,
    changed_paths: &HashSet<String>,
    cfg: &RetrievalConfig,
) -> RetrievalOutcome {
    let anchor_slots = 2usize.max(cfg.top_k.div_ceil(3));

    let mut best_per_changed: HashMap<&str, usize> = HashMap::new();
    for (i, s) in scored.iter().enumerate() {
        if changed_paths.contains(&s.path) {
            best_per_changed.entry(s.path.as_str()).or_insert(i);
        }
    }
    let mut anchor_ids: Vec<usize> = best_per_changed.into_values().collect();
    anchor_ids.sort_by(|&a, &b| scored[b].score.total_cmp(&scored[a].score));
    anchor_ids.truncate(anchor_slots);

    let mut selected: Vec<usize> = anchor_ids.clone();
    let mut per_path: HashMap<&str, usize> = HashMap::new();
    for &i in &selected {
        *per_path.entry(scored[i].path.as_str()).or_insert(0) += 1;
    }

    for (i, s) in scored.iter().enumerate() {
        if selected.len() >= cfg.top_k {
            break;
        }
        if selected.contains(&i) {
            continue;
        }
        let count = per_path.entry(s.path.as_str()).or_insert(0);
        if *count >= cfg.max_per_path {
            continue;
        }
        *count += 1;
        selected.push(i);
    }

    // Overflow pass ignores the per-path cap when topK is still unfilled.
    if selected.len() < cfg.top_k {
        for i in 0..scored.len() {
            if selected.len() >= cfg.top_k {
                break;
            }
            if !selected.contains(&i) {
                selected.push(i);
            }
        }
    }

    let mut score_by_path: HashMap<String, f64> = HashMap::new();
    for s in &scored {
        let e = score_by_path.entry(s.path.clone()).or_insert(s.score);
        if s.score > *e {
            *e = s.score;
        }
    }

    let items = selected
        .into_iter()
        .map(|i| {
            let s = &scored[i];
            RetrievedItem {
                path: s.path.clone(),
                kind: s.kind.as_str().to_string(),
                symbol: s.symbol.clone(),
                score: s.score,
                snippet: truncate_chars(&s.text, 400).to_string(),
            }
        })
        .collect();

    RetrievalOutcome {
        items,
        score_by_path,
    }
}

/// Cosine similarity normalized into `[0, 1]`.
pub fn normalized_cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.5; // unknown, neither near nor far
    }
    let mut dot = 0f64;
    let mut na = 0f64;
    let mut nb = 0f64;
    for (x, y) in a.iter().zip(b) {
        dot += (*x as f64) * (*y as f64);
        na += (*x as f64) * (*x as f64);
        nb += (*y as f64) * (*y as f64);
    }
    if na == 0.0 || nb == 0.0 {
        return 0.5;
    }
    let cos = dot / (na.sqrt() * nb.sqrt());
    (cos + 1.0) / 2.0
}

/// Jaccard-style token overlap between the query and the embedding's lexical
/// haystack (path + normalized path + symbol + text prefix).
fn lexical_overlap(query_tokens: &HashSet<String>, r: &EmbeddingRecord) -> f64 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let mut hay = String::new();
    if let Some(p) = &r.path {
        hay.push_str(p);
        hay.push('\n');
        hay.push_str(&p.replace('/', " ").replace(['_', '-'], " "));
        hay.push('\n');
    }
    if let Some(s) = &r.symbol_name {
        hay.push_str(s);
        hay.push('\n');
    }
    hay.push_str(truncate_chars(&r.text, LEXICAL_TEXT_CAP));

    let doc_tokens = tokenize(&hay);
    if doc_tokens.is_empty() {
        return 0.0;
    }
    let intersection = query_tokens.intersection(&doc_tokens).count() as f64;
    let union = query_tokens.union(&doc_tokens).count() as f64;
    intersection / union
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

//! Repository indexer.
//!
//! Walks a checkout, extracts symbols and references with tree-sitter,
//! computes file/symbol/chunk embeddings through the embedding provider, and
//! replaces each file's rows in the store atomically.
//!
//! Per-file failures (unreadable content, parser errors) are logged and
//! skipped; they never fail the indexing run.

pub mod chunker;
pub mod embedding;
pub mod errors;
pub mod extract;
pub mod language;
pub mod walk;

use std::collections::HashSet;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use store::{BundleEmbedding, BundleRef, BundleSymbol, EmbeddingKind, FileBundle, Store};

use chunker::{chunk_lines, ChunkConfig};
use embedding::{EmbeddingClient, DEFAULT_EMBED_BATCH};
use errors::IndexerResult;
use language::Language;

/// Indexing knobs; defaults cover the normal review-triggered refresh.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Re-embed even when the content hash is unchanged.
    pub force: bool,
    /// Mark rows as belonging to a pattern repository.
    pub is_pattern: bool,
    pub max_file_bytes: u64,
    pub max_parse_chars: usize,
    pub embed_batch: usize,
    pub chunking: ChunkConfig,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            force: false,
            is_pattern: false,
            max_file_bytes: 1024 * 1024,
            max_parse_chars: 200_000,
            embed_batch: DEFAULT_EMBED_BATCH,
            chunking: ChunkConfig::default(),
        }
    }
}

/// Counters reported after an indexing pass.
#[derive(Debug, Clone, Default)]
pub struct IndexSummary {
    pub files_indexed: usize,
    pub files_unchanged: usize,
    pub files_skipped: usize,
    pub files_removed: usize,
    pub symbols: usize,
    pub chunks: usize,
}

/// Index (or refresh) one repo checkout into the store.
pub async fn index_repo(
    store: &Store,
    repo_id: i64,
    root: &Path,
    embedder: &EmbeddingClient,
    opts: &IndexOptions,
) -> IndexerResult<IndexSummary> {
    let mut summary = IndexSummary::default();
    let candidates = walk::walk_checkout(root, opts.max_file_bytes)?;
    info!(
        repo_id,
        candidates = candidates.len(),
        force = opts.force,
        "index: walk complete"
    );

    let mut seen: HashSet<String> = HashSet::with_capacity(candidates.len());

    for cand in candidates {
        seen.insert(cand.rel_path.clone());
        match index_one_file(store, repo_id, &cand, embedder, opts).await {
            Ok(Some(counts)) => {
                summary.files_indexed += 1;
                summary.symbols += counts.0;
                summary.chunks += counts.1;
            }
            Ok(None) => summary.files_unchanged += 1,
            Err(e) => {
                warn!("index: {} skipped: {e}", cand.rel_path);
                summary.files_skipped += 1;
            }
        }
    }

    // Drop rows for files that disappeared from the checkout.
    for row in store.list_files(repo_id)? {
        if row.is_pattern == opts.is_pattern && !seen.contains(&row.path) {
            store.remove_file(repo_id, &row.path, row.is_pattern)?;
            summary.files_removed += 1;
        }
    }

    info!(
        repo_id,
        indexed = summary.files_indexed,
        unchanged = summary.files_unchanged,
        removed = summary.files_removed,
        "index: done"
    );
    Ok(summary)
}

/// Returns `Ok(None)` when the stored content hash already matches.
async fn index_one_file(
    store: &Store,
    repo_id: i64,
    cand: &walk::CandidateFile,
    embedder: &EmbeddingClient,
    opts: &IndexOptions,
) -> IndexerResult<Option<(usize, usize)>> {
    let bytes = std::fs::read(&cand.abs_path)?;
    if bytes.contains(&0) {
        debug!("index: {} contains NUL, not indexed", cand.rel_path);
        return Err(errors::IndexerError::Parser("binary content".into()));
    }

    let lang = Language::from_path(&cand.rel_path);
    if lang.is_none() && !language::looks_textual(&bytes) {
        return Err(errors::IndexerError::Parser("not textual".into()));
    }

    let content = String::from_utf8_lossy(&bytes).into_owned();
    let content_hash = hex_digest(&content);

    if !opts.force {
        if let Some(existing) = store.get_file(repo_id, &cand.rel_path, opts.is_pattern)? {
            if existing.content_hash == content_hash {
                return Ok(None);
            }
        }
    }

    // Parse errors degrade to an empty extraction; the file still indexes.
    let extraction = match lang {
        Some(l) => {
            let parse_input: &str = if content.len() > opts.max_parse_chars {
                truncate_at_char_boundary(&content, opts.max_parse_chars)
            } else {
                &content
            };
            match extract::extract(l, parse_input) {
                Ok(x) => x,
                Err(e) => {
                    warn!("index: parse failed for {}: {e}", cand.rel_path);
                    extract::Extraction::default()
                }
            }
        }
        None => extract::Extraction::default(),
    };

    let chunks = chunk_lines(&content, opts.chunking);

    // Assemble embedding inputs: one file, one per symbol, one per chunk.
    let mut texts: Vec<String> = Vec::with_capacity(1 + extraction.symbols.len() + chunks.len());
    texts.push(file_embedding_text(&cand.rel_path, &content));
    for s in &extraction.symbols {
        texts.push(format!("{} {}", s.name, s.signature));
    }
    for c in &chunks {
        texts.push(c.text.clone());
    }

    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    for batch in texts.chunks(opts.embed_batch.max(1)) {
        vectors.extend(embedder.embed_batch(batch).await?);
    }

    let mut embeddings = Vec::with_capacity(texts.len());
    let mut vec_iter = vectors.into_iter();
    embeddings.push(BundleEmbedding {
        kind: EmbeddingKind::File,
        symbol_index: None,
        vector: vec_iter.next().unwrap_or_default(),
        text: texts[0].clone(),
    });
    for (i, s) in extraction.symbols.iter().enumerate() {
        embeddings.push(BundleEmbedding {
            kind: EmbeddingKind::Symbol,
            symbol_index: Some(i),
            vector: vec_iter.next().unwrap_or_default(),
            text: format!("{} {}", s.name, s.signature),
        });
    }
    for c in &chunks {
        embeddings.push(BundleEmbedding {
            kind: EmbeddingKind::Chunk,
            symbol_index: None,
            vector: vec_iter.next().unwrap_or_default(),
            text: c.text.clone(),
        });
    }

    let bundle = FileBundle {
        path: cand.rel_path.clone(),
        language: lang.map(|l| l.as_str().to_string()),
        content_hash,
        size: cand.size as i64,
        is_pattern: opts.is_pattern,
        symbols: extraction
            .symbols
            .iter()
            .map(|s| BundleSymbol {
                name: s.name.clone(),
                kind: s.kind.clone(),
                start_line: s.start_line as i64,
                end_line: s.end_line as i64,
                signature: s.signature.clone(),
                hash: hex_digest(&format!("{}:{}:{}", s.name, s.kind, s.signature)),
            })
            .collect(),
        refs: extraction
            .refs
            .iter()
            .map(|r| BundleRef {
                ref_name: r.name.clone(),
                line: r.line as i64,
                kind: r.kind,
            })
            .collect(),
        embeddings,
    };

    store.replace_file_bundle(repo_id, &bundle)?;
    Ok(Some((bundle.symbols.len(), chunks.len())))
}

/// Path plus capped content, the input for `file`-kind embeddings.
fn file_embedding_text(path: &str, content: &str) -> String {
    const CAP: usize = 8_000;
    let body = if content.len() > CAP {
        truncate_at_char_boundary(content, CAP)
    } else {
        content
    };
    format!("{path}\n{body}")
}

fn truncate_at_char_boundary(s: &str, mut at: usize) -> &str {
    while at > 0 && !s.is_char_boundary(at) {
        at -= 1;
    }
    &s[..at]
}

fn hex_digest(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

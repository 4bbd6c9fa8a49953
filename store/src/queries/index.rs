//! File index, symbols, references, embeddings.
//!
//! Re-indexing a file replaces all of its rows in one transaction so readers
//! never observe a half-indexed file.

use rusqlite::{OptionalExtension, params};

use crate::errors::StoreResult;
use crate::models::{
    EmbeddingKind, EmbeddingRecord, FileIndexRow, RefKind, SymbolReferenceRow, SymbolRow,
};
use crate::queries::decode_err;
use crate::vectors::{blob_to_vec, vec_to_blob};
use crate::Store;

/// Everything the indexer produced for one file.
#[derive(Debug, Clone, Default)]
pub struct FileBundle {
    pub path: String,
    pub language: Option<String>,
    pub content_hash: String,
    pub size: i64,
    pub is_pattern: bool,
    pub symbols: Vec<BundleSymbol>,
    pub refs: Vec<BundleRef>,
    pub embeddings: Vec<BundleEmbedding>,
}

#[derive(Debug, Clone)]
pub struct BundleSymbol {
    pub name: String,
    pub kind: String,
    pub start_line: i64,
    pub end_line: i64,
    pub signature: String,
    pub hash: String,
}

#[derive(Debug, Clone)]
pub struct BundleRef {
    pub ref_name: String,
    pub line: i64,
    pub kind: RefKind,
}

#[derive(Debug, Clone)]
pub struct BundleEmbedding {
    pub kind: EmbeddingKind,
    /// Index into [`FileBundle::symbols`] for `symbol`-kind embeddings.
    pub symbol_index: Option<usize>,
    pub vector: Vec<f32>,
    pub text: String,
}

impl Store {
    pub fn get_file(
        &self,
        repo_id: i64,
        path: &str,
        is_pattern: bool,
    ) -> StoreResult<Option<FileIndexRow>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                "SELECT id, repo_id, path, language, content_hash, size, is_pattern
                 FROM file_index WHERE repo_id = ?1 AND path = ?2 AND is_pattern = ?3",
                params![repo_id, path, is_pattern as i64],
                map_file,
            )
            .optional()?)
    }

    pub fn list_files(&self, repo_id: i64) -> StoreResult<Vec<FileIndexRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, repo_id, path, language, content_hash, size, is_pattern
             FROM file_index WHERE repo_id = ?1 ORDER BY path",
        )?;
        let rows = stmt.query_map(params![repo_id], map_file)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Replace the file row and all dependent rows atomically.
    pub fn replace_file_bundle(&self, repo_id: i64, bundle: &FileBundle) -> StoreResult<i64> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        if let Some(old_id) = tx
            .query_row(
                "SELECT id FROM file_index WHERE repo_id = ?1 AND path = ?2 AND is_pattern = ?3",
                params![repo_id, bundle.path, bundle.is_pattern as i64],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
        {
            tx.execute("DELETE FROM embeddings WHERE file_id = ?1", params![old_id])?;
            tx.execute("DELETE FROM symbol_refs WHERE file_id = ?1", params![old_id])?;
            tx.execute("DELETE FROM symbols WHERE file_id = ?1", params![old_id])?;
            tx.execute("DELETE FROM file_index WHERE id = ?1", params![old_id])?;
        }

        tx.execute(
            "INSERT INTO file_index (repo_id, path, language, content_hash, size, is_pattern)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                repo_id,
                bundle.path,
                bundle.language,
                bundle.content_hash,
                bundle.size,
                bundle.is_pattern as i64
            ],
        )?;
        let file_id = tx.last_insert_rowid();

        let mut symbol_ids = Vec::with_capacity(bundle.symbols.len());
        for s in &bundle.symbols {
            tx.execute(
                "INSERT INTO symbols
                    (repo_id, file_id, name, kind, start_line, end_line, signature, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    repo_id,
                    file_id,
                    s.name,
                    s.kind,
                    s.start_line,
                    s.end_line,
                    s.signature,
                    s.hash
                ],
            )?;
            symbol_ids.push(tx.last_insert_rowid());
        }

        for r in &bundle.refs {
            tx.execute(
                "INSERT INTO symbol_refs (repo_id, file_id, ref_name, line, kind)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![repo_id, file_id, r.ref_name, r.line, r.kind.as_str()],
            )?;
        }

        for e in &bundle.embeddings {
            let symbol_id = e.symbol_index.and_then(|i| symbol_ids.get(i)).copied();
            tx.execute(
                "INSERT INTO embeddings (repo_id, file_id, symbol_id, kind, vector, text)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    repo_id,
                    file_id,
                    symbol_id,
                    e.kind.as_str(),
                    vec_to_blob(&e.vector),
                    e.text
                ],
            )?;
        }

        tx.commit()?;
        Ok(file_id)
    }

    /// Remove a file (and its dependent rows) that disappeared from the checkout.
    pub fn remove_file(&self, repo_id: i64, path: &str, is_pattern: bool) -> StoreResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        if let Some(id) = tx
            .query_row(
                "SELECT id FROM file_index WHERE repo_id = ?1 AND path = ?2 AND is_pattern = ?3",
                params![repo_id, path, is_pattern as i64],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
        {
            tx.execute("DELETE FROM embeddings WHERE file_id = ?1", params![id])?;
            tx.execute("DELETE FROM symbol_refs WHERE file_id = ?1", params![id])?;
            tx.execute("DELETE FROM symbols WHERE file_id = ?1", params![id])?;
            tx.execute("DELETE FROM file_index WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn symbols_for_repo(&self, repo_id: i64) -> StoreResult<Vec<SymbolRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, repo_id, file_id, name, kind, start_line, end_line, signature, hash
             FROM symbols WHERE repo_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![repo_id], map_symbol)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn refs_for_repo(&self, repo_id: i64) -> StoreResult<Vec<SymbolReferenceRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, repo_id, file_id, ref_name, line, kind
             FROM symbol_refs WHERE repo_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![repo_id], |row| {
            let kind: String = row.get(5)?;
            Ok(SymbolReferenceRow {
                id: row.get(0)?,
                repo_id: row.get(1)?,
                file_id: row.get(2)?,
                ref_name: row.get(3)?,
                line: row.get(4)?,
                kind: RefKind::parse(&kind).map_err(decode_err)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// One page of embeddings in descending-id order, joined with path and
    /// symbol context. `before_id = None` starts from the newest row.
    pub fn page_embeddings(
        &self,
        repo_id: i64,
        before_id: Option<i64>,
        limit: usize,
    ) -> StoreResult<Vec<EmbeddingRecord>> {
        let conn = self.lock();
        let cursor = before_id.unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(
            "SELECT e.id, e.repo_id, e.file_id, e.symbol_id, e.kind, e.vector, e.text,
                    f.path, s.name, COALESCE(f.is_pattern, 0)
             FROM embeddings e
             LEFT JOIN file_index f ON f.id = e.file_id
             LEFT JOIN symbols s ON s.id = e.symbol_id
             WHERE e.repo_id = ?1 AND e.id < ?2
             ORDER BY e.id DESC LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![repo_id, cursor, limit as i64], |row| {
            let kind: String = row.get(4)?;
            let blob: Vec<u8> = row.get(5)?;
            Ok(EmbeddingRecord {
                id: row.get(0)?,
                repo_id: row.get(1)?,
                file_id: row.get(2)?,
                symbol_id: row.get(3)?,
                kind: EmbeddingKind::parse(&kind).map_err(decode_err)?,
                vector: blob_to_vec(&blob),
                text: row.get(6)?,
                path: row.get(7)?,
                symbol_name: row.get(8)?,
                is_pattern: row.get::<_, i64>(9)? != 0,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn map_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileIndexRow> {
    Ok(FileIndexRow {
        id: row.get(0)?,
        repo_id: row.get(1)?,
        path: row.get(2)?,
        language: row.get(3)?,
        content_hash: row.get(4)?,
        size: row.get(5)?,
        is_pattern: row.get::<_, i64>(6)? != 0,
    })
}

fn map_symbol(row: &rusqlite::Row<'_>) -> rusqlite::Result<SymbolRow> {
    Ok(SymbolRow {
        id: row.get(0)?,
        repo_id: row.get(1)?,
        file_id: row.get(2)?,
        name: row.get(3)?,
        kind: row.get(4)?,
        start_line: row.get(5)?,
        end_line: row.get(6)?,
        signature: row.get(7)?,
        hash: row.get(8)?,
    })
}

//! Finding rows and lifecycle updates.

use rusqlite::{OptionalExtension, params};

use crate::errors::{StoreError, StoreResult};
use crate::models::{CommentKind, Finding, FindingStatus, FindingUpdate, NewFinding};
use crate::queries::decode_err;
use crate::Store;

const COLS: &str = "id, pull_request_id, run_id, last_seen_run_id, status, fingerprint, \
                    hunk_hash, context_hash, comment_id, comment_key, path, line, side, \
                    severity, category, title, body, evidence, suggested_patch, rule_id, \
                    comment_type";

impl Store {
    pub fn insert_finding(&self, f: &NewFinding) -> StoreResult<Finding> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO findings
                (pull_request_id, run_id, last_seen_run_id, status, fingerprint, hunk_hash,
                 context_hash, comment_key, path, line, side, severity, category, title,
                 body, evidence, suggested_patch, rule_id, comment_type)
             VALUES (?1, ?2, ?2, 'open', ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                f.pull_request_id,
                f.run_id,
                f.fingerprint,
                f.hunk_hash,
                f.context_hash,
                f.comment_key,
                f.path,
                f.line,
                f.side,
                f.severity,
                f.category,
                f.title,
                f.body,
                f.evidence,
                f.suggested_patch,
                f.rule_id,
                f.comment_type.as_str()
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {COLS} FROM findings WHERE id = ?1"),
            params![id],
            map_finding,
        )
        .map_err(Into::into)
    }

    pub fn get_finding(&self, id: i64) -> StoreResult<Finding> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {COLS} FROM findings WHERE id = ?1"),
            params![id],
            map_finding,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("finding {id}")))
    }

    /// All currently-open findings for a PR, oldest first.
    pub fn open_findings_for_pr(&self, pull_request_id: i64) -> StoreResult<Vec<Finding>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLS} FROM findings WHERE pull_request_id = ?1 AND status = 'open'
             ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![pull_request_id], map_finding)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// All findings for a PR regardless of status.
    pub fn findings_for_pr(&self, pull_request_id: i64) -> StoreResult<Vec<Finding>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLS} FROM findings WHERE pull_request_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![pull_request_id], map_finding)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Historical findings across the whole repo, used for hotspot grouping.
    pub fn findings_for_repo(&self, repo_id: i64) -> StoreResult<Vec<Finding>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM findings f
             JOIN pull_requests pr ON pr.id = f.pull_request_id
             WHERE pr.repo_id = ?1 ORDER BY f.id",
            COLS.split(", ")
                .map(|c| format!("f.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        ))?;
        let rows = stmt.query_map(params![repo_id], map_finding)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Refresh a matched finding in place and stamp `last_seen_run_id`.
    pub fn update_matched_finding(
        &self,
        id: i64,
        run_id: i64,
        up: &FindingUpdate,
    ) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE findings SET
                last_seen_run_id = ?2, line = ?3, side = ?4, severity = ?5, body = ?6,
                evidence = ?7, suggested_patch = ?8, rule_id = ?9, hunk_hash = ?10,
                context_hash = ?11, comment_type = ?12, status = 'open'
             WHERE id = ?1",
            params![
                id,
                run_id,
                up.line,
                up.side,
                up.severity,
                up.body,
                up.evidence,
                up.suggested_patch,
                up.rule_id,
                up.hunk_hash,
                up.context_hash,
                up.comment_type.as_str()
            ],
        )?;
        Ok(())
    }

    pub fn set_finding_status(&self, id: i64, status: FindingStatus) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE findings SET status = ?2 WHERE id = ?1",
            params![id, status.as_str()],
        )?;
        Ok(())
    }

    /// Attach the provider comment id once the inline comment is posted.
    pub fn set_finding_comment_id(&self, id: i64, provider_comment_id: &str) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE findings SET comment_id = ?2 WHERE id = ?1",
            params![id, provider_comment_id],
        )?;
        Ok(())
    }

    /// Resolve a finding by the provider comment id of its inline thread.
    pub fn find_finding_by_comment_id(
        &self,
        pull_request_id: i64,
        provider_comment_id: &str,
    ) -> StoreResult<Option<Finding>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {COLS} FROM findings
                     WHERE pull_request_id = ?1 AND comment_id = ?2
                     ORDER BY id DESC LIMIT 1"
                ),
                params![pull_request_id, provider_comment_id],
                map_finding,
            )
            .optional()?)
    }
}

fn map_finding(row: &rusqlite::Row<'_>) -> rusqlite::Result<Finding> {
    let status: String = row.get(4)?;
    let comment_type: String = row.get(20)?;
    Ok(Finding {
        id: row.get(0)?,
        pull_request_id: row.get(1)?,
        run_id: row.get(2)?,
        last_seen_run_id: row.get(3)?,
        status: FindingStatus::parse(&status).map_err(decode_err)?,
        fingerprint: row.get(5)?,
        hunk_hash: row.get(6)?,
        context_hash: row.get(7)?,
        comment_id: row.get(8)?,
        comment_key: row.get(9)?,
        path: row.get(10)?,
        line: row.get(11)?,
        side: row.get(12)?,
        severity: row.get(13)?,
        category: row.get(14)?,
        title: row.get(15)?,
        body: row.get(16)?,
        evidence: row.get(17)?,
        suggested_patch: row.get(18)?,
        rule_id: row.get(19)?,
        comment_type: CommentKind::parse(&comment_type).map_err(decode_err)?,
    })
}

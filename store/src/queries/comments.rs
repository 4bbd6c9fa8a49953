//! Posted review comments (inline threads and the status summary slot).

use rusqlite::{OptionalExtension, params};

use crate::errors::StoreResult;
use crate::models::{CommentKind, ReviewComment};
use crate::queries::decode_err;
use crate::Store;

const COLS: &str = "id, pull_request_id, finding_id, kind, provider_comment_id, body, url";

impl Store {
    /// Upsert keyed by `(pull_request, provider_comment_id)`.
    pub fn upsert_review_comment(
        &self,
        pull_request_id: i64,
        finding_id: Option<i64>,
        kind: CommentKind,
        provider_comment_id: &str,
        body: &str,
        url: Option<&str>,
    ) -> StoreResult<ReviewComment> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO review_comments
                (pull_request_id, finding_id, kind, provider_comment_id, body, url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (pull_request_id, provider_comment_id) DO UPDATE SET
                finding_id = COALESCE(excluded.finding_id, review_comments.finding_id),
                body = excluded.body,
                url = COALESCE(excluded.url, review_comments.url)",
            params![
                pull_request_id,
                finding_id,
                kind.as_str(),
                provider_comment_id,
                body,
                url
            ],
        )?;
        let row = conn.query_row(
            &format!(
                "SELECT {COLS} FROM review_comments
                 WHERE pull_request_id = ?1 AND provider_comment_id = ?2"
            ),
            params![pull_request_id, provider_comment_id],
            map_comment,
        )?;
        Ok(row)
    }

    /// The single status summary comment for a PR, if one was posted.
    pub fn find_summary_comment(&self, pull_request_id: i64) -> StoreResult<Option<ReviewComment>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {COLS} FROM review_comments
                     WHERE pull_request_id = ?1 AND kind = 'summary'
                     ORDER BY id DESC LIMIT 1"
                ),
                params![pull_request_id],
                map_comment,
            )
            .optional()?)
    }

    pub fn find_comment_by_provider_id(
        &self,
        pull_request_id: i64,
        provider_comment_id: &str,
    ) -> StoreResult<Option<ReviewComment>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {COLS} FROM review_comments
                     WHERE pull_request_id = ?1 AND provider_comment_id = ?2"
                ),
                params![pull_request_id, provider_comment_id],
                map_comment,
            )
            .optional()?)
    }
}

fn map_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReviewComment> {
    let kind: String = row.get(3)?;
    Ok(ReviewComment {
        id: row.get(0)?,
        pull_request_id: row.get(1)?,
        finding_id: row.get(2)?,
        kind: CommentKind::parse(&kind).map_err(decode_err)?,
        provider_comment_id: row.get(4)?,
        body: row.get(5)?,
        url: row.get(6)?,
    })
}

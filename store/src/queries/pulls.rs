//! Pull request rows.

use rusqlite::{OptionalExtension, params};

use crate::errors::{StoreError, StoreResult};
use crate::models::{PullRequest, PullRequestUpsert};
use crate::Store;

const COLS: &str = "id, repo_id, number, external_id, title, body, state, base_ref, head_ref, \
                    base_sha, head_sha, draft, author_id";

impl Store {
    pub fn upsert_pull_request(&self, up: &PullRequestUpsert) -> StoreResult<PullRequest> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO pull_requests
                (repo_id, number, external_id, title, body, state, base_ref, head_ref,
                 base_sha, head_sha, draft, author_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT (repo_id, number) DO UPDATE SET
                external_id = excluded.external_id,
                title = excluded.title,
                body = excluded.body,
                state = excluded.state,
                base_ref = excluded.base_ref,
                head_ref = excluded.head_ref,
                base_sha = excluded.base_sha,
                head_sha = excluded.head_sha,
                draft = excluded.draft,
                author_id = COALESCE(excluded.author_id, pull_requests.author_id)",
            params![
                up.repo_id,
                up.number,
                up.external_id,
                up.title,
                up.body,
                up.state,
                up.base_ref,
                up.head_ref,
                up.base_sha,
                up.head_sha,
                up.draft as i64,
                up.author_id
            ],
        )?;
        let pr = conn.query_row(
            &format!("SELECT {COLS} FROM pull_requests WHERE repo_id = ?1 AND number = ?2"),
            params![up.repo_id, up.number],
            map_pr,
        )?;
        Ok(pr)
    }

    pub fn get_pull_request(&self, id: i64) -> StoreResult<PullRequest> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {COLS} FROM pull_requests WHERE id = ?1"),
            params![id],
            map_pr,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("pull request {id}")))
    }

    pub fn find_pull_request(&self, repo_id: i64, number: i64) -> StoreResult<Option<PullRequest>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                &format!("SELECT {COLS} FROM pull_requests WHERE repo_id = ?1 AND number = ?2"),
                params![repo_id, number],
                map_pr,
            )
            .optional()?)
    }
}

fn map_pr(row: &rusqlite::Row<'_>) -> rusqlite::Result<PullRequest> {
    Ok(PullRequest {
        id: row.get(0)?,
        repo_id: row.get(1)?,
        number: row.get(2)?,
        external_id: row.get(3)?,
        title: row.get(4)?,
        body: row.get(5)?,
        state: row.get(6)?,
        base_ref: row.get(7)?,
        head_ref: row.get(8)?,
        base_sha: row.get(9)?,
        head_sha: row.get(10)?,
        draft: row.get::<_, i64>(11)? != 0,
        author_id: row.get(12)?,
    })
}

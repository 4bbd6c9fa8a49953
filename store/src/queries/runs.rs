//! Review run rows and their stage-JSON columns.

use rusqlite::{OptionalExtension, params};

use crate::errors::{StoreError, StoreResult};
use crate::models::{ReviewRun, RunStatus};
use crate::queries::decode_err;
use crate::Store;

const COLS: &str = "id, pull_request_id, head_sha, status, trigger_kind, started_at, \
                    completed_at, draft_json, final_json, verdicts_json, checks_json, \
                    context_pack_json";

/// Which stage-JSON column to set.
#[derive(Debug, Clone, Copy)]
pub enum RunJsonColumn {
    Draft,
    Final,
    Verdicts,
    Checks,
    ContextPack,
}

impl RunJsonColumn {
    fn column(self) -> &'static str {
        match self {
            RunJsonColumn::Draft => "draft_json",
            RunJsonColumn::Final => "final_json",
            RunJsonColumn::Verdicts => "verdicts_json",
            RunJsonColumn::Checks => "checks_json",
            RunJsonColumn::ContextPack => "context_pack_json",
        }
    }
}

impl Store {
    pub fn create_run(
        &self,
        pull_request_id: i64,
        head_sha: &str,
        trigger: &str,
    ) -> StoreResult<ReviewRun> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO review_runs (pull_request_id, head_sha, status, trigger_kind, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                pull_request_id,
                head_sha,
                RunStatus::Running.as_str(),
                trigger,
                Self::now()
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {COLS} FROM review_runs WHERE id = ?1"),
            params![id],
            map_run,
        )
        .map_err(Into::into)
    }

    pub fn get_run(&self, id: i64) -> StoreResult<ReviewRun> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {COLS} FROM review_runs WHERE id = ?1"),
            params![id],
            map_run,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("review run {id}")))
    }

    /// Most recent run for the PR, regardless of status.
    pub fn latest_run_for_pr(&self, pull_request_id: i64) -> StoreResult<Option<ReviewRun>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {COLS} FROM review_runs WHERE pull_request_id = ?1
                     ORDER BY id DESC LIMIT 1"
                ),
                params![pull_request_id],
                map_run,
            )
            .optional()?)
    }

    /// Most recent `completed` run for the PR.
    pub fn latest_completed_run(&self, pull_request_id: i64) -> StoreResult<Option<ReviewRun>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {COLS} FROM review_runs
                     WHERE pull_request_id = ?1 AND status = 'completed'
                     ORDER BY id DESC LIMIT 1"
                ),
                params![pull_request_id],
                map_run,
            )
            .optional()?)
    }

    /// True when a `completed` run already exists for this exact head.
    pub fn completed_run_exists(&self, pull_request_id: i64, head_sha: &str) -> StoreResult<bool> {
        let conn = self.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM review_runs
             WHERE pull_request_id = ?1 AND head_sha = ?2 AND status = 'completed'",
            params![pull_request_id, head_sha],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    pub fn finish_run(&self, id: i64, status: RunStatus) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE review_runs SET status = ?2, completed_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), Self::now()],
        )?;
        Ok(())
    }

    pub fn set_run_json(&self, id: i64, col: RunJsonColumn, json: &str) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute(
            &format!("UPDATE review_runs SET {} = ?2 WHERE id = ?1", col.column()),
            params![id, json],
        )?;
        Ok(())
    }
}

fn map_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReviewRun> {
    let status: String = row.get(3)?;
    Ok(ReviewRun {
        id: row.get(0)?,
        pull_request_id: row.get(1)?,
        head_sha: row.get(2)?,
        status: RunStatus::parse(&status).map_err(decode_err)?,
        trigger: row.get(4)?,
        started_at: row.get(5)?,
        completed_at: row.get(6)?,
        draft_json: row.get(7)?,
        final_json: row.get(8)?,
        verdicts_json: row.get(9)?,
        checks_json: row.get(10)?,
        context_pack_json: row.get(11)?,
    })
}

//! Per-repo rollups written by the analytics worker.

use rusqlite::{OptionalExtension, params};

use crate::errors::StoreResult;
use crate::Store;

#[derive(Debug, Clone, Default)]
pub struct RepoAnalytics {
    pub repo_id: i64,
    pub runs_completed: i64,
    pub findings_total: i64,
    pub findings_fixed: i64,
    pub feedback_positive: i64,
    pub feedback_negative: i64,
    pub updated_at: i64,
}

impl Store {
    pub fn roll_repo_analytics(
        &self,
        repo_id: i64,
        findings_new: i64,
        findings_fixed: i64,
        feedback_positive: i64,
        feedback_negative: i64,
    ) -> StoreResult<RepoAnalytics> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO repo_analytics
                (repo_id, runs_completed, findings_total, findings_fixed,
                 feedback_positive, feedback_negative, updated_at)
             VALUES (?1, 1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (repo_id) DO UPDATE SET
                runs_completed = runs_completed + 1,
                findings_total = findings_total + excluded.findings_total,
                findings_fixed = findings_fixed + excluded.findings_fixed,
                feedback_positive = feedback_positive + excluded.feedback_positive,
                feedback_negative = feedback_negative + excluded.feedback_negative,
                updated_at = excluded.updated_at",
            params![
                repo_id,
                findings_new,
                findings_fixed,
                feedback_positive,
                feedback_negative,
                Self::now()
            ],
        )?;
        self.get_repo_analytics(repo_id)
            .map(|a| a.unwrap_or_default())
    }

    pub fn get_repo_analytics(&self, repo_id: i64) -> StoreResult<Option<RepoAnalytics>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                "SELECT repo_id, runs_completed, findings_total, findings_fixed,
                        feedback_positive, feedback_negative, updated_at
                 FROM repo_analytics WHERE repo_id = ?1",
                params![repo_id],
                |row| {
                    Ok(RepoAnalytics {
                        repo_id: row.get(0)?,
                        runs_completed: row.get(1)?,
                        findings_total: row.get(2)?,
                        findings_fixed: row.get(3)?,
                        feedback_positive: row.get(4)?,
                        feedback_negative: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                },
            )
            .optional()?)
    }
}

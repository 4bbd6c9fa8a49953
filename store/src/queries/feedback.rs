//! Reviewer feedback (reactions and thread replies).

use rusqlite::params;

use crate::errors::StoreResult;
use crate::models::FeedbackType;
use crate::Store;

/// Per-category accept/reject counts derived from stored feedback, used by
/// the reviewer prompt hint and the strictness filter.
#[derive(Debug, Clone, Default)]
pub struct CategorySignal {
    pub category: String,
    pub accepted: i64,
    pub rejected: i64,
}

impl Store {
    pub fn insert_feedback(
        &self,
        review_run_id: i64,
        feedback_type: FeedbackType,
        sentiment: Option<&str>,
        action: Option<&str>,
        comment_id: &str,
        metadata: &serde_json::Value,
    ) -> StoreResult<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO feedback
                (review_run_id, feedback_type, sentiment, action, comment_id, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                review_run_id,
                feedback_type.as_str(),
                sentiment,
                action,
                comment_id,
                metadata.to_string()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Aggregate feedback into per-category signals for a repo.
    ///
    /// Positive reactions and `resolved` replies count as accepted; negative
    /// reactions count as rejected. Joined through the finding owning the
    /// commented thread.
    pub fn feedback_signals_for_repo(&self, repo_id: i64) -> StoreResult<Vec<CategorySignal>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT fi.category,
                    SUM(CASE WHEN fb.sentiment IN ('+1', 'heart', 'hooray', 'rocket')
                              OR fb.action = 'resolved' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN fb.sentiment IN ('-1', 'confused') THEN 1 ELSE 0 END)
             FROM feedback fb
             JOIN review_runs rr ON rr.id = fb.review_run_id
             JOIN pull_requests pr ON pr.id = rr.pull_request_id
             JOIN findings fi ON fi.pull_request_id = pr.id AND fi.comment_id = fb.comment_id
             WHERE pr.repo_id = ?1
             GROUP BY fi.category",
        )?;
        let rows = stmt.query_map(params![repo_id], |row| {
            Ok(CategorySignal {
                category: row.get(0)?,
                accepted: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                rejected: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

//! Job payloads carried by the queues.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    Review(ReviewJob),
    CommentReply(CommentReplyJob),
    Index(IndexJob),
    Analytics(AnalyticsJob),
}

/// One review pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewJob {
    pub provider_id: i64,
    pub installation_id: Option<i64>,
    pub repo_id: i64,
    pub pull_request_id: i64,
    pub pr_number: i64,
    pub head_sha: String,
    /// `webhook | manual | comment`
    pub trigger: String,
    /// Disables incremental mode and the same-head debounce.
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub rules_override: Option<serde_json::Value>,
}

/// Answer a thread reply or mention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentReplyJob {
    pub repo_id: i64,
    pub pull_request_id: i64,
    /// Raw provider id of the comment being answered.
    pub comment_id: String,
    /// Finding thread id when resolvable, else the reply target, else raw.
    pub canonical_comment_id: String,
    pub body: String,
    pub author_login: String,
}

/// Refresh the repo index (and rebuild the graph).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexJob {
    pub repo_id: i64,
    #[serde(default)]
    pub force: bool,
}

/// Roll a completed run into per-repo aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsJob {
    pub repo_id: i64,
    pub run_id: i64,
    #[serde(default)]
    pub findings_new: i64,
    #[serde(default)]
    pub findings_fixed: i64,
}

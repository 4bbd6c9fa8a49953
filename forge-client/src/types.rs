//! Normalized provider types the orchestrator works with.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteUser {
    pub external_id: String,
    pub login: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemotePullRequest {
    pub external_id: String,
    pub number: i64,
    pub title: String,
    pub body: String,
    /// `open | closed | merged`
    pub state: String,
    pub base_ref: String,
    pub head_ref: String,
    pub base_sha: String,
    pub head_sha: String,
    pub draft: bool,
    pub author: RemoteUser,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteCommit {
    pub sha: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteChangedFile {
    pub path: String,
    pub additions: u32,
    pub deletions: u32,
    pub status: String,
}

/// One comment as it exists on the forge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteComment {
    pub id: String,
    pub body: String,
    pub author_login: String,
    #[serde(default)]
    pub in_reply_to: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineCommentPayload {
    pub path: String,
    pub line: u32,
    /// `LEFT` or `RIGHT`
    pub side: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
}

impl CheckConclusion {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckConclusion::Success => "success",
            CheckConclusion::Failure => "failure",
            CheckConclusion::Neutral => "neutral",
        }
    }
}

//! Persisted entity types.
//!
//! Conventions:
//! - Integer rowids everywhere; foreign keys are plain `i64`.
//! - Enums serialize as `snake_case` strings and round-trip through
//!   `as_str`/`parse` pairs so SQLite TEXT columns stay readable.
//! - Timestamps are unix seconds (UTC).

use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

/// Lifecycle of one review run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(StoreError::InvalidValue(format!("run status: {other}"))),
        }
    }
}

/// Lifecycle of one finding identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Open,
    Fixed,
    Obsolete,
}

impl FindingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FindingStatus::Open => "open",
            FindingStatus::Fixed => "fixed",
            FindingStatus::Obsolete => "obsolete",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "open" => Ok(FindingStatus::Open),
            "fixed" => Ok(FindingStatus::Fixed),
            "obsolete" => Ok(FindingStatus::Obsolete),
            other => Err(StoreError::InvalidValue(format!("finding status: {other}"))),
        }
    }
}

/// Destination kind of a posted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    Inline,
    Summary,
}

impl CommentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentKind::Inline => "inline",
            CommentKind::Summary => "summary",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "inline" => Ok(CommentKind::Inline),
            "summary" => Ok(CommentKind::Summary),
            other => Err(StoreError::InvalidValue(format!("comment kind: {other}"))),
        }
    }
}

/// Reviewer response kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Reaction,
    Reply,
}

impl FeedbackType {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackType::Reaction => "reaction",
            FeedbackType::Reply => "reply",
        }
    }
}

/// What an embedding row was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingKind {
    File,
    Symbol,
    Chunk,
}

impl EmbeddingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EmbeddingKind::File => "file",
            EmbeddingKind::Symbol => "symbol",
            EmbeddingKind::Chunk => "chunk",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "file" => Ok(EmbeddingKind::File),
            "symbol" => Ok(EmbeddingKind::Symbol),
            "chunk" => Ok(EmbeddingKind::Chunk),
            other => Err(StoreError::InvalidValue(format!("embedding kind: {other}"))),
        }
    }
}

/// Kind of an extracted symbol reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Call,
    Import,
    Export,
}

impl RefKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RefKind::Call => "call",
            RefKind::Import => "import",
            RefKind::Export => "export",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "call" => Ok(RefKind::Call),
            "import" => Ok(RefKind::Import),
            "export" => Ok(RefKind::Export),
            other => Err(StoreError::InvalidValue(format!("ref kind: {other}"))),
        }
    }
}

/// Node taxonomy of the code graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphNodeType {
    File,
    Symbol,
    Directory,
    Module,
    External,
}

impl GraphNodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            GraphNodeType::File => "file",
            GraphNodeType::Symbol => "symbol",
            GraphNodeType::Directory => "directory",
            GraphNodeType::Module => "module",
            GraphNodeType::External => "external",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "file" => Ok(GraphNodeType::File),
            "symbol" => Ok(GraphNodeType::Symbol),
            "directory" => Ok(GraphNodeType::Directory),
            "module" => Ok(GraphNodeType::Module),
            "external" => Ok(GraphNodeType::External),
            other => Err(StoreError::InvalidValue(format!("node type: {other}"))),
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────
//  Rows
// ──────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Repo {
    pub id: i64,
    pub provider_id: i64,
    pub external_id: String,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub default_branch: String,
}

#[derive(Debug, Clone)]
pub struct PullRequest {
    pub id: i64,
    pub repo_id: i64,
    pub number: i64,
    pub external_id: String,
    pub title: String,
    pub body: String,
    pub state: String,
    pub base_ref: String,
    pub head_ref: String,
    pub base_sha: String,
    pub head_sha: String,
    pub draft: bool,
    pub author_id: Option<i64>,
}

/// Fields the scheduler upserts whenever a webhook mentions the PR.
#[derive(Debug, Clone)]
pub struct PullRequestUpsert {
    pub repo_id: i64,
    pub number: i64,
    pub external_id: String,
    pub title: String,
    pub body: String,
    pub state: String,
    pub base_ref: String,
    pub head_ref: String,
    pub base_sha: String,
    pub head_sha: String,
    pub draft: bool,
    pub author_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ReviewRun {
    pub id: i64,
    pub pull_request_id: i64,
    pub head_sha: String,
    pub status: RunStatus,
    pub trigger: String,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub draft_json: Option<String>,
    pub final_json: Option<String>,
    pub verdicts_json: Option<String>,
    pub checks_json: Option<String>,
    pub context_pack_json: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Finding {
    pub id: i64,
    pub pull_request_id: i64,
    pub run_id: i64,
    pub last_seen_run_id: i64,
    pub status: FindingStatus,
    pub fingerprint: String,
    pub hunk_hash: String,
    pub context_hash: String,
    pub comment_id: Option<String>,
    pub comment_key: String,
    pub path: String,
    pub line: i64,
    pub side: String,
    pub severity: String,
    pub category: String,
    pub title: String,
    pub body: String,
    pub evidence: String,
    pub suggested_patch: Option<String>,
    pub rule_id: Option<String>,
    /// Where this finding surfaces: inline thread or summary entry.
    pub comment_type: CommentKind,
}

/// Insertion shape for a finding first seen in the current run.
#[derive(Debug, Clone)]
pub struct NewFinding {
    pub pull_request_id: i64,
    pub run_id: i64,
    pub fingerprint: String,
    pub hunk_hash: String,
    pub context_hash: String,
    pub comment_key: String,
    pub path: String,
    pub line: i64,
    pub side: String,
    pub severity: String,
    pub category: String,
    pub title: String,
    pub body: String,
    pub evidence: String,
    pub suggested_patch: Option<String>,
    pub rule_id: Option<String>,
    pub comment_type: CommentKind,
}

/// Mutable fields refreshed when a prior finding matches a current draft.
#[derive(Debug, Clone)]
pub struct FindingUpdate {
    pub line: i64,
    pub side: String,
    pub severity: String,
    pub body: String,
    pub evidence: String,
    pub suggested_patch: Option<String>,
    pub rule_id: Option<String>,
    pub hunk_hash: String,
    pub context_hash: String,
    pub comment_type: CommentKind,
}

#[derive(Debug, Clone)]
pub struct ReviewComment {
    pub id: i64,
    pub pull_request_id: i64,
    pub finding_id: Option<i64>,
    pub kind: CommentKind,
    pub provider_comment_id: String,
    pub body: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileIndexRow {
    pub id: i64,
    pub repo_id: i64,
    pub path: String,
    pub language: Option<String>,
    pub content_hash: String,
    pub size: i64,
    pub is_pattern: bool,
}

#[derive(Debug, Clone)]
pub struct SymbolRow {
    pub id: i64,
    pub repo_id: i64,
    pub file_id: i64,
    pub name: String,
    pub kind: String,
    pub start_line: i64,
    pub end_line: i64,
    pub signature: String,
    pub hash: String,
}

#[derive(Debug, Clone)]
pub struct SymbolReferenceRow {
    pub id: i64,
    pub repo_id: i64,
    pub file_id: i64,
    pub ref_name: String,
    pub line: i64,
    pub kind: RefKind,
}

/// One embedding joined with its file/symbol context for retrieval.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub id: i64,
    pub repo_id: i64,
    pub file_id: Option<i64>,
    pub symbol_id: Option<i64>,
    pub kind: EmbeddingKind,
    pub vector: Vec<f32>,
    pub text: String,
    pub path: Option<String>,
    pub symbol_name: Option<String>,
    pub is_pattern: bool,
}

#[derive(Debug, Clone)]
pub struct GraphNodeRow {
    pub id: i64,
    pub repo_id: i64,
    pub node_type: GraphNodeType,
    pub key: String,
    pub file_id: Option<i64>,
    pub symbol_id: Option<i64>,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct GraphEdgeRow {
    pub id: i64,
    pub repo_id: i64,
    pub from_node_id: i64,
    pub to_node_id: i64,
    pub edge_type: String,
    pub weight: i64,
    pub examples: Vec<String>,
    /// `Some("inferred")` on `file_dep` edges promoted from call inference.
    pub source: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FeedbackRow {
    pub id: i64,
    pub review_run_id: i64,
    pub feedback_type: FeedbackType,
    pub sentiment: Option<String>,
    pub action: Option<String>,
    pub comment_id: String,
    pub metadata: serde_json::Value,
}

//! Wire schemas for the staged LLM outputs.
//!
//! Required fields are enforced by deserialization; enums reject unknown
//! tags. Unknown extra fields are tolerated — models decorate their output
//! and that must not fail a run.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Blocking,
    Important,
    Nit,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Blocking => "blocking",
            Severity::Important => "important",
            Severity::Nit => "nit",
        }
    }

    /// Lower ranks are more severe.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Blocking => 0,
            Severity::Important => 1,
            Severity::Nit => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bug,
    Security,
    Performance,
    Maintainability,
    Testing,
    Style,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Bug => "bug",
            Category::Security => "security",
            Category::Performance => "performance",
            Category::Maintainability => "maintainability",
            Category::Testing => "testing",
            Category::Style => "style",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentType {
    Inline,
    Summary,
}

/// One review comment as emitted by the reviewer/editor/coverage stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCommentOut {
    pub comment_id: String,
    pub comment_key: String,
    pub path: String,
    /// `LEFT` or `RIGHT`
    pub side: String,
    pub line: u32,
    pub severity: Severity,
    pub category: Category,
    pub title: String,
    pub body: String,
    pub evidence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_patch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_type: Option<CommentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileBreakdownEntry {
    pub path: String,
    #[serde(default)]
    pub comments: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewSummary {
    #[serde(default)]
    pub overview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub key_concerns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_breakdown: Option<Vec<FileBreakdownEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_mermaid: Option<String>,
}

/// Output of the reviewer stage (and shape of the editor's final review).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewOutput {
    #[serde(default)]
    pub summary: ReviewSummary,
    #[serde(default)]
    pub comments: Vec<ReviewCommentOut>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictAction {
    Keep,
    Drop,
    Revise,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub comment_id: String,
    pub action: VerdictAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Replacement comment for `revise`; validated before use, the draft
    /// survives when it does not parse.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_comment: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerdictsOutput {
    #[serde(default)]
    pub verdicts: Vec<Verdict>,
}

/// Supplemental findings from the coverage stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageOutput {
    #[serde(default)]
    pub comments: Vec<ReviewCommentOut>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Timeout,
    Skipped,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub top_errors: Vec<String>,
}

impl Default for CheckResult {
    fn default() -> Self {
        Self {
            status: CheckStatus::Skipped,
            summary: String::new(),
            top_errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checks {
    #[serde(default)]
    pub lint: CheckResult,
    #[serde(default)]
    pub build: CheckResult,
    #[serde(default)]
    pub test: CheckResult,
}

/// Output of the external verifier stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecksOutput {
    #[serde(default)]
    pub head_sha: String,
    #[serde(default)]
    pub checks: Checks,
}

impl ChecksOutput {
    pub fn any_failed(&self) -> bool {
        [&self.checks.lint, &self.checks.build, &self.checks.test]
            .iter()
            .any(|c| matches!(c.status, CheckStatus::Fail | CheckStatus::Error))
    }
}

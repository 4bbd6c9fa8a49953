//! Staged LLM execution contract.
//!
//! The review pipeline drives four external stages (reviewer, editor,
//! optional coverage, verifier) plus the comment-reply stage. Each stage
//! reads its inputs from the run's bundle directory and writes strict JSON
//! into the out directory; this crate owns the bundle layout, the spawn/
//! timeout semantics, the wire schemas, and the validation path with its
//! JSON-repair and last-message fallbacks.

pub mod bundle;
pub mod errors;
pub mod repair;
pub mod runner;
pub mod schema;

pub use bundle::BundlePaths;
pub use errors::{StageError, StageResult};
pub use runner::{
    load_stage_json, CommandRunnerConfig, Stage, StageRunner, StaticStages,
    DEFAULT_STAGE_TIMEOUT_SECS, VERDICTS_JSON,
};
pub use schema::{
    Category, CheckResult, CheckStatus, Checks, ChecksOutput, CommentType, Confidence,
    CoverageOutput, FileBreakdownEntry, ReviewCommentOut, ReviewOutput, ReviewSummary, Severity,
    Verdict, VerdictAction, VerdictsOutput,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn comment(id: &str, line: u32) -> serde_json::Value {
        json!({
            "comment_id": id,
            "comment_key": format!("key-{id}"),
            "path": "src/foo.ts",
            "side": "RIGHT",
            "line": line,
            "severity": "blocking",
            "category": "bug",
            "title": "Possible null deref",
            "body": "user may be null",
            "evidence": "return user.name;"
        })
    }

    #[tokio::test]
    async fn static_runner_round_trips_review_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = StageRunner::Static(StaticStages::default().with_stage(
            Stage::Reviewer,
            vec![(
                Stage::Reviewer.output_file().to_string(),
                json!({ "summary": { "overview": "ok" }, "comments": [comment("c1", 42)] }),
            )],
        ));

        runner
            .run_stage(Stage::Reviewer, dir.path(), dir.path(), "prompt")
            .await
            .unwrap();
        let review: ReviewOutput =
            load_stage_json(dir.path(), Stage::Reviewer, Stage::Reviewer.output_file()).unwrap();
        assert_eq!(review.comments.len(), 1);
        assert_eq!(review.comments[0].severity, Severity::Blocking);
    }

    #[tokio::test]
    async fn last_message_fallback_catches_broken_primary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("checks.json"), "{ not json").unwrap();
        std::fs::write(
            dir.path().join(Stage::Verifier.last_message_file()),
            "final message:\n```json\n{\"head_sha\":\"abc\",\"checks\":{\"lint\":{\"status\":\"pass\",\"summary\":\"\"},\"build\":{\"status\":\"fail\",\"summary\":\"2 errors\",\"top_errors\":[\"E0308\"]},\"test\":{\"status\":\"skipped\",\"summary\":\"\"}}}\n```",
        )
        .unwrap();

        let checks: ChecksOutput =
            load_stage_json(dir.path(), Stage::Verifier, Stage::Verifier.output_file()).unwrap();
        assert_eq!(checks.head_sha, "abc");
        assert!(checks.any_failed());
    }

    #[test]
    fn missing_output_is_its_own_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_stage_json::<ChecksOutput>(
            dir.path(),
            Stage::Verifier,
            Stage::Verifier.output_file(),
        )
        .unwrap_err();
        assert!(matches!(err, StageError::MissingOutput { .. }));
    }

    #[test]
    fn wire_schema_rejects_bad_enums() {
        let raw = comment("c1", 1).to_string().replace("blocking", "urgent");
        assert!(serde_json::from_str::<ReviewCommentOut>(&raw).is_err());
        assert!(serde_json::from_str::<ReviewCommentOut>(&comment("c1", 1).to_string()).is_ok());
    }
}

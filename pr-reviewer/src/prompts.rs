//! Prompt builders for the staged runs.
//!
//! Stages read their full inputs from the bundle directory; the prompt
//! carries the run-specific framing (config highlights, incremental hint,
//! feedback policy) and names the artifact the stage must write.

use store::CategorySignal;

use crate::config::ResolvedConfig;

pub fn reviewer_prompt(
    cfg: &ResolvedConfig,
    incremental_base: Option<&str>,
    feedback: &[CategorySignal],
) -> String {
    let mut p = String::new();
    p.push_str(
        "Review the pull request described by the bundle (pr.md, diff.patch, \
         context_pack.json). Emit draft_review.json with summary and comments.\n",
    );
    p.push_str(&format!(
        "Strictness: {:?}. Max inline comments: {}. Allowed categories: bug, security, \
         performance, maintainability, testing, style.\n",
        cfg.strictness, cfg.limits.max_inline_comments
    ));
    p.push_str(
        "Every comment needs path, line, side, severity, evidence quoting the diff, and a \
         suggested_patch when you claim blocking.\n",
    );

    if let Some(base) = incremental_base {
        p.push_str(&format!(
            "Incremental run: review only the delta since {base}; earlier commits were \
             already reviewed.\n"
        ));
    }

    let hint = feedback_hint(feedback);
    if !hint.is_empty() {
        p.push_str(&hint);
    }
    p
}

/// Categories the repo's reviewers consistently accept or reject.
fn feedback_hint(feedback: &[CategorySignal]) -> String {
    let mut liked: Vec<&str> = Vec::new();
    let mut disliked: Vec<&str> = Vec::new();
    for s in feedback {
        if s.accepted >= 3 && s.accepted > s.rejected * 2 {
            liked.push(&s.category);
        } else if s.rejected >= 3 && s.rejected > s.accepted {
            disliked.push(&s.category);
        }
    }
    let mut out = String::new();
    if !liked.is_empty() {
        out.push_str(&format!(
            "Reviewers here act on {} findings; look for them.\n",
            liked.join(", ")
        ));
    }
    if !disliked.is_empty() {
        out.push_str(&format!(
            "Reviewers here usually reject {} findings; raise only clear-cut cases.\n",
            disliked.join(", ")
        ));
    }
    out
}

pub fn editor_prompt(draft_json: &str, cfg: &ResolvedConfig) -> String {
    format!(
        "You are the editor pass. Input draft follows. Emit final_review.json (polished \
         summary + comments) and verdicts.json with keep/drop/revise per comment_id. \
         Drop speculation and anything without evidence. Strictness: {:?}.\n\
         Summary-only mode: {}.\n\nDRAFT:\n{draft_json}\n",
        cfg.strictness, cfg.output.summary_only
    )
}

pub fn coverage_prompt(targets: &[String]) -> String {
    format!(
        "Coverage pass: the following changed files have no findings yet. Inspect them in \
         the bundle and emit coverage.json with any additional comments (same schema). \
         Do not restate existing findings.\nFiles:\n{}\n",
        targets
            .iter()
            .map(|t| format!("- {t}"))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

pub fn verifier_prompt(head_sha: &str) -> String {
    format!(
        "Verifier pass: run lint, build, and tests for the checkout at {head_sha} and emit \
         checks.json with per-check status (pass|fail|timeout|skipped|error), a summary, \
         and top_errors.\n"
    )
}

pub fn reply_prompt(question: &str, finding_context: Option<&str>) -> String {
    let mut p = String::new();
    p.push_str("Answer the reviewer's comment concisely and concretely. Emit reply.json with a `body` field.\n");
    if let Some(ctx) = finding_context {
        p.push_str(&format!("Finding under discussion:\n{ctx}\n"));
    }
    p.push_str(&format!("Comment:\n{question}\n"));
    p
}

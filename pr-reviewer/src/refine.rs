//! Local quality refinement over the stage output (pipeline step between the
//! editor/coverage stages and reconciliation). Rules run in a fixed order;
//! each dropped or demoted comment leaves a diagnostic for the status
//! comment's warnings section.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use diff_index::{DiffIndex, Side};
use stage_runner::{Confidence, ReviewCommentOut, CommentType, Severity};
use store::CategorySignal;

use crate::config::{ResolvedConfig, Strictness};

/// Result of the refinement pass.
#[derive(Debug, Default)]
pub struct Refined {
    pub comments: Vec<ReviewCommentOut>,
    pub diagnostics: Vec<String>,
}

pub fn refine(
    mut comments: Vec<ReviewCommentOut>,
    diff: &DiffIndex,
    cfg: &ResolvedConfig,
    feedback: &[CategorySignal],
    changed_file_count: usize,
) -> Refined {
    let mut diagnostics = Vec::new();

    // 1. Unescape literal `\n` sequences in text fields.
    for c in &mut comments {
        unescape(&mut c.title);
        unescape(&mut c.body);
        unescape(&mut c.evidence);
        if let Some(p) = &mut c.suggested_patch {
            unescape(p);
        }
    }

    // 2. Evidence must quote something real.
    let before = comments.len();
    comments.retain(|c| {
        let e = c.evidence.trim();
        !(e.is_empty() || e == "\"\"" || e == "''")
    });
    if comments.len() < before {
        diagnostics.push(format!("{} finding(s) dropped: empty evidence", before - comments.len()));
    }

    // 3. A blocking claim without a patch is an important one.
    for c in &mut comments {
        if c.severity == Severity::Blocking && c.suggested_patch.is_none() {
            c.severity = Severity::Important;
            diagnostics.push(format!("`{}` downgraded: blocking without patch", c.title));
        }
    }

    // 4. Deduplicate overlapping findings, keeping the most severe.
    comments = dedupe_overlapping(comments, &mut diagnostics);

    // 5. Inline findings outside the diff become summary entries.
    for c in &mut comments {
        if c.comment_type.unwrap_or(CommentType::Inline) == CommentType::Inline {
            let side = Side::parse(&c.side).unwrap_or(Side::Right);
            if !diff.is_line_in_diff(&c.path, c.line, side) {
                c.comment_type = Some(CommentType::Summary);
                diagnostics.push(format!("`{}` moved to summary: outside the diff", c.title));
            }
        }
    }

    // 6. Strictness filter plus the learned feedback policy.
    let rejected_categories: HashSet<&str> = feedback
        .iter()
        .filter(|s| s.rejected >= 3 && s.rejected > s.accepted)
        .map(|s| s.category.as_str())
        .collect();
    let before = comments.len();
    comments.retain(|c| {
        let low_conf = c.confidence == Some(Confidence::Low);
        let keep_strictness = match cfg.strictness {
            Strictness::High => c.severity != Severity::Nit && !low_conf,
            Strictness::Medium => !(c.severity == Severity::Nit && low_conf),
            Strictness::Low => true,
        };
        if !keep_strictness {
            return false;
        }
        if rejected_categories.contains(c.category.as_str()) {
            return c.severity == Severity::Blocking || c.confidence == Some(Confidence::High);
        }
        true
    });
    if comments.len() < before {
        diagnostics.push(format!(
            "{} finding(s) filtered by strictness/feedback policy",
            before - comments.len()
        ));
    }

    // 7. Per-file inline cap scaled by the change size.
    let per_file_cap = per_file_inline_cap(cfg.limits.max_inline_comments, changed_file_count);
    comments = apply_inline_cap(comments, per_file_cap, cfg.output.summary_only, &mut diagnostics);

    debug!(
        kept = comments.len(),
        diagnostics = diagnostics.len(),
        "refine: done"
    );
    Refined {
        comments,
        diagnostics,
    }
}

/// `⌊max_inline / ⌈√changed_files⌉⌋`, floored at one.
pub fn per_file_inline_cap(max_inline: usize, changed_files: usize) -> usize {
    let denom = (changed_files.max(1) as f64).sqrt().ceil() as usize;
    (max_inline / denom.max(1)).max(1)
}

fn unescape(s: &mut String) {
    if s.contains("\\n") {
        *s = s.replace("\\n", "\n");
    }
}

fn normalized_title(t: &str) -> String {
    t.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn dedupe_overlapping(
    comments: Vec<ReviewCommentOut>,
    diagnostics: &mut Vec<String>,
) -> Vec<ReviewCommentOut> {
    let mut best: HashMap<(String, String, u32, String), ReviewCommentOut> = HashMap::new();
    let mut order: Vec<(String, String, u32, String)> = Vec::new();
    let mut dropped = 0usize;

    for c in comments {
        let key = (
            c.path.clone(),
            c.side.clone(),
            c.line,
            normalized_title(&c.title),
        );
        match best.get_mut(&key) {
            None => {
                order.push(key.clone());
                best.insert(key, c);
            }
            Some(existing) => {
                dropped += 1;
                let better = c.severity.rank() < existing.severity.rank()
                    || (c.severity == existing.severity && c.body.len() > existing.body.len());
                if better {
                    *existing = c;
                }
            }
        }
    }
    if dropped > 0 {
        diagnostics.push(format!("{dropped} duplicate finding(s) collapsed"));
    }
    order.into_iter().filter_map(|k| best.remove(&k)).collect()
}

fn apply_inline_cap(
    comments: Vec<ReviewCommentOut>,
    per_file_cap: usize,
    summary_only: bool,
    diagnostics: &mut Vec<String>,
) -> Vec<ReviewCommentOut> {
    // Group inline comments per path, best first.
    let mut inline_by_path: HashMap<String, Vec<ReviewCommentOut>> = HashMap::new();
    let mut rest: Vec<ReviewCommentOut> = Vec::new();
    for c in comments {
        if c.comment_type.unwrap_or(CommentType::Inline) == CommentType::Inline {
            inline_by_path.entry(c.path.clone()).or_default().push(c);
        } else {
            rest.push(c);
        }
    }

    let mut kept: Vec<ReviewCommentOut> = Vec::new();
    let mut paths: Vec<String> = inline_by_path.keys().cloned().collect();
    paths.sort();
    for path in paths {
        let mut group = inline_by_path.remove(&path).unwrap_or_default();
        group.sort_by_key(|c| {
            (
                c.severity.rank(),
                match c.confidence {
                    Some(Confidence::High) => 0,
                    Some(Confidence::Medium) | None => 1,
                    Some(Confidence::Low) => 2,
                },
                c.line,
            )
        });
        if group.len() > per_file_cap {
            let surplus = group.split_off(per_file_cap);
            if summary_only {
                for mut c in surplus {
                    c.comment_type = Some(CommentType::Summary);
                    rest.push(c);
                }
            } else {
                diagnostics.push(format!(
                    "{}: {} inline finding(s) over the per-file cap dropped",
                    path,
                    surplus.len()
                ));
            }
        }
        kept.extend(group);
    }

    kept.extend(rest);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedConfig;

    fn comment(line: u32, title: &str, severity: Severity) -> ReviewCommentOut {
        ReviewCommentOut {
            comment_id: format!("c-{line}-{title}"),
            comment_key: format!("k-{line}"),
            path: "src/foo.ts".into(),
            side: "RIGHT".into(),
            line,
            severity,
            category: stage_runner::Category::Bug,
            title: title.into(),
            body: "body".into(),
            evidence: "return user.name;".into(),
            suggested_patch: Some("patch".into()),
            comment_type: None,
            rule_id: None,
            rule_reason: None,
            confidence: None,
        }
    }

    fn diff() -> DiffIndex {
        DiffIndex::parse(
            "--- a/src/foo.ts\n+++ b/src/foo.ts\n@@ -40,3 +40,4 @@\n context\n+added line\n context2\n context3\n",
        )
    }

    #[test]
    fn empty_evidence_is_dropped_and_blocking_without_patch_demoted() {
        let mut a = comment(41, "real", Severity::Blocking);
        a.suggested_patch = None;
        let mut b = comment(41, "ghost", Severity::Important);
        b.evidence = "''".into();

        let out = refine(vec![a, b], &diff(), &ResolvedConfig::default(), &[], 1);
        assert_eq!(out.comments.len(), 1);
        assert_eq!(out.comments[0].severity, Severity::Important);
        assert!(out.diagnostics.iter().any(|d| d.contains("empty evidence")));
        assert!(out.diagnostics.iter().any(|d| d.contains("without patch")));
    }

    #[test]
    fn off_diff_inline_moves_to_summary() {
        let c = comment(400, "far away", Severity::Important);
        let out = refine(vec![c], &diff(), &ResolvedConfig::default(), &[], 1);
        assert_eq!(out.comments[0].comment_type, Some(CommentType::Summary));
    }

    #[test]
    fn high_strictness_drops_nits() {
        let cfg = ResolvedConfig {
            strictness: Strictness::High,
            ..ResolvedConfig::default()
        };
        let nit = comment(41, "tiny style thing", Severity::Nit);
        let keep = comment(41, "real bug", Severity::Important);
        let out = refine(vec![nit, keep], &diff(), &cfg, &[], 1);
        assert_eq!(out.comments.len(), 1);
        assert_eq!(out.comments[0].title, "real bug");
    }

    #[test]
    fn rejected_category_needs_blocking_or_high_confidence() {
        let signal = CategorySignal {
            category: "bug".into(),
            accepted: 0,
            rejected: 5,
        };
        let weak = comment(41, "weak claim", Severity::Important);
        let mut strong = comment(41, "strong claim", Severity::Important);
        strong.confidence = Some(Confidence::High);
        let out = refine(
            vec![weak, strong],
            &diff(),
            &ResolvedConfig::default(),
            &[signal],
            1,
        );
        assert_eq!(out.comments.len(), 1);
        assert_eq!(out.comments[0].title, "strong claim");
    }

    #[test]
    fn per_file_cap_converts_in_summary_only_mode() {
        assert_eq!(per_file_inline_cap(20, 1), 20);
        assert_eq!(per_file_inline_cap(20, 4), 10);
        assert_eq!(per_file_inline_cap(20, 10), 5);

        let cfg = ResolvedConfig {
            output: crate::config::OutputConfig {
                summary_only: true,
                ..Default::default()
            },
            limits: crate::config::Limits {
                max_inline_comments: 1,
                max_key_concerns: 5,
            },
            ..ResolvedConfig::default()
        };
        let many = vec![
            comment(41, "first", Severity::Blocking),
            comment(42, "second", Severity::Important),
        ];
        let out = refine(many, &diff(), &cfg, &[], 1);
        // Nothing dropped: the surplus turned into a summary entry.
        assert_eq!(out.comments.len(), 2);
        assert!(out
            .comments
            .iter()
            .any(|c| c.comment_type == Some(CommentType::Summary)));
    }
}

//! Summary enrichment and Markdown rendering.
//!
//! The editor's summary is completed locally: a file breakdown synthesized
//! from comment counts, a bounded mermaid dependency sketch, and a derived
//! confidence score. Rendering covers the PR-body block (between the hidden
//! summary markers) and the status summary comment.

use std::collections::BTreeMap;

use contextor::ContextPack;
use diff_index::FileStat;
use stage_runner::{ChecksOutput, CheckStatus, FileBreakdownEntry, ReviewCommentOut, ReviewSummary, Severity};
use store::Finding;

pub const SUMMARY_MARKER_START: &str = "<!-- grepiku-summary:start -->";
pub const SUMMARY_MARKER_END: &str = "<!-- grepiku-summary:end -->";

const MERMAID_MAX_NODES: usize = 28;
const MERMAID_MAX_EDGES: usize = 42;

/// Fill in whatever the editor left out.
pub fn enrich_summary(
    summary: &mut ReviewSummary,
    comments: &[ReviewCommentOut],
    pack: &ContextPack,
    changed: &[FileStat],
) {
    if summary.file_breakdown.is_none() {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for c in comments {
            *counts.entry(c.path.as_str()).or_insert(0) += 1;
        }
        summary.file_breakdown = Some(
            counts
                .into_iter()
                .map(|(path, n)| FileBreakdownEntry {
                    path: path.to_string(),
                    comments: n,
                    note: None,
                })
                .collect(),
        );
    }

    if summary.diagram_mermaid.is_none() {
        summary.diagram_mermaid = Some(build_mermaid(pack, changed));
    }

    if summary.confidence.is_none() {
        summary.confidence = Some(derive_confidence(summary.risk.as_deref(), comments));
    }
}

/// Bounded directed sketch from `file_dep` links; falls back to a
/// changed→related bipartite sketch when the graph gave us nothing.
fn build_mermaid(pack: &ContextPack, changed: &[FileStat]) -> String {
    let mut lines = vec!["graph LR".to_string()];
    let mut nodes: BTreeMap<String, String> = BTreeMap::new();
    let mut edge_count = 0usize;

    let mut node_id = |path: &str, nodes: &mut BTreeMap<String, String>| -> Option<String> {
        if let Some(id) = nodes.get(path) {
            return Some(id.clone());
        }
        if nodes.len() >= MERMAID_MAX_NODES {
            return None;
        }
        let id = format!("n{}", nodes.len());
        nodes.insert(path.to_string(), id.clone());
        Some(id)
    };

    for link in &pack.graph_links {
        if edge_count >= MERMAID_MAX_EDGES {
            break;
        }
        let (Some(from), Some(to)) = (
            node_id(&link.from, &mut nodes),
            node_id(&link.to, &mut nodes),
        ) else {
            continue;
        };
        lines.push(format!(
            "  {from}[\"{}\"] --> {to}[\"{}\"]",
            short(&link.from),
            short(&link.to)
        ));
        edge_count += 1;
    }

    if edge_count == 0 {
        // Bipartite sketch: each changed file points at the top related files.
        for stat in changed.iter().take(6) {
            let Some(from) = node_id(&stat.path, &mut nodes) else { break };
            for related in pack.related_files.iter().take(4) {
                if edge_count >= MERMAID_MAX_EDGES {
                    break;
                }
                let Some(to) = node_id(&related.path, &mut nodes) else { break };
                lines.push(format!(
                    "  {from}[\"{}\"] -.-> {to}[\"{}\"]",
                    short(&stat.path),
                    short(&related.path)
                ));
                edge_count += 1;
            }
        }
    }

    lines.join("\n")
}

fn short(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// `clip(0.2, 0.95, base(risk) − 0.18·blocking − 0.08·important − 0.02·nit)`
fn derive_confidence(risk: Option<&str>, comments: &[ReviewCommentOut]) -> f64 {
    let base = match risk {
        Some("low") => 0.86,
        Some("high") => 0.58,
        _ => 0.72,
    };
    let mut value: f64 = base;
    for c in comments {
        value -= match c.severity {
            Severity::Blocking => 0.18,
            Severity::Important => 0.08,
            Severity::Nit => 0.02,
        };
    }
    value.clamp(0.2, 0.95)
}

/// Replace (or append) the summary block inside the PR body.
pub fn upsert_body_block(existing_body: &str, rendered: &str) -> String {
    let block = format!("{SUMMARY_MARKER_START}\n{rendered}\n{SUMMARY_MARKER_END}");
    if let (Some(start), Some(end)) = (
        existing_body.find(SUMMARY_MARKER_START),
        existing_body.find(SUMMARY_MARKER_END),
    ) {
        let mut out = String::new();
        out.push_str(&existing_body[..start]);
        out.push_str(&block);
        out.push_str(&existing_body[end + SUMMARY_MARKER_END.len()..]);
        out
    } else if existing_body.trim().is_empty() {
        block
    } else {
        format!("{existing_body}\n\n{block}")
    }
}

/// Render the summary block placed into the PR body.
pub fn render_body_summary(summary: &ReviewSummary, max_key_concerns: usize) -> String {
    let mut md = String::new();
    md.push_str("### Grepiku Review Summary\n\n");
    if !summary.overview.is_empty() {
        md.push_str(&summary.overview);
        md.push_str("\n\n");
    }
    if let Some(risk) = &summary.risk {
        md.push_str(&format!("**Risk:** {risk}"));
        if let Some(conf) = summary.confidence {
            md.push_str(&format!(" · **Confidence:** {conf:.2}"));
        }
        md.push_str("\n\n");
    }
    if !summary.key_concerns.is_empty() {
        md.push_str("**Key concerns**\n");
        for concern in summary.key_concerns.iter().take(max_key_concerns) {
            md.push_str(&format!("- {concern}\n"));
        }
        md.push('\n');
    }
    if let Some(breakdown) = &summary.file_breakdown {
        if !breakdown.is_empty() {
            md.push_str("| File | Findings |\n|---|---|\n");
            for entry in breakdown {
                md.push_str(&format!("| `{}` | {} |\n", entry.path, entry.comments));
            }
            md.push('\n');
        }
    }
    if let Some(diagram) = &summary.diagram_mermaid {
        md.push_str("<details><summary>Change graph</summary>\n\n```mermaid\n");
        md.push_str(diagram);
        md.push_str("\n```\n\n</details>\n");
    }
    md
}

/// Input for the status summary comment.
pub struct StatusReport<'a> {
    pub run_id: i64,
    pub head_sha: &'a str,
    pub summary: &'a ReviewSummary,
    pub new_findings: &'a [Finding],
    pub still_open: &'a [Finding],
    pub fixed: &'a [Finding],
    pub carried_over: usize,
    pub warnings: &'a [String],
    pub checks: Option<&'a ChecksOutput>,
    pub max_key_concerns: usize,
}

/// Render the status summary comment body.
pub fn render_status_comment(report: &StatusReport<'_>) -> String {
    let mut md = String::new();
    md.push_str("## Grepiku Review\n\n");

    if !report.summary.overview.is_empty() {
        md.push_str(&report.summary.overview);
        md.push_str("\n\n");
    }
    if let Some(risk) = &report.summary.risk {
        md.push_str(&format!("**Risk:** {risk}"));
        if let Some(conf) = report.summary.confidence {
            md.push_str(&format!(" · **Confidence:** {conf:.2}"));
        }
        md.push('\n');
    } else if let Some(conf) = report.summary.confidence {
        md.push_str(&format!("**Confidence:** {conf:.2}\n"));
    }
    md.push_str(&format!(
        "Run `#{}` at `{}`\n\n",
        report.run_id,
        &report.head_sha[..report.head_sha.len().min(12)]
    ));

    if !report.summary.key_concerns.is_empty() {
        md.push_str("### Key concerns\n");
        for concern in report.summary.key_concerns.iter().take(report.max_key_concerns) {
            md.push_str(&format!("- {concern}\n"));
        }
        md.push('\n');
    }

    render_finding_list(&mut md, "New findings", report.new_findings);
    render_finding_list(&mut md, "Still open", report.still_open);
    render_finding_list(&mut md, "Fixed", report.fixed);
    if report.carried_over > 0 {
        md.push_str(&format!(
            "_{} earlier finding(s) on untouched files carried over._\n\n",
            report.carried_over
        ));
    }

    if let Some(checks) = report.checks {
        md.push_str("### Checks\n");
        for (name, result) in [
            ("lint", &checks.checks.lint),
            ("build", &checks.checks.build),
            ("test", &checks.checks.test),
        ] {
            md.push_str(&format!(
                "- {name}: {}{}\n",
                status_icon(result.status),
                if result.summary.is_empty() {
                    String::new()
                } else {
                    format!(" — {}", result.summary)
                }
            ));
        }
        md.push('\n');
    }

    if !report.warnings.is_empty() {
        md.push_str("<details><summary>Warnings</summary>\n\n");
        for w in report.warnings {
            md.push_str(&format!("- {w}\n"));
        }
        md.push_str("\n</details>\n");
    }
    md
}

fn render_finding_list(md: &mut String, label: &str, findings: &[Finding]) {
    if findings.is_empty() {
        return;
    }
    md.push_str(&format!("### {label} ({})\n", findings.len()));
    for f in findings {
        md.push_str(&format!(
            "- **{}** `{}:{}` — {}\n",
            f.severity, f.path, f.line, f.title
        ));
    }
    md.push('\n');
}

fn status_icon(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "✅ pass",
        CheckStatus::Fail => "❌ fail",
        CheckStatus::Timeout => "⏱ timeout",
        CheckStatus::Skipped => "➖ skipped",
        CheckStatus::Error => "⚠️ error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_block_upsert_is_idempotent() {
        let first = upsert_body_block("Original description.", "summary v1");
        assert!(first.contains("Original description."));
        assert!(first.contains("summary v1"));

        let second = upsert_body_block(&first, "summary v2");
        assert!(second.contains("summary v2"));
        assert!(!second.contains("summary v1"));
        // Re-rendering the same content changes nothing.
        assert_eq!(second, upsert_body_block(&second, "summary v2"));
    }

    #[test]
    fn confidence_is_clipped() {
        let blocking = |line| ReviewCommentOut {
            comment_id: format!("{line}"),
            comment_key: String::new(),
            path: "a".into(),
            side: "RIGHT".into(),
            line,
            severity: Severity::Blocking,
            category: stage_runner::Category::Bug,
            title: "t".into(),
            body: "b".into(),
            evidence: "e".into(),
            suggested_patch: None,
            comment_type: None,
            rule_id: None,
            rule_reason: None,
            confidence: None,
        };
        let many: Vec<_> = (0..10).map(blocking).collect();
        assert_eq!(derive_confidence(Some("low"), &many), 0.2);
        assert_eq!(derive_confidence(Some("low"), &[]), 0.86);
    }
}

//! Idempotent forge side-effects (pipeline step after reconciliation).
//!
//! Inline comments carry a hidden `<!-- grepiku:<finding_id> -->` marker;
//! the PR-body summary lives between its own marker pair. Re-running the
//! pipeline on the same head re-finds everything it already posted and only
//! touches drifted bodies.
//!
//! Only inline-typed findings get inline threads — anything the refinement
//! pass routed to the summary stays out of the diff margin. Forge writes
//! that fail with an integration-permission 403 degrade to run warnings
//! instead of failing the run.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use forge_client::{ForgeError, InlineCommentPayload, ProviderClient};
use store::{CommentKind, Finding, Store};

use crate::config::ResolvedConfig;
use crate::errors::ReviewResult;
use crate::summary::upsert_body_block;

/// Hidden per-finding marker embedded in inline comment bodies.
pub fn finding_marker(finding_id: i64) -> String {
    format!("<!-- grepiku:{finding_id} -->")
}

/// Extract a finding id from a posted comment body.
pub fn parse_marker(body: &str) -> Option<i64> {
    let start = body.find("<!-- grepiku:")?;
    let rest = &body[start + "<!-- grepiku:".len()..];
    let end = rest.find(" -->")?;
    rest[..end].trim().parse().ok()
}

/// Downgrade an integration-permission failure to a run warning.
///
/// Anything else — including an ambiguous plain 403 — stays an error.
pub(crate) fn permission_to_warning<T>(
    result: Result<T, ForgeError>,
    context: &str,
    warnings: &mut Vec<String>,
) -> ReviewResult<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(ForgeError::PermissionDenied(msg)) => {
            warn!("{context}: permission denied ({msg}), continuing");
            warnings.push(format!("{context} skipped: {msg}"));
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn inline_body(finding: &Finding) -> String {
    let mut md = format!("**{}**\n\n{}\n", finding.title.trim(), finding.body.trim());
    if !finding.evidence.trim().is_empty() {
        md.push_str(&format!("\n> `{}`\n", finding.evidence.trim()));
    }
    if let Some(patch) = &finding.suggested_patch {
        md.push_str(&format!("\n```suggestion\n{}\n```\n", patch.trim()));
    }
    md.push('\n');
    md.push_str(&finding_marker(finding.id));
    md
}

pub struct PostOutcome {
    pub inline_posted: usize,
    pub inline_updated: usize,
    pub threads_resolved: usize,
}

/// Post inline comments for new inline-typed findings, resync drifted ones,
/// and resolve threads for findings that went away.
pub async fn post_inline_effects(
    store: &Store,
    forge: &ProviderClient,
    cfg: &ResolvedConfig,
    pull_request_id: i64,
    created: &[Finding],
    fixed: &[Finding],
    warnings: &mut Vec<String>,
) -> ReviewResult<PostOutcome> {
    let mut outcome = PostOutcome {
        inline_posted: 0,
        inline_updated: 0,
        threads_resolved: 0,
    };

    let inline_allowed =
        cfg.comment_types.allows_inline() && !cfg.output.summary_only;

    // Existing comments by marker, for idempotency and drift repair.
    let existing = forge.list_inline_comments().await?;
    let by_finding: HashMap<i64, &forge_client::RemoteComment> = existing
        .iter()
        .filter_map(|c| parse_marker(&c.body).map(|id| (id, c)))
        .collect();

    if inline_allowed {
        for finding in created {
            // Summary-typed findings surface in the status comment only.
            if finding.comment_type == CommentKind::Summary {
                continue;
            }
            if by_finding.contains_key(&finding.id) {
                debug!(finding = finding.id, "publish: inline already posted");
                continue;
            }
            let posted = permission_to_warning(
                forge
                    .create_inline_comment(&InlineCommentPayload {
                        path: finding.path.clone(),
                        line: finding.line as u32,
                        side: finding.side.clone(),
                        body: inline_body(finding),
                    })
                    .await,
                "inline comment",
                warnings,
            )?;
            let Some(posted) = posted else { continue };
            store.set_finding_comment_id(finding.id, &posted.id)?;
            store.upsert_review_comment(
                pull_request_id,
                Some(finding.id),
                CommentKind::Inline,
                &posted.id,
                &posted.body,
                posted.url.as_deref(),
            )?;
            outcome.inline_posted += 1;
        }
    }

    // Resync any of our comments whose rendered body drifted.
    for (finding_id, remote) in &by_finding {
        let Ok(finding) = store.get_finding(*finding_id) else {
            continue;
        };
        if finding.pull_request_id != pull_request_id {
            continue;
        }
        let expected = inline_body(&finding);
        if remote.body != expected {
            let updated = permission_to_warning(
                forge.update_inline_comment(&remote.id, &expected).await,
                "inline comment update",
                warnings,
            )?;
            if updated.is_none() {
                continue;
            }
            store.upsert_review_comment(
                pull_request_id,
                Some(finding.id),
                CommentKind::Inline,
                &remote.id,
                &expected,
                remote.url.as_deref(),
            )?;
            outcome.inline_updated += 1;
        }
    }

    // Resolve threads for findings that went away, best effort.
    for finding in fixed {
        if let Some(comment_id) = &finding.comment_id {
            match forge.resolve_inline_thread(comment_id).await {
                Ok(()) => outcome.threads_resolved += 1,
                Err(e) => warn!(finding = finding.id, "publish: resolve failed (ignored): {e}"),
            }
        }
    }

    info!(
        posted = outcome.inline_posted,
        updated = outcome.inline_updated,
        resolved = outcome.threads_resolved,
        "publish: inline effects done"
    );
    Ok(outcome)
}

/// Upsert the PR-body summary block.
pub async fn upsert_pr_body(
    forge: &ProviderClient,
    current_body: &str,
    rendered_summary: &str,
    warnings: &mut Vec<String>,
) -> ReviewResult<()> {
    let next = upsert_body_block(current_body, rendered_summary);
    if next != current_body {
        permission_to_warning(
            forge.update_pull_request_body(&next).await,
            "PR body summary",
            warnings,
        )?;
    }
    Ok(())
}

/// Create or update the status summary comment, keyed through the store.
pub async fn upsert_status_comment(
    store: &Store,
    forge: &ProviderClient,
    pull_request_id: i64,
    body: &str,
    warnings: &mut Vec<String>,
) -> ReviewResult<()> {
    match store.find_summary_comment(pull_request_id)? {
        Some(existing) => {
            if existing.body != body {
                let updated = permission_to_warning(
                    forge
                        .update_summary_comment(&existing.provider_comment_id, body)
                        .await,
                    "status comment update",
                    warnings,
                )?;
                if updated.is_none() {
                    return Ok(());
                }
                store.upsert_review_comment(
                    pull_request_id,
                    None,
                    CommentKind::Summary,
                    &existing.provider_comment_id,
                    body,
                    existing.url.as_deref(),
                )?;
            }
        }
        None => {
            let posted = permission_to_warning(
                forge.create_summary_comment(body).await,
                "status comment",
                warnings,
            )?;
            let Some(posted) = posted else {
                return Ok(());
            };
            store.upsert_review_comment(
                pull_request_id,
                None,
                CommentKind::Summary,
                &posted.id,
                body,
                posted.url.as_deref(),
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_round_trips() {
        let body = format!("**Title**\n\nbody\n\n{}", finding_marker(42));
        assert_eq!(parse_marker(&body), Some(42));
        assert_eq!(parse_marker("no marker here"), None);
    }

    #[test]
    fn only_permission_failures_downgrade() {
        let mut warnings = Vec::new();
        let ok = permission_to_warning(
            Ok::<_, ForgeError>(1),
            "write",
            &mut warnings,
        )
        .unwrap();
        assert_eq!(ok, Some(1));

        let denied = permission_to_warning(
            Err::<i32, _>(ForgeError::PermissionDenied("cannot push to fork".into())),
            "write",
            &mut warnings,
        )
        .unwrap();
        assert_eq!(denied, None);
        assert!(warnings[0].contains("cannot push to fork"));

        // An ambiguous 403 still fails loudly.
        let forbidden = permission_to_warning(
            Err::<i32, _>(ForgeError::Forbidden),
            "write",
            &mut warnings,
        );
        assert!(forbidden.is_err());
        assert_eq!(warnings.len(), 1);
    }
}

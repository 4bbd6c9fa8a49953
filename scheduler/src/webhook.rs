//! Webhook event classification and admission.
//!
//! The HTTP receiver verifies signatures and normalizes payloads into
//! [`WebhookEvent`]; everything decision-shaped lives here: tenant upserts,
//! debounce, trigger predicates, suppressions, feedback recording, and job
//! enqueueing.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use forge_client::ProviderClient;
use store::{FeedbackType, PullRequestUpsert, RepoUpsert, Store};

use crate::errors::SchedulerResult;
use crate::jobs::{CommentReplyJob, Job, ReviewJob};
use crate::queue::QueueSet;
use crate::triggers::{comment_trigger, CommentTrigger, TriggerConfig};

/// Marker embedded in our own mention replies so they never re-trigger.
pub const MENTION_MARKER: &str = "<!-- grepiku-mention:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PullRequest,
    Comment,
    Reaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub kind: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInfo {
    pub external_id: String,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub default_branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub external_id: String,
    pub number: i64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub state: String,
    pub base_ref: String,
    pub head_ref: String,
    pub base_sha: String,
    pub head_sha: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub external_id: String,
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentInfo {
    pub id: String,
    #[serde(default)]
    pub body: String,
    pub author_login: String,
    #[serde(default)]
    pub in_reply_to: Option<String>,
    /// Reaction content for `reaction` events (`+1`, `-1`, …).
    #[serde(default)]
    pub reaction: Option<String>,
}

/// A verified, normalized webhook event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub provider: ProviderInfo,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub action: String,
    #[serde(default)]
    pub installation_id: Option<String>,
    pub repo: RepoInfo,
    pub pull_request: PullRequestInfo,
    #[serde(default)]
    pub comment: Option<CommentInfo>,
    #[serde(default)]
    pub author: Option<UserInfo>,
}

/// What the handler decided, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Enqueued,
    SuppressedClosed,
    SuppressedDuplicateHead,
    SuppressedByTriggers,
    SuppressedAutoCommit,
    SuppressedBotComment,
    FeedbackOnly,
    Ignored,
}

pub struct WebhookHandler<'a> {
    pub store: &'a Store,
    pub queues: &'a QueueSet,
    pub triggers: &'a TriggerConfig,
    /// Bot login for self-comment suppression.
    pub bot_login: &'a str,
    /// Used to fetch the head commit on `synchronize`; optional so tests
    /// and degraded deployments keep working.
    pub forge: Option<&'a ProviderClient>,
}

impl WebhookHandler<'_> {
    /// Classify and act on one event.
    pub async fn handle(&self, event: &WebhookEvent) -> SchedulerResult<Decision> {
        // Always first: tenant and PR upserts.
        let provider_id = self
            .store
            .upsert_provider(&event.provider.kind, &event.provider.base_url)?;
        let installation_id = match &event.installation_id {
            Some(ext) => Some(self.store.upsert_installation(provider_id, ext)?),
            None => None,
        };
        let repo = self.store.upsert_repo(&RepoUpsert {
            provider_id,
            external_id: event.repo.external_id.clone(),
            owner: event.repo.owner.clone(),
            name: event.repo.name.clone(),
            full_name: event.repo.full_name.clone(),
            default_branch: event.repo.default_branch.clone(),
        })?;
        if let Some(inst) = installation_id {
            self.store.link_repo_installation(repo.id, inst)?;
        }
        let author_id = match &event.author {
            Some(u) => Some(self.store.upsert_user(provider_id, &u.external_id, &u.login)?),
            None => None,
        };
        let pr = self.store.upsert_pull_request(&PullRequestUpsert {
            repo_id: repo.id,
            number: event.pull_request.number,
            external_id: event.pull_request.external_id.clone(),
            title: event.pull_request.title.clone(),
            body: event.pull_request.body.clone(),
            state: event.pull_request.state.clone(),
            base_ref: event.pull_request.base_ref.clone(),
            head_ref: event.pull_request.head_ref.clone(),
            base_sha: event.pull_request.base_sha.clone(),
            head_sha: event.pull_request.head_sha.clone(),
            draft: event.pull_request.draft,
            author_id,
        })?;

        match event.event_type {
            EventType::PullRequest => {
                self.handle_pull_request(event, provider_id, installation_id, repo.id, pr.id)
                    .await
            }
            EventType::Comment => {
                self.handle_comment(event, provider_id, installation_id, repo.id, pr.id)
                    .await
            }
            EventType::Reaction => self.handle_reaction(event, pr.id).await,
        }
    }

    async fn handle_pull_request(
        &self,
        event: &WebhookEvent,
        provider_id: i64,
        installation_id: Option<i64>,
        repo_id: i64,
        pull_request_id: i64,
    ) -> SchedulerResult<Decision> {
        let pr = &event.pull_request;
        if pr.state == "closed" || pr.state == "merged" {
            return Ok(Decision::SuppressedClosed);
        }

        // Debounce: one non-failed run per head.
        if let Some(latest) = self.store.latest_run_for_pr(pull_request_id)? {
            if latest.head_sha == pr.head_sha && latest.status != store::RunStatus::Failed {
                debug!(head = %pr.head_sha, "webhook: duplicate head, suppressed");
                return Ok(Decision::SuppressedDuplicateHead);
            }
        }

        if !self.triggers.allows_pull_request(pr) {
            return Ok(Decision::SuppressedByTriggers);
        }

        // Auto-accepted suggestion pushes never re-trigger a review.
        if event.action == "synchronize" {
            if let Some(forge) = self.forge {
                if let Ok(commit) = forge.fetch_commit(&pr.head_sha).await {
                    if commit
                        .message
                        .to_lowercase()
                        .starts_with("apply suggestion")
                    {
                        info!(head = %pr.head_sha, "webhook: suggestion commit, suppressed");
                        return Ok(Decision::SuppressedAutoCommit);
                    }
                }
            }
        }

        self.queues.review.enqueue(Job::Review(ReviewJob {
            provider_id,
            installation_id,
            repo_id,
            pull_request_id,
            pr_number: pr.number,
            head_sha: pr.head_sha.clone(),
            trigger: "webhook".to_string(),
            force: false,
            rules_override: None,
        }));
        Ok(Decision::Enqueued)
    }

    async fn handle_comment(
        &self,
        event: &WebhookEvent,
        provider_id: i64,
        installation_id: Option<i64>,
        repo_id: i64,
        pull_request_id: i64,
    ) -> SchedulerResult<Decision> {
        let Some(comment) = &event.comment else {
            return Ok(Decision::Ignored);
        };

        if is_bot_login(&comment.author_login, self.bot_login)
            || comment.body.contains(MENTION_MARKER)
        {
            return Ok(Decision::SuppressedBotComment);
        }

        let trigger = comment_trigger(&comment.body, &self.triggers.comment_triggers);

        // Canonical comment id: finding thread > reply target > raw id.
        let target_finding = match self
            .store
            .find_finding_by_comment_id(pull_request_id, &comment.id)?
        {
            Some(f) => Some(f),
            None => match &comment.in_reply_to {
                Some(parent) => self
                    .store
                    .find_finding_by_comment_id(pull_request_id, parent)?,
                None => None,
            },
        };
        let canonical_id = target_finding
            .as_ref()
            .and_then(|f| f.comment_id.clone())
            .or_else(|| comment.in_reply_to.clone())
            .unwrap_or_else(|| comment.id.clone());

        // Always record the reply against the latest run when there is one.
        if let Some(run) = self.store.latest_run_for_pr(pull_request_id)? {
            let action = if body_marks_resolved(&comment.body) {
                Some("resolved")
            } else {
                None
            };
            self.store.insert_feedback(
                run.id,
                FeedbackType::Reply,
                None,
                action,
                &canonical_id,
                &serde_json::json!({ "author": comment.author_login }),
            )?;
        }

        let is_thread_reply = target_finding.is_some();
        if trigger.is_none() && !is_thread_reply {
            return Ok(Decision::FeedbackOnly);
        }

        // Acknowledge receipt; failures are swallowed.
        if let Some(forge) = self.forge {
            if let Err(e) = forge.add_reaction(&comment.id, "eyes").await {
                debug!("webhook: reaction failed (ignored): {e}");
            }
        }

        self.queues
            .comment_reply
            .enqueue(Job::CommentReply(CommentReplyJob {
                repo_id,
                pull_request_id,
                comment_id: comment.id.clone(),
                canonical_comment_id: canonical_id,
                body: comment.body.clone(),
                author_login: comment.author_login.clone(),
            }));

        if trigger == Some(CommentTrigger::Review) {
            self.queues.review.enqueue(Job::Review(ReviewJob {
                provider_id,
                installation_id,
                repo_id,
                pull_request_id,
                pr_number: event.pull_request.number,
                head_sha: event.pull_request.head_sha.clone(),
                trigger: "comment".to_string(),
                force: true,
                rules_override: None,
            }));
        }
        Ok(Decision::Enqueued)
    }

    async fn handle_reaction(
        &self,
        event: &WebhookEvent,
        pull_request_id: i64,
    ) -> SchedulerResult<Decision> {
        let Some(comment) = &event.comment else {
            return Ok(Decision::Ignored);
        };
        let Some(run) = self.store.latest_run_for_pr(pull_request_id)? else {
            return Ok(Decision::Ignored);
        };

        let canonical_id = match self
            .store
            .find_finding_by_comment_id(pull_request_id, &comment.id)?
        {
            Some(f) => f.comment_id.unwrap_or_else(|| comment.id.clone()),
            None => comment.id.clone(),
        };

        self.store.insert_feedback(
            run.id,
            FeedbackType::Reaction,
            comment.reaction.as_deref(),
            None,
            &canonical_id,
            &serde_json::json!({ "author": comment.author_login }),
        )?;
        Ok(Decision::FeedbackOnly)
    }
}

/// Bot self-detection: case-insensitive, `[bot]` suffix tolerated.
fn is_bot_login(login: &str, bot_login: &str) -> bool {
    let norm = |s: &str| s.trim().trim_end_matches("[bot]").to_lowercase();
    norm(login) == norm(bot_login)
}

/// `fixed`/`resolved`/`done` without a nearby negation.
fn body_marks_resolved(body: &str) -> bool {
    let lower = body.to_lowercase();
    for keyword in ["fixed", "resolved", "done"] {
        let mut search_from = 0;
        while let Some(pos) = lower[search_from..].find(keyword) {
            let at = search_from + pos;
            let prefix = &lower[at.saturating_sub(24)..at];
            let negated = [
                "not ", "n't ", "never ", "no ", "isn't ", "wasn't ", "hasn't ",
            ]
            .iter()
            .any(|n| prefix.ends_with(n) || prefix.contains(&format!("{n}quite ")));
            if !negated {
                return true;
            }
            search_from = at + keyword.len();
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_login_matching_tolerates_suffix_and_case() {
        assert!(is_bot_login("Grepiku[bot]", "grepiku"));
        assert!(is_bot_login("grepiku", "grepiku"));
        assert!(!is_bot_login("someone-else", "grepiku"));
    }

    #[test]
    fn resolved_detection_handles_negation() {
        assert!(body_marks_resolved("fixed in the next commit"));
        assert!(body_marks_resolved("This is done."));
        assert!(!body_marks_resolved("this is not fixed yet"));
        assert!(!body_marks_resolved("it isn't resolved"));
        assert!(!body_marks_resolved("looks wrong to me"));
        // A negated first occurrence does not hide a later positive one.
        assert!(body_marks_resolved("not fixed before, but now it is fixed"));
    }
}

//! Trigger predicates for pull-request events and comment commands.

use serde::{Deserialize, Serialize};

use crate::webhook::PullRequestInfo;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TriggerConfig {
    /// Reviews run only when asked for explicitly.
    pub manual_only: bool,
    pub include_labels: Vec<String>,
    pub exclude_labels: Vec<String>,
    pub include_branches: Vec<String>,
    pub exclude_branches: Vec<String>,
    pub include_authors: Vec<String>,
    pub exclude_authors: Vec<String>,
    pub include_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub skip_drafts: bool,
    /// Command patterns that trigger from comments.
    pub comment_triggers: Vec<String>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            manual_only: false,
            include_labels: Vec::new(),
            exclude_labels: Vec::new(),
            include_branches: Vec::new(),
            exclude_branches: Vec::new(),
            include_authors: Vec::new(),
            exclude_authors: Vec::new(),
            include_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            skip_drafts: true,
            comment_triggers: vec!["/review".to_string(), "@bot".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentTrigger {
    /// Explicit command: enqueue a forced review.
    Review,
    /// Mention: answer in thread only.
    Mention,
}

impl TriggerConfig {
    pub fn allows_pull_request(&self, pr: &PullRequestInfo) -> bool {
        if self.manual_only {
            return false;
        }
        if self.skip_drafts && pr.draft {
            return false;
        }
        if !self.include_labels.is_empty()
            && !pr.labels.iter().any(|l| self.include_labels.contains(l))
        {
            return false;
        }
        if pr.labels.iter().any(|l| self.exclude_labels.contains(l)) {
            return false;
        }
        if !self.include_branches.is_empty()
            && !self
                .include_branches
                .iter()
                .any(|b| branch_matches(b, &pr.base_ref))
        {
            return false;
        }
        if self
            .exclude_branches
            .iter()
            .any(|b| branch_matches(b, &pr.base_ref))
        {
            return false;
        }
        let text = format!("{}\n{}", pr.title, pr.body).to_lowercase();
        if !self.include_keywords.is_empty()
            && !self
                .include_keywords
                .iter()
                .any(|k| text.contains(&k.to_lowercase()))
        {
            return false;
        }
        if self
            .exclude_keywords
            .iter()
            .any(|k| text.contains(&k.to_lowercase()))
        {
            return false;
        }
        true
    }
}

fn branch_matches(pattern: &str, branch: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => branch.starts_with(prefix),
        None => pattern == branch,
    }
}

/// Classify a comment body against the configured command patterns.
///
/// A leading slash command wins; a bare mention of the bot is a mention.
pub fn comment_trigger(body: &str, patterns: &[String]) -> Option<CommentTrigger> {
    let trimmed = body.trim();
    for pattern in patterns {
        if pattern.starts_with('/') {
            let is_command = trimmed
                .lines()
                .any(|line| line.trim().starts_with(pattern.as_str()));
            if is_command {
                return Some(CommentTrigger::Review);
            }
        } else if trimmed.to_lowercase().contains(&pattern.to_lowercase()) {
            return Some(CommentTrigger::Mention);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr() -> PullRequestInfo {
        PullRequestInfo {
            external_id: "1".into(),
            number: 1,
            title: "Fix crash".into(),
            body: "details".into(),
            state: "open".into(),
            base_ref: "main".into(),
            head_ref: "fix/crash".into(),
            base_sha: "a".repeat(40),
            head_sha: "b".repeat(40),
            draft: false,
            labels: vec!["bug".into()],
        }
    }

    #[test]
    fn default_config_allows_open_non_draft() {
        let cfg = TriggerConfig::default();
        assert!(cfg.allows_pull_request(&pr()));

        let mut draft = pr();
        draft.draft = true;
        assert!(!cfg.allows_pull_request(&draft));
    }

    #[test]
    fn label_and_branch_filters_apply() {
        let cfg = TriggerConfig {
            include_labels: vec!["needs-review".into()],
            ..TriggerConfig::default()
        };
        assert!(!cfg.allows_pull_request(&pr()));

        let cfg = TriggerConfig {
            exclude_branches: vec!["release/*".into()],
            ..TriggerConfig::default()
        };
        let mut release = pr();
        release.base_ref = "release/1.2".into();
        assert!(!cfg.allows_pull_request(&release));
        assert!(cfg.allows_pull_request(&pr()));
    }

    #[test]
    fn comment_commands_and_mentions_differ() {
        let patterns = vec!["/review".to_string(), "@bot".to_string()];
        assert_eq!(
            comment_trigger("/review please", &patterns),
            Some(CommentTrigger::Review)
        );
        assert_eq!(
            comment_trigger("hey @bot what about this?", &patterns),
            Some(CommentTrigger::Mention)
        );
        assert_eq!(comment_trigger("nice change", &patterns), None);
    }
}

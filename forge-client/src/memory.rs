//! In-memory forge double.
//!
//! Serves canned PR data and records every mutation, so pipeline tests can
//! assert on what would have been posted — including idempotency across two
//! identical runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::{ForgeError, ForgeResult};
use crate::types::{
    CheckConclusion, InlineCommentPayload, RemoteChangedFile, RemoteComment, RemoteCommit,
    RemotePullRequest,
};

#[derive(Debug, Default)]
pub struct ForgeState {
    pub pull_request: RemotePullRequest,
    pub commits: Vec<RemoteCommit>,
    pub diff: String,
    /// When set, `fetch_diff_patch` raises `DiffTooLarge`.
    pub diff_too_large: bool,
    /// When set, every write raises an integration-permission 403.
    pub permission_denied_writes: bool,
    pub changed_files: Vec<RemoteChangedFile>,
    pub pr_body: String,
    pub summary_comments: Vec<RemoteComment>,
    pub inline_comments: Vec<RemoteComment>,
    pub resolved_threads: Vec<String>,
    pub reactions: Vec<(String, String)>,
    pub replies: Vec<(String, String)>,
    pub checks: Vec<(String, String, Option<(CheckConclusion, String)>)>,
}

/// Cloneable handle; all clones share one state.
#[derive(Debug, Clone, Default)]
pub struct MemoryForge {
    state: Arc<Mutex<ForgeState>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryForge {
    pub fn new(state: ForgeState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, ForgeState> {
        self.state.lock().expect("forge state poisoned")
    }

    fn fresh_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn check_writable(&self) -> ForgeResult<()> {
        if self.state().permission_denied_writes {
            return Err(ForgeError::PermissionDenied(
                "resource not accessible by integration".into(),
            ));
        }
        Ok(())
    }

    pub async fn fetch_pull_request(&self) -> ForgeResult<RemotePullRequest> {
        Ok(self.state().pull_request.clone())
    }

    pub async fn fetch_commit(&self, sha: &str) -> ForgeResult<RemoteCommit> {
        self.state()
            .commits
            .iter()
            .find(|c| c.sha == sha)
            .cloned()
            .ok_or(ForgeError::NotFound)
    }

    pub async fn fetch_diff_patch(&self) -> ForgeResult<String> {
        let state = self.state();
        if state.diff_too_large {
            return Err(ForgeError::DiffTooLarge);
        }
        Ok(state.diff.clone())
    }

    pub async fn list_changed_files(&self) -> ForgeResult<Vec<RemoteChangedFile>> {
        Ok(self.state().changed_files.clone())
    }

    pub async fn update_pull_request_body(&self, body: &str) -> ForgeResult<()> {
        self.check_writable()?;
        let mut state = self.state();
        state.pr_body = body.to_string();
        state.pull_request.body = body.to_string();
        Ok(())
    }

    pub async fn create_summary_comment(&self, body: &str) -> ForgeResult<RemoteComment> {
        self.check_writable()?;
        let comment = RemoteComment {
            id: self.fresh_id("summary"),
            body: body.to_string(),
            author_login: "grepiku[bot]".into(),
            ..Default::default()
        };
        self.state().summary_comments.push(comment.clone());
        Ok(comment)
    }

    pub async fn update_summary_comment(&self, id: &str, body: &str) -> ForgeResult<()> {
        self.check_writable()?;
        let mut state = self.state();
        match state.summary_comments.iter_mut().find(|c| c.id == id) {
            Some(c) => {
                c.body = body.to_string();
                Ok(())
            }
            None => Err(ForgeError::NotFound),
        }
    }

    pub async fn create_inline_comment(
        &self,
        payload: &InlineCommentPayload,
    ) -> ForgeResult<RemoteComment> {
        self.check_writable()?;
        let comment = RemoteComment {
            id: self.fresh_id("inline"),
            body: payload.body.clone(),
            author_login: "grepiku[bot]".into(),
            path: Some(payload.path.clone()),
            line: Some(payload.line),
            ..Default::default()
        };
        self.state().inline_comments.push(comment.clone());
        Ok(comment)
    }

    pub async fn list_inline_comments(&self) -> ForgeResult<Vec<RemoteComment>> {
        Ok(self.state().inline_comments.clone())
    }

    pub async fn update_inline_comment(&self, id: &str, body: &str) -> ForgeResult<()> {
        self.check_writable()?;
        let mut state = self.state();
        match state.inline_comments.iter_mut().find(|c| c.id == id) {
            Some(c) => {
                c.body = body.to_string();
                Ok(())
            }
            None => Err(ForgeError::NotFound),
        }
    }

    pub async fn resolve_inline_thread(&self, comment_id: &str) -> ForgeResult<()> {
        self.state().resolved_threads.push(comment_id.to_string());
        Ok(())
    }

    pub async fn create_status_check(&self, name: &str) -> ForgeResult<String> {
        self.check_writable()?;
        let id = self.fresh_id("check");
        self.state().checks.push((id.clone(), name.to_string(), None));
        Ok(id)
    }

    pub async fn update_status_check(
        &self,
        check_id: &str,
        conclusion: CheckConclusion,
        summary: &str,
    ) -> ForgeResult<()> {
        self.check_writable()?;
        let mut state = self.state();
        match state.checks.iter_mut().find(|(id, _, _)| id == check_id) {
            Some(entry) => {
                entry.2 = Some((conclusion, summary.to_string()));
                Ok(())
            }
            None => Err(ForgeError::NotFound),
        }
    }

    pub async fn add_reaction(&self, comment_id: &str, content: &str) -> ForgeResult<()> {
        self.state()
            .reactions
            .push((comment_id.to_string(), content.to_string()));
        Ok(())
    }

    pub async fn reply_to_comment(&self, comment_id: &str, body: &str) -> ForgeResult<RemoteComment> {
        self.state()
            .replies
            .push((comment_id.to_string(), body.to_string()));
        Ok(RemoteComment {
            id: self.fresh_id("reply"),
            body: body.to_string(),
            author_login: "grepiku[bot]".into(),
            in_reply_to: Some(comment_id.to_string()),
            ..Default::default()
        })
    }
}

//! Forge adapter: normalized types, typed errors, and enum-dispatched
//! provider clients (no async-trait, no boxed trait objects).
//!
//! Every operation is atomic from the orchestrator's perspective: partial
//! failures raise a [`ForgeError`] and the job plane retries the whole job.

pub mod errors;
pub mod github;
pub mod memory;
pub mod types;

pub use errors::{ForgeError, ForgeResult};
pub use github::{GithubClient, GithubConfig};
pub use memory::{ForgeState, MemoryForge};
pub use types::{
    CheckConclusion, InlineCommentPayload, RemoteChangedFile, RemoteComment, RemoteCommit,
    RemotePullRequest, RemoteUser,
};

/// Provider dispatch.
#[derive(Debug, Clone)]
pub enum ProviderClient {
    Github(GithubClient),
    Memory(MemoryForge),
}

macro_rules! dispatch {
    ($self:ident, $client:ident => $body:expr) => {
        match $self {
            ProviderClient::Github($client) => $body,
            ProviderClient::Memory($client) => $body,
        }
    };
}

impl ProviderClient {
    pub async fn fetch_pull_request(&self) -> ForgeResult<RemotePullRequest> {
        dispatch!(self, c => c.fetch_pull_request().await)
    }

    pub async fn fetch_commit(&self, sha: &str) -> ForgeResult<RemoteCommit> {
        dispatch!(self, c => c.fetch_commit(sha).await)
    }

    pub async fn fetch_diff_patch(&self) -> ForgeResult<String> {
        dispatch!(self, c => c.fetch_diff_patch().await)
    }

    pub async fn list_changed_files(&self) -> ForgeResult<Vec<RemoteChangedFile>> {
        dispatch!(self, c => c.list_changed_files().await)
    }

    pub async fn update_pull_request_body(&self, body: &str) -> ForgeResult<()> {
        dispatch!(self, c => c.update_pull_request_body(body).await)
    }

    pub async fn create_summary_comment(&self, body: &str) -> ForgeResult<RemoteComment> {
        dispatch!(self, c => c.create_summary_comment(body).await)
    }

    pub async fn update_summary_comment(&self, id: &str, body: &str) -> ForgeResult<()> {
        dispatch!(self, c => c.update_summary_comment(id, body).await)
    }

    pub async fn create_inline_comment(
        &self,
        payload: &InlineCommentPayload,
    ) -> ForgeResult<RemoteComment> {
        dispatch!(self, c => c.create_inline_comment(payload).await)
    }

    pub async fn list_inline_comments(&self) -> ForgeResult<Vec<RemoteComment>> {
        dispatch!(self, c => c.list_inline_comments().await)
    }

    pub async fn update_inline_comment(&self, id: &str, body: &str) -> ForgeResult<()> {
        dispatch!(self, c => c.update_inline_comment(id, body).await)
    }

    /// Best-effort; unsupported providers raise [`ForgeError::Unsupported`].
    pub async fn resolve_inline_thread(&self, comment_id: &str) -> ForgeResult<()> {
        dispatch!(self, c => c.resolve_inline_thread(comment_id).await)
    }

    pub async fn create_status_check(&self, name: &str) -> ForgeResult<String> {
        dispatch!(self, c => c.create_status_check(name).await)
    }

    pub async fn update_status_check(
        &self,
        check_id: &str,
        conclusion: CheckConclusion,
        summary: &str,
    ) -> ForgeResult<()> {
        dispatch!(self, c => c.update_status_check(check_id, conclusion, summary).await)
    }

    /// Best-effort reaction.
    pub async fn add_reaction(&self, comment_id: &str, content: &str) -> ForgeResult<()> {
        dispatch!(self, c => c.add_reaction(comment_id, content).await)
    }

    pub async fn reply_to_comment(&self, comment_id: &str, body: &str) -> ForgeResult<RemoteComment> {
        dispatch!(self, c => c.reply_to_comment(comment_id, body).await)
    }
}

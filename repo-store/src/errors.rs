//! Worktree manager errors.

use thiserror::Error;

pub type RepoStoreResult<T> = Result<T, RepoStoreError>;

#[derive(Debug, Error)]
pub enum RepoStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("worktree creation kept racing after {attempts} attempts")]
    WorktreeRace { attempts: usize },
}

impl RepoStoreError {
    /// The specific race the worktree-add retry loop absorbs.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, RepoStoreError::Git { stderr, .. } if stderr.contains("already exists"))
    }
}

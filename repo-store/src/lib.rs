//! Serialized git checkout manager.
//!
//! One persistent clone per `(owner, repo)` under `var/repos/`, with
//! detached worktrees alongside in `<repo>-worktrees/`. Calls for the same
//! repo are chained through a per-key async mutex, so a second caller waits
//! for the first to finish its clone/fetch; worktrees themselves are
//! independent once created.

pub mod errors;
pub mod git;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use errors::{RepoStoreError, RepoStoreResult};
use git::{is_commit_sha, run_git, run_git_anywhere};

const WORKTREE_MAX_AGE: Duration = Duration::from_secs(6 * 60 * 60);
const WORKTREES_KEPT_PER_SHA: usize = 2;
const WORKTREE_ADD_ATTEMPTS: usize = 6;

/// Build the token-bearing clone URL the origin is rewritten to.
pub fn https_clone_url(host: &str, owner: &str, repo: &str, token: &str) -> String {
    format!("https://x-access-token:{token}@{host}/{owner}/{repo}.git")
}

#[derive(Clone)]
pub struct RepoStore {
    /// Project root; clones live at `<root>/var/repos/<owner>/<repo>`.
    root: PathBuf,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl RepoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn repo_dir(&self, owner: &str, repo: &str) -> PathBuf {
        self.root.join("var").join("repos").join(owner).join(repo)
    }

    fn worktrees_dir(&self, owner: &str, repo: &str) -> PathBuf {
        self.root
            .join("var")
            .join("repos")
            .join(owner)
            .join(format!("{repo}-worktrees"))
    }

    async fn repo_lock(&self, owner: &str, repo: &str) -> Arc<Mutex<()>> {
        let key = format!("{owner}/{repo}");
        let mut locks = self.locks.lock().await;
        locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Ensure a detached worktree at `head_sha` and return its path.
    ///
    /// `clone_url` is rewritten onto origin on every call so a rotated token
    /// takes effect immediately.
    pub async fn ensure_checkout(
        &self,
        owner: &str,
        repo: &str,
        head_sha: &str,
        clone_url: &str,
    ) -> RepoStoreResult<PathBuf> {
        let lock = self.repo_lock(owner, repo).await;
        let _guard = lock.lock().await;

        let repo_dir = self.repo_dir(owner, repo);
        if !repo_dir.join(".git").exists() {
            info!(owner, repo, "repo-store: cloning");
            tokio::fs::create_dir_all(&repo_dir).await?;
            run_git_anywhere(&[
                "clone",
                clone_url,
                repo_dir.to_str().unwrap_or_default(),
            ])
            .await?;
        } else {
            run_git(&repo_dir, &["remote", "set-url", "origin", clone_url]).await?;
            run_git(&repo_dir, &["fetch", "--all", "--prune"]).await?;
        }

        let reference = self.resolve_reference(&repo_dir, head_sha).await?;
        self.prune_worktrees(owner, repo, head_sha).await?;
        self.add_worktree(owner, repo, &repo_dir, head_sha, &reference)
            .await
    }

    /// Literal SHAs are used directly; anything else falls back to
    /// `origin/HEAD` then `HEAD`.
    async fn resolve_reference(&self, repo_dir: &Path, head_sha: &str) -> RepoStoreResult<String> {
        if is_commit_sha(head_sha) {
            return Ok(head_sha.to_string());
        }
        for candidate in ["origin/HEAD", "HEAD"] {
            if let Ok(sha) = run_git(repo_dir, &["rev-parse", candidate]).await {
                return Ok(sha);
            }
        }
        Ok(head_sha.to_string())
    }

    /// Drop same-sha worktrees older than six hours, keeping the two most
    /// recently modified.
    async fn prune_worktrees(&self, owner: &str, repo: &str, sha: &str) -> RepoStoreResult<()> {
        let dir = self.worktrees_dir(owner, repo);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Ok(());
        };

        let mut same_sha: Vec<(PathBuf, SystemTime)> = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(&format!("{sha}-")) {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(UNIX_EPOCH);
            same_sha.push((entry.path(), modified));
        }

        same_sha.sort_by(|a, b| b.1.cmp(&a.1));
        let now = SystemTime::now();
        for (path, modified) in same_sha.into_iter().skip(WORKTREES_KEPT_PER_SHA) {
            let old_enough = now
                .duration_since(modified)
                .map(|age| age > WORKTREE_MAX_AGE)
                .unwrap_or(true);
            if !old_enough {
                continue;
            }
            debug!(path = %path.display(), "repo-store: pruning stale worktree");
            let repo_dir = self.repo_dir(owner, repo);
            if let Err(e) = run_git(
                &repo_dir,
                &[
                    "worktree",
                    "remove",
                    "--force",
                    path.to_str().unwrap_or_default(),
                ],
            )
            .await
            {
                warn!("repo-store: worktree remove failed ({e}); deleting directory");
                let _ = std::fs::remove_dir_all(&path);
                let _ = run_git(&repo_dir, &["worktree", "prune"]).await;
            }
        }
        Ok(())
    }

    async fn add_worktree(
        &self,
        owner: &str,
        repo: &str,
        repo_dir: &Path,
        sha: &str,
        reference: &str,
    ) -> RepoStoreResult<PathBuf> {
        let dir = self.worktrees_dir(owner, repo);
        tokio::fs::create_dir_all(&dir).await?;
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let pid = std::process::id();

        for attempt in 1..=WORKTREE_ADD_ATTEMPTS {
            let path = dir.join(format!("{sha}-{epoch}-{pid}-{attempt}"));
            match run_git(
                repo_dir,
                &[
                    "worktree",
                    "add",
                    "--detach",
                    path.to_str().unwrap_or_default(),
                    reference,
                ],
            )
            .await
            {
                Ok(_) => {
                    info!(path = %path.display(), "repo-store: worktree ready");
                    return Ok(path);
                }
                Err(e) if e.is_already_exists() => {
                    debug!(attempt, "repo-store: worktree path raced, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(RepoStoreError::WorktreeRace {
            attempts: WORKTREE_ADD_ATTEMPTS,
        })
    }

    /// `git diff --no-color --no-ext-diff <base>...<head>` in the repo clone.
    pub async fn local_diff(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> RepoStoreResult<String> {
        let repo_dir = self.repo_dir(owner, repo);
        run_git(
            &repo_dir,
            &[
                "diff",
                "--no-color",
                "--no-ext-diff",
                &format!("{base}...{head}"),
            ],
        )
        .await
    }

    /// First line of a commit message (used for suppression checks).
    pub async fn commit_subject(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> RepoStoreResult<String> {
        let repo_dir = self.repo_dir(owner, repo);
        run_git(&repo_dir, &["show", "-s", "--format=%s", sha]).await
    }
}

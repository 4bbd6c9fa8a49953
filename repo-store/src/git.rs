//! Thin git CLI wrapper.
//!
//! Working-tree operations go through the `git` binary rather than a
//! library binding: the CLI's clobber protections and worktree semantics are
//! the behavior we want, and failures carry their stderr.

use std::path::Path;
use std::process::Output;

use tokio::process::Command;
use tracing::debug;

use crate::errors::{RepoStoreError, RepoStoreResult};

/// Run `git <args>` in `dir`, returning trimmed stdout.
pub async fn run_git(dir: &Path, args: &[&str]) -> RepoStoreResult<String> {
    debug!(dir = %dir.display(), ?args, "git");
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await?;
    check(args, output)
}

/// Run `git <args>` without a working directory (clone).
pub async fn run_git_anywhere(args: &[&str]) -> RepoStoreResult<String> {
    debug!(?args, "git");
    let output = Command::new("git").args(args).output().await?;
    check(args, output)
}

fn check(args: &[&str], output: Output) -> RepoStoreResult<String> {
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(RepoStoreError::Git {
            command: format!("git {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// True when `s` is a full commit id.
pub fn is_commit_sha(s: &str) -> bool {
    s.len() == 40 && s.chars().all(|c| c.is_ascii_hexdigit())
}

//! Checkout walking with skip lists and per-file gates.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;
use walkdir::WalkDir;

use crate::errors::IndexerResult;

/// Directory names never descended into: VCS internals, dependency caches,
/// build outputs, and the service's own runtime dirs.
const SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    "vendor",
    "__pycache__",
    ".venv",
    "venv",
    ".next",
    ".cache",
    "var",
];

/// One file that passed the walk-level filters (path and size only; content
/// gates run at read time).
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// Path relative to the checkout root, `/`-separated.
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub size: u64,
}

pub(crate) fn skip_set() -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for dir in SKIP_DIRS {
        // match the dir at any depth
        builder.add(Glob::new(&format!("**/{dir}")).expect("static glob"));
        builder.add(Glob::new(dir).expect("static glob"));
    }
    builder.build().expect("static glob set")
}

/// Enumerate candidate files under `root`, bounded by `max_file_bytes`.
pub fn walk_checkout(root: &Path, max_file_bytes: u64) -> IndexerResult<Vec<CandidateFile>> {
    let skip = skip_set();
    let mut out = Vec::new();

    let walker = WalkDir::new(root).follow_links(false).into_iter();
    for entry in walker.filter_entry(|e| {
        if !e.file_type().is_dir() {
            return true;
        }
        let rel = e.path().strip_prefix(root).unwrap_or(e.path());
        !skip.is_match(rel)
    }) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("walk: skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!("walk: no metadata for {}: {e}", entry.path().display());
                continue;
            }
        };
        if meta.len() > max_file_bytes {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        out.push(CandidateFile {
            rel_path: rel,
            abs_path: entry.path().to_path_buf(),
            size: meta.len(),
        });
    }

    out.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn skips_caches_and_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/lodash")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("node_modules/lodash/index.js"), "x").unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref: main").unwrap();
        fs::write(dir.path().join("big.bin"), vec![b'x'; 2048]).unwrap();

        let files = walk_checkout(dir.path(), 1024).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["src/main.rs"]);
    }
}

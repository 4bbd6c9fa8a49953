//! Unified-diff index.
//!
//! Parses a textual unified diff once and answers the questions the rest of
//! the pipeline keeps asking:
//! - which post-image paths does the diff touch,
//! - is `(path, line, side)` inside the diff,
//! - stable digests of the hunk (and its unchanged neighborhood) containing a
//!   line, used to follow findings across commits when line numbers shift.
//!
//! The parser is lenient: unknown header lines end the current hunk, invalid
//! hunk headers are skipped, and binary patches simply produce no hunks.

mod hashes;
mod parser;

pub use parser::parse_unified_diff;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which image of the diff a line number refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "LEFT")]
    Left,
    #[serde(rename = "RIGHT")]
    Right,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "LEFT",
            Side::Right => "RIGHT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LEFT" => Some(Side::Left),
            "RIGHT" => Some(Side::Right),
            _ => None,
        }
    }
}

/// Classification of one line within a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Added,
    Deleted,
    Context,
}

/// One line of a hunk with its resolved line numbers.
#[derive(Debug, Clone)]
pub struct DiffLine {
    pub kind: LineKind,
    /// Old-image line number (deleted and context lines).
    pub old_line: Option<u32>,
    /// New-image line number (added and context lines).
    pub new_line: Option<u32>,
    pub content: String,
}

/// One `@@`-delimited hunk.
#[derive(Debug, Clone)]
pub struct Hunk {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// True when `(line, side)` falls on a line this hunk carries.
    pub fn contains(&self, line: u32, side: Side) -> bool {
        self.lines.iter().any(|l| matches(l, line, side))
    }
}

fn matches(l: &DiffLine, line: u32, side: Side) -> bool {
    match side {
        Side::Right => l.new_line == Some(line) && l.kind != LineKind::Deleted,
        Side::Left => l.old_line == Some(line) && l.kind != LineKind::Added,
    }
}

/// Per-path add/delete counts, as reported to the context-pack builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileStat {
    pub path: String,
    pub additions: u32,
    pub deletions: u32,
}

/// Parsed diff with per-path hunks and digest queries.
#[derive(Debug, Clone, Default)]
pub struct DiffIndex {
    files: Vec<String>,
    hunks: HashMap<String, Vec<Hunk>>,
}

impl DiffIndex {
    /// Parse a unified diff into an index.
    pub fn parse(diff: &str) -> Self {
        parse_unified_diff(diff)
    }

    pub(crate) fn from_parts(files: Vec<String>, hunks: HashMap<String, Vec<Hunk>>) -> Self {
        Self { files, hunks }
    }

    /// Post-image paths present in the diff, in first-seen order.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.hunks.contains_key(path)
    }

    pub fn hunks_for(&self, path: &str) -> &[Hunk] {
        self.hunks.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Is `(path, line, side)` a line the diff actually shows?
    ///
    /// On `RIGHT` the line must be an added or context line of some hunk's
    /// new range; on `LEFT` a deleted or context line of the old range.
    pub fn is_line_in_diff(&self, path: &str, line: u32, side: Side) -> bool {
        self.hunks_for(path).iter().any(|h| h.contains(line, side))
    }

    /// 16-hex digest over the full text of the hunk containing the line.
    ///
    /// The hunk header (and with it the absolute positions) is excluded, so
    /// the digest survives the hunk shifting up or down the file.
    pub fn hunk_hash(&self, path: &str, line: u32, side: Side) -> Option<String> {
        let hunk = self.find_hunk(path, line, side)?;
        Some(hashes::hunk_digest(hunk))
    }

    /// 16-hex digest over up to ±3 unchanged lines around the target.
    pub fn context_hash(&self, path: &str, line: u32, side: Side) -> Option<String> {
        let hunk = self.find_hunk(path, line, side)?;
        let at = hunk.lines.iter().position(|l| matches(l, line, side))?;
        Some(hashes::context_digest(hunk, at))
    }

    /// New-image line numbers introduced by the diff for `path`.
    pub fn added_lines(&self, path: &str) -> Vec<u32> {
        let mut out: Vec<u32> = self
            .hunks_for(path)
            .iter()
            .flat_map(|h| h.lines.iter())
            .filter(|l| l.kind == LineKind::Added)
            .filter_map(|l| l.new_line)
            .collect();
        out.sort_unstable();
        out
    }

    /// Per-path addition/deletion counts.
    pub fn file_stats(&self) -> Vec<FileStat> {
        self.files
            .iter()
            .map(|path| {
                let mut stat = FileStat {
                    path: path.clone(),
                    ..Default::default()
                };
                for l in self.hunks_for(path).iter().flat_map(|h| h.lines.iter()) {
                    match l.kind {
                        LineKind::Added => stat.additions += 1,
                        LineKind::Deleted => stat.deletions += 1,
                        LineKind::Context => {}
                    }
                }
                stat
            })
            .collect()
    }

    fn find_hunk(&self, path: &str, line: u32, side: Side) -> Option<&Hunk> {
        self.hunks_for(path).iter().find(|h| h.contains(line, side))
    }
}

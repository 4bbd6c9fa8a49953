//! Lenient unified-diff parser.

use std::collections::HashMap;

use crate::{DiffIndex, DiffLine, Hunk, LineKind};

/// Parse a unified diff into a [`DiffIndex`].
///
/// File sections are recognized by `---`/`+++` headers (with `diff --git` as
/// a section boundary); `@@` headers open hunks. Lines that fit neither close
/// the current hunk, which tolerates `index`, mode, and binary-file markers.
pub fn parse_unified_diff(diff: &str) -> DiffIndex {
    let mut files: Vec<String> = Vec::new();
    let mut hunks: HashMap<String, Vec<Hunk>> = HashMap::new();

    let mut old_path: Option<String> = None;
    let mut current_path: Option<String> = None;
    let mut current: Option<Hunk> = None;
    // Running counters inside the current hunk.
    let mut old_no: u32 = 0;
    let mut new_no: u32 = 0;

    let mut flush_hunk =
        |current: &mut Option<Hunk>, path: &Option<String>, hunks: &mut HashMap<String, Vec<Hunk>>| {
            if let (Some(h), Some(p)) = (current.take(), path.as_ref()) {
                hunks.entry(p.clone()).or_default().push(h);
            }
        };

    for line in diff.lines() {
        if line.starts_with("diff --git ") {
            flush_hunk(&mut current, &current_path, &mut hunks);
            current_path = None;
            old_path = None;
            continue;
        }
        if let Some(rest) = line.strip_prefix("--- ") {
            flush_hunk(&mut current, &current_path, &mut hunks);
            old_path = normalize_header_path(rest);
            continue;
        }
        if let Some(rest) = line.strip_prefix("+++ ") {
            flush_hunk(&mut current, &current_path, &mut hunks);
            // Post-image path wins; deletions fall back to the old path so
            // LEFT-side queries still resolve.
            let path = normalize_header_path(rest).or_else(|| old_path.clone());
            if let Some(p) = &path {
                if !files.contains(p) {
                    files.push(p.clone());
                }
            }
            current_path = path;
            continue;
        }
        if let Some(rest) = line.strip_prefix("@@") {
            flush_hunk(&mut current, &current_path, &mut hunks);
            if current_path.is_none() {
                continue;
            }
            let Some(header) = parse_hunk_header(rest) else {
                // skip invalid header; do not fail hard
                continue;
            };
            old_no = header.0;
            new_no = header.2;
            current = Some(Hunk {
                old_start: header.0,
                old_count: header.1,
                new_start: header.2,
                new_count: header.3,
                lines: Vec::new(),
            });
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            continue;
        };

        if let Some(content) = line.strip_prefix('+') {
            hunk.lines.push(DiffLine {
                kind: LineKind::Added,
                old_line: None,
                new_line: Some(new_no),
                content: content.to_string(),
            });
            new_no += 1;
        } else if let Some(content) = line.strip_prefix('-') {
            hunk.lines.push(DiffLine {
                kind: LineKind::Deleted,
                old_line: Some(old_no),
                new_line: None,
                content: content.to_string(),
            });
            old_no += 1;
        } else if line.starts_with(' ') || line.is_empty() {
            let content = if line.is_empty() { "" } else { &line[1..] };
            hunk.lines.push(DiffLine {
                kind: LineKind::Context,
                old_line: Some(old_no),
                new_line: Some(new_no),
                content: content.to_string(),
            });
            old_no += 1;
            new_no += 1;
        } else if line.starts_with('\\') {
            // "\ No newline at end of file"
        } else {
            // other headers end the current hunk
            flush_hunk(&mut current, &current_path, &mut hunks);
        }
    }

    flush_hunk(&mut current, &current_path, &mut hunks);

    // `files` may mention paths whose sections carried no hunks (binary);
    // keep only paths that can answer queries.
    files.retain(|p| hunks.contains_key(p));
    DiffIndex::from_parts(files, hunks)
}

/// Strip exactly one leading `a/` or `b/` and drop `/dev/null`.
///
/// A diff touching a real top-level directory named `a` or `b` renders as
/// `a/a/…` or `b/b/…`, so single-prefix stripping preserves it.
fn normalize_header_path(raw: &str) -> Option<String> {
    let raw = raw.split('\t').next().unwrap_or(raw).trim();
    if raw == "/dev/null" {
        return None;
    }
    let stripped = raw
        .strip_prefix("a/")
        .or_else(|| raw.strip_prefix("b/"))
        .unwrap_or(raw);
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Parse ` -a,b +c,d @@ …` following the leading `@@`.
fn parse_hunk_header(rest: &str) -> Option<(u32, u32, u32, u32)> {
    let mut parts = rest.trim().split_whitespace();
    let old = parts.next()?.strip_prefix('-')?;
    let new = parts.next()?.strip_prefix('+')?;
    let (old_start, old_count) = split_range(old)?;
    let (new_start, new_count) = split_range(new)?;
    Some((old_start, old_count, new_start, new_count))
}

fn split_range(s: &str) -> Option<(u32, u32)> {
    let mut it = s.split(',');
    let start: u32 = it.next()?.parse().ok()?;
    // count may be omitted; one line is implied
    let count: u32 = match it.next() {
        Some(c) => c.parse().ok()?,
        None => 1,
    };
    Some((start, count))
}

//! Query composition and tokenization shared by the retrieval channels.

use std::collections::HashSet;

use diff_index::FileStat;

const MAX_BODY_CHARS: usize = 1200;
const MAX_DIFF_LINES: usize = 140;
const MAX_QUERY_CHARS: usize = 6000;

/// Compose the retrieval query from PR metadata, changed paths, and raw diff
/// signal (added/removed lines only).
pub fn compose_query(
    pr_title: Option<&str>,
    pr_body: Option<&str>,
    changed: &[FileStat],
    diff_text: &str,
) -> String {
    let mut q = String::new();

    if let Some(title) = pr_title {
        q.push_str(title.trim());
        q.push('\n');
    }
    if let Some(body) = pr_body {
        let body = body.trim();
        let clipped = truncate_chars(body, MAX_BODY_CHARS);
        if !clipped.is_empty() {
            q.push_str(clipped);
            q.push('\n');
        }
    }
    for stat in changed {
        q.push_str(&stat.path);
        q.push('\n');
    }

    let mut taken = 0usize;
    for line in diff_text.lines() {
        if taken >= MAX_DIFF_LINES {
            break;
        }
        let is_signal = (line.starts_with('+') && !line.starts_with("+++"))
            || (line.starts_with('-') && !line.starts_with("---"));
        if is_signal {
            q.push_str(&line[1..]);
            q.push('\n');
            taken += 1;
        }
    }

    truncate_chars(&q, MAX_QUERY_CHARS).to_string()
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "not", "but", "have",
    "has", "you", "your", "into", "out", "use", "used", "will", "can", "all", "any", "when",
    "where", "how", "what", "why", "also", "its", "were", "been", "than", "then", "they",
    "their", "there", "which", "while", "would", "should", "could", "these", "those", "new",
    "add", "added", "fix", "fixed", "update", "updated", "remove", "removed",
];

/// Tokenize for the lexical channel: lowercase, split on non-identifier
/// characters (keeping `/` and `.` so path fragments survive), drop
/// stopwords and one-character tokens.
pub fn tokenize(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '/' || c == '.'))
        .map(|t| t.trim_matches(|c| c == '.' || c == '/'))
        .filter(|t| t.len() >= 2)
        .filter(|t| !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Tokens that look like path fragments (used for the one-shot path boost).
pub fn path_like_tokens(tokens: &HashSet<String>) -> Vec<&String> {
    tokens
        .iter()
        .filter(|t| t.contains('/') || (t.contains('.') && !t.ends_with('.')))
        .collect()
}

pub fn truncate_chars(s: &str, max: usize) -> &str {
    if s.chars().count() <= max {
        return s;
    }
    let mut end = 0;
    for (i, (pos, _)) in s.char_indices().enumerate() {
        if i == max {
            end = pos;
            break;
        }
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_bounded_and_keeps_signal() {
        let changed = vec![FileStat {
            path: "src/foo.ts".into(),
            additions: 2,
            deletions: 1,
        }];
        let diff = "--- a/src/foo.ts\n+++ b/src/foo.ts\n@@ -1 +1,2 @@\n+if (user == null) return;\n-return user.name;\n context line\n";
        let q = compose_query(Some("Fix null deref"), Some("Long body"), &changed, diff);
        assert!(q.contains("Fix null deref"));
        assert!(q.contains("src/foo.ts"));
        assert!(q.contains("if (user == null) return;"));
        assert!(q.contains("return user.name;"));
        assert!(!q.contains("context line"));
        assert!(!q.contains("+++"));
        assert!(q.chars().count() <= 6000);
    }

    #[test]
    fn tokens_skip_stopwords_and_short_fragments() {
        let toks = tokenize("Fix the null deref in src/foo.ts for a user");
        assert!(toks.contains("null"));
        assert!(toks.contains("deref"));
        assert!(toks.contains("src/foo.ts"));
        assert!(!toks.contains("the"));
        assert!(!toks.contains("a"));
        let paths = path_like_tokens(&toks);
        assert!(paths.iter().any(|t| t.as_str() == "src/foo.ts"));
    }
}

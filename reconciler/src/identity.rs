//! Finding identity: fingerprints, match keys, and title similarity.

use sha2::{Digest, Sha256};

/// 16-hex digest shared by all identity keys.
pub fn hash16(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p.as_bytes());
        hasher.update(b"\x1f");
    }
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Fingerprint over the slow-moving identity fields.
pub fn fingerprint(category: &str, title: &str, path: &str) -> String {
    hash16(&[category, &normalize_title(title), path])
}

/// Exact-match key: fingerprint + location digest + title.
pub fn match_key(fingerprint: &str, path: &str, hunk_hash: &str, title: &str) -> String {
    hash16(&[fingerprint, path, hunk_hash, &normalize_title(title)])
}

/// Path normalization for matching: strip `./` and diff-image prefixes.
pub fn normalize_path(path: &str) -> String {
    let p = path.trim();
    let p = p.strip_prefix("./").unwrap_or(p);
    let p = p
        .strip_prefix("a/")
        .or_else(|| p.strip_prefix("b/"))
        .unwrap_or(p);
    p.to_string()
}

/// Lowercased alphanumeric-token form of a title.
pub fn normalize_title(title: &str) -> String {
    title_tokens(title).join(" ")
}

fn title_tokens(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(str::to_string)
        .collect()
}

/// Token-Jaccard similarity between two titles, in `[0, 1]`.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let ta: std::collections::HashSet<String> = title_tokens(a).into_iter().collect();
    let tb: std::collections::HashSet<String> = title_tokens(b).into_iter().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let inter = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    inter / union
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_16_hex_and_stable() {
        let fp = fingerprint("bug", "Possible null deref", "src/foo.ts");
        assert_eq!(fp.len(), 16);
        assert_eq!(fp, fingerprint("bug", "Possible null deref", "src/foo.ts"));
        // Title normalization collapses case and punctuation.
        assert_eq!(fp, fingerprint("bug", "possible NULL deref!", "src/foo.ts"));
        assert_ne!(fp, fingerprint("bug", "possible null deref", "src/bar.ts"));
    }

    #[test]
    fn path_normalization_strips_diff_prefixes() {
        assert_eq!(normalize_path("./src/x.ts"), "src/x.ts");
        assert_eq!(normalize_path("b/src/x.ts"), "src/x.ts");
        assert_eq!(normalize_path("src/x.ts"), "src/x.ts");
    }

    #[test]
    fn similarity_orders_titles_sensibly() {
        let close = title_similarity("possible null dereference", "null dereference possible");
        let far = title_similarity("possible null dereference", "missing test coverage");
        assert!(close > 0.9);
        assert!(far < 0.2);
    }
}

//! Stable digests over hunk content.

use sha2::{Digest, Sha256};

use crate::{Hunk, LineKind};

const HEX_LEN: usize = 16;

/// Digest of the full hunk body: per-line origin marker + content.
///
/// Absolute line numbers are deliberately excluded.
pub(crate) fn hunk_digest(hunk: &Hunk) -> String {
    let mut hasher = Sha256::new();
    for l in &hunk.lines {
        hasher.update(marker(l.kind));
        hasher.update(l.content.as_bytes());
        hasher.update(b"\n");
    }
    short_hex(hasher)
}

/// Digest of up to three unchanged lines on each side of `at`.
pub(crate) fn context_digest(hunk: &Hunk, at: usize) -> String {
    let before: Vec<&str> = hunk.lines[..at]
        .iter()
        .rev()
        .filter(|l| l.kind == LineKind::Context)
        .take(3)
        .map(|l| l.content.as_str())
        .collect();
    let after = hunk.lines[at + 1..]
        .iter()
        .filter(|l| l.kind == LineKind::Context)
        .take(3)
        .map(|l| l.content.as_str());

    let mut hasher = Sha256::new();
    for line in before.into_iter().rev() {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hasher.update(b"|");
    for line in after {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    short_hex(hasher)
}

fn marker(kind: LineKind) -> &'static [u8] {
    match kind {
        LineKind::Added => b"+",
        LineKind::Deleted => b"-",
        LineKind::Context => b" ",
    }
}

fn short_hex(hasher: Sha256) -> String {
    let digest = hasher.finalize();
    let mut out = String::with_capacity(HEX_LEN);
    for byte in digest.iter().take(HEX_LEN / 2) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

//! Extension → language mapping and grammar lookup.

/// Languages with a syntax parser wired in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Rust,
    Python,
    Typescript,
    Tsx,
    Javascript,
}

impl Language {
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit('.').next()?;
        match ext {
            "rs" => Some(Language::Rust),
            "py" => Some(Language::Python),
            "ts" | "mts" | "cts" => Some(Language::Typescript),
            "tsx" => Some(Language::Tsx),
            "js" | "mjs" | "cjs" | "jsx" => Some(Language::Javascript),
            _ => None,
        }
    }

    /// Stable tag stored on `file_index.language`.
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::Typescript | Language::Tsx => "typescript",
            Language::Javascript => "javascript",
        }
    }

    pub fn grammar(self) -> tree_sitter::Language {
        match self {
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::Typescript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::Javascript => tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

/// Loose text-likeness check for files without a known parser: printable
/// ratio over the first 4 KiB must reach 0.92.
pub fn looks_textual(bytes: &[u8]) -> bool {
    let prefix = &bytes[..bytes.len().min(4096)];
    if prefix.is_empty() {
        return true;
    }
    let printable = prefix
        .iter()
        .filter(|&&b| matches!(b, b'\n' | b'\r' | b'\t' | 0x20..=0x7E) || b >= 0x80)
        .count();
    (printable as f64) / (prefix.len() as f64) >= 0.92
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_extension_families() {
        assert_eq!(Language::from_path("src/lib.rs"), Some(Language::Rust));
        assert_eq!(Language::from_path("a/b/mod.mts"), Some(Language::Typescript));
        assert_eq!(Language::from_path("component.tsx"), Some(Language::Tsx));
        assert_eq!(Language::from_path("script.cjs"), Some(Language::Javascript));
        assert_eq!(Language::from_path("README.md"), None);
        assert_eq!(Language::from_path("Makefile"), None);
    }

    #[test]
    fn binary_prefix_is_rejected() {
        assert!(looks_textual(b"plain text with unicode \xc3\xa9"));
        let mut binary = vec![0x01u8; 1000];
        binary.extend_from_slice(b"some text");
        assert!(!looks_textual(&binary));
    }
}

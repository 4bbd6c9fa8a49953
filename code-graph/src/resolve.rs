//! Extension-aware import resolution.
//!
//! Resolves an import spec against the set of indexed file paths using the
//! extension family of the importing file, then `index`/`__init__`
//! conventions. Specs that cannot name an internal file resolve to `None`
//! and become external-dependency edges.

use std::collections::HashSet;

const TS_FAMILY: &[&str] = &["ts", "tsx", "js", "jsx", "mts", "cts", "mjs", "cjs"];

/// Resolve `spec` as imported from `importer` against `paths`.
pub fn resolve_import(importer: &str, spec: &str, paths: &HashSet<String>) -> Option<String> {
    let ext = importer.rsplit('.').next().unwrap_or("");
    match ext {
        "ts" | "tsx" | "mts" | "cts" | "js" | "jsx" | "mjs" | "cjs" => {
            resolve_ts(importer, spec, paths)
        }
        "py" => resolve_py(importer, spec, paths),
        "rs" | "go" => resolve_exact(importer, spec, paths),
        _ => None,
    }
}

/// Package root of a non-relative spec, the key for external nodes:
/// `@scope/pkg/deep` → `@scope/pkg`, `lodash/fp` → `lodash`.
pub fn package_root(spec: &str) -> Option<String> {
    if spec.starts_with('.') || spec.starts_with('/') {
        return None;
    }
    let mut parts = spec.split('/');
    let first = parts.next()?;
    if first.is_empty() {
        return None;
    }
    if first.starts_with('@') {
        let second = parts.next()?;
        Some(format!("{first}/{second}"))
    } else {
        Some(first.split("::").next().unwrap_or(first).to_string())
    }
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

fn join(dir: &str, rel: &str) -> String {
    let mut parts: Vec<&str> = if dir.is_empty() {
        Vec::new()
    } else {
        dir.split('/').collect()
    };
    for seg in rel.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

fn resolve_ts(importer: &str, spec: &str, paths: &HashSet<String>) -> Option<String> {
    if !(spec.starts_with('.') || spec.starts_with('/')) {
        return None;
    }
    let base = join(parent_dir(importer), spec.trim_start_matches('/'));

    // exact path as written
    if paths.contains(&base) {
        return Some(base);
    }
    // sibling extensions
    for ext in TS_FAMILY {
        let cand = format!("{base}.{ext}");
        if paths.contains(&cand) {
            return Some(cand);
        }
    }
    // directory index
    for ext in TS_FAMILY {
        let cand = format!("{base}/index.{ext}");
        if paths.contains(&cand) {
            return Some(cand);
        }
    }
    None
}

fn resolve_py(importer: &str, spec: &str, paths: &HashSet<String>) -> Option<String> {
    // Relative: each leading dot climbs one level (first dot = same package).
    let (mut dir, rest) = if let Some(stripped) = spec.strip_prefix('.') {
        let mut dir = parent_dir(importer).to_string();
        let mut rest = stripped;
        while let Some(more) = rest.strip_prefix('.') {
            dir = parent_dir(&dir).to_string();
            rest = more;
        }
        (dir, rest.to_string())
    } else {
        (String::new(), spec.to_string())
    };

    if dir.is_empty() {
        dir = String::new();
    }
    let rel = rest.replace('.', "/");
    let base = join(&dir, &rel);

    let module = format!("{base}.py");
    if paths.contains(&module) {
        return Some(module);
    }
    let package = format!("{base}/__init__.py");
    if paths.contains(&package) {
        return Some(package);
    }
    None
}

/// Rust/Go: the spec already names a path-ish module; try it verbatim with
/// the importer's extension, both absolutely and next to the importer.
fn resolve_exact(importer: &str, spec: &str, paths: &HashSet<String>) -> Option<String> {
    let ext = importer.rsplit('.').next().unwrap_or("rs");
    let rel = spec
        .trim_start_matches("crate::")
        .trim_start_matches("self::")
        .trim_start_matches("super::")
        .replace("::", "/");

    for base in [
        join(parent_dir(importer), &rel),
        rel.clone(),
        format!("src/{rel}"),
    ] {
        let cand = format!("{base}.{ext}");
        if paths.contains(&cand) {
            return Some(cand);
        }
        let cand = format!("{base}/mod.{ext}");
        if paths.contains(&cand) {
            return Some(cand);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ts_family_resolves_siblings_and_index() {
        let p = paths(&["src/util.ts", "src/lib/index.tsx", "src/app.tsx"]);
        assert_eq!(
            resolve_import("src/app.tsx", "./util", &p),
            Some("src/util.ts".into())
        );
        assert_eq!(
            resolve_import("src/app.tsx", "./lib", &p),
            Some("src/lib/index.tsx".into())
        );
        assert_eq!(resolve_import("src/app.tsx", "lodash", &p), None);
    }

    #[test]
    fn python_relative_dots_climb_packages() {
        let p = paths(&["pkg/a/util.py", "pkg/b/__init__.py", "pkg/a/mod.py"]);
        assert_eq!(
            resolve_import("pkg/a/mod.py", ".util", &p),
            Some("pkg/a/util.py".into())
        );
        assert_eq!(
            resolve_import("pkg/a/mod.py", "..b", &p),
            Some("pkg/b/__init__.py".into())
        );
        assert_eq!(resolve_import("pkg/a/mod.py", "os", &p), None);
    }

    #[test]
    fn rust_uses_exact_module_paths() {
        let p = paths(&["src/config/model.rs", "src/parsing.rs"]);
        assert_eq!(
            resolve_import("src/lib.rs", "crate::parsing", &p),
            Some("src/parsing.rs".into())
        );
        assert_eq!(
            resolve_import("src/lib.rs", "crate::config::model", &p),
            Some("src/config/model.rs".into())
        );
    }

    #[test]
    fn package_roots() {
        assert_eq!(package_root("@scope/pkg/deep"), Some("@scope/pkg".into()));
        assert_eq!(package_root("lodash/fp"), Some("lodash".into()));
        assert_eq!(package_root("serde_json::Value"), Some("serde_json".into()));
        assert_eq!(package_root("./local"), None);
    }
}

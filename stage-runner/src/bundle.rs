//! Per-run bundle layout: `var/bundles/<run_id>/{bundle, out, codex_home}`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::StageResult;

/// Input file names the orchestrator writes before stage 1.
pub const PR_MD: &str = "pr.md";
pub const DIFF_PATCH: &str = "diff.patch";
pub const CHANGED_FILES_JSON: &str = "changed_files.json";
pub const BOT_CONFIG_JSON: &str = "bot_config.json";
pub const RULES_JSON: &str = "rules.json";
pub const SCOPES_JSON: &str = "scopes.json";
pub const CONTEXT_PACK_JSON: &str = "context_pack.json";
pub const CONFIG_WARNINGS_JSON: &str = "config_warnings.json";

#[derive(Debug, Clone)]
pub struct BundlePaths {
    pub root: PathBuf,
    pub bundle_dir: PathBuf,
    pub out_dir: PathBuf,
    pub codex_home: PathBuf,
}

impl BundlePaths {
    /// Create the directory trio for one run.
    pub fn create(project_root: &Path, run_id: i64) -> StageResult<Self> {
        let root = project_root
            .join("var")
            .join("bundles")
            .join(run_id.to_string());
        let paths = Self {
            bundle_dir: root.join("bundle"),
            out_dir: root.join("out"),
            codex_home: root.join("codex_home"),
            root,
        };
        fs::create_dir_all(&paths.bundle_dir)?;
        fs::create_dir_all(&paths.out_dir)?;
        fs::create_dir_all(&paths.codex_home)?;
        Ok(paths)
    }

    pub fn write_input(&self, name: &str, contents: &str) -> StageResult<()> {
        fs::write(self.bundle_dir.join(name), contents)?;
        Ok(())
    }
}

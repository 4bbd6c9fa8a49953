//! Per-run configuration resolution.
//!
//! Layering, lowest precedence first: shipped defaults, the repo's config
//! file from the checkout, stored memory rules, installation defaults, UI
//! overrides, and the job's `rules_override`. Invalid sections degrade to
//! their defaults with a warning attached to the run; they are never fatal.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use contextor::ContextConfig;
use scheduler::TriggerConfig;

/// File name looked up at the checkout root.
pub const REPO_CONFIG_FILE: &str = ".grepiku.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputDestination {
    PrBody,
    Comment,
    Both,
}

impl OutputDestination {
    pub fn allows_pr_body(self) -> bool {
        matches!(self, OutputDestination::PrBody | OutputDestination::Both)
    }

    pub fn allows_comment(self) -> bool {
        matches!(self, OutputDestination::Comment | OutputDestination::Both)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Limits {
    pub max_inline_comments: usize,
    pub max_key_concerns: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_inline_comments: 20,
            max_key_concerns: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputConfig {
    pub destination: OutputDestination,
    pub summary_only: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            destination: OutputDestination::Comment,
            summary_only: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommentTypes {
    pub allow: Vec<String>,
}

impl Default for CommentTypes {
    fn default() -> Self {
        Self {
            allow: vec!["inline".to_string(), "summary".to_string()],
        }
    }
}

impl CommentTypes {
    pub fn allows_inline(&self) -> bool {
        self.allow.iter().any(|t| t == "inline")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusChecksConfig {
    pub name: String,
    pub required: bool,
}

impl Default for StatusChecksConfig {
    fn default() -> Self {
        Self {
            name: "Grepiku Review".to_string(),
            required: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoverageConfig {
    pub should_run: bool,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self { should_run: true }
    }
}

/// Everything one run needs to know.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub strictness: Strictness,
    pub limits: Limits,
    pub output: OutputConfig,
    pub comment_types: CommentTypes,
    pub status_checks: StatusChecksConfig,
    pub coverage: CoverageConfig,
    pub context: ContextConfig,
    pub triggers: TriggerConfig,
    /// Full names of pattern repositories boosted at retrieval time.
    pub pattern_repositories: Vec<String>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            strictness: Strictness::Medium,
            limits: Limits::default(),
            output: OutputConfig::default(),
            comment_types: CommentTypes::default(),
            status_checks: StatusChecksConfig::default(),
            coverage: CoverageConfig::default(),
            context: ContextConfig::default(),
            triggers: TriggerConfig::default(),
            pattern_repositories: Vec::new(),
        }
    }
}

const KNOWN_KEYS: &[&str] = &[
    "strictness",
    "limits",
    "output",
    "commentTypes",
    "statusChecks",
    "coverage",
    "context",
    "triggers",
    "patternRepositories",
];

/// Override layers above the repo file, lowest precedence first.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayers {
    pub memory_rules: Option<serde_json::Value>,
    pub installation_defaults: Option<serde_json::Value>,
    pub ui_overrides: Option<serde_json::Value>,
    pub rules_override: Option<serde_json::Value>,
}

/// Resolve config for one run; warnings surface in the status comment.
pub fn resolve_config(checkout: &Path, layers: &ConfigLayers) -> (ResolvedConfig, Vec<String>) {
    let mut warnings = Vec::new();
    let mut merged = serde_json::json!({});

    match read_repo_config(checkout) {
        Ok(Some(value)) => deep_merge(&mut merged, &value),
        Ok(None) => {}
        Err(w) => warnings.push(w),
    }
    for layer in [
        &layers.memory_rules,
        &layers.installation_defaults,
        &layers.ui_overrides,
        &layers.rules_override,
    ]
    .into_iter()
    .flatten()
    {
        deep_merge(&mut merged, layer);
    }

    if let Some(obj) = merged.as_object() {
        for key in obj.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                warnings.push(format!("unknown config key `{key}` ignored"));
            }
        }
    }

    // Per-section decode keeps one bad section from discarding the rest.
    let mut cfg = ResolvedConfig::default();
    decode_section(&merged, "strictness", &mut cfg.strictness, &mut warnings);
    decode_section(&merged, "limits", &mut cfg.limits, &mut warnings);
    decode_section(&merged, "output", &mut cfg.output, &mut warnings);
    decode_section(&merged, "commentTypes", &mut cfg.comment_types, &mut warnings);
    decode_section(&merged, "statusChecks", &mut cfg.status_checks, &mut warnings);
    decode_section(&merged, "coverage", &mut cfg.coverage, &mut warnings);
    decode_section(&merged, "context", &mut cfg.context, &mut warnings);
    decode_section(&merged, "triggers", &mut cfg.triggers, &mut warnings);
    decode_section(
        &merged,
        "patternRepositories",
        &mut cfg.pattern_repositories,
        &mut warnings,
    );

    debug!(warnings = warnings.len(), "config resolved");
    (cfg, warnings)
}

fn read_repo_config(checkout: &Path) -> Result<Option<serde_json::Value>, String> {
    let path = checkout.join(REPO_CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| format!("{REPO_CONFIG_FILE} unreadable: {e}"))?;
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| format!("{REPO_CONFIG_FILE} is not valid JSON: {e}"))
}

fn decode_section<T: serde::de::DeserializeOwned>(
    merged: &serde_json::Value,
    key: &str,
    slot: &mut T,
    warnings: &mut Vec<String>,
) {
    let Some(value) = merged.get(key) else { return };
    match serde_json::from_value::<T>(value.clone()) {
        Ok(v) => *slot = v,
        Err(e) => warnings.push(format!("config section `{key}` invalid, using defaults: {e}")),
    }
}

/// Recursive object merge; non-objects replace.
fn deep_merge(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(b), serde_json::Value::Object(o)) => {
            for (k, v) in o {
                deep_merge(b.entry(k.clone()).or_insert(serde_json::Value::Null), v);
            }
        }
        (slot, v) => *slot = v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_hold_without_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let (cfg, warnings) = resolve_config(dir.path(), &ConfigLayers::default());
        assert!(warnings.is_empty());
        assert_eq!(cfg.strictness, Strictness::Medium);
        assert_eq!(cfg.limits.max_inline_comments, 20);
        assert_eq!(cfg.status_checks.name, "Grepiku Review");
        assert_eq!(cfg.context.retrieval.top_k, 18);
    }

    #[test]
    fn repo_file_merges_and_bad_sections_warn() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(REPO_CONFIG_FILE),
            r#"{
                "strictness": "high",
                "limits": { "maxInlineComments": 5 },
                "coverage": "yes-please",
                "surpriseKey": true
            }"#,
        )
        .unwrap();

        let (cfg, warnings) = resolve_config(dir.path(), &ConfigLayers::default());
        assert_eq!(cfg.strictness, Strictness::High);
        assert_eq!(cfg.limits.max_inline_comments, 5);
        // Broken section degrades to defaults with a warning.
        assert!(cfg.coverage.should_run);
        assert!(warnings.iter().any(|w| w.contains("coverage")));
        assert!(warnings.iter().any(|w| w.contains("surpriseKey")));
    }

    #[test]
    fn override_layers_win_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(REPO_CONFIG_FILE),
            r#"{ "output": { "summaryOnly": false } }"#,
        )
        .unwrap();
        let layers = ConfigLayers {
            ui_overrides: Some(serde_json::json!({ "output": { "summaryOnly": true } })),
            rules_override: Some(serde_json::json!({ "strictness": "low" })),
            ..ConfigLayers::default()
        };
        let (cfg, _) = resolve_config(dir.path(), &layers);
        assert!(cfg.output.summary_only);
        assert_eq!(cfg.strictness, Strictness::Low);
    }
}

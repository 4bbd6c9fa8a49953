//! Stage execution.
//!
//! The orchestrator only knows `run_stage(stage, bundle_dir, out_dir,
//! prompt)` and the promise that the stage writes its JSON into `out_dir`.
//! The command runner shells out to the external stage CLI under a
//! wall-clock timeout; the static runner serves tests and dry runs.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::{StageError, StageResult};
use crate::repair::parse_with_repair;

/// Default per-stage wall clock.
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 900;

/// Pipeline stages with their primary output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Reviewer,
    Editor,
    Coverage,
    Verifier,
    Reply,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Reviewer => "reviewer",
            Stage::Editor => "editor",
            Stage::Coverage => "coverage",
            Stage::Verifier => "verifier",
            Stage::Reply => "reply",
        }
    }

    /// Primary JSON artifact of the stage.
    pub fn output_file(self) -> &'static str {
        match self {
            Stage::Reviewer => "draft_review.json",
            Stage::Editor => "final_review.json",
            Stage::Coverage => "coverage.json",
            Stage::Verifier => "checks.json",
            Stage::Reply => "reply.json",
        }
    }

    pub fn last_message_file(self) -> String {
        format!("last_message_{}.txt", self.name())
    }
}

/// The editor's second artifact.
pub const VERDICTS_JSON: &str = "verdicts.json";

#[derive(Debug, Clone)]
pub struct CommandRunnerConfig {
    /// External stage CLI, e.g. the codex launcher script.
    pub program: String,
    /// Fixed leading args before `<stage> <bundle_dir> <out_dir>`.
    pub args: Vec<String>,
    pub stage_timeout: Duration,
}

impl CommandRunnerConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stage_timeout: Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS),
        }
    }
}

/// Enum-dispatched runner; no trait objects.
#[derive(Debug, Clone)]
pub enum StageRunner {
    Command(CommandRunnerConfig),
    /// Serves canned files per stage; used by tests and dry runs.
    Static(StaticStages),
}

/// Files (name → JSON) written per stage by the static runner.
#[derive(Debug, Clone, Default)]
pub struct StaticStages {
    pub files: HashMap<&'static str, Vec<(String, serde_json::Value)>>,
}

impl StaticStages {
    pub fn with_stage(
        mut self,
        stage: Stage,
        files: Vec<(String, serde_json::Value)>,
    ) -> Self {
        self.files.insert(stage.name(), files);
        self
    }
}

impl StageRunner {
    /// Run one stage; on success its JSON artifacts exist in `out_dir`.
    pub async fn run_stage(
        &self,
        stage: Stage,
        bundle_dir: &Path,
        out_dir: &Path,
        prompt: &str,
    ) -> StageResult<()> {
        match self {
            StageRunner::Command(cfg) => run_command(cfg, stage, bundle_dir, out_dir, prompt).await,
            StageRunner::Static(stages) => {
                let Some(files) = stages.files.get(stage.name()) else {
                    return Err(StageError::MissingOutput {
                        stage: stage.name(),
                        file: stage.output_file().to_string(),
                    });
                };
                for (name, value) in files {
                    let bytes = serde_json::to_vec_pretty(value)?;
                    std::fs::write(out_dir.join(name), bytes)?;
                }
                Ok(())
            }
        }
    }
}

async fn run_command(
    cfg: &CommandRunnerConfig,
    stage: Stage,
    bundle_dir: &Path,
    out_dir: &Path,
    prompt: &str,
) -> StageResult<()> {
    debug!(stage = stage.name(), program = %cfg.program, "stage: spawning");
    let mut child = Command::new(&cfg.program)
        .args(&cfg.args)
        .arg(stage.name())
        .arg(bundle_dir)
        .arg(out_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(prompt.as_bytes()).await?;
        drop(stdin);
    }

    let waited = tokio::time::timeout(cfg.stage_timeout, child.wait_with_output()).await;
    let output = match waited {
        Ok(result) => result?,
        Err(_) => {
            return Err(StageError::Timeout {
                stage: stage.name(),
                secs: cfg.stage_timeout.as_secs(),
            });
        }
    };

    // Keep the transcript around as the validation fallback.
    let last_message = out_dir.join(stage.last_message_file());
    if let Err(e) = std::fs::write(&last_message, &output.stdout) {
        warn!(stage = stage.name(), "stage: could not persist last message: {e}");
    }

    if !output.status.success() {
        return Err(StageError::Process {
            stage: stage.name(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

/// Load and validate one stage artifact, repairing and finally falling back
/// to the stage's last-message transcript.
pub fn load_stage_json<T: DeserializeOwned>(
    out_dir: &Path,
    stage: Stage,
    file: &str,
) -> StageResult<T> {
    let mut primary_err: Option<serde_json::Error> = None;
    if let Ok(raw) = std::fs::read_to_string(out_dir.join(file)) {
        match parse_with_repair::<T>(&raw) {
            Ok(v) => return Ok(v),
            Err(e) => {
                warn!(
                    stage = stage.name(),
                    file, "stage: primary artifact failed validation: {e}"
                );
                primary_err = Some(e);
            }
        }
    }

    if let Ok(raw) = std::fs::read_to_string(out_dir.join(stage.last_message_file())) {
        if let Ok(v) = parse_with_repair::<T>(&raw) {
            return Ok(v);
        }
    }

    match primary_err {
        Some(source) => Err(StageError::Validation {
            stage: stage.name(),
            source,
        }),
        None => Err(StageError::MissingOutput {
            stage: stage.name(),
            file: file.to_string(),
        }),
    }
}

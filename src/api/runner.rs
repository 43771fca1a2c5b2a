//! Training job runner
//!
//! Launches `<interpreter> <script> --episodes N` in the script's directory,
//! waits for it under a wall-clock limit and turns the result into the run
//! endpoint's response body. One job at a time.

use axum::http::StatusCode;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::models::RunResponseWire;

pub struct JobRunner {
    config: ServerConfig,
    running: Mutex<()>,
}

impl JobRunner {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            running: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub async fn run(&self, episodes: u32) -> (StatusCode, RunResponseWire) {
        let Ok(_guard) = self.running.try_lock() else {
            warn!(episodes, "Run rejected: another job is in progress");
            return (
                StatusCode::CONFLICT,
                RunResponseWire::failure(Vec::new(), "A run is already in progress"),
            );
        };

        let script = &self.config.script;
        if !script.exists() {
            return (
                StatusCode::BAD_REQUEST,
                RunResponseWire::failure(
                    vec![format!("Not found: {}", script.display())],
                    format!("{} not found", script.display()),
                ),
            );
        }
        if !self.config.csv_path.exists() {
            return (
                StatusCode::BAD_REQUEST,
                RunResponseWire::failure(
                    Vec::new(),
                    format!("CSV not found: {}", self.config.csv_path.display()),
                ),
            );
        }

        info!(episodes, script = %script.display(), "🚀 Starting training job");
        (StatusCode::OK, self.execute(episodes).await)
    }

    async fn execute(&self, episodes: u32) -> RunResponseWire {
        let (dir, file) = split_script(&self.config.script);
        let mut cmd = Command::new(&self.config.interpreter);
        cmd.arg(file)
            .arg("--episodes")
            .arg(episodes.to_string())
            .current_dir(dir)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = self.config.job_timeout;
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!(error = %e, "Failed to launch training job");
                return RunResponseWire::failure(Vec::new(), e.to_string());
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Training job timed out");
                return RunResponseWire::failure(
                    vec![format!(
                        "Run timed out ({}s). Try fewer episodes.",
                        timeout.as_secs()
                    )],
                    "Timeout",
                );
            }
        };

        let code = output.status.code().unwrap_or(-1);
        let mut log: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .chain(String::from_utf8_lossy(&output.stderr).lines())
            .map(str::to_string)
            .collect();
        if log.is_empty() {
            log.push(format!("Exit code: {}", code));
        }

        if !output.status.success() {
            warn!(code, log_lines = log.len(), "Training job failed");
            return RunResponseWire::failure(log, format!("Process exited with code {}", code));
        }

        let results = match read_results(&self.config.results_path).await {
            Ok(results) => results,
            Err(e) => {
                error!(error = %e, "Training job finished but results are unreadable");
                return RunResponseWire::failure(log, format!("{:#}", e));
            }
        };

        info!(
            log_lines = log.len(),
            has_results = results.is_some(),
            "✅ Training job finished"
        );
        RunResponseWire {
            success: true,
            log,
            results,
            error: None,
        }
    }
}

/// Results artifact as JSON, or `None` when the job did not write one
pub async fn read_results(path: &Path) -> anyhow::Result<Option<serde_json::Value>> {
    use anyhow::Context;

    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    let value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

fn split_script(script: &Path) -> (PathBuf, PathBuf) {
    let dir = match script.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file = script
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| script.to_path_buf());
    (dir, file)
}

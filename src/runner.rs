//! Command execution boundary
//!
//! Git is never invoked directly from the higher layers: every subprocess
//! goes through the [`CommandRunner`] trait, so tests can script exact
//! outputs and verify exact argument sequences.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors from running an external command
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {status}: {output}")]
    ExitFailure {
        program: String,
        status: i32,
        output: String,
    },
}

impl CommandError {
    /// Combined output captured from a failed command, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Spawn { .. } => None,
            Self::ExitFailure { output, .. } => Some(output),
        }
    }
}

/// Abstraction over process execution
///
/// The production implementation shells out; test implementations return
/// scripted `(output, error)` pairs in call order.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` in `work_dir`, returning captured stdout.
    ///
    /// A non-zero exit maps to [`CommandError::ExitFailure`] carrying the
    /// combined stdout and stderr.
    async fn run(&self, work_dir: &Path, program: &str, args: &[&str]) -> Result<String, CommandError>;
}

/// Production runner backed by tokio subprocesses
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, work_dir: &Path, program: &str, args: &[&str]) -> Result<String, CommandError> {
        debug!(work_dir = %work_dir.display(), %program, ?args, "ProcessRunner::run: called");

        let output = Command::new(program)
            .args(args)
            .current_dir(work_dir)
            .output()
            .await
            .map_err(|e| CommandError::Spawn {
                program: program.to_string(),
                source: e,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut combined = stdout;
            if !stderr.is_empty() {
                if !combined.is_empty() && !combined.ends_with('\n') {
                    combined.push('\n');
                }
                combined.push_str(&stderr);
            }
            debug!(%program, "ProcessRunner::run: command failed");
            return Err(CommandError::ExitFailure {
                program: program.to_string(),
                status: output.status.code().unwrap_or(-1),
                output: combined.trim().to_string(),
            });
        }

        Ok(stdout)
    }
}

/// Scripted runner for deterministic tests: pops queued results in call
/// order and records every invocation for argument-sequence assertions.
#[cfg(test)]
pub(crate) struct ScriptedRunner {
    results: std::sync::Mutex<std::collections::VecDeque<Result<String, CommandError>>>,
    calls: std::sync::Mutex<Vec<(std::path::PathBuf, String, Vec<String>)>>,
}

#[cfg(test)]
impl ScriptedRunner {
    pub(crate) fn new(results: Vec<Result<String, CommandError>>) -> Self {
        Self {
            results: std::sync::Mutex::new(results.into()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Queue a run of successful outputs
    pub(crate) fn ok(outputs: &[&str]) -> Self {
        Self::new(outputs.iter().map(|o| Ok(o.to_string())).collect())
    }

    /// Shorthand for a scripted non-zero git exit
    pub(crate) fn exit(output: &str) -> Result<String, CommandError> {
        Err(CommandError::ExitFailure {
            program: "git".to_string(),
            status: 1,
            output: output.to_string(),
        })
    }

    pub(crate) fn calls(&self) -> Vec<(std::path::PathBuf, String, Vec<String>)> {
        self.calls.lock().expect("lock").clone()
    }
}

#[cfg(test)]
#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, work_dir: &Path, program: &str, args: &[&str]) -> Result<String, CommandError> {
        self.calls.lock().expect("lock").push((
            work_dir.to_path_buf(),
            program.to_string(),
            args.iter().map(|a| a.to_string()).collect(),
        ));

        self.results
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| {
                Err(CommandError::ExitFailure {
                    program: program.to_string(),
                    status: -1,
                    output: "missing scripted command result".to_string(),
                })
            })
    }
}

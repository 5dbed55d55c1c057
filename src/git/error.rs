//! Git operation error taxonomy
//!
//! Named sentinel conditions that callers routinely treat as non-fatal are
//! distinct variants; everything else is wrapped with the operation name and
//! the command's captured output.

use std::path::PathBuf;

use thiserror::Error;

use crate::runner::CommandError;

/// Errors from the repository-operations layer
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Branch already exists: {0}")]
    BranchExists(String),

    #[error("Nothing to commit")]
    NothingToCommit,

    #[error("Worktree not found: {0}")]
    WorktreeNotFound(String),

    #[error("Branch not pushed to {remote}: {branch}")]
    BranchNotPushed { remote: String, branch: String },

    #[error("Invalid ref: {0}")]
    InvalidRef(String),

    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("git {op} failed: {output}")]
    CommandFailed { op: String, output: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitError {
    /// Wrap a failed command with the operation that issued it
    pub(crate) fn command(op: impl Into<String>, err: CommandError) -> Self {
        let output = match &err {
            CommandError::ExitFailure { output, .. } => output.clone(),
            other => other.to_string(),
        };
        Self::CommandFailed {
            op: op.into(),
            output,
        }
    }
}

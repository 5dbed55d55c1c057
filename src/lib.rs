//! ForkMerge - Git worktree fork/join orchestration
//!
//! Forks branches of work into isolated git worktrees sharing one object
//! database, lets them evolve independently, and joins them back into the
//! base branch serially with explicit conflict handling.

pub mod cli;
pub mod config;
pub mod git;
pub mod runner;
pub mod worktree;

pub use config::Config;
pub use git::{
    CommitAndPush, CommitResult, GitContext, GitError, PushResult, WorktreeInfo,
    sanitize_branch_name,
};
pub use runner::{CommandError, CommandRunner, ProcessRunner};
pub use worktree::{ConflictFile, MergeConfig, MergeResult, WorktreeManager};

//! Repository-operations layer
//!
//! A typed façade over the git CLI for one checkout. Every call is routed
//! through the crate's command-execution boundary, so the whole layer is
//! mockable with scripted runners.

mod error;
mod repo;
mod worktree;

pub use error::GitError;
pub use repo::{CommitAndPush, CommitResult, DEFAULT_WORKTREE_DIR, GitContext, PushResult};
pub use worktree::{WorktreeInfo, sanitize_branch_name};

//! Fork/join worktree orchestration
//!
//! [`WorktreeManager`] fans branches of work out into isolated git worktrees
//! and later joins them back into the base branch one at a time, pausing for
//! conflict resolution when a merge does not apply cleanly.

mod manager;
mod merge;

pub use manager::WorktreeManager;
pub use merge::{ConflictFile, MergeConfig, MergeResult};

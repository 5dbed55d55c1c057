//! Fork/join merge coordination
//!
//! Serially reconciles tracked branches back into the base branch inside the
//! base repository. Conflicts are surfaced file-by-file for an explicit
//! abort/resolve/continue workflow instead of being resolved automatically.
//! The coordinator holds no merge state of its own: the in-progress state
//! lives in git and is recovered by probing, so it survives process
//! restarts as long as the base repository is untouched.

use tracing::{debug, info, warn};

use super::manager::WorktreeManager;
use crate::git::GitError;

/// Options for a merge attempt
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Merge commit message; a default is derived from the branch names
    pub commit_message: Option<String>,

    /// Force a merge commit even when fast-forward is possible
    pub no_fast_forward: bool,

    /// Squash the branch into staged changes instead of committing a merge
    pub squash: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            commit_message: None,
            no_fast_forward: true,
            squash: false,
        }
    }
}

/// One file left unmerged by a conflicting merge
///
/// Only populated while the base repository is in an unresolved merge state.
#[derive(Debug, Clone)]
pub struct ConflictFile {
    /// Path relative to the repository root
    pub path: String,

    /// Raw working-tree content including the embedded conflict markers
    pub markers: String,

    /// Pre-merge content on the base branch side (index stage 2)
    pub ours: Option<String>,

    /// Pre-merge content on the incoming branch side (index stage 3)
    pub theirs: Option<String>,
}

/// Terminal, immutable outcome record for one merge attempt
///
/// Conflicts and `error` are mutually exclusive with `success`; a
/// conflicted merge is an expected outcome, not an error.
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub branch_id: String,
    pub success: bool,
    pub conflicts: Vec<ConflictFile>,
    /// HEAD after a successful merge; best-effort, may be empty
    pub commit_sha: Option<String>,
    pub error: Option<String>,
}

impl MergeResult {
    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_conflict(&self) -> bool {
        !self.conflicts.is_empty()
    }

    fn merged(branch_id: &str, commit_sha: Option<String>) -> Self {
        Self {
            branch_id: branch_id.to_string(),
            success: true,
            conflicts: Vec::new(),
            commit_sha,
            error: None,
        }
    }

    fn conflicted(branch_id: &str, conflicts: Vec<ConflictFile>) -> Self {
        Self {
            branch_id: branch_id.to_string(),
            success: false,
            conflicts,
            commit_sha: None,
            error: None,
        }
    }

    fn failed(branch_id: &str, error: impl Into<String>) -> Self {
        Self {
            branch_id: branch_id.to_string(),
            success: false,
            conflicts: Vec::new(),
            commit_sha: None,
            error: Some(error.into()),
        }
    }
}

impl WorktreeManager {
    /// Merge every tracked branch into the base branch, in sorted ID order
    ///
    /// Merges are strictly serial: the base repository can only be in one
    /// merge state at a time. The batch halts at the first conflicted
    /// result: later branches are left untouched and the base repository
    /// stays mid-merge for resolution. This is "merge until blocked", not
    /// "merge everything and report all conflicts".
    pub async fn merge_branches(&self, config: &MergeConfig) -> Vec<MergeResult> {
        let mut ids: Vec<String> = {
            // Snapshot under the read lock, released before merging begins
            self.worktrees.read().await.keys().cloned().collect()
        };
        ids.sort();
        self.merge_branches_ordered(&ids, config).await
    }

    /// Merge the given branches in caller-supplied order, halting at the
    /// first conflict
    pub async fn merge_branches_ordered(
        &self,
        branch_ids: &[String],
        config: &MergeConfig,
    ) -> Vec<MergeResult> {
        debug!(count = branch_ids.len(), "WorktreeManager::merge_branches_ordered: called");
        let mut results = Vec::with_capacity(branch_ids.len());

        for branch_id in branch_ids {
            let result = self.merge_single_branch(branch_id, config).await;
            let halt = result.is_conflict();
            results.push(result);

            if halt {
                warn!(%branch_id, "Merge conflict, halting batch for resolution");
                break;
            }
        }

        results
    }

    /// Merge one tracked branch into the base branch
    ///
    /// The merge runs in the base repository, not the worktree, against the
    /// branch the worktree actually has checked out (not assumed equal to
    /// the branch ID). Failures are classified: unmerged files become a
    /// conflict result, anything else a failure result with the underlying
    /// error preserved.
    pub async fn merge_single_branch(&self, branch_id: &str, config: &MergeConfig) -> MergeResult {
        debug!(%branch_id, "WorktreeManager::merge_single_branch: called");

        let Some(path) = self.worktree_path(branch_id).await else {
            return MergeResult::failed(branch_id, format!("no worktree registered for '{branch_id}'"));
        };

        let worktree_ctx = self.base_repo.in_worktree(&path);
        let branch = match worktree_ctx.current_branch().await {
            Ok(b) => b,
            Err(e) => return MergeResult::failed(branch_id, e.to_string()),
        };

        // git rejects --no-ff together with --squash; squash wins
        let no_ff = config.no_fast_forward && !config.squash;
        let message = config
            .commit_message
            .clone()
            .unwrap_or_else(|| format!("Merge branch '{}' into {}", branch, self.base_branch));
        // A squash merge commits nothing, so a message would be ignored
        let message = (!config.squash).then_some(message);

        match self
            .base_repo
            .merge(&branch, no_ff, config.squash, message.as_deref())
            .await
        {
            Ok(_) => {
                // Best-effort: an unreadable HEAD leaves the field empty
                let sha = self.base_repo.head_sha().await.ok();
                info!(%branch_id, %branch, sha = sha.as_deref().unwrap_or(""), "Merged branch into base");
                MergeResult::merged(branch_id, sha)
            }
            Err(merge_err) => match self.detect_conflicts().await {
                Ok(conflicts) if !conflicts.is_empty() => {
                    warn!(%branch_id, files = conflicts.len(), "Merge produced conflicts");
                    MergeResult::conflicted(branch_id, conflicts)
                }
                _ => {
                    warn!(%branch_id, error = %merge_err, "Merge failed");
                    MergeResult::failed(branch_id, merge_err.to_string())
                }
            },
        }
    }

    /// Conflicted files in the base repository's current merge state
    ///
    /// Markers come from the working tree (which embeds git's conflict
    /// markers); unreadable files are skipped rather than aborting the
    /// scan. Ours/theirs variants are read from index stages best-effort.
    pub async fn detect_conflicts(&self) -> Result<Vec<ConflictFile>, GitError> {
        let paths = self.base_repo.unmerged_paths().await?;
        debug!(count = paths.len(), "WorktreeManager::detect_conflicts: unmerged paths");
        let mut conflicts = Vec::with_capacity(paths.len());

        for path in paths {
            let abs = self.base_repo.repo_path().join(&path);
            let markers = match tokio::fs::read_to_string(&abs).await {
                Ok(content) => content,
                Err(e) => {
                    debug!(%path, error = %e, "detect_conflicts: skipping unreadable file");
                    continue;
                }
            };

            let ours = self.base_repo.show_stage(2, &path).await.ok();
            let theirs = self.base_repo.show_stage(3, &path).await.ok();

            conflicts.push(ConflictFile {
                path,
                markers,
                ours,
                theirs,
            });
        }

        Ok(conflicts)
    }

    /// Abort the in-progress merge, restoring a clean base repository
    pub async fn abort_merge(&self) -> Result<(), GitError> {
        debug!("WorktreeManager::abort_merge: called");
        self.base_repo.merge_abort().await?;
        info!("Merge aborted");
        Ok(())
    }

    /// Overwrite a conflicted file with resolved content and stage it
    ///
    /// The only mutation point during conflict resolution; operates directly
    /// on the base repository's working tree.
    pub async fn resolve_conflict(&self, path: &str, resolved: &str) -> Result<(), GitError> {
        debug!(%path, "WorktreeManager::resolve_conflict: called");
        let abs = self.base_repo.repo_path().join(path);
        tokio::fs::write(&abs, resolved).await?;
        self.base_repo.stage(&[path]).await?;
        info!(%path, "Conflict resolved and staged");
        Ok(())
    }

    /// Commit the in-progress merge once every conflict is staged
    pub async fn continue_merge(&self, message: &str) -> Result<(), GitError> {
        debug!(%message, "WorktreeManager::continue_merge: called");
        self.base_repo.commit(message).await?;
        info!("Merge continued");
        Ok(())
    }
}

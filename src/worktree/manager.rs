//! Worktree orchestrator
//!
//! Fans logical branches of work out into isolated git worktrees, one per
//! branch ID, and tracks the branchID → path registry behind a read/write
//! lock. Individual worktrees are driven concurrently by independent
//! callers; isolation comes from git's own worktree mechanism.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::git::{GitContext, GitError, sanitize_branch_name};
use crate::runner::{CommandRunner, ProcessRunner};

/// Manager for one fork/join episode against a single base repository
pub struct WorktreeManager {
    /// Parent directory for generated worktrees
    pub(crate) base_dir: PathBuf,

    /// Context rooted at the authoritative repository
    pub(crate) base_repo: GitContext,

    /// Branch active when orchestration began; every merge targets it
    pub(crate) base_branch: String,

    /// branchID → worktree path; a branch ID maps to at most one worktree
    pub(crate) worktrees: RwLock<HashMap<String, PathBuf>>,
}

impl WorktreeManager {
    /// Create a manager bound to `repo_path`, merging into `base_branch`
    ///
    /// Validates the repository and creates `base_dir`; fails fast on
    /// either, returning no partial manager.
    pub async fn new(
        base_dir: impl Into<PathBuf>,
        repo_path: impl Into<PathBuf>,
        base_branch: impl Into<String>,
    ) -> Result<Self, GitError> {
        Self::with_runner(base_dir, repo_path, base_branch, Arc::new(ProcessRunner)).await
    }

    pub async fn with_runner(
        base_dir: impl Into<PathBuf>,
        repo_path: impl Into<PathBuf>,
        base_branch: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, GitError> {
        let base_dir = base_dir.into();
        let base_branch = base_branch.into();
        debug!(base_dir = %base_dir.display(), %base_branch, "WorktreeManager::new: called");

        let base_repo = GitContext::open_with_runner(repo_path, runner).await?;
        tokio::fs::create_dir_all(&base_dir).await?;

        info!(
            repo = %base_repo.repo_path().display(),
            %base_branch,
            "Worktree manager initialized"
        );

        Ok(Self {
            base_dir,
            base_repo,
            base_branch,
            worktrees: RwLock::new(HashMap::new()),
        })
    }

    pub fn base_branch(&self) -> &str {
        &self.base_branch
    }

    pub fn base_repo(&self) -> &GitContext {
        &self.base_repo
    }

    /// Create (or return) the worktree for `branch_id`
    ///
    /// Idempotent: an already-registered ID returns its existing path with
    /// no side effects, so callers may re-enter after a partial failure.
    /// The git branch defaults to `branch_id` when `git_branch` is None or
    /// empty. The worktree is rooted at the base branch; if the branch
    /// already exists it is checked out instead of recreated.
    pub async fn create_branch_worktree(
        &self,
        branch_id: &str,
        git_branch: Option<&str>,
    ) -> Result<PathBuf, GitError> {
        debug!(%branch_id, ?git_branch, "WorktreeManager::create_branch_worktree: called");

        // Write lock held across the git call so one ID can never race two
        // worktree creations.
        let mut worktrees = self.worktrees.write().await;

        if let Some(existing) = worktrees.get(branch_id) {
            debug!(%branch_id, path = %existing.display(), "create_branch_worktree: already registered");
            return Ok(existing.clone());
        }

        let dir_name = sanitize_branch_name(branch_id);
        let path = self.base_dir.join(dir_name);
        let branch = git_branch.filter(|b| !b.is_empty()).unwrap_or(branch_id);

        self.base_repo
            .add_worktree(&path, branch, Some(&self.base_branch))
            .await?;

        info!(%branch_id, %branch, path = %path.display(), "Created branch worktree");
        worktrees.insert(branch_id.to_string(), path.clone());

        Ok(path)
    }

    /// Path of the worktree registered for `branch_id`, if any
    pub async fn worktree_path(&self, branch_id: &str) -> Option<PathBuf> {
        self.worktrees.read().await.get(branch_id).cloned()
    }

    /// Defensive copy of the branchID → path registry
    pub async fn list_branch_worktrees(&self) -> HashMap<String, PathBuf> {
        self.worktrees.read().await.clone()
    }

    pub async fn branch_count(&self) -> usize {
        self.worktrees.read().await.len()
    }

    /// Fresh context scoped to the branch's worktree, for callers that need
    /// direct repository operations on one branch
    pub async fn git_context_for_branch(&self, branch_id: &str) -> Result<GitContext, GitError> {
        let path = self
            .worktree_path(branch_id)
            .await
            .ok_or_else(|| GitError::WorktreeNotFound(branch_id.to_string()))?;
        Ok(self.base_repo.in_worktree(path))
    }

    /// Re-register worktrees already present under the base directory
    ///
    /// Lets a manager reconstructed in a new process pick up worktrees a
    /// previous run created; keys are derived from the directory names.
    /// Returns how many entries were adopted.
    pub async fn adopt_existing(&self) -> Result<usize, GitError> {
        debug!("WorktreeManager::adopt_existing: called");
        let listed = self.base_repo.list_worktrees().await?;
        let mut worktrees = self.worktrees.write().await;
        let mut adopted = 0;

        for wt in listed {
            if !wt.path.starts_with(&self.base_dir) {
                continue;
            }
            let Some(name) = wt.path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if worktrees.contains_key(name) {
                continue;
            }
            debug!(branch_id = %name, path = %wt.path.display(), "adopt_existing: registering");
            worktrees.insert(name.to_string(), wt.path.clone());
            adopted += 1;
        }

        Ok(adopted)
    }

    /// Remove the worktree for `branch_id`; an unknown ID is a no-op
    pub async fn cleanup_branch(&self, branch_id: &str) -> Result<(), GitError> {
        debug!(%branch_id, "WorktreeManager::cleanup_branch: called");

        let Some(path) = self.worktree_path(branch_id).await else {
            debug!(%branch_id, "cleanup_branch: no registered worktree, skipping");
            return Ok(());
        };

        self.base_repo.cleanup_worktree(&path).await?;
        self.worktrees.write().await.remove(branch_id);

        info!(%branch_id, "Removed branch worktree");
        Ok(())
    }

    /// Best-effort removal of every registered worktree
    ///
    /// Continues past individual failures and always clears the registry,
    /// returning the last error encountered, if any. Cleanup never leaves
    /// dangling bookkeeping even when filesystem removal partially failed.
    pub async fn cleanup_all(&self) -> Result<(), GitError> {
        debug!("WorktreeManager::cleanup_all: called");
        let mut worktrees = self.worktrees.write().await;
        let mut last_err = None;

        for (branch_id, path) in worktrees.drain() {
            if let Err(e) = self.base_repo.cleanup_worktree(&path).await {
                warn!(%branch_id, error = %e, "Failed to remove worktree");
                last_err = Some(e);
            } else {
                debug!(%branch_id, "cleanup_all: removed worktree");
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

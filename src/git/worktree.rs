//! Worktree CRUD on top of [`GitContext`]
//!
//! Covers creation (with the new-branch/existing-branch fallback), graceful
//! and forced removal, porcelain listing, and the branch-name sanitizer that
//! derives filesystem-safe directory names.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::error::GitError;
use super::repo::GitContext;

/// Snapshot of one live worktree as reported by git
///
/// Recomputed on demand, never cached beyond a single call.
#[derive(Debug, Clone)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    /// None when the worktree is in detached-HEAD state
    pub branch: Option<String>,
    pub commit: String,
}

/// Derive a filesystem-safe directory segment from a branch name
///
/// Rule (stable across versions for layout compatibility): replace `/` with
/// `-`, lowercase, strip characters outside `[a-z0-9-]`, collapse repeated
/// `-`, trim leading/trailing `-`.
pub fn sanitize_branch_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = false;

    for ch in name.chars() {
        let ch = if ch == '/' { '-' } else { ch.to_ascii_lowercase() };
        if ch == '-' {
            if last_dash {
                continue;
            }
            last_dash = true;
            out.push(ch);
        } else if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            last_dash = false;
            out.push(ch);
        }
        // Everything else is stripped
    }

    out.trim_matches('-').to_string()
}

impl GitContext {
    /// Create a worktree for `branch` under the context's worktree dir
    ///
    /// Tries a brand-new branch at HEAD first; if the branch already exists
    /// the worktree checks it out instead.
    pub async fn create_worktree(&self, branch: &str) -> Result<PathBuf, GitError> {
        debug!(%branch, "GitContext::create_worktree: called");
        let dir_name = sanitize_branch_name(branch);
        let path = self.repo_path.join(&self.worktree_dir).join(dir_name);
        self.add_worktree(&path, branch, None).await?;
        Ok(path)
    }

    /// Low-level worktree add: new branch at `start_ref` (HEAD when None),
    /// falling back to checking out an existing branch of the same name
    pub(crate) async fn add_worktree(
        &self,
        path: &Path,
        branch: &str,
        start_ref: Option<&str>,
    ) -> Result<(), GitError> {
        let path_str = path.to_string_lossy().into_owned();

        let mut args = vec!["worktree", "add", path_str.as_str(), "-b", branch];
        if let Some(r) = start_ref {
            args.push(r);
        }

        match self.git_raw(&args).await {
            Ok(_) => {
                info!(%branch, path = %path.display(), "Created worktree with new branch");
                return Ok(());
            }
            Err(e) => {
                let text = e.output().unwrap_or_default();
                if !text.contains("already exists") {
                    return Err(GitError::command("worktree add", e));
                }
                debug!(%branch, "add_worktree: branch exists, checking out existing branch");
            }
        }

        match self
            .git_raw(&["worktree", "add", path_str.as_str(), branch])
            .await
        {
            Ok(_) => {
                info!(%branch, path = %path.display(), "Created worktree on existing branch");
                Ok(())
            }
            Err(e) => {
                let text = e.output().unwrap_or_default();
                if text.contains("invalid reference") || text.contains("not a valid ref") {
                    Err(GitError::InvalidRef(branch.to_string()))
                } else {
                    Err(GitError::command("worktree add", e))
                }
            }
        }
    }

    /// Remove a worktree, tolerating uncommitted changes
    ///
    /// Attempts a graceful remove first, then a forced one. A path git no
    /// longer considers a working tree counts as already removed.
    pub async fn cleanup_worktree(&self, path: &Path) -> Result<(), GitError> {
        debug!(path = %path.display(), "GitContext::cleanup_worktree: called");
        let path_str = path.to_string_lossy().into_owned();

        if self
            .git_raw(&["worktree", "remove", path_str.as_str()])
            .await
            .is_ok()
        {
            return Ok(());
        }

        match self
            .git_raw(&["worktree", "remove", "--force", path_str.as_str()])
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let text = e.output().unwrap_or_default();
                if text.contains("is not a working tree") {
                    debug!(path = %path.display(), "cleanup_worktree: already removed");
                    Ok(())
                } else {
                    Err(GitError::command("worktree remove", e))
                }
            }
        }
    }

    /// List all worktrees known to the repository
    pub async fn list_worktrees(&self) -> Result<Vec<WorktreeInfo>, GitError> {
        let out = self
            .git("worktree list", &["worktree", "list", "--porcelain"])
            .await?;
        Ok(parse_worktree_list(&out))
    }

    /// Find the worktree that has `branch` checked out
    pub async fn get_worktree(&self, branch: &str) -> Result<Option<WorktreeInfo>, GitError> {
        let worktrees = self.list_worktrees().await?;
        Ok(worktrees
            .into_iter()
            .find(|wt| wt.branch.as_deref() == Some(branch)))
    }

    /// Find a worktree by path, normalizing both sides to absolute paths
    pub async fn get_worktree_by_path(&self, path: &Path) -> Result<Option<WorktreeInfo>, GitError> {
        let want = absolute_path(path);
        let worktrees = self.list_worktrees().await?;
        Ok(worktrees
            .into_iter()
            .find(|wt| absolute_path(&wt.path) == want))
    }

    /// Drop stale worktree metadata
    pub async fn prune_worktrees(&self) -> Result<(), GitError> {
        self.git("worktree prune", &["worktree", "prune"]).await?;
        Ok(())
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Parse `git worktree list --porcelain` output: blank-line-delimited
/// records of `worktree <path>`, `HEAD <sha>`, and `branch <ref>` or the
/// bare `detached` sentinel.
fn parse_worktree_list(output: &str) -> Vec<WorktreeInfo> {
    let mut infos = Vec::new();
    let mut path: Option<PathBuf> = None;
    let mut commit = String::new();
    let mut branch: Option<String> = None;

    let mut flush = |path: &mut Option<PathBuf>, commit: &mut String, branch: &mut Option<String>| {
        if let Some(p) = path.take() {
            infos.push(WorktreeInfo {
                path: p,
                branch: branch.take(),
                commit: std::mem::take(commit),
            });
        }
        branch.take();
        commit.clear();
    };

    for line in output.lines() {
        if line.is_empty() {
            flush(&mut path, &mut commit, &mut branch);
        } else if let Some(rest) = line.strip_prefix("worktree ") {
            path = Some(PathBuf::from(rest));
        } else if let Some(rest) = line.strip_prefix("HEAD ") {
            commit = rest.to_string();
        } else if let Some(rest) = line.strip_prefix("branch ") {
            branch = Some(rest.strip_prefix("refs/heads/").unwrap_or(rest).to_string());
        } else if line == "detached" {
            branch = None;
        }
        // "bare" and attributes from newer git versions are ignored
    }
    flush(&mut path, &mut commit, &mut branch);

    infos
}

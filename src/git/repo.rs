//! Typed git façade for one checkout
//!
//! Every operation shells out through the crate's [`CommandRunner`], scoped
//! to a single working directory. A context pointed at the base repository
//! and one pointed at a worktree are interchangeable values: cheap, clonable,
//! no state beyond configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::error::GitError;
use crate::runner::{CommandError, CommandRunner, ProcessRunner};

/// Default directory, relative to the repo root, for ad-hoc worktrees
pub const DEFAULT_WORKTREE_DIR: &str = ".worktrees";

/// A git repository checkout plus the runner used to drive it
#[derive(Clone)]
pub struct GitContext {
    /// Absolute path to the repository root
    pub(crate) repo_path: PathBuf,

    /// Directory (relative to the root) where ad-hoc worktrees are created
    pub(crate) worktree_dir: PathBuf,

    /// Directory commands actually run in; equals `repo_path` unless the
    /// context is scoped to a worktree
    pub(crate) work_dir: PathBuf,

    pub(crate) runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for GitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitContext")
            .field("repo_path", &self.repo_path)
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

/// Outcome of a successful commit composition
#[derive(Debug, Clone)]
pub struct CommitResult {
    pub sha: String,
    pub branch: String,
}

/// Outcome of a successful push composition
#[derive(Debug, Clone)]
pub struct PushResult {
    pub remote: String,
    pub branch: String,
    pub sha: String,
    pub remote_url: Option<String>,
}

/// Combined outcome of [`GitContext::commit_all_and_push`]
///
/// A failed push never discards the fact that the commit succeeded: the
/// commit result is always present, and the push error rides alongside it.
#[derive(Debug)]
pub struct CommitAndPush {
    pub commit: CommitResult,
    pub push: Option<PushResult>,
    pub push_error: Option<GitError>,
}

impl CommitAndPush {
    pub fn is_pushed(&self) -> bool {
        self.push.is_some()
    }
}

impl GitContext {
    /// Open a context rooted at `repo_path`, validating it is a git repo
    pub async fn open(repo_path: impl Into<PathBuf>) -> Result<Self, GitError> {
        Self::open_with_runner(repo_path, Arc::new(ProcessRunner)).await
    }

    /// Open with an explicit runner (tests inject a scripted one here)
    pub async fn open_with_runner(
        repo_path: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, GitError> {
        let repo_path = repo_path.into();
        debug!(repo_path = %repo_path.display(), "GitContext::open: called");

        let ctx = Self {
            work_dir: repo_path.clone(),
            worktree_dir: PathBuf::from(DEFAULT_WORKTREE_DIR),
            repo_path,
            runner,
        };

        match ctx.git_raw(&["rev-parse", "--git-dir"]).await {
            Ok(_) => Ok(ctx),
            Err(CommandError::ExitFailure { .. }) => {
                Err(GitError::NotARepository(ctx.repo_path.clone()))
            }
            Err(e) => Err(GitError::command("rev-parse", e)),
        }
    }

    /// New context sharing the runner but running commands inside `path`
    pub fn in_worktree(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: path.into(),
            ..self.clone()
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Run git with the given args, wrapping failures with `op`
    pub(crate) async fn git(&self, op: &str, args: &[&str]) -> Result<String, GitError> {
        self.runner
            .run(&self.work_dir, "git", args)
            .await
            .map_err(|e| GitError::command(op, e))
    }

    /// Run git without wrapping, for callers that classify failures
    pub(crate) async fn git_raw(&self, args: &[&str]) -> Result<String, CommandError> {
        self.runner.run(&self.work_dir, "git", args).await
    }

    // === Read-only probes ===

    /// Name of the currently checked-out branch
    pub async fn current_branch(&self) -> Result<String, GitError> {
        let out = self
            .git("rev-parse", &["rev-parse", "--abbrev-ref", "HEAD"])
            .await?;
        Ok(out.trim().to_string())
    }

    /// SHA of the current HEAD
    pub async fn head_sha(&self) -> Result<String, GitError> {
        let out = self.git("rev-parse", &["rev-parse", "HEAD"]).await?;
        Ok(out.trim().to_string())
    }

    /// Whether a local branch exists
    ///
    /// A clean non-zero exit means the ref is missing; only execution
    /// failures (e.g. git itself not runnable) surface as errors.
    pub async fn branch_exists(&self, name: &str) -> Result<bool, GitError> {
        let refname = format!("refs/heads/{name}");
        match self
            .git_raw(&["rev-parse", "--verify", "--quiet", &refname])
            .await
        {
            Ok(_) => Ok(true),
            Err(CommandError::ExitFailure { .. }) => Ok(false),
            Err(e) => Err(GitError::command("rev-parse", e)),
        }
    }

    /// Whether `<remote>/<branch>` exists locally (no network access; only
    /// what a prior fetch already brought in)
    pub async fn is_branch_pushed(&self, remote: &str, branch: &str) -> Result<bool, GitError> {
        let refname = format!("refs/remotes/{remote}/{branch}");
        match self
            .git_raw(&["rev-parse", "--verify", "--quiet", &refname])
            .await
        {
            Ok(_) => Ok(true),
            Err(CommandError::ExitFailure { .. }) => Ok(false),
            Err(e) => Err(GitError::command("rev-parse", e)),
        }
    }

    /// Short-form status output; empty means a clean working tree
    pub async fn status_short(&self) -> Result<String, GitError> {
        self.git("status", &["status", "--short"]).await
    }

    /// Diff against an optional target ref (working tree diff when None)
    pub async fn diff(&self, target: Option<&str>) -> Result<String, GitError> {
        let mut args = vec!["diff"];
        if let Some(t) = target {
            args.push(t);
        }
        self.git("diff", &args).await
    }

    /// Diff of staged changes
    pub async fn diff_staged(&self) -> Result<String, GitError> {
        self.git("diff", &["diff", "--staged"]).await
    }

    /// URL of the given remote
    pub async fn remote_url(&self, remote: &str) -> Result<String, GitError> {
        let out = self
            .git("remote get-url", &["remote", "get-url", remote])
            .await?;
        Ok(out.trim().to_string())
    }

    // === Branch lifecycle ===

    /// Create a branch at HEAD
    ///
    /// An existing branch is the dedicated [`GitError::BranchExists`]
    /// condition, distinct from generic failures.
    pub async fn create_branch(&self, name: &str) -> Result<(), GitError> {
        debug!(%name, "GitContext::create_branch: called");
        if self.branch_exists(name).await? {
            return Err(GitError::BranchExists(name.to_string()));
        }
        self.git("branch", &["branch", name]).await?;
        Ok(())
    }

    /// Delete a local branch
    pub async fn delete_branch(&self, name: &str, force: bool) -> Result<(), GitError> {
        let flag = if force { "-D" } else { "-d" };
        self.git("branch delete", &["branch", flag, name]).await?;
        Ok(())
    }

    pub async fn checkout(&self, refname: &str) -> Result<(), GitError> {
        self.git("checkout", &["checkout", refname]).await?;
        Ok(())
    }

    /// Create and check out a new branch at HEAD
    pub async fn checkout_new(&self, name: &str) -> Result<(), GitError> {
        self.git("checkout -b", &["checkout", "-b", name]).await?;
        Ok(())
    }

    /// Check out `refname`, create `name` there, then check out `name`
    ///
    /// Three sequential steps; each failure names the step that broke.
    pub async fn checkout_new_at(&self, name: &str, refname: &str) -> Result<(), GitError> {
        debug!(%name, %refname, "GitContext::checkout_new_at: called");
        self.git("checkout (base ref)", &["checkout", refname]).await?;
        self.git("branch (create)", &["branch", name]).await?;
        self.git("checkout (new branch)", &["checkout", name]).await?;
        Ok(())
    }

    // === Staging and committing ===

    pub async fn stage(&self, files: &[&str]) -> Result<(), GitError> {
        let mut args = vec!["add"];
        args.extend_from_slice(files);
        self.git("add", &args).await?;
        Ok(())
    }

    pub async fn stage_all(&self) -> Result<(), GitError> {
        self.git("add -A", &["add", "-A"]).await?;
        Ok(())
    }

    /// Commit staged changes
    ///
    /// "Nothing to commit" is detected from the command output and surfaced
    /// as [`GitError::NothingToCommit`], since callers frequently treat an
    /// opportunistic commit with no changes as benign.
    pub async fn commit(&self, message: &str) -> Result<(), GitError> {
        match self.git_raw(&["commit", "-m", message]).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let text = e.output().unwrap_or_default();
                if text.contains("nothing to commit")
                    || text.contains("nothing added to commit")
                    || text.contains("no changes added to commit")
                {
                    debug!("GitContext::commit: nothing to commit");
                    Err(GitError::NothingToCommit)
                } else {
                    Err(GitError::command("commit", e))
                }
            }
        }
    }

    // === Remote operations ===

    pub async fn push(&self, remote: &str, branch: &str, set_upstream: bool) -> Result<(), GitError> {
        debug!(%remote, %branch, set_upstream, "GitContext::push: called");
        let mut args = vec!["push"];
        if set_upstream {
            args.push("--set-upstream");
        }
        args.push(remote);
        args.push(branch);
        self.git("push", &args).await?;
        Ok(())
    }

    pub async fn pull(&self) -> Result<(), GitError> {
        self.git("pull", &["pull"]).await?;
        Ok(())
    }

    pub async fn fetch(&self, remote: &str) -> Result<(), GitError> {
        self.git("fetch", &["fetch", remote]).await?;
        Ok(())
    }

    // === Merge surface (driven by the merge coordinator) ===

    /// Merge `branch` into the currently checked-out branch
    pub async fn merge(
        &self,
        branch: &str,
        no_ff: bool,
        squash: bool,
        message: Option<&str>,
    ) -> Result<(), GitError> {
        let mut args = vec!["merge"];
        if no_ff {
            args.push("--no-ff");
        }
        if squash {
            args.push("--squash");
        }
        if let Some(m) = message {
            args.push("-m");
            args.push(m);
        }
        args.push(branch);
        self.git("merge", &args).await?;
        Ok(())
    }

    pub async fn merge_abort(&self) -> Result<(), GitError> {
        self.git("merge --abort", &["merge", "--abort"]).await?;
        Ok(())
    }

    /// Paths left unmerged by a conflicting merge
    pub async fn unmerged_paths(&self) -> Result<Vec<String>, GitError> {
        let out = self
            .git("diff", &["diff", "--name-only", "--diff-filter=U"])
            .await?;
        Ok(out
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Index-stage content of `path` (stage 2 = ours, stage 3 = theirs);
    /// only meaningful while a merge is unresolved
    pub async fn show_stage(&self, stage: u8, path: &str) -> Result<String, GitError> {
        let spec = format!(":{stage}:{path}");
        self.git("show", &["show", &spec]).await
    }

    // === Compositions ===

    /// Stage everything and commit, capturing the resulting SHA and branch
    pub async fn commit_all(&self, message: &str) -> Result<CommitResult, GitError> {
        debug!(%message, "GitContext::commit_all: called");
        self.stage_all().await?;
        self.commit(message).await?;
        let sha = self.head_sha().await?;
        let branch = self.current_branch().await?;
        Ok(CommitResult { sha, branch })
    }

    /// Push the current branch to `origin`
    pub async fn push_current(&self) -> Result<PushResult, GitError> {
        self.push_current_to("origin").await
    }

    /// Push the current branch, setting upstream tracking when the remote
    /// branch does not exist yet
    pub async fn push_current_to(&self, remote: &str) -> Result<PushResult, GitError> {
        debug!(%remote, "GitContext::push_current_to: called");
        let branch = self.current_branch().await?;
        let set_upstream = !self.is_branch_pushed(remote, &branch).await?;
        self.push(remote, &branch, set_upstream).await?;

        let sha = self.head_sha().await?;
        let remote_url = self.remote_url(remote).await.ok();

        Ok(PushResult {
            remote: remote.to_string(),
            branch,
            sha,
            remote_url,
        })
    }

    /// Commit everything, then push; a push failure is reported alongside
    /// the commit result instead of discarding it
    pub async fn commit_all_and_push(&self, message: &str) -> Result<CommitAndPush, GitError> {
        self.commit_all_and_push_to(message, "origin").await
    }

    pub async fn commit_all_and_push_to(
        &self,
        message: &str,
        remote: &str,
    ) -> Result<CommitAndPush, GitError> {
        let commit = self.commit_all(message).await?;

        match self.push_current_to(remote).await {
            Ok(push) => Ok(CommitAndPush {
                commit,
                push: Some(push),
                push_error: None,
            }),
            Err(e) => {
                warn!(sha = %commit.sha, error = %e, "Commit succeeded but push failed");
                Ok(CommitAndPush {
                    commit,
                    push: None,
                    push_error: Some(e),
                })
            }
        }
    }
}

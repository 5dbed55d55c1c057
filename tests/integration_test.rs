//! Integration tests for ForkMerge
//!
//! End-to-end fork/join flows against real git repositories: forked
//! worktrees evolve independently, merges join them back serially, and
//! conflicts pause the batch for abort/resolve/continue.

use std::path::Path;

use tempfile::tempdir;
use tokio::process::Command;

use forkmerge::worktree::{MergeConfig, WorktreeManager};

async fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Initialize a repository with one committed file, returning its branch
async fn setup_git_repo(dir: &Path) -> String {
    git(dir, &["init"]).await;
    git(dir, &["config", "user.email", "test@test.com"]).await;
    git(dir, &["config", "user.name", "Test"]).await;
    std::fs::write(dir.join("shared.txt"), "base\n").unwrap();
    git(dir, &["add", "."]).await;
    git(dir, &["commit", "-m", "initial"]).await;
    git(dir, &["rev-parse", "--abbrev-ref", "HEAD"]).await
}

async fn setup_manager(repo: &Path, base: &Path) -> WorktreeManager {
    let branch = setup_git_repo(repo).await;
    WorktreeManager::new(base, repo, branch).await.unwrap()
}

/// Fork a branch, rewrite shared.txt on it, and diverge the base branch
/// so that merging the fork conflicts.
async fn setup_conflicting_fork(manager: &WorktreeManager, repo: &Path, branch_id: &str) {
    let path = manager.create_branch_worktree(branch_id, None).await.unwrap();

    std::fs::write(path.join("shared.txt"), "fork change\n").unwrap();
    let ctx = manager.git_context_for_branch(branch_id).await.unwrap();
    ctx.commit_all("change shared on fork").await.unwrap();

    std::fs::write(repo.join("shared.txt"), "base change\n").unwrap();
    manager
        .base_repo()
        .commit_all("change shared on base")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_forked_branches_evolve_independently_and_join() {
    let repo = tempdir().unwrap();
    let base = tempdir().unwrap();
    let manager = setup_manager(repo.path(), base.path()).await;

    let path_a = manager.create_branch_worktree("task-a", None).await.unwrap();
    let path_b = manager.create_branch_worktree("task-b", None).await.unwrap();

    std::fs::write(path_a.join("a.txt"), "from a\n").unwrap();
    let ctx_a = manager.git_context_for_branch("task-a").await.unwrap();
    ctx_a.commit_all("add a.txt").await.unwrap();

    std::fs::write(path_b.join("b.txt"), "from b\n").unwrap();
    let ctx_b = manager.git_context_for_branch("task-b").await.unwrap();
    ctx_b.commit_all("add b.txt").await.unwrap();

    // Neither worktree sees the other's file before the join
    assert!(!path_a.join("b.txt").exists());
    assert!(!path_b.join("a.txt").exists());

    let results = manager.merge_branches(&MergeConfig::default()).await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_success()));
    assert!(results.iter().all(|r| r.commit_sha.is_some()));

    // Both contributions landed on the base branch
    assert!(repo.path().join("a.txt").exists());
    assert!(repo.path().join("b.txt").exists());

    // Default merge records a real merge commit
    let parents = git(repo.path(), &["log", "-1", "--pretty=%P"]).await;
    assert_eq!(parents.split_whitespace().count(), 2);
}

#[tokio::test]
async fn test_conflict_halts_batch_before_later_branches() {
    let repo = tempdir().unwrap();
    let base = tempdir().unwrap();
    let manager = setup_manager(repo.path(), base.path()).await;

    // "aaa" sorts before "bbb", so the conflict is hit first
    setup_conflicting_fork(&manager, repo.path(), "aaa").await;

    let path_b = manager.create_branch_worktree("bbb", None).await.unwrap();
    std::fs::write(path_b.join("b.txt"), "from b\n").unwrap();
    let ctx_b = manager.git_context_for_branch("bbb").await.unwrap();
    ctx_b.commit_all("add b.txt").await.unwrap();

    let results = manager.merge_branches(&MergeConfig::default()).await;

    // The batch stops at the conflicted branch; "bbb" was never attempted
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].branch_id, "aaa");
    assert!(results[0].is_conflict());
    assert!(results[0].error.is_none());

    let conflicts = &results[0].conflicts;
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].path, "shared.txt");
    assert!(conflicts[0].markers.contains("<<<<<<<"));
    assert_eq!(conflicts[0].ours.as_deref(), Some("base change\n"));
    assert_eq!(conflicts[0].theirs.as_deref(), Some("fork change\n"));

    assert!(!repo.path().join("b.txt").exists());
    manager.abort_merge().await.unwrap();
}

#[tokio::test]
async fn test_abort_restores_clean_base_repository() {
    let repo = tempdir().unwrap();
    let base = tempdir().unwrap();
    let manager = setup_manager(repo.path(), base.path()).await;

    setup_conflicting_fork(&manager, repo.path(), "task-1").await;

    let result = manager
        .merge_single_branch("task-1", &MergeConfig::default())
        .await;
    assert!(result.is_conflict());

    manager.abort_merge().await.unwrap();

    let status = manager.base_repo().status_short().await.unwrap();
    assert!(status.trim().is_empty(), "expected clean tree, got: {status}");
    assert_eq!(
        std::fs::read_to_string(repo.path().join("shared.txt")).unwrap(),
        "base change\n"
    );
    assert!(manager.detect_conflicts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resolve_and_continue_completes_the_merge() {
    let repo = tempdir().unwrap();
    let base = tempdir().unwrap();
    let manager = setup_manager(repo.path(), base.path()).await;

    setup_conflicting_fork(&manager, repo.path(), "task-1").await;

    let result = manager
        .merge_single_branch("task-1", &MergeConfig::default())
        .await;
    assert!(result.is_conflict());

    manager
        .resolve_conflict("shared.txt", "reconciled\n")
        .await
        .unwrap();
    assert!(manager.detect_conflicts().await.unwrap().is_empty());

    manager.continue_merge("join task-1").await.unwrap();

    let status = manager.base_repo().status_short().await.unwrap();
    assert!(status.trim().is_empty());
    assert_eq!(
        std::fs::read_to_string(repo.path().join("shared.txt")).unwrap(),
        "reconciled\n"
    );

    let subject = git(repo.path(), &["log", "-1", "--pretty=%s"]).await;
    assert_eq!(subject, "join task-1");
}

#[tokio::test]
async fn test_merge_is_idempotent_after_join() {
    let repo = tempdir().unwrap();
    let base = tempdir().unwrap();
    let manager = setup_manager(repo.path(), base.path()).await;

    let path = manager.create_branch_worktree("task-1", None).await.unwrap();
    std::fs::write(path.join("a.txt"), "from a\n").unwrap();
    let ctx = manager.git_context_for_branch("task-1").await.unwrap();
    ctx.commit_all("add a.txt").await.unwrap();

    let first = manager
        .merge_single_branch("task-1", &MergeConfig::default())
        .await;
    assert!(first.is_success());

    // An already-merged branch merges again as a no-op
    let second = manager
        .merge_single_branch("task-1", &MergeConfig::default())
        .await;
    assert!(second.is_success());
}

#[tokio::test]
async fn test_commit_all_and_push_preserves_commit_on_push_failure() {
    let repo = tempdir().unwrap();
    let base = tempdir().unwrap();
    let manager = setup_manager(repo.path(), base.path()).await;

    let path = manager.create_branch_worktree("task-1", None).await.unwrap();
    std::fs::write(path.join("a.txt"), "from a\n").unwrap();
    let ctx = manager.git_context_for_branch("task-1").await.unwrap();

    // No remote configured, so the push leg cannot succeed
    let outcome = ctx.commit_all_and_push("add a.txt").await.unwrap();

    assert!(!outcome.commit.sha.is_empty());
    assert_eq!(outcome.commit.branch, "task-1");
    assert!(outcome.push.is_none());
    assert!(outcome.push_error.is_some());

    // The commit survived even though the push failed
    let subject = git(&path, &["log", "-1", "--pretty=%s"]).await;
    assert_eq!(subject, "add a.txt");
}

//! ForkMerge - git worktree fork/join orchestrator
//!
//! CLI entry point for forking branches into worktrees and joining them back.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use forkmerge::cli::{Cli, Command};
use forkmerge::config::Config;
use forkmerge::worktree::{MergeConfig, MergeResult, WorktreeManager};

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("forkmerge")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("fm.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    let repo_root = match cli.repo {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // Relative base directories live under the repository root
    let base_dir = if config.worktrees.base_dir.is_absolute() {
        config.worktrees.base_dir.clone()
    } else {
        repo_root.join(&config.worktrees.base_dir)
    };

    // The branch checked out when the command runs is the join target
    let base_branch = forkmerge::GitContext::open(&repo_root)
        .await?
        .current_branch()
        .await?;

    let manager = WorktreeManager::new(&base_dir, &repo_root, &base_branch).await?;

    // Each invocation is a fresh process; pick up worktrees earlier runs left
    let adopted = manager.adopt_existing().await?;
    info!(adopted, %base_branch, "Manager ready");

    match cli.command {
        Command::Fork { ids, branch } => cmd_fork(&manager, &ids, branch.as_deref()).await,
        Command::List => cmd_list(&manager).await,
        Command::Merge { ids, message, ff, squash } => {
            let merge_config = MergeConfig {
                commit_message: message,
                no_fast_forward: config.merge.no_fast_forward && !ff,
                squash: config.merge.squash || squash,
            };
            cmd_merge(&manager, &ids, &merge_config).await
        }
        Command::Conflicts => cmd_conflicts(&manager).await,
        Command::Abort => {
            manager.abort_merge().await?;
            println!("Merge aborted, base branch restored");
            Ok(())
        }
        Command::Resolve { path, file } => cmd_resolve(&manager, &path, &file).await,
        Command::Continue { message } => {
            manager.continue_merge(&message).await?;
            println!("Merge committed");
            Ok(())
        }
        Command::Push { id, message } => cmd_push(&manager, &id, &message, &config.git.remote).await,
        Command::Cleanup { id } => cmd_cleanup(&manager, id.as_deref()).await,
    }
}

/// Fork worktrees for the given branch IDs
async fn cmd_fork(manager: &WorktreeManager, ids: &[String], branch: Option<&str>) -> Result<()> {
    if branch.is_some() && ids.len() > 1 {
        return Err(eyre::eyre!("--branch only applies to a single branch ID"));
    }

    for id in ids {
        let path = manager.create_branch_worktree(id, branch).await?;
        println!("{} -> {}", id, path.display());
    }

    Ok(())
}

/// List tracked worktrees
async fn cmd_list(manager: &WorktreeManager) -> Result<()> {
    let worktrees = manager.list_branch_worktrees().await;

    if worktrees.is_empty() {
        println!("No worktrees (base branch: {})", manager.base_branch());
        return Ok(());
    }

    let mut entries: Vec<_> = worktrees.into_iter().collect();
    entries.sort();

    println!("Worktrees merging into {}:", manager.base_branch());
    for (id, path) in entries {
        println!("  {} -> {}", id, path.display());
    }

    Ok(())
}

/// Merge branches back into the base branch
async fn cmd_merge(manager: &WorktreeManager, ids: &[String], merge_config: &MergeConfig) -> Result<()> {
    let results = if ids.is_empty() {
        manager.merge_branches(merge_config).await
    } else {
        manager.merge_branches_ordered(ids, merge_config).await
    };

    if results.is_empty() {
        println!("Nothing to merge");
        return Ok(());
    }

    let mut blocked = false;
    for result in &results {
        print_merge_result(result);
        if !result.is_success() {
            blocked = true;
        }
    }

    if blocked {
        std::process::exit(1);
    }
    Ok(())
}

fn print_merge_result(result: &MergeResult) {
    if result.is_success() {
        match &result.commit_sha {
            Some(sha) => println!("✓ {} merged ({})", result.branch_id, sha),
            None => println!("✓ {} merged", result.branch_id),
        }
    } else if result.is_conflict() {
        println!("✗ {} conflicted:", result.branch_id);
        for conflict in &result.conflicts {
            println!("    {}", conflict.path);
        }
        println!("  Resolve with `fm resolve` then `fm continue`, or `fm abort`");
    } else {
        println!(
            "✗ {} failed: {}",
            result.branch_id,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
}

/// Show conflicted files of the in-progress merge
async fn cmd_conflicts(manager: &WorktreeManager) -> Result<()> {
    let conflicts = manager.detect_conflicts().await?;

    if conflicts.is_empty() {
        println!("No merge conflicts");
        return Ok(());
    }

    println!("{} conflicted file(s):", conflicts.len());
    for conflict in &conflicts {
        println!("  {}", conflict.path);
    }

    Ok(())
}

/// Replace a conflicted file with resolved content and stage it
async fn cmd_resolve(manager: &WorktreeManager, path: &str, file: &PathBuf) -> Result<()> {
    let resolved = fs::read_to_string(file)
        .context(format!("Failed to read resolved content from {}", file.display()))?;

    manager.resolve_conflict(path, &resolved).await?;
    println!("Resolved and staged {}", path);
    Ok(())
}

/// Commit everything in a branch's worktree and push its branch
async fn cmd_push(manager: &WorktreeManager, id: &str, message: &str, remote: &str) -> Result<()> {
    let ctx = manager.git_context_for_branch(id).await?;
    let outcome = ctx.commit_all_and_push_to(message, remote).await?;

    println!("{} committed {} ({})", id, outcome.commit.sha, outcome.commit.branch);
    match (&outcome.push, &outcome.push_error) {
        (Some(push), _) => println!("Pushed to {}/{}", push.remote, push.branch),
        (None, Some(err)) => {
            println!("Push to {} failed: {}", remote, err);
            std::process::exit(1);
        }
        (None, None) => {}
    }

    Ok(())
}

/// Remove one worktree, or all of them
async fn cmd_cleanup(manager: &WorktreeManager, id: Option<&str>) -> Result<()> {
    match id {
        Some(id) => {
            manager.cleanup_branch(id).await?;
            println!("Removed worktree for {}", id);
        }
        None => {
            let count = manager.branch_count().await;
            manager.cleanup_all().await?;
            println!("Removed {} worktree(s)", count);
        }
    }
    Ok(())
}

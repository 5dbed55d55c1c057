//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ForkMerge - git worktree fork/join orchestrator
#[derive(Parser)]
#[command(
    name = "fm",
    about = "Fork branches into isolated git worktrees and join them back serially",
    version,
    after_help = "Logs are written to: ~/.local/share/forkmerge/logs/fm.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Repository to operate on (defaults to the current directory)
    #[arg(short = 'C', long, global = true, help = "Repository to operate on")]
    pub repo: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Fork worktrees for one or more branch IDs
    Fork {
        /// Branch IDs to fork, one worktree each
        #[arg(required = true)]
        ids: Vec<String>,

        /// Git branch name to use instead of the branch ID (single ID only)
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// List worktrees under the configured base directory
    List,

    /// Merge forked branches back into the base branch
    Merge {
        /// Branch IDs to merge in this order (all tracked IDs, sorted, when omitted)
        ids: Vec<String>,

        /// Merge commit message
        #[arg(short, long)]
        message: Option<String>,

        /// Allow fast-forward merges
        #[arg(long)]
        ff: bool,

        /// Squash each branch instead of creating merge commits
        #[arg(long)]
        squash: bool,
    },

    /// Show conflicted files of the in-progress merge
    Conflicts,

    /// Abort the in-progress merge
    Abort,

    /// Replace a conflicted file with resolved content and stage it
    Resolve {
        /// Conflicted path, relative to the repository root
        path: String,

        /// File holding the resolved content
        file: PathBuf,
    },

    /// Commit the in-progress merge once conflicts are staged
    Continue {
        /// Merge commit message
        message: String,
    },

    /// Commit everything in a branch's worktree and push its branch
    Push {
        /// Branch ID whose worktree to commit and push
        id: String,

        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Remove one worktree, or all of them
    Cleanup {
        /// Branch ID to remove (all worktrees when omitted)
        id: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_fork() {
        let cli = Cli::parse_from(["fm", "fork", "task-1", "task-2"]);
        match cli.command {
            Command::Fork { ids, branch } => {
                assert_eq!(ids, vec!["task-1", "task-2"]);
                assert!(branch.is_none());
            }
            _ => panic!("expected fork"),
        }
    }

    #[test]
    fn test_cli_parse_fork_requires_id() {
        assert!(Cli::try_parse_from(["fm", "fork"]).is_err());
    }

    #[test]
    fn test_cli_parse_fork_with_branch() {
        let cli = Cli::parse_from(["fm", "fork", "task-1", "--branch", "feature/login"]);
        match cli.command {
            Command::Fork { branch, .. } => assert_eq!(branch.as_deref(), Some("feature/login")),
            _ => panic!("expected fork"),
        }
    }

    #[test]
    fn test_cli_parse_list() {
        let cli = Cli::parse_from(["fm", "list"]);
        assert!(matches!(cli.command, Command::List));
    }

    #[test]
    fn test_cli_parse_merge_defaults() {
        let cli = Cli::parse_from(["fm", "merge"]);
        match cli.command {
            Command::Merge { ids, message, ff, squash } => {
                assert!(ids.is_empty());
                assert!(message.is_none());
                assert!(!ff);
                assert!(!squash);
            }
            _ => panic!("expected merge"),
        }
    }

    #[test]
    fn test_cli_parse_merge_squash_ordered() {
        let cli = Cli::parse_from(["fm", "merge", "b", "a", "--squash"]);
        match cli.command {
            Command::Merge { ids, squash, .. } => {
                assert_eq!(ids, vec!["b", "a"]);
                assert!(squash);
            }
            _ => panic!("expected merge"),
        }
    }

    #[test]
    fn test_cli_parse_resolve() {
        let cli = Cli::parse_from(["fm", "resolve", "src/lib.rs", "/tmp/resolved.rs"]);
        match cli.command {
            Command::Resolve { path, file } => {
                assert_eq!(path, "src/lib.rs");
                assert_eq!(file, PathBuf::from("/tmp/resolved.rs"));
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn test_cli_parse_push() {
        let cli = Cli::parse_from(["fm", "push", "task-1", "-m", "checkpoint"]);
        match cli.command {
            Command::Push { id, message } => {
                assert_eq!(id, "task-1");
                assert_eq!(message, "checkpoint");
            }
            _ => panic!("expected push"),
        }
    }

    #[test]
    fn test_cli_parse_cleanup_all() {
        let cli = Cli::parse_from(["fm", "cleanup"]);
        assert!(matches!(cli.command, Command::Cleanup { id: None }));
    }

    #[test]
    fn test_cli_parse_global_flags() {
        let cli = Cli::parse_from(["fm", "-v", "-C", "/repo", "list"]);
        assert!(cli.verbose);
        assert_eq!(cli.repo, Some(PathBuf::from("/repo")));
    }
}

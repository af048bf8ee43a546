use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hc_core::Mode;

#[derive(Parser)]
#[command(name = "huskycat", version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Polyglot code validation for hooks, CI, pipelines, and assistants")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Bare `huskycat [paths..]` is `huskycat validate [paths..]`.
    #[command(flatten)]
    pub validate: ValidateArgs,

    /// Override mode detection (git-hooks, ci, cli, pipeline, mcp)
    #[arg(long, global = true, value_enum)]
    pub mode: Option<Mode>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Args, Default)]
pub struct ValidateArgs {
    /// Files or directories to validate
    pub paths: Vec<PathBuf>,

    /// Take the file set from the staged files of the surrounding repository
    #[arg(long)]
    pub staged: bool,

    /// Apply auto-fixes where the fix policy allows
    #[arg(long)]
    pub fix: bool,

    /// Permit Uncertain-confidence fixes (CLI mode, with --fix)
    #[arg(long = "unsafe")]
    pub unsafe_fixes: bool,

    /// Skip tool invocations marked slow
    #[arg(long)]
    pub fast: bool,

    /// Cancel outstanding work on the first error
    #[arg(long)]
    pub fail_fast: bool,

    /// Treat unavailable tools and process-manager failures as hard errors
    #[arg(long)]
    pub strict: bool,

    /// Worker pool size (default 8)
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Write a JUnit-style XML report to this path (CI mode)
    #[arg(long)]
    pub junit: Option<PathBuf>,

    /// Disable the live progress table
    #[arg(long)]
    pub no_progress: bool,

    /// Run as the detached background validator for an existing run id
    #[arg(long, hide = true)]
    pub detached_run: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate files with every applicable tool (default)
    Validate(ValidateArgs),

    /// Install git hooks (pre-commit, pre-push, commit-msg)
    SetupHooks {
        /// Overwrite hooks not managed by huskycat
        #[arg(long)]
        force: bool,

        /// Hooks directory (defaults to the repository's .git/hooks)
        #[arg(long)]
        hooks_dir: Option<PathBuf>,
    },

    /// Copy this binary into the per-user prefix and install hooks
    Install {
        #[arg(long)]
        force: bool,
    },

    /// Write a starter config file and install hooks
    Bootstrap {
        #[arg(long)]
        force: bool,
    },

    /// Show tool availability, tiers, and state paths
    Status,

    /// Run as an MCP server (JSON-RPC 2.0 over stdio)
    McpServer,

    /// Check a commit message file (invoked by the commit-msg hook)
    CommitMsg {
        /// Path to the message file git provides
        file: PathBuf,
    },
}

//! Mode adapters: every mode-dependent decision (output format,
//! interactivity, fail-fast default, tool-set default, color, exit code)
//! lives behind this trait so the scheduler and registry stay mode-agnostic.

mod ci;
mod cli;
mod git_hooks;
mod pipeline;

pub use ci::{write_junit, CiAdapter};
pub use cli::CliAdapter;
pub use git_hooks::GitHooksAdapter;
pub use pipeline::PipelineAdapter;

use hc_core::{Mode, EXIT_DIAGNOSTICS, EXIT_OK};
use hc_scheduler::RunOutcome;

pub trait Adapter {
    fn mode(&self) -> Mode;

    /// May this adapter prompt on the controlling terminal?
    fn interactive(&self) -> bool;

    fn fail_fast_default(&self) -> bool {
        false
    }

    /// Default to the fast tool subset (skip slow checkers)?
    fn fast_default(&self) -> bool {
        false
    }

    /// Surface the live progress table (subject to TTY and config)?
    fn show_progress(&self) -> bool {
        false
    }

    fn use_color(&self) -> bool {
        false
    }

    /// Format the aggregate for stdout.
    fn render(&self, outcome: &RunOutcome) -> String;

    fn exit_code(&self, outcome: &RunOutcome) -> i32 {
        if outcome.overall_success() {
            EXIT_OK
        } else {
            EXIT_DIAGNOSTICS
        }
    }
}

/// Select the adapter once at startup. MCP is served by its own loop and
/// never reaches this dispatch.
pub fn select_adapter(mode: Mode, stdout_tty: bool, stderr_tty: bool) -> Box<dyn Adapter> {
    match mode {
        Mode::GitHooks => Box::new(GitHooksAdapter { tty: stderr_tty }),
        Mode::Ci => Box::new(CiAdapter),
        Mode::Cli | Mode::Mcp => Box::new(CliAdapter { tty: stdout_tty }),
        Mode::Pipeline => Box::new(PipelineAdapter),
    }
}

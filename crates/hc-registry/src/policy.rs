//! Fix-confidence policy: decides, per (mode, tool), whether an invocation
//! runs the tool's fix or its check.
//!
//! CI and MCP validation never mutate source files, regardless of flags.
//! Prompts only exist in interactive contexts; the caller resolves them and
//! EOF/non-TTY counts as the default answer.

use hc_core::{FixConfidence, Mode};

/// Resolved action for one (mode, tool) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixAction {
    Fix,
    Check,
    /// Ask on the controlling terminal; default answer is "yes".
    PromptDefaultYes,
    /// Ask on the controlling terminal; default answer is "no".
    PromptDefaultNo,
}

impl FixAction {
    /// Collapse a prompt to its default answer (EOF / non-TTY path).
    pub fn default_resolution(self) -> bool {
        matches!(self, Self::Fix | Self::PromptDefaultYes)
    }
}

/// Everything the policy needs about the invocation context.
#[derive(Clone, Copy, Debug)]
pub struct PolicyInput {
    pub mode: Mode,
    /// A controlling TTY is attached (GitHooks prompting, CLI interactivity).
    pub interactive_tty: bool,
    /// `--fix` was requested.
    pub fix_requested: bool,
    /// `--unsafe` opt-in for Uncertain fixes under CLI.
    pub unsafe_allowed: bool,
}

/// The policy table. Manual never fixes, anywhere.
pub fn decide(input: &PolicyInput, confidence: FixConfidence) -> FixAction {
    if confidence == FixConfidence::Manual {
        return FixAction::Check;
    }
    match input.mode {
        Mode::Ci | Mode::Mcp => FixAction::Check,
        Mode::GitHooks => match (confidence, input.interactive_tty) {
            (FixConfidence::Safe, _) => FixAction::Fix,
            (FixConfidence::Likely, true) => FixAction::PromptDefaultYes,
            (FixConfidence::Uncertain, true) => FixAction::PromptDefaultNo,
            _ => FixAction::Check,
        },
        Mode::Cli => {
            if !input.fix_requested {
                return FixAction::Check;
            }
            match confidence {
                FixConfidence::Safe | FixConfidence::Likely => FixAction::Fix,
                FixConfidence::Uncertain if input.unsafe_allowed => FixAction::Fix,
                _ => FixAction::Check,
            }
        }
        Mode::Pipeline => {
            if input.fix_requested {
                FixAction::Fix
            } else {
                FixAction::Check
            }
        }
    }
}

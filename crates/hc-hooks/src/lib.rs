//! Git hook installation and the commit-message format check.

pub mod commit_msg;
pub mod scripts;

pub use commit_msg::check_commit_message;
pub use scripts::{install_hooks, render_hook, HookKind, InstallReport};

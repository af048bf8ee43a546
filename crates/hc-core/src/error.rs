use crate::{EXIT_CONFIG, EXIT_DIAGNOSTICS, EXIT_UNAVAILABLE};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Configuration error in {path}: {message}")]
    Config { path: String, message: String },

    #[error("Dependency cycle involving tool '{0}'")]
    DependencyCycle(String),

    #[error("Unknown mode '{0}': expected git-hooks, ci, cli, pipeline, or mcp")]
    UnknownMode(String),

    #[error("Invalid value '{value}' for feature flag '{flag}'")]
    BadFlagValue { flag: String, value: String },

    #[error("Tool '{0}' is unavailable in every tier")]
    ToolUnavailable(String),

    #[error("Unreadable input path '{0}'")]
    Input(String),

    #[error("Process manager error: {0}")]
    ProcessManager(String),
}

impl AppError {
    /// Map an error kind to its reserved process exit code.
    ///
    /// Configuration problems are fatal at startup and use a distinct code;
    /// an unavailable tool only reaches here under strict mode.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. }
            | Self::DependencyCycle(_)
            | Self::UnknownMode(_)
            | Self::BadFlagValue { .. } => EXIT_CONFIG,
            Self::ToolUnavailable(_) => EXIT_UNAVAILABLE,
            Self::Input(_) | Self::ProcessManager(_) => EXIT_DIAGNOSTICS,
        }
    }
}

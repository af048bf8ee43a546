//! Core data model shared by every huskycat crate: invocation modes,
//! execution tiers, fix confidence, validation results, and the error
//! taxonomy.

pub mod error;
pub mod types;

pub use error::AppError;
pub use types::{
    Diagnostic, FixConfidence, Mode, ProgressCounts, ProgressState, Tier, ValidationResult,
};

/// Process exit code for an overall pass.
pub const EXIT_OK: i32 = 0;
/// Process exit code when any tool reported an error.
pub const EXIT_DIAGNOSTICS: i32 = 1;
/// Process exit code for configuration errors (bad config file, DAG cycle,
/// unknown mode, bad feature-flag value).
pub const EXIT_CONFIG: i32 = 2;
/// Process exit code for an unavailable tool under strict mode.
pub const EXIT_UNAVAILABLE: i32 = 3;

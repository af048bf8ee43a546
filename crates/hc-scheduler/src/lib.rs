//! Parallel scheduler: orders tools by their dependency DAG, runs
//! independent work concurrently in a bounded pool, enforces per-tool
//! timeouts (inside the engine), and streams progress through a
//! thread-safe callback.

pub mod levels;
pub mod run;

pub use levels::dependency_levels;
pub use run::{ProgressCallback, RunOutcome, Scheduler, WorkItem};

/// Default worker pool size.
pub const DEFAULT_JOBS: usize = 8;

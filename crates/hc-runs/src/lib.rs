//! Non-blocking hook support: persisted run records, PID files, per-run
//! logs, detached background validators, and zombie reaping.
//!
//! Cross-process consistency relies on exactly one mechanism: every writer
//! publishes files via temp-file-then-rename, and each run id has a single
//! writer (the child that owns it). The parent only ever reads.

pub mod fork;
pub mod liveness;
pub mod record;
pub mod store;

pub use fork::fork_validation;
pub use liveness::is_process_alive;
pub use record::{file_set_hash, RunRecord, RunStatus, RunToolState};
pub use store::{ProceedDecision, RunStore};

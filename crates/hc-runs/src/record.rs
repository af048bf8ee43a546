use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use hc_core::{ProgressCounts, ProgressState};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Passed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunToolState {
    pub state: ProgressState,
    #[serde(flatten)]
    pub counts: ProgressCounts,
}

/// Persisted summary of one validation run. Created when the background
/// child starts, updated on each tool completion, finalized at child exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// SHA-256 over the sorted absolute paths, for cheap overlap checks.
    pub file_set_hash: String,
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub tool_states: BTreeMap<String, RunToolState>,
    pub status: RunStatus,
    pub pid: u32,
    pub log_path: PathBuf,
}

impl RunRecord {
    pub fn new(files: Vec<PathBuf>, pid: u32, log_path: PathBuf) -> Self {
        Self::with_id(ulid::Ulid::new().to_string(), files, pid, log_path)
    }

    /// Adopt a caller-chosen run id (the forking parent picks the id; the
    /// detached child creates the record under it).
    pub fn with_id(run_id: String, files: Vec<PathBuf>, pid: u32, log_path: PathBuf) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            file_set_hash: file_set_hash(&files),
            files,
            tool_states: BTreeMap::new(),
            status: RunStatus::Running,
            pid,
            log_path,
        }
    }

    pub fn update_tool(&mut self, tool: &str, state: ProgressState, counts: ProgressCounts) {
        self.tool_states
            .insert(tool.to_string(), RunToolState { state, counts });
    }

    pub fn finalize(&mut self, passed: bool) {
        self.finished_at = Some(Utc::now());
        self.status = if passed {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        };
    }

    /// Two runs overlap when they share at least one file.
    pub fn overlaps(&self, files: &[PathBuf]) -> bool {
        self.files.iter().any(|f| files.contains(f))
    }
}

/// Order-independent hash of a file set.
pub fn file_set_hash(files: &[PathBuf]) -> String {
    let mut sorted: Vec<String> = files
        .iter()
        .map(|f| f.to_string_lossy().into_owned())
        .collect();
    sorted.sort();
    let mut hasher = Sha256::new();
    for path in &sorted {
        hasher.update(path.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_set_hash_is_order_independent() {
        let a = vec![PathBuf::from("/w/a.py"), PathBuf::from("/w/b.py")];
        let b = vec![PathBuf::from("/w/b.py"), PathBuf::from("/w/a.py")];
        assert_eq!(file_set_hash(&a), file_set_hash(&b));
    }

    #[test]
    fn file_set_hash_distinguishes_sets() {
        let a = vec![PathBuf::from("/w/a.py")];
        let b = vec![PathBuf::from("/w/b.py")];
        assert_ne!(file_set_hash(&a), file_set_hash(&b));
    }

    #[test]
    fn new_record_starts_running() {
        let record = RunRecord::new(
            vec![PathBuf::from("/w/a.py")],
            42,
            PathBuf::from("/logs/x.log"),
        );
        assert_eq!(record.status, RunStatus::Running);
        assert!(record.finished_at.is_none());
        assert_eq!(record.run_id.len(), 26, "ULID run id");
    }

    #[test]
    fn finalize_sets_status_and_timestamp() {
        let mut record =
            RunRecord::new(vec![PathBuf::from("/w/a.py")], 1, PathBuf::from("/l"));
        record.finalize(true);
        assert_eq!(record.status, RunStatus::Passed);
        assert!(record.finished_at.is_some());

        let mut failed =
            RunRecord::new(vec![PathBuf::from("/w/a.py")], 1, PathBuf::from("/l"));
        failed.finalize(false);
        assert_eq!(failed.status, RunStatus::Failed);
    }

    #[test]
    fn overlap_requires_a_shared_file() {
        let record = RunRecord::new(
            vec![PathBuf::from("/w/a.py")],
            1,
            PathBuf::from("/l"),
        );
        assert!(record.overlaps(&[PathBuf::from("/w/a.py"), PathBuf::from("/w/b.py")]));
        assert!(!record.overlaps(&[PathBuf::from("/w/c.py")]));
    }

    #[test]
    fn record_round_trips_through_json() {
        let mut record = RunRecord::new(
            vec![PathBuf::from("/w/a.py")],
            7,
            PathBuf::from("/logs/r.log"),
        );
        record.update_tool(
            "black",
            ProgressState::Succeeded,
            ProgressCounts {
                errors: 0,
                warnings: 1,
                files_processed: 1,
            },
        );
        let json = serde_json::to_string(&record).unwrap();
        let loaded: RunRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.run_id, record.run_id);
        assert_eq!(loaded.tool_states["black"].counts.warnings, 1);
    }
}

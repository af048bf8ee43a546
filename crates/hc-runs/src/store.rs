use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, warn};

use crate::liveness::is_process_alive;
use crate::record::{RunRecord, RunStatus};

/// Pointer file naming the most recent run id.
const LATEST_FILE: &str = "latest";

/// What the parent should do before forking a new validation.
#[derive(Debug, PartialEq, Eq)]
pub enum ProceedDecision {
    Proceed,
    /// A validation for overlapping inputs is still in flight.
    AlreadyRunning { run_id: String, pid: u32 },
    /// The previous finalized run over overlapping inputs failed; the
    /// caller decides whether to prompt (TTY) or warn and proceed.
    PreviousFailure { run_id: String },
}

/// Filesystem layout for run state: `<root>/` holds one JSON record per run
/// id plus the `latest` pointer, `<root>/pids/` the PID files, and
/// `<root>/logs/` the per-run logs.
#[derive(Debug, Clone)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn runs_dir(&self) -> &Path {
        &self.root
    }

    pub fn pids_dir(&self) -> PathBuf {
        self.root.join("pids")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.pids_dir()).context("create pids directory")?;
        std::fs::create_dir_all(self.logs_dir()).context("create logs directory")?;
        Ok(())
    }

    pub fn record_path(&self, run_id: &str) -> PathBuf {
        self.root.join(format!("{run_id}.json"))
    }

    pub fn pid_path(&self, run_id: &str) -> PathBuf {
        self.pids_dir().join(format!("{run_id}.pid"))
    }

    pub fn log_path(&self, run_id: &str) -> PathBuf {
        self.logs_dir().join(format!("{run_id}.log"))
    }

    /// Atomically publish a run record, then the `latest` pointer. Partial
    /// writes are never observable.
    pub fn save_run(&self, record: &RunRecord) -> Result<()> {
        self.ensure_dirs()?;
        let json = serde_json::to_string_pretty(record).context("serialize run record")?;
        write_atomic(&self.root, &self.record_path(&record.run_id), json.as_bytes())?;
        write_atomic(
            &self.root,
            &self.root.join(LATEST_FILE),
            record.run_id.as_bytes(),
        )?;
        Ok(())
    }

    pub fn load_run(&self, run_id: &str) -> Result<RunRecord> {
        let path = self.record_path(run_id);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("read run record {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parse run record {}", path.display()))
    }

    /// Most recent run record, if any.
    pub fn latest_run(&self) -> Option<RunRecord> {
        let run_id = std::fs::read_to_string(self.root.join(LATEST_FILE)).ok()?;
        self.load_run(run_id.trim()).ok()
    }

    pub fn write_pid_file(&self, run_id: &str, pid: u32) -> Result<()> {
        self.ensure_dirs()?;
        write_atomic(
            &self.pids_dir(),
            &self.pid_path(run_id),
            pid.to_string().as_bytes(),
        )
    }

    pub fn remove_pid_file(&self, run_id: &str) {
        let _ = std::fs::remove_file(self.pid_path(run_id));
    }

    /// Decide whether a new validation should start for `files`.
    ///
    /// The most recent record wins: still running with a live child and an
    /// overlapping file set blocks; a finalized failure over overlapping
    /// inputs asks the caller to confirm; anything else proceeds.
    pub fn should_proceed_with_commit(&self, files: &[PathBuf]) -> ProceedDecision {
        let Some(latest) = self.latest_run() else {
            return ProceedDecision::Proceed;
        };
        if !latest.overlaps(files) {
            return ProceedDecision::Proceed;
        }
        match latest.status {
            RunStatus::Running if is_process_alive(latest.pid) => {
                ProceedDecision::AlreadyRunning {
                    run_id: latest.run_id,
                    pid: latest.pid,
                }
            }
            RunStatus::Failed => ProceedDecision::PreviousFailure {
                run_id: latest.run_id,
            },
            _ => ProceedDecision::Proceed,
        }
    }

    /// Reap finished children and repair their records.
    ///
    /// A PID file whose process no longer exists is stale: it is removed,
    /// and if its record still says `running` the child crashed, so the
    /// record is promoted to `failed`.
    pub fn cleanup_zombies(&self) -> Result<usize> {
        reap_finished_children();

        let pids_dir = self.pids_dir();
        let entries = match std::fs::read_dir(&pids_dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(0),
        };

        let mut cleaned = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "pid") {
                continue;
            }
            let Some(run_id) = path.file_stem().map(|s| s.to_string_lossy().into_owned())
            else {
                continue;
            };
            let pid = std::fs::read_to_string(&path)
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok());
            let alive = pid.is_some_and(is_process_alive);
            if alive {
                continue;
            }

            if let Ok(mut record) = self.load_run(&run_id) {
                if record.status == RunStatus::Running {
                    warn!(run_id = %run_id, "promoting crashed run to failed");
                    record.status = RunStatus::Failed;
                    record.finished_at = Some(Utc::now());
                    self.save_run(&record)?;
                }
            }
            let _ = std::fs::remove_file(&path);
            cleaned += 1;
        }
        debug!(cleaned, "zombie cleanup complete");
        Ok(cleaned)
    }

    /// Remove finalized run records (and their logs) older than `max_age`.
    pub fn prune_runs(&self, max_age: Duration) -> Result<usize> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return Ok(0),
        };
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::days(7));

        let mut pruned = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(run_id) = path.file_stem().map(|s| s.to_string_lossy().into_owned())
            else {
                continue;
            };
            let Ok(record) = self.load_run(&run_id) else {
                continue;
            };
            let finished = match record.finished_at {
                Some(finished) => finished,
                None => continue,
            };
            if finished < cutoff {
                let _ = std::fs::remove_file(&path);
                let _ = std::fs::remove_file(self.log_path(&run_id));
                pruned += 1;
            }
        }
        Ok(pruned)
    }
}

/// Write via a temp file in the same directory, then rename into place.
fn write_atomic(dir: &Path, dest: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create directory {}", dir.display()))?;
    let tmp = tempfile::NamedTempFile::new_in(dir).context("create temp file")?;
    std::fs::write(tmp.path(), bytes).context("write temp file")?;
    tmp.persist(dest)
        .with_context(|| format!("rename into {}", dest.display()))?;
    Ok(())
}

/// Reap any finished children of this process without blocking.
fn reap_finished_children() {
    #[cfg(unix)]
    {
        loop {
            // SAFETY: waitpid with WNOHANG never blocks; -1 means any child.
            let pid = unsafe { libc::waitpid(-1, std::ptr::null_mut(), libc::WNOHANG) };
            if pid <= 0 {
                break;
            }
            debug!(pid, "reaped finished child");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const DEAD_PID: u32 = 0x7FFF_FFFE;

    fn store() -> (tempfile::TempDir, RunStore) {
        let tmp = tempdir().unwrap();
        let store = RunStore::new(tmp.path().join("runs"));
        (tmp, store)
    }

    fn record(files: &[&str], pid: u32) -> RunRecord {
        RunRecord::new(
            files.iter().map(PathBuf::from).collect(),
            pid,
            PathBuf::from("/logs/test.log"),
        )
    }

    #[test]
    fn save_and_load_round_trip_with_latest_pointer() {
        let (_tmp, store) = store();
        let rec = record(&["/w/a.py"], 1);
        store.save_run(&rec).unwrap();

        let loaded = store.load_run(&rec.run_id).unwrap();
        assert_eq!(loaded.file_set_hash, rec.file_set_hash);

        let latest = store.latest_run().unwrap();
        assert_eq!(latest.run_id, rec.run_id);
    }

    #[test]
    fn latest_pointer_tracks_the_most_recent_save() {
        let (_tmp, store) = store();
        let first = record(&["/w/a.py"], 1);
        let second = record(&["/w/b.py"], 2);
        store.save_run(&first).unwrap();
        store.save_run(&second).unwrap();
        assert_eq!(store.latest_run().unwrap().run_id, second.run_id);
    }

    #[test]
    fn no_history_proceeds() {
        let (_tmp, store) = store();
        assert_eq!(
            store.should_proceed_with_commit(&[PathBuf::from("/w/a.py")]),
            ProceedDecision::Proceed
        );
    }

    #[test]
    fn live_overlapping_run_blocks() {
        let (_tmp, store) = store();
        // Our own PID is certainly alive.
        let rec = record(&["/w/a.py"], std::process::id());
        store.save_run(&rec).unwrap();

        match store.should_proceed_with_commit(&[PathBuf::from("/w/a.py")]) {
            ProceedDecision::AlreadyRunning { run_id, .. } => assert_eq!(run_id, rec.run_id),
            other => panic!("expected AlreadyRunning, got {other:?}"),
        }
    }

    #[test]
    fn dead_running_record_does_not_block() {
        let (_tmp, store) = store();
        let rec = record(&["/w/a.py"], DEAD_PID);
        store.save_run(&rec).unwrap();
        assert_eq!(
            store.should_proceed_with_commit(&[PathBuf::from("/w/a.py")]),
            ProceedDecision::Proceed
        );
    }

    #[test]
    fn previous_failure_with_overlap_asks_for_confirmation() {
        let (_tmp, store) = store();
        let mut rec = record(&["/w/a.py"], DEAD_PID);
        rec.finalize(false);
        store.save_run(&rec).unwrap();

        match store.should_proceed_with_commit(&[
            PathBuf::from("/w/a.py"),
            PathBuf::from("/w/b.py"),
        ]) {
            ProceedDecision::PreviousFailure { run_id } => assert_eq!(run_id, rec.run_id),
            other => panic!("expected PreviousFailure, got {other:?}"),
        }
    }

    #[test]
    fn disjoint_file_sets_always_proceed() {
        let (_tmp, store) = store();
        let mut rec = record(&["/w/a.py"], std::process::id());
        rec.finalize(false);
        store.save_run(&rec).unwrap();
        assert_eq!(
            store.should_proceed_with_commit(&[PathBuf::from("/w/other.py")]),
            ProceedDecision::Proceed
        );
    }

    #[test]
    fn cleanup_promotes_crashed_runs_and_removes_stale_pids() {
        let (_tmp, store) = store();
        let rec = record(&["/w/a.py"], DEAD_PID);
        store.save_run(&rec).unwrap();
        store.write_pid_file(&rec.run_id, DEAD_PID).unwrap();

        let cleaned = store.cleanup_zombies().unwrap();
        assert_eq!(cleaned, 1);
        assert!(!store.pid_path(&rec.run_id).exists());
        assert_eq!(store.load_run(&rec.run_id).unwrap().status, RunStatus::Failed);
    }

    #[test]
    fn cleanup_leaves_live_children_alone() {
        let (_tmp, store) = store();
        let rec = record(&["/w/a.py"], std::process::id());
        store.save_run(&rec).unwrap();
        store.write_pid_file(&rec.run_id, std::process::id()).unwrap();

        let cleaned = store.cleanup_zombies().unwrap();
        assert_eq!(cleaned, 0);
        assert!(store.pid_path(&rec.run_id).exists());
        assert_eq!(
            store.load_run(&rec.run_id).unwrap().status,
            RunStatus::Running
        );
    }

    #[test]
    fn prune_removes_only_old_finalized_records() {
        let (_tmp, store) = store();
        let mut old = record(&["/w/a.py"], DEAD_PID);
        old.finalize(true);
        old.finished_at = Some(Utc::now() - chrono::Duration::days(30));
        store.save_run(&old).unwrap();

        let mut fresh = record(&["/w/b.py"], DEAD_PID);
        fresh.finalize(true);
        store.save_run(&fresh).unwrap();

        let running = record(&["/w/c.py"], DEAD_PID);
        store.save_run(&running).unwrap();

        let pruned = store.prune_runs(Duration::from_secs(7 * 24 * 3600)).unwrap();
        assert_eq!(pruned, 1);
        assert!(store.load_run(&old.run_id).is_err());
        assert!(store.load_run(&fresh.run_id).is_ok());
        assert!(store.load_run(&running.run_id).is_ok());
    }
}

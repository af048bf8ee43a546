use std::path::PathBuf;

/// Per-user state root: `$HUSKYCAT_HOME` when set (tests and containers
/// redirect state this way), otherwise `~/.huskycat`.
pub fn state_root() -> PathBuf {
    if let Ok(root) = std::env::var("HUSKYCAT_HOME") {
        if !root.is_empty() {
            return PathBuf::from(root);
        }
    }
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(".huskycat"),
        None => std::env::temp_dir().join("huskycat-state"),
    }
}

/// Extracted bundled tools and their version manifest.
pub fn tools_dir() -> PathBuf {
    state_root().join("tools")
}

/// Run records, one JSON file per run id.
pub fn runs_dir() -> PathBuf {
    state_root().join("runs")
}

/// PID files for currently-tracked detached children.
pub fn pids_dir() -> PathBuf {
    runs_dir().join("pids")
}

/// Per-run log files capturing child standard streams.
pub fn logs_dir() -> PathBuf {
    runs_dir().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_state_nests_under_runs() {
        assert_eq!(pids_dir(), runs_dir().join("pids"));
        assert_eq!(logs_dir(), runs_dir().join("logs"));
    }

    #[test]
    fn tools_dir_nests_under_state_root() {
        assert!(tools_dir().starts_with(state_root()));
    }
}

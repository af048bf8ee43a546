//! Input-file collection: explicit arguments (directories walked), the
//! staged-file list from git, or a newline-delimited list on stdin.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use hc_config::ExcludeSet;
use hc_core::AppError;
use tracing::debug;

/// Expand explicit path arguments: files are taken as-is, directories are
/// walked (gitignore-aware), and everything is filtered through the
/// configured exclude patterns. A nonexistent argument is an input error.
pub fn collect_from_args(
    paths: &[PathBuf],
    excludes: &ExcludeSet,
) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            if !excludes.is_excluded(path) {
                files.push(path.clone());
            }
        } else if path.is_dir() {
            for entry in ignore::WalkBuilder::new(path).build().flatten() {
                let entry_path = entry.path();
                if entry.file_type().is_some_and(|t| t.is_file())
                    && !excludes.is_excluded(entry_path)
                {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else {
            return Err(AppError::Input(path.display().to_string()));
        }
    }
    files.sort();
    files.dedup();
    debug!(count = files.len(), "collected input files");
    Ok(files)
}

/// Staged files of the surrounding repository (added, copied, modified,
/// renamed). Deleted files are not validated.
pub fn staged_files(workdir: &Path, excludes: &ExcludeSet) -> Result<Vec<PathBuf>> {
    let output = Command::new("git")
        .args(["diff", "--cached", "--name-only", "--diff-filter=ACMR"])
        .current_dir(workdir)
        .output()
        .context("run git diff --cached")?;
    if !output.status.success() {
        anyhow::bail!(
            "git diff --cached failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    let mut files: Vec<PathBuf> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| workdir.join(line))
        .filter(|path| path.is_file() && !excludes.is_excluded(path))
        .collect();
    files.sort();
    Ok(files)
}

/// Newline-delimited file list on stdin (Pipeline mode with no arguments).
pub fn read_stdin_list(excludes: &ExcludeSet) -> Vec<PathBuf> {
    let stdin = std::io::stdin();
    let mut files: Vec<PathBuf> = stdin
        .lock()
        .lines()
        .map_while(Result::ok)
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .filter(|path| !excludes.is_excluded(path))
        .collect();
    files.sort();
    files.dedup();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn no_excludes() -> ExcludeSet {
        ExcludeSet::compile(&[]).unwrap()
    }

    #[test]
    fn explicit_file_is_collected() {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("a.py");
        std::fs::write(&file, "x = 1\n").unwrap();

        let files = collect_from_args(&[file.clone()], &no_excludes()).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn directory_is_walked_recursively() {
        let tmp = tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("a.py"), "").unwrap();
        std::fs::write(tmp.path().join("sub/b.py"), "").unwrap();

        let files = collect_from_args(&[tmp.path().to_path_buf()], &no_excludes()).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn missing_path_is_an_input_error() {
        let err = collect_from_args(&[PathBuf::from("/definitely/not/here.py")], &no_excludes())
            .unwrap_err();
        assert!(matches!(err, AppError::Input(_)));
    }

    #[test]
    fn exclude_patterns_filter_results() {
        let tmp = tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("vendor")).unwrap();
        std::fs::write(tmp.path().join("a.py"), "").unwrap();
        std::fs::write(tmp.path().join("vendor/b.py"), "").unwrap();

        let excludes = ExcludeSet::compile(&["vendor".to_string()]).unwrap();
        let files = collect_from_args(&[tmp.path().to_path_buf()], &excludes).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.py"));
    }

    #[test]
    fn duplicates_are_removed_and_order_is_sorted() {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("a.py");
        std::fs::write(&file, "").unwrap();

        let files =
            collect_from_args(&[file.clone(), file.clone()], &no_excludes()).unwrap();
        assert_eq!(files.len(), 1);
    }
}

//! `setup-hooks`, `install`, and `bootstrap`.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use hc_hooks::install_hooks;
use tracing::debug;

/// Starter config written by `bootstrap`.
const STARTER_CONFIG: &str = "\
# huskycat configuration
feature_flags:
  nonblocking_hooks: false
  parallel_execution: true
  tui_progress: true
  cache_results: true
tools: {}
exclude_patterns:
  - target
  - node_modules
  - .git
";

/// Hooks directory of the surrounding repository.
fn repo_hooks_dir(workdir: &Path) -> Result<PathBuf> {
    let output = Command::new("git")
        .args(["rev-parse", "--git-path", "hooks"])
        .current_dir(workdir)
        .output()
        .context("run git rev-parse")?;
    if !output.status.success() {
        anyhow::bail!("not inside a git repository");
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(workdir.join(path))
}

pub fn handle_setup_hooks(force: bool, hooks_dir: Option<PathBuf>) -> Result<()> {
    let workdir = std::env::current_dir().context("determine working directory")?;
    let hooks_dir = match hooks_dir {
        Some(dir) => dir,
        None => repo_hooks_dir(&workdir)?,
    };
    let binary = std::env::current_exe().ok();

    let report = install_hooks(
        &hooks_dir,
        env!("CARGO_PKG_VERSION"),
        binary.as_deref(),
        force,
    )?;
    for path in &report.installed {
        println!("installed {}", path.display());
    }
    for path in &report.skipped {
        println!("skipped {} (unmanaged; use --force)", path.display());
    }
    Ok(())
}

/// Copy this binary into the per-user prefix and install hooks pointing at
/// the recorded absolute path.
pub fn handle_install(force: bool) -> Result<()> {
    let bin_dir = hc_config::paths::state_root().join("bin");
    std::fs::create_dir_all(&bin_dir)
        .with_context(|| format!("create {}", bin_dir.display()))?;
    let dest = bin_dir.join("huskycat");
    let current = std::env::current_exe().context("locate current executable")?;

    if current != dest {
        std::fs::copy(&current, &dest)
            .with_context(|| format!("copy binary to {}", dest.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&dest)?.permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&dest, perms)?;
        }
        println!("installed binary to {}", dest.display());
    } else {
        debug!("already running from the install prefix");
    }

    let workdir = std::env::current_dir()?;
    if let Ok(hooks_dir) = repo_hooks_dir(&workdir) {
        let report = install_hooks(&hooks_dir, env!("CARGO_PKG_VERSION"), Some(&dest), force)?;
        for path in &report.installed {
            println!("installed {}", path.display());
        }
    }
    Ok(())
}

/// Write a starter config (if absent) and install hooks.
pub fn handle_bootstrap(force: bool) -> Result<()> {
    let workdir = std::env::current_dir().context("determine working directory")?;
    let config_path = workdir.join(".huskycat.yaml");
    if config_path.exists() && !force {
        println!("config exists: {}", config_path.display());
    } else {
        std::fs::write(&config_path, STARTER_CONFIG)
            .with_context(|| format!("write {}", config_path.display()))?;
        println!("wrote {}", config_path.display());
    }
    handle_setup_hooks(force, None)
}

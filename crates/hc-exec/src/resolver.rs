use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use hc_core::{AppError, Tier};
use tracing::{debug, warn};

/// Container image used by the last-resort fallback tier.
const FALLBACK_IMAGE: &str = "huskycat/tools:latest";

/// A concrete, ready-to-invoke command prefix for one tool.
///
/// The registry appends the tool's own arguments after `prefix_args`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tier: Tier,
    pub program: PathBuf,
    pub prefix_args: Vec<String>,
}

/// Three-tier tool resolver: bundled cache, then local PATH, then a
/// containerized fallback. Resolution is pure with respect to the process
/// environment captured at construction, and memoized per tool name.
pub struct Resolver {
    bundled: BTreeMap<String, PathBuf>,
    in_container: bool,
    container_runtime: Option<PathBuf>,
    /// Explicit search path override; `None` uses the process PATH.
    search_path: Option<OsString>,
    workdir: PathBuf,
    cache: Mutex<HashMap<String, Option<Invocation>>>,
}

impl Resolver {
    /// Capture the process environment once: bundled tool map, container
    /// markers, and (lazily cheap) container runtime availability.
    pub fn new(bundled: BTreeMap<String, PathBuf>, workdir: &Path) -> Self {
        let in_container = detect_inside_container();
        let container_runtime = detect_container_runtime(None);
        Self {
            bundled,
            in_container,
            container_runtime,
            search_path: None,
            workdir: workdir.to_path_buf(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Test constructor with every environment probe injected.
    pub fn with_environment(
        bundled: BTreeMap<String, PathBuf>,
        in_container: bool,
        container_runtime: Option<PathBuf>,
        search_path: Option<OsString>,
        workdir: &Path,
    ) -> Self {
        Self {
            bundled,
            in_container,
            container_runtime,
            search_path,
            workdir: workdir.to_path_buf(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `name` to an invocation using the highest-priority available
    /// source. First hit wins; the outcome (including failure) is memoized.
    pub fn resolve(&self, name: &str, executable: &str) -> Result<Invocation, AppError> {
        if let Some(cached) = self.cache.lock().unwrap().get(name) {
            return cached
                .clone()
                .ok_or_else(|| AppError::ToolUnavailable(name.to_string()));
        }
        let resolved = self.resolve_uncached(name, executable);
        self.cache
            .lock()
            .unwrap()
            .insert(name.to_string(), resolved.clone());
        resolved.ok_or_else(|| AppError::ToolUnavailable(name.to_string()))
    }

    fn resolve_uncached(&self, name: &str, executable: &str) -> Option<Invocation> {
        // Tier 1: extracted bundled binary.
        if let Some(path) = self.bundled.get(name) {
            if is_executable(path) {
                debug!(tool = name, path = %path.display(), "resolved from bundle");
                return Some(Invocation {
                    tier: Tier::Bundled,
                    program: path.clone(),
                    prefix_args: Vec::new(),
                });
            }
        }

        // Tier 2: already inside a container; the image guarantees the tool.
        if self.in_container {
            debug!(tool = name, "resolved inside container");
            return Some(Invocation {
                tier: Tier::Container,
                program: PathBuf::from(executable),
                prefix_args: Vec::new(),
            });
        }

        // Tier 3: host PATH.
        let found = match &self.search_path {
            Some(paths) => which::which_in(executable, Some(paths), &self.workdir).ok(),
            None => which::which(executable).ok(),
        };
        if let Some(path) = found {
            debug!(tool = name, path = %path.display(), "resolved from PATH");
            return Some(Invocation {
                tier: Tier::Local,
                program: path,
                prefix_args: Vec::new(),
            });
        }

        // Tier 4: containerized fallback through a host runtime.
        if let Some(runtime) = &self.container_runtime {
            warn!(
                tool = name,
                runtime = %runtime.display(),
                "tool not found locally; falling back to containerized execution"
            );
            let mount = format!("{}:/workspace", self.workdir.display());
            return Some(Invocation {
                tier: Tier::ContainerFallback,
                program: runtime.clone(),
                prefix_args: vec![
                    "run".to_string(),
                    "--rm".to_string(),
                    "-v".to_string(),
                    mount,
                    "-w".to_string(),
                    "/workspace".to_string(),
                    FALLBACK_IMAGE.to_string(),
                    executable.to_string(),
                ],
            });
        }

        None
    }
}

/// True when this process is itself running inside a container.
fn detect_inside_container() -> bool {
    Path::new("/.dockerenv").exists()
        || Path::new("/run/.containerenv").exists()
        || std::env::var_os("container").is_some()
}

/// First available container runtime on the host, if any.
fn detect_container_runtime(search_path: Option<&OsString>) -> Option<PathBuf> {
    for runtime in ["docker", "podman"] {
        let found = match search_path {
            Some(paths) => which::which_in(runtime, Some(paths), ".").ok(),
            None => which::which(runtime).ok(),
        };
        if let Some(path) = found {
            return Some(path);
        }
    }
    None
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fake_exe(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    #[test]
    fn bundled_tier_wins_over_path() {
        let tmp = tempdir().unwrap();
        let bundled_exe = fake_exe(tmp.path(), "ruff-bundled");
        let path_dir = tmp.path().join("bin");
        std::fs::create_dir(&path_dir).unwrap();
        fake_exe(&path_dir, "ruff");

        let mut bundled = BTreeMap::new();
        bundled.insert("ruff".to_string(), bundled_exe.clone());
        let resolver = Resolver::with_environment(
            bundled,
            false,
            None,
            Some(path_dir.into_os_string()),
            tmp.path(),
        );

        let inv = resolver.resolve("ruff", "ruff").unwrap();
        assert_eq!(inv.tier, Tier::Bundled);
        assert_eq!(inv.program, bundled_exe);
    }

    #[test]
    fn non_executable_bundled_entry_falls_through() {
        let tmp = tempdir().unwrap();
        let stale = tmp.path().join("ruff-stale");
        std::fs::write(&stale, "").unwrap();
        let path_dir = tmp.path().join("bin");
        std::fs::create_dir(&path_dir).unwrap();
        let local = fake_exe(&path_dir, "ruff");

        let mut bundled = BTreeMap::new();
        bundled.insert("ruff".to_string(), stale);
        let resolver = Resolver::with_environment(
            bundled,
            false,
            None,
            Some(path_dir.into_os_string()),
            tmp.path(),
        );

        let inv = resolver.resolve("ruff", "ruff").unwrap();
        assert_eq!(inv.tier, Tier::Local);
        assert_eq!(inv.program, local);
    }

    #[test]
    fn inside_container_uses_bare_name() {
        let tmp = tempdir().unwrap();
        let resolver = Resolver::with_environment(
            BTreeMap::new(),
            true,
            None,
            Some(OsString::new()),
            tmp.path(),
        );
        let inv = resolver.resolve("shellcheck", "shellcheck").unwrap();
        assert_eq!(inv.tier, Tier::Container);
        assert_eq!(inv.program, PathBuf::from("shellcheck"));
        assert!(inv.prefix_args.is_empty());
    }

    #[test]
    fn container_fallback_builds_run_prefix() {
        let tmp = tempdir().unwrap();
        let runtime = fake_exe(tmp.path(), "docker");
        let resolver = Resolver::with_environment(
            BTreeMap::new(),
            false,
            Some(runtime.clone()),
            Some(OsString::new()),
            tmp.path(),
        );

        let inv = resolver.resolve("tflint", "tflint").unwrap();
        assert_eq!(inv.tier, Tier::ContainerFallback);
        assert_eq!(inv.program, runtime);
        assert_eq!(inv.prefix_args[0], "run");
        assert!(inv.prefix_args.contains(&"--rm".to_string()));
        assert_eq!(inv.prefix_args.last().unwrap(), "tflint");
    }

    #[test]
    fn unavailable_everywhere_is_tool_unavailable() {
        let tmp = tempdir().unwrap();
        let resolver = Resolver::with_environment(
            BTreeMap::new(),
            false,
            None,
            Some(OsString::new()),
            tmp.path(),
        );
        let err = resolver.resolve("chplcheck", "chplcheck").unwrap_err();
        assert!(matches!(err, AppError::ToolUnavailable(name) if name == "chplcheck"));
    }

    #[test]
    fn resolution_is_memoized() {
        let tmp = tempdir().unwrap();
        let path_dir = tmp.path().join("bin");
        std::fs::create_dir(&path_dir).unwrap();
        fake_exe(&path_dir, "black");

        let resolver = Resolver::with_environment(
            BTreeMap::new(),
            false,
            None,
            Some(path_dir.clone().into_os_string()),
            tmp.path(),
        );
        let first = resolver.resolve("black", "black").unwrap();
        // Remove the binary; the memoized result must still be returned.
        std::fs::remove_file(path_dir.join("black")).unwrap();
        let second = resolver.resolve("black", "black").unwrap();
        assert_eq!(first, second);
    }
}

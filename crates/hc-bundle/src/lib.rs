//! Embedded-tool extractor: when huskycat runs as a self-contained
//! distribution carrying native tool binaries, materialize them into the
//! per-user cache before the resolver is first consulted.
//!
//! Extraction is gated on the bundle version string and is strictly
//! best-effort: any failure degrades to "no bundled tools" so the PATH and
//! container tiers can still satisfy the run. The manifest is written last,
//! via temp-file-then-rename, so a partial extraction never looks valid.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// File inside the bundle directory carrying the bundle version string.
const VERSION_FILE: &str = "VERSION";
/// Manifest file written into the cache directory after extraction.
const MANIFEST_FILE: &str = "manifest.json";
/// Bundle directory probed next to the running executable.
const BUNDLE_DIR_NAME: &str = "bundled-tools";

/// On-disk record of what was extracted, and from which bundle version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheManifest {
    pub version: String,
    pub tools: BTreeMap<String, PathBuf>,
}

impl CacheManifest {
    pub fn load(cache_dir: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(cache_dir.join(MANIFEST_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Atomically publish the manifest: write to a temp file in the cache
    /// directory, then rename into place.
    fn persist(&self, cache_dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serialize manifest")?;
        let tmp = tempfile::NamedTempFile::new_in(cache_dir)
            .context("create temp manifest file")?;
        std::fs::write(tmp.path(), json).context("write temp manifest")?;
        tmp.persist(cache_dir.join(MANIFEST_FILE))
            .context("rename manifest into place")?;
        Ok(())
    }
}

/// Ensure bundled tools are materialized; returns tool name → absolute path.
///
/// Memoized per process. Not bundled, or extraction failed → empty map.
pub fn ensure_tools() -> &'static BTreeMap<String, PathBuf> {
    static TOOLS: OnceLock<BTreeMap<String, PathBuf>> = OnceLock::new();
    TOOLS.get_or_init(|| {
        let Some(bundle_dir) = detect_bundle() else {
            debug!("not running from a bundled distribution");
            return BTreeMap::new();
        };
        let cache_dir = hc_config::paths::tools_dir();
        match ensure_tools_in(&bundle_dir, &cache_dir) {
            Ok(tools) => tools,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "bundled tool extraction failed; falling back to PATH/container tiers");
                BTreeMap::new()
            }
        }
    })
}

/// Detect the bundle directory: `HUSKYCAT_BUNDLE_DIR`, else a
/// `bundled-tools/` directory with a `VERSION` file next to the executable.
pub fn detect_bundle() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("HUSKYCAT_BUNDLE_DIR") {
        if !dir.is_empty() {
            let path = PathBuf::from(dir);
            if path.join(VERSION_FILE).is_file() {
                return Some(path);
            }
        }
    }
    let exe_dir = std::env::current_exe().ok()?.parent()?.to_path_buf();
    let candidate = exe_dir.join(BUNDLE_DIR_NAME);
    candidate.join(VERSION_FILE).is_file().then_some(candidate)
}

/// Extraction core, parameterized over directories so tests can drive it.
///
/// Skips work entirely when the on-disk manifest already carries the
/// bundle's version string.
pub fn ensure_tools_in(
    bundle_dir: &Path,
    cache_dir: &Path,
) -> Result<BTreeMap<String, PathBuf>> {
    let version = std::fs::read_to_string(bundle_dir.join(VERSION_FILE))
        .with_context(|| format!("read bundle version from {}", bundle_dir.display()))?
        .trim()
        .to_string();

    if let Some(manifest) = CacheManifest::load(cache_dir) {
        if manifest.version == version {
            debug!(version = %version, "bundled tools already extracted");
            return Ok(manifest.tools);
        }
    }

    std::fs::create_dir_all(cache_dir)
        .with_context(|| format!("create tool cache dir {}", cache_dir.display()))?;

    let mut tools = BTreeMap::new();
    for entry in std::fs::read_dir(bundle_dir).context("read bundle directory")? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name == VERSION_FILE {
            continue;
        }
        let dest = cache_dir.join(&name);
        std::fs::copy(entry.path(), &dest)
            .with_context(|| format!("copy bundled tool '{name}'"))?;
        set_executable(&dest)?;
        tools.insert(name, dest);
    }

    // Manifest is published last: a crash mid-copy leaves the old (or no)
    // manifest, and the next run re-extracts.
    let manifest = CacheManifest {
        version,
        tools: tools.clone(),
    };
    manifest.persist(cache_dir)?;
    debug!(count = tools.len(), "extracted bundled tools");
    Ok(tools)
}

/// Build a PATH value with the cache directory prepended, for child
/// processes spawned by the executor.
pub fn search_path_with(cache_dir: &Path) -> OsString {
    let current = std::env::var_os("PATH").unwrap_or_default();
    let mut entries = vec![cache_dir.to_path_buf()];
    entries.extend(std::env::split_paths(&current));
    std::env::join_paths(entries).unwrap_or(current)
}

fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("set executable mode on {}", path.display()))?;
    }
    Ok(())
}

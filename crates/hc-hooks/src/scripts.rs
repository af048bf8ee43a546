//! Hook script generation and installation.
//!
//! Scripts are rendered deterministically from (version, binary path), so a
//! `--force` reinstall over an existing install is byte-identical. Each
//! script embeds a `HOOK_VERSION` literal and compares it against the
//! installed binary before validating, printing an update hint on drift.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Marker identifying scripts we wrote; reinstall refuses to clobber
/// foreign hooks without `--force`.
const MANAGED_MARKER: &str = "# Managed by huskycat setup-hooks";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookKind {
    PreCommit,
    PrePush,
    CommitMsg,
}

impl HookKind {
    pub const ALL: [HookKind; 3] = [Self::PreCommit, Self::PrePush, Self::CommitMsg];

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::PreCommit => "pre-commit",
            Self::PrePush => "pre-push",
            Self::CommitMsg => "commit-msg",
        }
    }
}

/// Shared preamble: binary discovery (recorded absolute path, then PATH,
/// then a cargo developer fallback), skip-hooks bypass, and the version
/// drift warning.
fn preamble(version: &str, binary_path: Option<&Path>) -> String {
    let recorded = binary_path
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    format!(
        r#"#!/bin/sh
{MANAGED_MARKER}; reinstall with: huskycat setup-hooks --force
HOOK_VERSION="{version}"

if [ -n "$HUSKYCAT_SKIP_HOOKS" ]; then
    exit 0
fi

if [ -n "{recorded}" ] && [ -x "{recorded}" ]; then
    HUSKYCAT="{recorded}"
elif command -v huskycat >/dev/null 2>&1; then
    HUSKYCAT="huskycat"
elif command -v cargo >/dev/null 2>&1 && [ -f Cargo.toml ]; then
    # Developer fallback: run from the working tree.
    HUSKYCAT="cargo run --quiet --bin huskycat --"
else
    echo "huskycat: binary not found; skipping validation" >&2
    exit 0
fi

if [ "${{HUSKYCAT_CHECK_VERSION:-1}}" != "0" ]; then
    BIN_VERSION="$($HUSKYCAT --version 2>/dev/null | awk '{{print $2}}')"
    if [ -n "$BIN_VERSION" ] && [ "$BIN_VERSION" != "$HOOK_VERSION" ]; then
        echo "huskycat: hook v$HOOK_VERSION, binary v$BIN_VERSION; run 'huskycat setup-hooks --force' to update" >&2
    fi
fi

if [ "$(git config --get huskycat.nonblocking 2>/dev/null)" = "true" ]; then
    HUSKYCAT_NONBLOCKING=1
    export HUSKYCAT_NONBLOCKING
fi
"#
    )
}

/// Render one hook script.
pub fn render_hook(kind: HookKind, version: &str, binary_path: Option<&Path>) -> String {
    let preamble = preamble(version, binary_path);
    let body = match kind {
        HookKind::PreCommit => {
            r#"
exec $HUSKYCAT validate --mode git-hooks --staged
"#
        }
        HookKind::PrePush => {
            r#"
FILES=$(git diff --name-only "@{upstream}"...HEAD 2>/dev/null)
if [ -z "$FILES" ]; then
    exit 0
fi
printf '%s\n' "$FILES" | exec $HUSKYCAT validate --mode pipeline
"#
        }
        HookKind::CommitMsg => {
            r#"
exec $HUSKYCAT commit-msg "$1"
"#
        }
    };
    format!("{preamble}{body}")
}

/// Outcome of one `install_hooks` call.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub installed: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Install all hook scripts into `hooks_dir` with executable bits set.
///
/// Existing hooks we manage are rewritten in place; foreign hooks are left
/// alone unless `force` is given.
pub fn install_hooks(
    hooks_dir: &Path,
    version: &str,
    binary_path: Option<&Path>,
    force: bool,
) -> Result<InstallReport> {
    std::fs::create_dir_all(hooks_dir)
        .with_context(|| format!("create hooks directory {}", hooks_dir.display()))?;

    let mut report = InstallReport::default();
    for kind in HookKind::ALL {
        let dest = hooks_dir.join(kind.file_name());
        if dest.exists() && !force {
            let existing = std::fs::read_to_string(&dest).unwrap_or_default();
            if !existing.contains(MANAGED_MARKER) {
                warn!(hook = kind.file_name(), "existing unmanaged hook left alone (use --force)");
                report.skipped.push(dest);
                continue;
            }
        }
        let content = render_hook(kind, version, binary_path);
        std::fs::write(&dest, &content)
            .with_context(|| format!("write hook {}", dest.display()))?;
        set_executable(&dest)?;
        debug!(hook = kind.file_name(), "installed");
        report.installed.push(dest);
    }
    Ok(report)
}

fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("set executable bit on {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rendered_hooks_embed_version_and_marker() {
        let script = render_hook(HookKind::PreCommit, "1.2.3", None);
        assert!(script.starts_with("#!/bin/sh"));
        assert!(script.contains("HOOK_VERSION=\"1.2.3\""));
        assert!(script.contains(MANAGED_MARKER));
        assert!(script.contains("validate --mode git-hooks --staged"));
    }

    #[test]
    fn recorded_binary_path_is_preferred() {
        let script = render_hook(
            HookKind::PreCommit,
            "1.0.0",
            Some(Path::new("/opt/huskycat/bin/huskycat")),
        );
        assert!(script.contains("/opt/huskycat/bin/huskycat"));
    }

    #[test]
    fn commit_msg_hook_forwards_the_message_file() {
        let script = render_hook(HookKind::CommitMsg, "1.0.0", None);
        assert!(script.contains("commit-msg \"$1\""));
    }

    #[test]
    fn pre_push_hook_pipes_changed_files() {
        let script = render_hook(HookKind::PrePush, "1.0.0", None);
        assert!(script.contains("--mode pipeline"));
        assert!(script.contains("@{upstream}"));
    }

    #[test]
    fn install_writes_all_three_hooks_executable() {
        let tmp = tempdir().unwrap();
        let report = install_hooks(tmp.path(), "1.0.0", None, false).unwrap();
        assert_eq!(report.installed.len(), 3);
        assert!(report.skipped.is_empty());

        for kind in HookKind::ALL {
            let path = tmp.path().join(kind.file_name());
            assert!(path.exists());
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mode = std::fs::metadata(&path).unwrap().permissions().mode();
                assert_eq!(mode & 0o111, 0o111, "{}", kind.file_name());
            }
        }
    }

    #[test]
    fn force_reinstall_is_byte_identical() {
        let tmp = tempdir().unwrap();
        install_hooks(tmp.path(), "1.0.0", None, false).unwrap();
        let before = std::fs::read(tmp.path().join("pre-commit")).unwrap();

        install_hooks(tmp.path(), "1.0.0", None, true).unwrap();
        let after = std::fs::read(tmp.path().join("pre-commit")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn unmanaged_hook_is_preserved_without_force() {
        let tmp = tempdir().unwrap();
        let foreign = tmp.path().join("pre-commit");
        std::fs::write(&foreign, "#!/bin/sh\necho custom hook\n").unwrap();

        let report = install_hooks(tmp.path(), "1.0.0", None, false).unwrap();
        assert_eq!(report.skipped, vec![foreign.clone()]);
        assert_eq!(
            std::fs::read_to_string(&foreign).unwrap(),
            "#!/bin/sh\necho custom hook\n"
        );
    }

    #[test]
    fn force_overwrites_unmanaged_hooks() {
        let tmp = tempdir().unwrap();
        let foreign = tmp.path().join("pre-commit");
        std::fs::write(&foreign, "#!/bin/sh\necho custom hook\n").unwrap();

        let report = install_hooks(tmp.path(), "1.0.0", None, true).unwrap();
        assert_eq!(report.installed.len(), 3);
        assert!(std::fs::read_to_string(&foreign)
            .unwrap()
            .contains(MANAGED_MARKER));
    }

    #[test]
    fn managed_hook_is_refreshed_without_force() {
        let tmp = tempdir().unwrap();
        install_hooks(tmp.path(), "1.0.0", None, false).unwrap();
        let report = install_hooks(tmp.path(), "1.1.0", None, false).unwrap();
        assert_eq!(report.installed.len(), 3);
        let content = std::fs::read_to_string(tmp.path().join("pre-commit")).unwrap();
        assert!(content.contains("HOOK_VERSION=\"1.1.0\""));
    }
}

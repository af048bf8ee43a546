use std::path::Path;
use std::time::Duration;

use hc_core::{Diagnostic, FixConfidence};

/// Builds the argv (after the resolved program prefix) for one invocation.
pub type ArgvFn = fn(file: &Path, extra_args: &[String]) -> Vec<String>;

/// Maps a finished child's (exit code, stdout, stderr) to findings.
pub type ParserFn = fn(exit_code: i32, stdout: &str, stderr: &str) -> Parsed;

/// Findings extracted from one tool invocation. Warnings never fail a
/// result; errors always do.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Parsed {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            ..Self::default()
        }
    }
}

/// How a descriptor claims files.
///
/// Predicate-based descriptors deliberately cannot claim bare extensions:
/// an Ansible linter must not fire on every YAML file in the tree.
#[derive(Clone, Copy)]
pub enum FileMatch {
    /// Case-insensitive extension set, without the leading dot.
    Extensions(&'static [&'static str]),
    /// Custom predicate over the whole path.
    Predicate(fn(&Path) -> bool),
}

impl FileMatch {
    pub fn matches(&self, path: &Path) -> bool {
        match self {
            Self::Extensions(extensions) => path
                .extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
                .is_some_and(|ext| extensions.contains(&ext.as_str())),
            Self::Predicate(predicate) => predicate(path),
        }
    }
}

/// Declarative description of one external tool: how to invoke it, how to
/// read its output, and how much to trust its fixes. Adding a tool to
/// huskycat is adding one of these to the catalog.
pub struct ToolDescriptor {
    /// Stable identifier used in config, results, and dependency sets.
    pub name: &'static str,
    /// Binary name for PATH lookup; may differ from `name`.
    pub executable: &'static str,
    pub matcher: FileMatch,
    pub check_args: ArgvFn,
    /// `None` means the tool has no fix operation at all.
    pub fix_args: Option<ArgvFn>,
    pub parser: ParserFn,
    pub fix_confidence: FixConfidence,
    pub timeout: Duration,
    /// Tools that must complete before this one runs.
    pub depends_on: &'static [&'static str],
    /// Elided by fast mode (heavy checkers that reach out to infrastructure).
    pub slow: bool,
}

impl ToolDescriptor {
    /// Whether `fix` can even be attempted for this tool.
    pub fn fixable(&self) -> bool {
        self.fix_args.is_some() && self.fix_confidence != FixConfidence::Manual
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("executable", &self.executable)
            .field("fix_confidence", &self.fix_confidence)
            .field("timeout", &self.timeout)
            .field("depends_on", &self.depends_on)
            .field("slow", &self.slow)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extension_match_is_case_insensitive() {
        let matcher = FileMatch::Extensions(&["py"]);
        assert!(matcher.matches(&PathBuf::from("a.py")));
        assert!(matcher.matches(&PathBuf::from("a.PY")));
        assert!(!matcher.matches(&PathBuf::from("a.pyc")));
        assert!(!matcher.matches(&PathBuf::from("py")));
    }

    #[test]
    fn predicate_match_sees_whole_path() {
        fn in_roles(path: &Path) -> bool {
            path.components().any(|c| c.as_os_str() == "roles")
        }
        let matcher = FileMatch::Predicate(in_roles);
        assert!(matcher.matches(&PathBuf::from("ansible/roles/web/tasks/main.yml")));
        assert!(!matcher.matches(&PathBuf::from("docs/roles.md")));
    }
}

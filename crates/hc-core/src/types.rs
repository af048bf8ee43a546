use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Invocation context, detected once per process and immutable thereafter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Mode {
    /// Invoked from an installed git hook.
    GitHooks,
    /// Continuous-integration pipeline: machine-readable report, no prompts.
    Ci,
    /// Interactive command-line use.
    Cli,
    /// Stream-oriented use: line-delimited JSON, file list on stdin.
    Pipeline,
    /// JSON-RPC 2.0 server over stdio for AI-assistant integration.
    Mcp,
}

impl Mode {
    /// Returns the CLI-facing name for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GitHooks => "git-hooks",
            Self::Ci => "ci",
            Self::Cli => "cli",
            Self::Pipeline => "pipeline",
            Self::Mcp => "mcp",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = crate::error::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "git-hooks" | "githooks" | "hooks" => Ok(Self::GitHooks),
            "ci" => Ok(Self::Ci),
            "cli" => Ok(Self::Cli),
            "pipeline" => Ok(Self::Pipeline),
            "mcp" => Ok(Self::Mcp),
            other => Err(crate::error::AppError::UnknownMode(other.to_string())),
        }
    }
}

/// Source from which a tool's executable is obtained for one invocation.
///
/// Resolution is strictly ordered: `Bundled` wins over `Local`, which wins
/// over the container fallbacks. Each tool resolves to exactly one tier per
/// run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    /// Extracted from the self-contained distribution bundle.
    Bundled,
    /// Found on the host PATH.
    Local,
    /// We are already inside a container image that guarantees the tool.
    Container,
    /// Host-side container runtime wraps the tool as a last resort.
    ContainerFallback,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bundled => "bundled",
            Self::Local => "local",
            Self::Container => "container",
            Self::ContainerFallback => "container-fallback",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How much we trust a tool's auto-fix.
///
/// Total-ordered so the fix policy reduces to single comparisons:
/// `Safe < Likely < Uncertain < Manual`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FixConfidence {
    /// Deterministic, idempotent rewrites (formatters).
    Safe,
    /// Mechanical fixes that occasionally change semantics at the margin.
    Likely,
    /// Fixes that may alter behavior; require explicit opt-in.
    Uncertain,
    /// The tool has no fix, or its fix must never run automatically.
    Manual,
}

impl FixConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Likely => "likely",
            Self::Uncertain => "uncertain",
            Self::Manual => "manual",
        }
    }
}

/// One structured finding parsed from a tool's output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    pub message: String,
}

/// Outcome of running one tool against one file.
///
/// `success` is true iff `errors` is empty; the constructors below are the
/// only way these fields are set together, so the invariant holds by
/// construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationResult {
    pub tool: String,
    pub file: PathBuf,
    pub success: bool,
    /// Did this invocation modify the file in place?
    pub fixed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Build a result from parsed findings; `success` follows `errors`.
    pub fn from_findings(
        tool: impl Into<String>,
        file: impl Into<PathBuf>,
        errors: Vec<String>,
        warnings: Vec<String>,
        duration: Duration,
    ) -> Self {
        Self {
            tool: tool.into(),
            file: file.into(),
            success: errors.is_empty(),
            fixed: false,
            errors,
            warnings,
            duration,
            diagnostics: Vec::new(),
        }
    }

    /// Clean pass with no findings.
    pub fn passed(tool: impl Into<String>, file: impl Into<PathBuf>, duration: Duration) -> Self {
        Self::from_findings(tool, file, Vec::new(), Vec::new(), duration)
    }

    /// Synthesized result for a tool that exceeded its timeout.
    pub fn timed_out(tool: impl Into<String>, file: impl Into<PathBuf>, timeout: Duration) -> Self {
        let secs = timeout.as_secs();
        Self::from_findings(
            tool,
            file,
            vec![format!("timed out after {secs}s")],
            Vec::new(),
            timeout,
        )
    }

    /// Synthesized result for a tool no tier could provide.
    pub fn unavailable(tool: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self::from_findings(
            tool,
            file,
            vec!["tool unavailable".to_string()],
            Vec::new(),
            Duration::ZERO,
        )
    }

    pub fn with_fixed(mut self, fixed: bool) -> Self {
        self.fixed = fixed;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

/// Serialize `Duration` as fractional seconds so run records and CI reports
/// stay readable.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(de)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

/// Lifecycle states reported through the scheduler's progress callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl ProgressState {
    /// A state is terminal once the tool will produce no further updates.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    /// Single-cell glyph used by the live progress table.
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Pending => "·",
            Self::Running => "▶",
            Self::Succeeded => "✓",
            Self::Failed => "✗",
            Self::Skipped => "–",
        }
    }
}

/// Per-tool counters carried alongside each progress update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCounts {
    pub errors: usize,
    pub warnings: usize,
    pub files_processed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_str() {
        for mode in [Mode::GitHooks, Mode::Ci, Mode::Cli, Mode::Pipeline, Mode::Mcp] {
            let parsed: Mode = mode.as_str().parse().unwrap();
            assert_eq!(parsed, mode);
        }
    }

    #[test]
    fn mode_rejects_unknown() {
        assert!("watch".parse::<Mode>().is_err());
    }

    #[test]
    fn fix_confidence_is_totally_ordered() {
        assert!(FixConfidence::Safe < FixConfidence::Likely);
        assert!(FixConfidence::Likely < FixConfidence::Uncertain);
        assert!(FixConfidence::Uncertain < FixConfidence::Manual);
    }

    #[test]
    fn from_findings_sets_success_iff_no_errors() {
        let clean = ValidationResult::from_findings(
            "black",
            "a.py",
            Vec::new(),
            vec!["note".into()],
            Duration::from_millis(5),
        );
        assert!(clean.success);

        let dirty = ValidationResult::from_findings(
            "ruff",
            "a.py",
            vec!["E501 line too long".into()],
            Vec::new(),
            Duration::from_millis(5),
        );
        assert!(!dirty.success);
    }

    #[test]
    fn timed_out_result_carries_literal_message_and_duration() {
        let result = ValidationResult::timed_out("mypy", "a.py", Duration::from_secs(1));
        assert!(!result.success);
        assert_eq!(result.errors, vec!["timed out after 1s".to_string()]);
        assert_eq!(result.duration, Duration::from_secs(1));
    }

    #[test]
    fn unavailable_result_is_failure_not_crash() {
        let result = ValidationResult::unavailable("hadolint", "Dockerfile");
        assert!(!result.success);
        assert_eq!(result.errors, vec!["tool unavailable".to_string()]);
    }

    #[test]
    fn duration_serializes_as_seconds() {
        let result = ValidationResult::passed("black", "a.py", Duration::from_millis(1500));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["duration"].as_f64(), Some(1.5));
    }

    #[test]
    fn progress_state_terminality() {
        assert!(!ProgressState::Pending.is_terminal());
        assert!(!ProgressState::Running.is_terminal());
        assert!(ProgressState::Succeeded.is_terminal());
        assert!(ProgressState::Failed.is_terminal());
        assert!(ProgressState::Skipped.is_terminal());
    }
}

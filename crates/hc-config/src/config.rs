use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hc_core::AppError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::env::parse_flag_value;

/// Config file names probed in each directory, in priority order.
const CONFIG_FILE_NAMES: &[&str] = &[
    ".huskycat.yaml",
    ".huskycat.yml",
    ".huskycat.json",
    "huskycat.yaml",
];

/// Top-level keys we understand; anything else is a warning, not an error.
const KNOWN_KEYS: &[&str] = &["feature_flags", "tools", "exclude_patterns"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub feature_flags: FeatureFlags,
    #[serde(default)]
    pub tools: BTreeMap<String, ToolSettings>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Where this config was loaded from; `None` means built-in defaults.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// GitHooks mode forks a background validator instead of blocking.
    #[serde(default)]
    pub nonblocking_hooks: bool,
    /// When false the scheduler runs tools sequentially in dependency order.
    #[serde(default = "default_true")]
    pub parallel_execution: bool,
    /// When false the live progress table is disabled regardless of TTY.
    #[serde(default = "default_true")]
    pub tui_progress: bool,
    /// When false run records are not persisted.
    #[serde(default = "default_true")]
    pub cache_results: bool,
    /// Strict mode: unavailable tools and process-manager failures become
    /// hard errors instead of warnings.
    #[serde(default)]
    pub strict: bool,
    /// Cancel outstanding work on the first error.
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            nonblocking_hooks: false,
            parallel_execution: true,
            tui_progress: true,
            cache_results: true,
            strict: false,
            fail_fast: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            extra_args: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration for a run starting at `start_dir`: built-in
    /// defaults, overlaid by the first discovered config file, overlaid by
    /// `HUSKYCAT_*` environment variables. CLI flags are applied by the
    /// dispatcher on top of the returned value.
    pub fn load(start_dir: &Path) -> Result<Self, AppError> {
        let mut config = match Self::discover_file(start_dir) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    /// Walk from `start_dir` toward the filesystem root; the first directory
    /// containing any recognized config file wins.
    pub fn discover_file(start_dir: &Path) -> Option<PathBuf> {
        for dir in start_dir.ancestors() {
            for name in CONFIG_FILE_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// Parse a YAML or JSON config file. Parse failures are hard errors
    /// naming the file; unknown top-level keys are warnings.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let value: serde_yaml::Value = if is_json {
            let json: serde_json::Value =
                serde_json::from_str(&content).map_err(|e| AppError::Config {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            serde_yaml::to_value(json).map_err(|e| AppError::Config {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|e| AppError::Config {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        };

        if let serde_yaml::Value::Mapping(ref mapping) = value {
            for key in mapping.keys() {
                if let serde_yaml::Value::String(name) = key {
                    if !KNOWN_KEYS.contains(&name.as_str()) {
                        warn!(key = %name, file = %path.display(), "unknown config key ignored");
                    }
                }
            }
        }

        let mut config: Config =
            serde_yaml::from_value(value).map_err(|e| AppError::Config {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Overlay environment variables. Takes the variable iterator as an
    /// argument so tests can inject instead of mutating process state.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if key == "HUSKYCAT_NONBLOCKING" {
                self.feature_flags.nonblocking_hooks = parse_flag_value(&key, &value)?;
            } else if let Some(name) = key.strip_prefix("HUSKYCAT_FEATURE_") {
                let parsed = parse_flag_value(&key, &value)?;
                match name.to_ascii_lowercase().as_str() {
                    "nonblocking_hooks" => self.feature_flags.nonblocking_hooks = parsed,
                    "parallel_execution" => self.feature_flags.parallel_execution = parsed,
                    "tui_progress" => self.feature_flags.tui_progress = parsed,
                    "cache_results" => self.feature_flags.cache_results = parsed,
                    "strict" => self.feature_flags.strict = parsed,
                    "fail_fast" => self.feature_flags.fail_fast = parsed,
                    other => warn!(flag = other, "unknown feature flag in environment ignored"),
                }
            }
        }
        Ok(())
    }

    /// Check if a tool is enabled (unconfigured tools default to enabled).
    pub fn is_tool_enabled(&self, tool: &str) -> bool {
        self.tools.get(tool).map(|t| t.enabled).unwrap_or(true)
    }

    /// Extra command-line arguments configured for a tool.
    pub fn extra_args(&self, tool: &str) -> &[String] {
        self.tools
            .get(tool)
            .map(|t| t.extra_args.as_slice())
            .unwrap_or(&[])
    }
}

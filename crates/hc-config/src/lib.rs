//! Layered configuration: built-in defaults, a discovered YAML/JSON config
//! file, `HUSKYCAT_*` environment variables, and command-line flags, merged
//! in that precedence order.

pub mod config;
pub mod env;
pub mod exclude;
pub mod paths;

pub use config::{Config, FeatureFlags, ToolSettings};
pub use env::{mode_override, parse_flag_value, skip_hooks_requested};
pub use exclude::ExcludeSet;

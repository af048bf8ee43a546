use std::path::Path;

use hc_config::Config;

use crate::catalog::CATALOG;
use crate::descriptor::ToolDescriptor;

/// Tools applicable to one file, in catalog order (which is already a
/// topological order of the dependency graph).
///
/// Filters out tools disabled in config and, under fast mode, tools marked
/// slow. A single file may activate several descriptors; their execution
/// order is the scheduler's concern.
pub fn applicable_tools(
    file: &Path,
    config: &Config,
    fast_mode: bool,
) -> Vec<&'static ToolDescriptor> {
    CATALOG
        .iter()
        .filter(|d| d.matcher.matches(file))
        .filter(|d| config.is_tool_enabled(d.name))
        .filter(|d| !(fast_mode && d.slow))
        .collect()
}

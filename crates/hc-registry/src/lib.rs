//! Validator registry: the declarative catalog of external tools, file →
//! tool selection, per-tool output parsers, the fix-confidence policy, and
//! the engine that turns one (file, tool) work item into a
//! [`hc_core::ValidationResult`].

pub mod catalog;
pub mod descriptor;
pub mod engine;
pub mod parse;
pub mod policy;
pub mod select;

pub use catalog::CATALOG;
pub use descriptor::{FileMatch, Parsed, ToolDescriptor};
pub use engine::run_tool;
pub use policy::{decide, FixAction, PolicyInput};
pub use select::applicable_tools;

/// Look up a catalog descriptor by name.
pub fn descriptor(name: &str) -> Option<&'static ToolDescriptor> {
    CATALOG.iter().find(|d| d.name == name)
}

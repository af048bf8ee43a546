//! Tool execution substrate: the three-tier resolver that turns a tool name
//! into a ready-to-run command prefix, and the child-process invocation
//! layer with process-group isolation and scheduler-enforced timeouts.

pub mod invoke;
pub mod resolver;

pub use invoke::{run_with_timeout, ExecOutcome};
pub use resolver::{Invocation, Resolver};

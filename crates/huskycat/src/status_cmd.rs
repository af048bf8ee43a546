//! `huskycat status`: tool availability per tier, config provenance, and
//! state paths.

use anyhow::{Context, Result};
use hc_config::Config;
use hc_exec::Resolver;
use hc_registry::CATALOG;

pub fn handle_status() -> Result<()> {
    let workdir = std::env::current_dir().context("determine working directory")?;
    let config = Config::load(&workdir)?;

    println!("huskycat {}", env!("CARGO_PKG_VERSION"));
    match &config.source {
        Some(path) => println!("config: {}", path.display()),
        None => println!("config: built-in defaults"),
    }
    println!("state:  {}", hc_config::paths::state_root().display());

    let bundled = hc_bundle::ensure_tools().clone();
    if !bundled.is_empty() {
        println!("bundle: {} tool(s) extracted", bundled.len());
    }
    let resolver = Resolver::new(bundled, &workdir);

    println!("\n{:<20} {:<10} {}", "TOOL", "STATUS", "SOURCE");
    for descriptor in CATALOG {
        let enabled = config.is_tool_enabled(descriptor.name);
        let (status, source) = if !enabled {
            ("disabled", String::new())
        } else {
            match resolver.resolve(descriptor.name, descriptor.executable) {
                Ok(invocation) => ("ok", format!("{} ({})", invocation.program.display(), invocation.tier)),
                Err(_) => ("missing", String::new()),
            }
        };
        println!("{:<20} {:<10} {source}", descriptor.name, status);
    }

    Ok(())
}

//! Dependency-level assignment over the tool DAG (Kahn's algorithm).
//!
//! Nodes are the unique tool names in the current run; edges go from a
//! dependency to its dependents. Dependencies on tools absent from the run
//! are ignored: a type checker still runs when its formatter produced no
//! work items. Cycles are a configuration error detected before any tool
//! starts.

use std::collections::{BTreeMap, BTreeSet};

use hc_core::AppError;
use hc_registry::ToolDescriptor;

/// Compute execution levels: tools in the same level have no dependency
/// relationship and may run concurrently; level `k+1` starts only after
/// level `k` completed.
pub fn dependency_levels(
    tools: &[&'static ToolDescriptor],
) -> Result<Vec<Vec<&'static str>>, AppError> {
    let present: BTreeSet<&str> = tools.iter().map(|d| d.name).collect();

    // In-degree and adjacency restricted to tools actually in this run.
    let mut in_degree: BTreeMap<&str, usize> = present.iter().map(|n| (*n, 0)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for descriptor in tools {
        for dep in descriptor.depends_on {
            if present.contains(dep) {
                *in_degree.get_mut(descriptor.name).unwrap() += 1;
                dependents.entry(dep).or_default().push(descriptor.name);
            }
        }
    }

    let mut levels = Vec::new();
    let mut remaining = present.len();
    while remaining > 0 {
        // All currently dependency-free nodes form one level.
        let level: Vec<&str> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(name, _)| *name)
            .collect();

        if level.is_empty() {
            // Every remaining node still has a remaining dependency. Walk
            // dependency edges until a node repeats; that node is on a
            // cycle (not merely downstream of one).
            let remaining: BTreeSet<&str> = in_degree.keys().copied().collect();
            let mut seen = BTreeSet::new();
            let mut node = *remaining
                .iter()
                .next()
                .expect("non-empty in_degree when remaining > 0");
            while seen.insert(node) {
                let descriptor = tools
                    .iter()
                    .find(|d| d.name == node)
                    .expect("remaining node comes from the tool list");
                node = descriptor
                    .depends_on
                    .iter()
                    .copied()
                    .find(|dep| remaining.contains(dep))
                    .expect("positive in-degree implies a remaining dependency");
            }
            return Err(AppError::DependencyCycle(node.to_string()));
        }

        for name in &level {
            in_degree.remove(name);
            if let Some(next) = dependents.get(name) {
                for dependent in next {
                    if let Some(deg) = in_degree.get_mut(dependent) {
                        *deg -= 1;
                    }
                }
            }
        }
        remaining -= level.len();
        levels.push(level.into_iter().collect());
    }

    Ok(levels)
}

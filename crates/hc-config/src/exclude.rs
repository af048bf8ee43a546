use std::path::Path;

use glob::Pattern;

/// Compiled exclude patterns.
///
/// A pattern containing a path separator matches against the whole relative
/// path; a bare pattern (e.g. `target` or `*.min.js`) matches any single
/// path component, which is what users writing `node_modules` expect.
#[derive(Debug, Default)]
pub struct ExcludeSet {
    whole_path: Vec<Pattern>,
    component: Vec<Pattern>,
}

impl ExcludeSet {
    pub fn compile(patterns: &[String]) -> anyhow::Result<Self> {
        let mut whole_path = Vec::new();
        let mut component = Vec::new();
        for raw in patterns {
            let pattern = Pattern::new(raw)
                .map_err(|e| anyhow::anyhow!("invalid exclude pattern '{raw}': {e}"))?;
            if raw.contains('/') {
                whole_path.push(pattern);
            } else {
                component.push(pattern);
            }
        }
        Ok(Self {
            whole_path,
            component,
        })
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.whole_path.iter().any(|p| p.matches_path(path)) {
            return true;
        }
        path.components().any(|c| {
            let text = c.as_os_str().to_string_lossy();
            self.component.iter().any(|p| p.matches(&text))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.whole_path.is_empty() && self.component.is_empty()
    }
}

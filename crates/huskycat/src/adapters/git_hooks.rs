use hc_core::Mode;
use hc_scheduler::RunOutcome;

use super::Adapter;

/// Hook output: silent on success, concise on failure. The hook's job is
/// to get out of the way of a clean commit.
pub struct GitHooksAdapter {
    pub tty: bool,
}

impl Adapter for GitHooksAdapter {
    fn mode(&self) -> Mode {
        Mode::GitHooks
    }

    fn interactive(&self) -> bool {
        self.tty
    }

    fn fail_fast_default(&self) -> bool {
        true
    }

    fn fast_default(&self) -> bool {
        true
    }

    fn show_progress(&self) -> bool {
        self.tty
    }

    fn use_color(&self) -> bool {
        self.tty
    }

    fn render(&self, outcome: &RunOutcome) -> String {
        if outcome.overall_success() {
            return String::new();
        }
        let mut out = String::from("huskycat: validation failed\n");
        for result in outcome.results.iter().filter(|r| !r.success) {
            let first = result.errors.first().map(String::as_str).unwrap_or("failed");
            out.push_str(&format!(
                "  {} {}: {first}\n",
                result.tool,
                result.file.display()
            ));
        }
        out.push_str("run `huskycat validate` for details, or commit with HUSKYCAT_SKIP_HOOKS=1\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hc_core::ValidationResult;
    use std::time::Duration;

    fn outcome(results: Vec<ValidationResult>) -> RunOutcome {
        RunOutcome {
            results,
            skipped_tools: Vec::new(),
        }
    }

    #[test]
    fn silent_on_success() {
        let adapter = GitHooksAdapter { tty: false };
        let rendered = adapter.render(&outcome(vec![ValidationResult::passed(
            "black",
            "a.py",
            Duration::ZERO,
        )]));
        assert!(rendered.is_empty());
    }

    #[test]
    fn concise_on_failure() {
        let adapter = GitHooksAdapter { tty: false };
        let failing = ValidationResult::from_findings(
            "ruff",
            "a.py",
            vec!["1:5 E225 Missing whitespace".to_string()],
            Vec::new(),
            Duration::ZERO,
        );
        let rendered = adapter.render(&outcome(vec![failing]));
        assert!(rendered.contains("validation failed"));
        assert!(rendered.contains("ruff a.py: 1:5 E225"));
        assert!(rendered.contains("HUSKYCAT_SKIP_HOOKS"));
    }
}

use std::collections::BTreeMap;
use std::path::PathBuf;

use hc_core::{Mode, ValidationResult};
use hc_scheduler::RunOutcome;

use super::Adapter;

/// Interactive CLI output: human-readable, grouped by file, colored when
/// stdout is a terminal.
pub struct CliAdapter {
    pub tty: bool,
}

impl CliAdapter {
    fn paint(&self, text: &str, code: &str) -> String {
        if self.tty {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

impl Adapter for CliAdapter {
    fn mode(&self) -> Mode {
        Mode::Cli
    }

    fn interactive(&self) -> bool {
        self.tty
    }

    fn show_progress(&self) -> bool {
        self.tty
    }

    fn use_color(&self) -> bool {
        self.tty
    }

    fn render(&self, outcome: &RunOutcome) -> String {
        let mut by_file: BTreeMap<PathBuf, Vec<&ValidationResult>> = BTreeMap::new();
        for result in &outcome.results {
            by_file.entry(result.file.clone()).or_default().push(result);
        }

        let mut out = String::new();
        for (file, results) in &by_file {
            out.push_str(&format!("{}\n", self.paint(&file.display().to_string(), "1")));
            for result in results {
                let (glyph, code) = if result.success {
                    ("✓", "32")
                } else {
                    ("✗", "31")
                };
                let fixed = if result.fixed { " (fixed)" } else { "" };
                out.push_str(&format!(
                    "  {} {:<18}{fixed}\n",
                    self.paint(glyph, code),
                    result.tool
                ));
                for error in &result.errors {
                    out.push_str(&format!("      {}\n", self.paint(error, "31")));
                }
                for warning in &result.warnings {
                    out.push_str(&format!("      {}\n", self.paint(warning, "33")));
                }
            }
        }

        let errors: usize = outcome.results.iter().map(|r| r.errors.len()).sum();
        let warnings: usize = outcome.results.iter().map(|r| r.warnings.len()).sum();
        let fixed = outcome.results.iter().filter(|r| r.fixed).count();
        out.push_str(&format!(
            "\n{} file(s), {} error(s), {} warning(s), {} fixed",
            by_file.len(),
            errors,
            warnings,
            fixed
        ));
        if !outcome.skipped_tools.is_empty() {
            out.push_str(&format!(
                "\nskipped (unavailable): {}",
                outcome.skipped_tools.join(", ")
            ));
        }
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn groups_results_by_file_with_summary() {
        let adapter = CliAdapter { tty: false };
        let outcome = RunOutcome {
            results: vec![
                ValidationResult::passed("black", "a.py", Duration::ZERO).with_fixed(true),
                ValidationResult::from_findings(
                    "ruff",
                    "a.py",
                    vec!["1:5 E225 Missing whitespace".to_string()],
                    Vec::new(),
                    Duration::ZERO,
                ),
            ],
            skipped_tools: vec!["mypy".to_string()],
        };

        let rendered = adapter.render(&outcome);
        assert!(rendered.contains("a.py\n"));
        assert!(rendered.contains("✓ black"));
        assert!(rendered.contains("(fixed)"));
        assert!(rendered.contains("✗ ruff"));
        assert!(rendered.contains("1 file(s), 1 error(s), 0 warning(s), 1 fixed"));
        assert!(rendered.contains("skipped (unavailable): mypy"));
    }

    #[test]
    fn non_tty_output_has_no_escape_codes() {
        let adapter = CliAdapter { tty: false };
        let outcome = RunOutcome {
            results: vec![ValidationResult::passed("black", "a.py", Duration::ZERO)],
            skipped_tools: Vec::new(),
        };
        assert!(!adapter.render(&outcome).contains('\x1b'));
    }

    #[test]
    fn tty_output_is_colored() {
        let adapter = CliAdapter { tty: true };
        let outcome = RunOutcome {
            results: vec![ValidationResult::passed("black", "a.py", Duration::ZERO)],
            skipped_tools: Vec::new(),
        };
        assert!(adapter.render(&outcome).contains("\x1b[32m"));
    }
}

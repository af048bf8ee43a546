use std::path::Path;

use anyhow::{Context, Result};
use hc_core::Mode;
use hc_scheduler::RunOutcome;
use serde_json::json;

use super::Adapter;

/// CI output: one machine-readable JSON document on stdout; optionally a
/// JUnit-style XML report on disk. Never prompts, never fixes, never
/// fail-fasts (CI wants the full picture).
pub struct CiAdapter;

impl Adapter for CiAdapter {
    fn mode(&self) -> Mode {
        Mode::Ci
    }

    fn interactive(&self) -> bool {
        false
    }

    fn render(&self, outcome: &RunOutcome) -> String {
        let errors: usize = outcome.results.iter().map(|r| r.errors.len()).sum();
        let warnings: usize = outcome.results.iter().map(|r| r.warnings.len()).sum();
        let files: std::collections::BTreeSet<_> =
            outcome.results.iter().map(|r| r.file.clone()).collect();
        let report = json!({
            "mode": "ci",
            "results": outcome.results,
            "summary": {
                "files": files.len(),
                "errors": errors,
                "warnings": warnings,
                "skipped_tools": outcome.skipped_tools,
                "success": outcome.overall_success(),
            },
        });
        serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Minimal JUnit-style report: one testcase per (file, tool) pair.
pub fn write_junit(path: &Path, outcome: &RunOutcome) -> Result<()> {
    let failures = outcome.results.iter().filter(|r| !r.success).count();
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!(
        "<testsuite name=\"huskycat\" tests=\"{}\" failures=\"{failures}\">\n",
        outcome.results.len()
    ));
    for result in &outcome.results {
        xml.push_str(&format!(
            "  <testcase classname=\"{}\" name=\"{}\" time=\"{:.3}\"",
            xml_escape(&result.tool),
            xml_escape(&result.file.display().to_string()),
            result.duration.as_secs_f64(),
        ));
        if result.success {
            xml.push_str("/>\n");
        } else {
            xml.push_str(">\n");
            for error in &result.errors {
                xml.push_str(&format!(
                    "    <failure message=\"{}\"/>\n",
                    xml_escape(error)
                ));
            }
            xml.push_str("  </testcase>\n");
        }
    }
    xml.push_str("</testsuite>\n");
    std::fs::write(path, xml).with_context(|| format!("write JUnit report {}", path.display()))
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hc_core::ValidationResult;
    use std::time::Duration;

    fn mixed_outcome() -> RunOutcome {
        RunOutcome {
            results: vec![
                ValidationResult::passed("black", "a.py", Duration::from_millis(10)),
                ValidationResult::from_findings(
                    "ruff",
                    "a.py",
                    vec!["1:5 E225 Missing whitespace".to_string()],
                    vec!["note".to_string()],
                    Duration::from_millis(20),
                ),
            ],
            skipped_tools: vec!["mypy".to_string()],
        }
    }

    #[test]
    fn report_is_valid_json_with_summary() {
        let rendered = CiAdapter.render(&mixed_outcome());
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["summary"]["errors"], 1);
        assert_eq!(parsed["summary"]["warnings"], 1);
        assert_eq!(parsed["summary"]["files"], 1);
        assert_eq!(parsed["summary"]["success"], false);
        assert_eq!(parsed["summary"]["skipped_tools"][0], "mypy");
        assert_eq!(parsed["results"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn junit_report_counts_failures_and_escapes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("junit.xml");
        let mut outcome = mixed_outcome();
        outcome.results[1].errors[0] = "unexpected <token> & more".to_string();

        write_junit(&path, &outcome).unwrap();
        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains("tests=\"2\" failures=\"1\""));
        assert!(xml.contains("&lt;token&gt; &amp; more"));
        assert!(!xml.contains("<token>"));
    }
}

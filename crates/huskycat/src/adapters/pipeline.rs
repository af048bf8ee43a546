use hc_core::Mode;
use hc_scheduler::RunOutcome;
use serde_json::json;

use super::Adapter;

/// Stream output: one JSON object per result line, then a summary line.
/// Consumers can process results as they read without buffering the whole
/// document.
pub struct PipelineAdapter;

impl Adapter for PipelineAdapter {
    fn mode(&self) -> Mode {
        Mode::Pipeline
    }

    fn interactive(&self) -> bool {
        false
    }

    fn render(&self, outcome: &RunOutcome) -> String {
        let mut out = String::new();
        for result in &outcome.results {
            if let Ok(line) = serde_json::to_string(result) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        let summary = json!({
            "summary": {
                "results": outcome.results.len(),
                "skipped_tools": outcome.skipped_tools,
                "success": outcome.overall_success(),
            }
        });
        out.push_str(&summary.to_string());
        out.push('\n');
        out
    }
}

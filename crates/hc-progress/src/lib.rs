//! Live tool-status table for interactive terminals.
//!
//! All updates go through one mutex-guarded state; callers may invoke
//! [`ProgressDisplay::update`] from any worker thread. When stderr is not a
//! terminal (or the feature flag disabled the display), every call is a
//! no-op and no terminal control sequences are emitted.

use std::collections::BTreeMap;
use std::io::{IsTerminal, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossterm::{cursor, terminal, QueueableCommand};
use hc_core::{ProgressCounts, ProgressState};

/// Default repaint throttle (10 Hz).
const DEFAULT_REFRESH: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
struct Row {
    state: ProgressState,
    counts: ProgressCounts,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

struct State {
    /// Row order is first-registration order; updates merge by tool name.
    order: Vec<String>,
    rows: BTreeMap<String, Row>,
    lines_drawn: u16,
    last_render: Option<Instant>,
    stopped: bool,
}

pub struct ProgressDisplay {
    enabled: bool,
    refresh: Duration,
    state: Mutex<State>,
}

impl ProgressDisplay {
    /// Display that renders iff `tui_enabled` and stderr is a terminal.
    pub fn auto(tui_enabled: bool) -> Self {
        Self::new(tui_enabled && std::io::stderr().is_terminal())
    }

    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            refresh: DEFAULT_REFRESH,
            state: Mutex::new(State {
                order: Vec::new(),
                rows: BTreeMap::new(),
                lines_drawn: 0,
                last_render: None,
                stopped: false,
            }),
        }
    }

    pub fn with_refresh(mut self, refresh: Duration) -> Self {
        self.refresh = refresh;
        self
    }

    /// Initialize the table with every tool in `Pending`.
    pub fn start(&self, tools: &[&str]) {
        let mut state = self.state.lock().unwrap();
        for tool in tools {
            if !state.rows.contains_key(*tool) {
                state.order.push(tool.to_string());
                state.rows.insert(
                    tool.to_string(),
                    Row {
                        state: ProgressState::Pending,
                        counts: ProgressCounts::default(),
                        started_at: None,
                        finished_at: None,
                    },
                );
            }
        }
        self.render(&mut state, true);
    }

    /// Merge an update by tool name. Safe under concurrent calls; repaints
    /// are throttled except for terminal-state transitions.
    pub fn update(&self, tool: &str, progress: ProgressState, counts: ProgressCounts) {
        let mut state = self.state.lock().unwrap();
        if state.stopped {
            return;
        }
        if !state.rows.contains_key(tool) {
            state.order.push(tool.to_string());
        }
        let now = Instant::now();
        let row = state.rows.entry(tool.to_string()).or_insert(Row {
            state: ProgressState::Pending,
            counts: ProgressCounts::default(),
            started_at: None,
            finished_at: None,
        });
        row.counts = counts;
        row.state = progress;
        if progress == ProgressState::Running && row.started_at.is_none() {
            row.started_at = Some(now);
        }
        if progress.is_terminal() && row.finished_at.is_none() {
            row.finished_at = Some(now);
        }
        self.render(&mut state, progress.is_terminal());
    }

    /// Render the final table state and release the terminal. Idempotent;
    /// safe to call from a drop guard on any exit path.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        if state.stopped {
            return;
        }
        self.render(&mut state, true);
        state.stopped = true;
        if self.enabled && state.lines_drawn > 0 {
            let mut stderr = std::io::stderr();
            let _ = stderr.flush();
        }
    }

    fn render(&self, state: &mut State, force: bool) {
        if !self.enabled || state.stopped {
            return;
        }
        if !force {
            if let Some(last) = state.last_render {
                if last.elapsed() < self.refresh {
                    return;
                }
            }
        }
        state.last_render = Some(Instant::now());

        let lines = render_lines(&state.order, &state.rows);
        let mut stderr = std::io::stderr();
        if state.lines_drawn > 0 {
            let _ = stderr.queue(cursor::MoveUp(state.lines_drawn));
            let _ = stderr.queue(terminal::Clear(terminal::ClearType::FromCursorDown));
        }
        for line in &lines {
            let _ = writeln!(stderr, "{line}");
        }
        let _ = stderr.flush();
        state.lines_drawn = lines.len() as u16;
    }
}

/// Pure table rendering, split out for tests.
fn render_lines(order: &[String], rows: &BTreeMap<String, Row>) -> Vec<String> {
    let mut lines = Vec::with_capacity(order.len() + 1);
    let total = order.len();
    let done = rows.values().filter(|r| r.state.is_terminal()).count();

    for tool in order {
        let Some(row) = rows.get(tool) else {
            continue;
        };
        let elapsed = match (row.started_at, row.finished_at) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        };
        lines.push(format!(
            "{} {:<18} {:<9} {:>6.1}s {:>3}E {:>3}W {:>4} files",
            row.state.glyph(),
            tool,
            state_label(row.state),
            elapsed.as_secs_f64(),
            row.counts.errors,
            row.counts.warnings,
            row.counts.files_processed,
        ));
    }

    if total > 0 {
        lines.push(format!("[{}] {done}/{total} tools", bar(done, total, 24)));
    }
    lines
}

fn state_label(state: ProgressState) -> &'static str {
    match state {
        ProgressState::Pending => "pending",
        ProgressState::Running => "running",
        ProgressState::Succeeded => "ok",
        ProgressState::Failed => "failed",
        ProgressState::Skipped => "skipped",
    }
}

fn bar(done: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 { 0 } else { width * done / total };
    let mut bar = String::with_capacity(width);
    for i in 0..width {
        bar.push(if i < filled { '#' } else { '-' });
    }
    bar
}

/// Guard that guarantees `stop()` runs on every exit path.
pub struct ProgressScope<'a> {
    display: &'a ProgressDisplay,
}

impl<'a> ProgressScope<'a> {
    pub fn new(display: &'a ProgressDisplay) -> Self {
        Self { display }
    }
}

impl Drop for ProgressScope<'_> {
    fn drop(&mut self) {
        self.display.stop();
    }
}

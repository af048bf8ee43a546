use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use hc_core::{AppError, ProgressCounts, ProgressState, ValidationResult};
use hc_exec::Resolver;
use hc_registry::ToolDescriptor;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::levels::dependency_levels;

/// Thread-safe progress sink; invoked from worker tasks.
pub type ProgressCallback = Arc<dyn Fn(&str, ProgressState, ProgressCounts) + Send + Sync>;

/// One (tool, file) unit of work with its resolved fix decision.
pub struct WorkItem {
    pub descriptor: &'static ToolDescriptor,
    pub file: PathBuf,
    pub do_fix: bool,
    pub extra_args: Vec<String>,
}

/// Aggregate of one scheduler run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Sorted by (file, tool) regardless of execution order.
    pub results: Vec<ValidationResult>,
    /// Tools no tier could provide (non-strict mode only).
    pub skipped_tools: Vec<String>,
}

impl RunOutcome {
    pub fn overall_success(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }
}

/// Executes work items level by level over the dependency DAG.
pub struct Scheduler {
    pub resolver: Arc<Resolver>,
    /// Worker pool size; 1 gives sequential dependency-order execution.
    pub jobs: usize,
    /// Cancel outstanding work on the first error.
    pub fail_fast: bool,
    /// Unavailable tools become hard errors instead of skips.
    pub strict: bool,
    pub workdir: PathBuf,
    pub search_path: Option<OsString>,
    pub progress: Option<ProgressCallback>,
}

impl Scheduler {
    pub async fn run(&self, items: Vec<WorkItem>) -> Result<RunOutcome, AppError> {
        // Unique tools in first-seen (catalog) order.
        let mut tools: Vec<&'static ToolDescriptor> = Vec::new();
        for item in &items {
            if !tools.iter().any(|d| d.name == item.descriptor.name) {
                tools.push(item.descriptor);
            }
        }

        // Cycles are rejected before any tool starts.
        let levels = dependency_levels(&tools)?;

        // Probe availability once per tool; a tool that no tier can provide
        // is either fatal (strict) or skipped with a warning.
        let mut skipped_tools = Vec::new();
        let mut items = items;
        for descriptor in &tools {
            if self
                .resolver
                .resolve(descriptor.name, descriptor.executable)
                .is_err()
            {
                if self.strict {
                    return Err(AppError::ToolUnavailable(descriptor.name.to_string()));
                }
                warn!(tool = descriptor.name, "tool unavailable; skipping its work items");
                self.emit(descriptor.name, ProgressState::Skipped, ProgressCounts::default());
                skipped_tools.push(descriptor.name.to_string());
            }
        }
        items.retain(|item| !skipped_tools.contains(&item.descriptor.name.to_string()));

        for descriptor in &tools {
            if !skipped_tools.iter().any(|s| s == descriptor.name) {
                self.emit(descriptor.name, ProgressState::Pending, ProgressCounts::default());
            }
        }

        let counts: Arc<Mutex<HashMap<String, ProgressCounts>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let cancelled = Arc::new(AtomicBool::new(false));
        let semaphore = Arc::new(Semaphore::new(self.jobs.max(1)));
        let mut results: Vec<ValidationResult> = Vec::new();

        for level in &levels {
            let level_tools: Vec<&str> = level
                .iter()
                .copied()
                .filter(|name| items.iter().any(|i| i.descriptor.name == *name))
                .collect();
            if level_tools.is_empty() {
                continue;
            }

            if self.fail_fast && cancelled.load(Ordering::SeqCst) {
                for name in &level_tools {
                    self.emit(name, ProgressState::Skipped, self.counts_for(&counts, name));
                }
                continue;
            }

            for name in &level_tools {
                self.emit(name, ProgressState::Running, ProgressCounts::default());
            }

            let (level_items, rest): (Vec<WorkItem>, Vec<WorkItem>) = items
                .into_iter()
                .partition(|item| level_tools.contains(&item.descriptor.name));
            items = rest;

            let mut join_set: JoinSet<Option<ValidationResult>> = JoinSet::new();
            for item in level_items {
                let resolver = Arc::clone(&self.resolver);
                let semaphore = Arc::clone(&semaphore);
                let cancelled = Arc::clone(&cancelled);
                let counts = Arc::clone(&counts);
                let progress = self.progress.clone();
                let workdir = self.workdir.clone();
                let search_path = self.search_path.clone();
                let fail_fast = self.fail_fast;

                join_set.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok()?;
                    // Fail-fast stops workers from picking up new items;
                    // already-running children complete.
                    if fail_fast && cancelled.load(Ordering::SeqCst) {
                        return None;
                    }

                    let result = hc_registry::run_tool(
                        &resolver,
                        item.descriptor,
                        &item.file,
                        item.do_fix,
                        &item.extra_args,
                        &workdir,
                        search_path.as_deref(),
                    )
                    .await;

                    if !result.success && fail_fast {
                        cancelled.store(true, Ordering::SeqCst);
                    }

                    let updated = {
                        let mut counts = counts.lock().unwrap();
                        let entry = counts.entry(item.descriptor.name.to_string()).or_default();
                        entry.errors += result.errors.len();
                        entry.warnings += result.warnings.len();
                        entry.files_processed += 1;
                        *entry
                    };
                    if let Some(callback) = &progress {
                        callback(item.descriptor.name, ProgressState::Running, updated);
                    }
                    Some(result)
                });
            }

            let mut level_results = Vec::new();
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(Some(result)) => level_results.push(result),
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "scheduler worker panicked"),
                }
            }

            // Tool-level terminal states once the whole level settled.
            for name in &level_tools {
                let ran: Vec<&ValidationResult> = level_results
                    .iter()
                    .filter(|r| r.tool == *name)
                    .collect();
                let state = if ran.is_empty() {
                    ProgressState::Skipped
                } else if ran.iter().all(|r| r.success) {
                    ProgressState::Succeeded
                } else {
                    ProgressState::Failed
                };
                self.emit(name, state, self.counts_for(&counts, name));
            }
            results.extend(level_results);
        }

        debug!(results = results.len(), skipped = skipped_tools.len(), "scheduler run complete");

        // Deterministic aggregate order regardless of execution order.
        results.sort_by(|a, b| a.file.cmp(&b.file).then_with(|| a.tool.cmp(&b.tool)));
        Ok(RunOutcome {
            results,
            skipped_tools,
        })
    }

    fn counts_for(
        &self,
        counts: &Arc<Mutex<HashMap<String, ProgressCounts>>>,
        tool: &str,
    ) -> ProgressCounts {
        counts
            .lock()
            .unwrap()
            .get(tool)
            .copied()
            .unwrap_or_default()
    }

    fn emit(&self, tool: &str, state: ProgressState, counts: ProgressCounts) {
        if let Some(callback) = &self.progress {
            callback(tool, state, counts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hc_core::FixConfidence;
    use hc_registry::descriptor::{FileMatch, Parsed};
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    fn file_arg(file: &Path, _extra: &[String]) -> Vec<String> {
        vec![file.to_string_lossy().into_owned()]
    }

    fn exit_parser(exit: i32, _stdout: &str, _stderr: &str) -> Parsed {
        if exit == 0 {
            Parsed::clean()
        } else {
            Parsed::error(format!("exit {exit}"))
        }
    }

    fn leak_tool(
        name: &'static str,
        deps: &'static [&'static str],
    ) -> &'static ToolDescriptor {
        Box::leak(Box::new(ToolDescriptor {
            name,
            executable: name,
            matcher: FileMatch::Extensions(&["x"]),
            check_args: file_arg,
            fix_args: None,
            parser: exit_parser,
            fix_confidence: FixConfidence::Manual,
            timeout: Duration::from_secs(10),
            depends_on: deps,
            slow: false,
        }))
    }

    /// Writes fake tool scripts into `<dir>/bin` and returns a resolver
    /// that only searches there.
    fn env_with_scripts(dir: &Path, scripts: &[(&str, &str)]) -> Arc<Resolver> {
        let bin = dir.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        for (name, body) in scripts {
            let path = bin.join(name);
            std::fs::write(&path, body).unwrap();
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            }
        }
        Arc::new(Resolver::with_environment(
            BTreeMap::new(),
            false,
            None,
            Some(bin.into_os_string()),
            dir,
        ))
    }

    fn scheduler(resolver: Arc<Resolver>, dir: &Path) -> Scheduler {
        Scheduler {
            resolver,
            jobs: 4,
            fail_fast: false,
            strict: false,
            workdir: dir.to_path_buf(),
            search_path: None,
            progress: None,
        }
    }

    fn item(descriptor: &'static ToolDescriptor, file: PathBuf) -> WorkItem {
        WorkItem {
            descriptor,
            file,
            do_fix: false,
            extra_args: Vec::new(),
        }
    }

    #[tokio::test]
    async fn dependency_order_is_observed_in_progress_events() {
        let tmp = tempdir().unwrap();
        let resolver = env_with_scripts(
            tmp.path(),
            &[("fmt-a", "#!/bin/sh\nexit 0\n"), ("check-a", "#!/bin/sh\nexit 0\n")],
        );
        let fmt = leak_tool("fmt-a", &[]);
        let check = leak_tool("check-a", &["fmt-a"]);

        let events: Arc<Mutex<Vec<(String, ProgressState)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut sched = scheduler(resolver, tmp.path());
        sched.progress = Some(Arc::new(move |tool, state, _| {
            sink.lock().unwrap().push((tool.to_string(), state));
        }));

        let file = tmp.path().join("c.x");
        std::fs::write(&file, "x\n").unwrap();
        let outcome = sched
            .run(vec![item(fmt, file.clone()), item(check, file)])
            .await
            .unwrap();
        assert!(outcome.overall_success());

        let events = events.lock().unwrap();
        let pos = |tool: &str, state: ProgressState| {
            events
                .iter()
                .position(|(t, s)| t == tool && *s == state)
                .unwrap_or_else(|| panic!("missing {tool} {state:?}"))
        };
        // The dependent's Running never precedes the dependency's Succeeded.
        assert!(pos("fmt-a", ProgressState::Succeeded) < pos("check-a", ProgressState::Running));
    }

    #[tokio::test]
    async fn failed_dependency_does_not_cancel_dependents_by_default() {
        let tmp = tempdir().unwrap();
        let resolver = env_with_scripts(
            tmp.path(),
            &[("fmt-b", "#!/bin/sh\nexit 1\n"), ("check-b", "#!/bin/sh\nexit 0\n")],
        );
        let fmt = leak_tool("fmt-b", &[]);
        let check = leak_tool("check-b", &["fmt-b"]);

        let file = tmp.path().join("c.x");
        std::fs::write(&file, "x\n").unwrap();
        let sched = scheduler(resolver, tmp.path());
        let outcome = sched
            .run(vec![item(fmt, file.clone()), item(check, file)])
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 2);
        let dependent = outcome.results.iter().find(|r| r.tool == "check-b").unwrap();
        assert!(dependent.success, "dependent still ran and passed");
    }

    #[tokio::test]
    async fn fail_fast_skips_later_levels() {
        let tmp = tempdir().unwrap();
        let resolver = env_with_scripts(
            tmp.path(),
            &[("fmt-c", "#!/bin/sh\nexit 1\n"), ("check-c", "#!/bin/sh\nexit 0\n")],
        );
        let fmt = leak_tool("fmt-c", &[]);
        let check = leak_tool("check-c", &["fmt-c"]);

        let events: Arc<Mutex<Vec<(String, ProgressState)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut sched = scheduler(resolver, tmp.path());
        sched.fail_fast = true;
        sched.progress = Some(Arc::new(move |tool, state, _| {
            sink.lock().unwrap().push((tool.to_string(), state));
        }));

        let file = tmp.path().join("c.x");
        std::fs::write(&file, "x\n").unwrap();
        let outcome = sched
            .run(vec![item(fmt, file.clone()), item(check, file)])
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 1, "dependent never ran");
        let events = events.lock().unwrap();
        assert!(events
            .iter()
            .any(|(t, s)| t == "check-c" && *s == ProgressState::Skipped));
    }

    #[tokio::test]
    async fn unavailable_tool_is_skipped_when_not_strict() {
        let tmp = tempdir().unwrap();
        let resolver = env_with_scripts(tmp.path(), &[]);
        let ghost = leak_tool("ghost-d", &[]);

        let file = tmp.path().join("c.x");
        std::fs::write(&file, "x\n").unwrap();
        let sched = scheduler(resolver, tmp.path());
        let outcome = sched.run(vec![item(ghost, file)]).await.unwrap();

        assert!(outcome.results.is_empty());
        assert_eq!(outcome.skipped_tools, vec!["ghost-d"]);
        assert!(outcome.overall_success());
    }

    #[tokio::test]
    async fn unavailable_tool_is_fatal_when_strict() {
        let tmp = tempdir().unwrap();
        let resolver = env_with_scripts(tmp.path(), &[]);
        let ghost = leak_tool("ghost-e", &[]);

        let file = tmp.path().join("c.x");
        std::fs::write(&file, "x\n").unwrap();
        let mut sched = scheduler(resolver, tmp.path());
        sched.strict = true;
        let err = sched.run(vec![item(ghost, file)]).await.unwrap_err();
        assert!(matches!(err, AppError::ToolUnavailable(name) if name == "ghost-e"));
    }

    #[tokio::test]
    async fn results_are_sorted_by_file_then_tool() {
        let tmp = tempdir().unwrap();
        let resolver = env_with_scripts(
            tmp.path(),
            &[("ta-f", "#!/bin/sh\nexit 0\n"), ("tb-f", "#!/bin/sh\nexit 0\n")],
        );
        let ta = leak_tool("ta-f", &[]);
        let tb = leak_tool("tb-f", &[]);

        let f1 = tmp.path().join("a.x");
        let f2 = tmp.path().join("b.x");
        std::fs::write(&f1, "x\n").unwrap();
        std::fs::write(&f2, "x\n").unwrap();

        let sched = scheduler(resolver, tmp.path());
        // Deliberately interleaved input order.
        let outcome = sched
            .run(vec![
                item(tb, f2.clone()),
                item(ta, f2.clone()),
                item(tb, f1.clone()),
                item(ta, f1.clone()),
            ])
            .await
            .unwrap();

        let order: Vec<(String, String)> = outcome
            .results
            .iter()
            .map(|r| (r.file.display().to_string(), r.tool.clone()))
            .collect();
        let mut expected = order.clone();
        expected.sort();
        assert_eq!(order, expected);
    }

    #[tokio::test]
    async fn sequential_mode_still_completes() {
        let tmp = tempdir().unwrap();
        let resolver =
            env_with_scripts(tmp.path(), &[("solo-g", "#!/bin/sh\nexit 0\n")]);
        let solo = leak_tool("solo-g", &[]);

        let file = tmp.path().join("c.x");
        std::fs::write(&file, "x\n").unwrap();
        let mut sched = scheduler(resolver, tmp.path());
        sched.jobs = 1;
        let outcome = sched.run(vec![item(solo, file)]).await.unwrap();
        assert_eq!(outcome.results.len(), 1);
    }
}

//! Dispatcher: mode detection, config loading, file collection, the
//! blocking and non-blocking validate flows, and the shared execution core
//! used by the CLI paths and the MCP server alike.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use hc_config::{Config, ExcludeSet};
use hc_core::{AppError, Mode, ProgressCounts, ProgressState, EXIT_DIAGNOSTICS, EXIT_OK};
use hc_exec::Resolver;
use hc_progress::{ProgressDisplay, ProgressScope};
use hc_registry::{applicable_tools, decide, FixAction, PolicyInput};
use hc_runs::{fork_validation, ProceedDecision, RunRecord, RunStore};
use hc_scheduler::{ProgressCallback, RunOutcome, Scheduler, WorkItem, DEFAULT_JOBS};
use tracing::{debug, info, warn};

use crate::adapters::{select_adapter, write_junit, Adapter};
use crate::cli::ValidateArgs;
use crate::files;

/// Detect the invocation mode once: explicit flag, then `HUSKYCAT_MODE`,
/// then the hook marker, then common CI environment markers, then CLI.
/// MCP is only ever entered through the `mcp-server` verb.
pub fn detect_mode(flag: Option<Mode>) -> Result<Mode, AppError> {
    if let Some(mode) = flag {
        return Ok(mode);
    }
    if let Some(mode) = hc_config::mode_override()? {
        return Ok(mode);
    }
    if std::env::var_os("HUSKYCAT_HOOK").is_some() {
        return Ok(Mode::GitHooks);
    }
    if let Ok(value) = std::env::var("CI") {
        if hc_config::parse_flag_value("CI", &value).unwrap_or(false) {
            return Ok(Mode::Ci);
        }
    }
    Ok(Mode::Cli)
}

/// Ask a yes/no question on stderr; EOF and non-TTY resolve to the default.
fn prompt_yes_no(question: &str, default_yes: bool) -> bool {
    use std::io::Write;
    let hint = if default_yes { "Y/n" } else { "y/N" };
    eprint!("{question} [{hint}] ");
    let _ = std::io::stderr().flush();
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => default_yes,
        Ok(_) => match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => true,
            "n" | "no" => false,
            _ => default_yes,
        },
    }
}

/// Options for one execution of the core pipeline.
pub struct ExecOptions {
    pub policy: PolicyInput,
    pub fast: bool,
    pub jobs: usize,
    pub fail_fast: bool,
    pub strict: bool,
    /// Allowed to put questions on the terminal for prompt-gated fixes.
    pub interactive_prompts: bool,
}

/// The shared execution core: select tools per file, resolve fix decisions,
/// schedule, and return the aggregate. Used by the inline CLI flow, the
/// detached child, and the MCP handlers.
///
/// `on_planned` receives the final tool-name set once fix prompts are
/// resolved and before the scheduler starts; the inline flow uses it to
/// seed the progress table with every tool in pending.
pub async fn execute(
    workdir: &Path,
    config: &Config,
    input_files: Vec<PathBuf>,
    options: &ExecOptions,
    progress: Option<ProgressCallback>,
    on_planned: Option<&(dyn Fn(&[&str]) + Sync)>,
) -> Result<RunOutcome, AppError> {
    let bundled = hc_bundle::ensure_tools().clone();
    let search_path = (!bundled.is_empty())
        .then(|| hc_bundle::search_path_with(&hc_config::paths::tools_dir()));
    let resolver = Arc::new(Resolver::new(bundled, workdir));

    // Resolve the fix decision once per tool; prompts are per tool, not per
    // file, so a hundred Python files ask about ruff once.
    let mut decisions: std::collections::BTreeMap<&str, bool> = std::collections::BTreeMap::new();
    let mut items = Vec::new();
    for file in &input_files {
        for descriptor in applicable_tools(file, config, options.fast) {
            let do_fix = *decisions.entry(descriptor.name).or_insert_with(|| {
                match decide(&options.policy, descriptor.fix_confidence) {
                    FixAction::Fix => true,
                    FixAction::Check => false,
                    prompt => {
                        let default_yes = prompt.default_resolution();
                        if options.interactive_prompts {
                            prompt_yes_no(
                                &format!("Apply {} fixes?", descriptor.name),
                                default_yes,
                            )
                        } else {
                            default_yes
                        }
                    }
                }
            });
            items.push(WorkItem {
                descriptor,
                file: file.clone(),
                do_fix,
                extra_args: config.extra_args(descriptor.name).to_vec(),
            });
        }
    }

    if let Some(on_planned) = on_planned {
        let mut names: Vec<&str> = Vec::new();
        for item in &items {
            if !names.contains(&item.descriptor.name) {
                names.push(item.descriptor.name);
            }
        }
        on_planned(&names);
    }

    let scheduler = Scheduler {
        resolver,
        jobs: if config.feature_flags.parallel_execution {
            options.jobs
        } else {
            1
        },
        fail_fast: options.fail_fast,
        strict: options.strict,
        workdir: workdir.to_path_buf(),
        search_path,
        progress,
    };
    scheduler.run(items).await
}

/// Full `validate` flow for the CLI surface. Returns the process exit code.
pub async fn run_validate(mode: Mode, args: &ValidateArgs) -> Result<i32> {
    let workdir = std::env::current_dir().context("determine working directory")?;

    if mode == Mode::GitHooks && hc_config::skip_hooks_requested() {
        info!("HUSKYCAT_SKIP_HOOKS set; skipping validation");
        return Ok(EXIT_OK);
    }

    let config = Config::load(&workdir)?;
    let excludes = ExcludeSet::compile(&config.exclude_patterns).map_err(|e| {
        AppError::Config {
            path: config
                .source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "exclude_patterns".to_string()),
            message: e.to_string(),
        }
    })?;

    let adapter = select_adapter(
        mode,
        std::io::stdout().is_terminal(),
        std::io::stderr().is_terminal(),
    );

    let input_files = collect_inputs(mode, args, &workdir, &excludes)?;
    if input_files.is_empty() {
        debug!("no input files matched; nothing to do");
        return Ok(EXIT_OK);
    }

    // Detached child: the parent already forked us with an assigned run id.
    if let Some(run_id) = &args.detached_run {
        return run_detached_child(run_id, &workdir, &config, args, input_files).await;
    }

    // Non-blocking hooks: consult previous-run state, then fork and return.
    if mode == Mode::GitHooks
        && config.feature_flags.nonblocking_hooks
        && config.feature_flags.cache_results
    {
        return run_nonblocking_parent(&workdir, adapter.as_ref(), args, input_files);
    }

    run_inline(mode, adapter.as_ref(), &workdir, &config, args, input_files).await
}

fn collect_inputs(
    mode: Mode,
    args: &ValidateArgs,
    workdir: &Path,
    excludes: &ExcludeSet,
) -> Result<Vec<PathBuf>> {
    if args.staged || (mode == Mode::GitHooks && args.paths.is_empty()) {
        return files::staged_files(workdir, excludes);
    }
    if !args.paths.is_empty() {
        return Ok(files::collect_from_args(&args.paths, excludes)?);
    }
    if mode == Mode::Pipeline {
        return Ok(files::read_stdin_list(excludes));
    }
    // CLI with no arguments validates the working tree.
    Ok(files::collect_from_args(
        &[workdir.to_path_buf()],
        excludes,
    )?)
}

async fn run_inline(
    mode: Mode,
    adapter: &dyn Adapter,
    workdir: &Path,
    config: &Config,
    args: &ValidateArgs,
    input_files: Vec<PathBuf>,
) -> Result<i32> {
    let options = ExecOptions {
        policy: PolicyInput {
            mode,
            interactive_tty: adapter.interactive(),
            fix_requested: args.fix,
            unsafe_allowed: args.unsafe_fixes,
        },
        fast: args.fast || adapter.fast_default(),
        jobs: args.jobs.unwrap_or(DEFAULT_JOBS),
        fail_fast: args.fail_fast
            || config.feature_flags.fail_fast
            || adapter.fail_fast_default(),
        strict: args.strict || config.feature_flags.strict,
        interactive_prompts: adapter.interactive(),
    };

    let display = Arc::new(ProgressDisplay::auto(
        adapter.show_progress() && config.feature_flags.tui_progress && !args.no_progress,
    ));
    let progress: ProgressCallback = {
        let display = Arc::clone(&display);
        Arc::new(move |tool, state, counts| display.update(tool, state, counts))
    };
    // Seed the table with every planned tool in pending; invoked after fix
    // prompts so questions never interleave with the live repaint.
    let on_planned = {
        let display = Arc::clone(&display);
        move |tools: &[&str]| display.start(tools)
    };

    // The scope guard restores the terminal on every exit path, including
    // panics inside the scheduler.
    let outcome = {
        let _scope = ProgressScope::new(&display);
        execute(
            workdir,
            config,
            input_files,
            &options,
            Some(progress),
            Some(&on_planned),
        )
        .await
    };
    let outcome = outcome?;

    if let Some(junit) = &args.junit {
        write_junit(junit, &outcome)?;
    }

    let rendered = adapter.render(&outcome);
    if !rendered.is_empty() {
        print!("{rendered}");
    }
    Ok(adapter.exit_code(&outcome))
}

fn run_nonblocking_parent(
    workdir: &Path,
    adapter: &dyn Adapter,
    args: &ValidateArgs,
    input_files: Vec<PathBuf>,
) -> Result<i32> {
    let store = RunStore::new(hc_config::paths::runs_dir());
    if let Err(e) = store.cleanup_zombies() {
        warn!(error = %format!("{e:#}"), "zombie cleanup failed");
    }

    match store.should_proceed_with_commit(&input_files) {
        ProceedDecision::Proceed => {}
        ProceedDecision::AlreadyRunning { run_id, pid } => {
            eprintln!(
                "huskycat: validation {run_id} (pid {pid}) is still running for overlapping files; \
                 let it finish before committing"
            );
            return Ok(EXIT_DIAGNOSTICS);
        }
        ProceedDecision::PreviousFailure { run_id } => {
            if adapter.interactive() {
                let proceed = prompt_yes_no(
                    &format!("previous validation {run_id} failed for these files; commit anyway?"),
                    true,
                );
                if !proceed {
                    return Ok(EXIT_DIAGNOSTICS);
                }
            } else {
                warn!(run_id = %run_id, "previous validation failed for overlapping files; proceeding");
            }
        }
    }

    let run_id = ulid::Ulid::new().to_string();
    let exe = std::env::current_exe().context("locate current executable")?;
    let mut child_args = vec![
        "validate".to_string(),
        "--mode".to_string(),
        "git-hooks".to_string(),
        "--detached-run".to_string(),
        run_id.clone(),
    ];
    if args.fast || adapter.fast_default() {
        child_args.push("--fast".to_string());
    }
    child_args.extend(
        input_files
            .iter()
            .map(|f| f.to_string_lossy().into_owned()),
    );

    match fork_validation(&store, &run_id, &exe, &child_args) {
        Ok(pid) => {
            debug!(run_id = %run_id, pid, "validation continues in the background");
            Ok(EXIT_OK)
        }
        Err(e) => {
            // Fork failure does not block the commit by default.
            warn!(error = %format!("{e:#}"), "background fork failed; commit proceeds");
            Ok(EXIT_OK)
        }
    }
}

/// Child side of a non-blocking run: own the PID file and the run record,
/// execute the pipeline, finalize.
async fn run_detached_child(
    run_id: &str,
    workdir: &Path,
    config: &Config,
    args: &ValidateArgs,
    input_files: Vec<PathBuf>,
) -> Result<i32> {
    let store = RunStore::new(hc_config::paths::runs_dir());
    store.ensure_dirs()?;
    store.write_pid_file(run_id, std::process::id())?;

    let record = RunRecord::with_id(
        run_id.to_string(),
        input_files.clone(),
        std::process::id(),
        store.log_path(run_id),
    );
    store.save_run(&record)?;

    let record = Arc::new(Mutex::new(record));
    let progress: ProgressCallback = {
        let record = Arc::clone(&record);
        let store = store.clone();
        Arc::new(move |tool: &str, state: ProgressState, counts: ProgressCounts| {
            let mut record = record.lock().unwrap();
            record.update_tool(tool, state, counts);
            if state.is_terminal() {
                if let Err(e) = store.save_run(&record) {
                    warn!(error = %format!("{e:#}"), "run record update failed");
                }
            }
        })
    };

    let options = ExecOptions {
        policy: PolicyInput {
            mode: Mode::GitHooks,
            // The detached child has no terminal.
            interactive_tty: false,
            fix_requested: args.fix,
            unsafe_allowed: false,
        },
        fast: args.fast,
        jobs: args.jobs.unwrap_or(DEFAULT_JOBS),
        fail_fast: false,
        strict: false,
        interactive_prompts: false,
    };

    let result = execute(workdir, config, input_files, &options, Some(progress), None).await;

    let passed = match &result {
        Ok(outcome) => outcome.overall_success(),
        Err(_) => false,
    };
    {
        let mut record = record.lock().unwrap();
        record.finalize(passed);
        store.save_run(&record)?;
    }
    store.remove_pid_file(run_id);

    match result {
        Ok(outcome) => {
            info!(
                run_id = %run_id,
                passed,
                results = outcome.results.len(),
                "detached validation finished"
            );
            Ok(if passed { EXIT_OK } else { EXIT_DIAGNOSTICS })
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_only_options(fast: bool) -> ExecOptions {
        ExecOptions {
            policy: PolicyInput {
                mode: Mode::Cli,
                interactive_tty: false,
                fix_requested: false,
                unsafe_allowed: false,
            },
            fast,
            jobs: 2,
            fail_fast: false,
            strict: false,
            interactive_prompts: false,
        }
    }

    #[tokio::test]
    async fn on_planned_sees_deduplicated_tools_in_catalog_order() {
        let tmp = tempfile::tempdir().unwrap();
        let files = vec![
            tmp.path().join("a.py"),
            tmp.path().join("b.py"),
            tmp.path().join("c.yaml"),
        ];
        for file in &files {
            std::fs::write(file, "\n").unwrap();
        }

        let planned: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let on_planned = |tools: &[&str]| {
            *planned.lock().unwrap() = tools.iter().map(|t| t.to_string()).collect();
        };
        let _ = execute(
            tmp.path(),
            &Config::default(),
            files,
            &check_only_options(false),
            None,
            Some(&on_planned),
        )
        .await;

        let planned = planned.lock().unwrap();
        assert_eq!(*planned, ["black", "ruff", "mypy", "yamllint"]);
    }

    #[tokio::test]
    async fn on_planned_respects_fast_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.py");
        std::fs::write(&file, "\n").unwrap();

        let planned: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let on_planned = |tools: &[&str]| {
            *planned.lock().unwrap() = tools.iter().map(|t| t.to_string()).collect();
        };
        let _ = execute(
            tmp.path(),
            &Config::default(),
            vec![file],
            &check_only_options(true),
            None,
            Some(&on_planned),
        )
        .await;

        let planned = planned.lock().unwrap();
        assert_eq!(*planned, ["black", "ruff"]);
    }

    #[test]
    fn explicit_flag_wins_mode_detection() {
        assert_eq!(detect_mode(Some(Mode::Pipeline)).unwrap(), Mode::Pipeline);
    }

    #[test]
    fn default_mode_is_cli() {
        // The test environment has neither HUSKYCAT_MODE nor HUSKYCAT_HOOK;
        // CI may be set on runners, so only assert the flag-free contract
        // when the variable is absent.
        if std::env::var_os("CI").is_none() && std::env::var_os("HUSKYCAT_MODE").is_none() {
            assert_eq!(detect_mode(None).unwrap(), Mode::Cli);
        }
    }
}

//! The per-work-item validation engine: resolve the tool, pick check or fix
//! argv, run with the descriptor's timeout, and map the outcome to a
//! [`ValidationResult`]. All failures are recovered into results; nothing
//! here aborts the run.

use std::ffi::OsStr;
use std::path::Path;

use hc_core::ValidationResult;
use hc_exec::{run_with_timeout, Resolver};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::descriptor::ToolDescriptor;

/// Run one (tool, file) work item.
///
/// `do_fix` is the already-resolved policy decision for this tool; the
/// engine still refuses to fix tools without a fix operation. Whether the
/// fix actually modified the file is detected by hashing the file around
/// the invocation, which works uniformly across tools whose own reporting
/// differs.
pub async fn run_tool(
    resolver: &Resolver,
    descriptor: &ToolDescriptor,
    file: &Path,
    do_fix: bool,
    extra_args: &[String],
    workdir: &Path,
    search_path: Option<&OsStr>,
) -> ValidationResult {
    let invocation = match resolver.resolve(descriptor.name, descriptor.executable) {
        Ok(invocation) => invocation,
        Err(_) => return ValidationResult::unavailable(descriptor.name, file),
    };

    let fixing = do_fix && descriptor.fixable();
    let argv = if fixing {
        (descriptor.fix_args.expect("fixable implies fix_args"))(file, extra_args)
    } else {
        (descriptor.check_args)(file, extra_args)
    };

    let before = fixing.then(|| content_hash(file)).flatten();

    debug!(
        tool = descriptor.name,
        file = %file.display(),
        tier = %invocation.tier,
        fixing,
        "running tool"
    );

    let outcome = match run_with_timeout(
        &invocation,
        &argv,
        workdir,
        descriptor.timeout,
        search_path,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            return ValidationResult::from_findings(
                descriptor.name,
                file,
                vec![format!("{} failed to start: {e:#}", descriptor.name)],
                Vec::new(),
                std::time::Duration::ZERO,
            );
        }
    };

    if outcome.timed_out {
        return ValidationResult::timed_out(descriptor.name, file, descriptor.timeout);
    }

    let parsed = (descriptor.parser)(outcome.exit_code, &outcome.stdout, &outcome.stderr);
    let fixed = match before {
        Some(before_hash) => content_hash(file).is_some_and(|after| after != before_hash),
        None => false,
    };

    ValidationResult::from_findings(
        descriptor.name,
        file,
        parsed.errors,
        parsed.warnings,
        outcome.duration,
    )
    .with_diagnostics(parsed.diagnostics)
    .with_fixed(fixed)
}

fn content_hash(file: &Path) -> Option<[u8; 32]> {
    let bytes = std::fs::read(file).ok()?;
    Some(Sha256::digest(&bytes).into())
}

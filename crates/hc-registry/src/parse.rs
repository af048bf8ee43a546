//! Output parsers, one per catalog tool.
//!
//! Each parser encodes a single tool's conventions: which exit codes mean
//! "clean" vs "findings" vs "crashed", which stream carries diagnostics,
//! and which noise lines to drop. Parsers never see the filesystem; they
//! map `(exit code, stdout, stderr)` to [`Parsed`] findings.

use std::sync::OnceLock;

use hc_core::Diagnostic;
use regex::Regex;

use crate::descriptor::Parsed;

fn regex(cell: &'static OnceLock<Regex>, pattern: &'static str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// Fallback for tools that crashed: last non-empty stderr line, or a
/// generic message naming the exit code.
fn crash_error(tool: &str, exit_code: i32, stderr: &str) -> Parsed {
    let detail = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(str::trim);
    match detail {
        Some(line) => Parsed::error(format!("{tool} failed (exit {exit_code}): {line}")),
        None => Parsed::error(format!("{tool} failed with exit code {exit_code}")),
    }
}

/// black: exit 0 clean, 1 would-reformat (check mode), anything else is an
/// internal error reported on stderr.
pub fn parse_black(exit_code: i32, _stdout: &str, stderr: &str) -> Parsed {
    match exit_code {
        0 => Parsed::clean(),
        1 => Parsed::error("file would be reformatted"),
        code => crash_error("black", code, stderr),
    }
}

/// ruff check: findings on stdout as `file:line:col: CODE message`;
/// summary lines ("Found N errors", fix hints) are noise.
pub fn parse_ruff(exit_code: i32, stdout: &str, stderr: &str) -> Parsed {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"^(?P<file>.+?):(?P<line>\d+):(?P<col>\d+): (?P<rule>[A-Z]+\d+) (?P<msg>.+)$",
    );

    let mut parsed = Parsed::clean();
    for line in stdout.lines() {
        if let Some(caps) = re.captures(line.trim_end()) {
            parsed.errors.push(format!(
                "{}:{} {} {}",
                &caps["line"], &caps["col"], &caps["rule"], &caps["msg"]
            ));
            parsed.diagnostics.push(Diagnostic {
                line: caps["line"].parse().unwrap_or(0),
                column: caps["col"].parse().ok(),
                rule: Some(caps["rule"].to_string()),
                message: caps["msg"].to_string(),
            });
        }
    }
    if parsed.errors.is_empty() && exit_code != 0 {
        return crash_error("ruff", exit_code, stderr);
    }
    parsed
}

/// mypy: `file:line: error: msg  [code]`; notes are dropped, the trailing
/// "Found N errors" summary is noise.
pub fn parse_mypy(exit_code: i32, stdout: &str, stderr: &str) -> Parsed {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"^(?P<file>.+?):(?P<line>\d+):(?:(?P<col>\d+):)? (?P<sev>error|warning|note): (?P<msg>.+?)(?:\s+\[(?P<rule>[a-z0-9-]+)\])?$",
    );

    let mut parsed = Parsed::clean();
    for line in stdout.lines() {
        let Some(caps) = re.captures(line.trim_end()) else {
            continue;
        };
        let message = caps["msg"].to_string();
        match &caps["sev"] {
            "error" => {
                parsed.errors.push(format!("line {}: {message}", &caps["line"]));
                parsed.diagnostics.push(Diagnostic {
                    line: caps["line"].parse().unwrap_or(0),
                    column: caps.name("col").and_then(|c| c.as_str().parse().ok()),
                    rule: caps.name("rule").map(|r| r.as_str().to_string()),
                    message,
                });
            }
            "warning" => parsed.warnings.push(message),
            _ => {}
        }
    }
    if parsed.errors.is_empty() && exit_code > 1 {
        return crash_error("mypy", exit_code, stderr);
    }
    parsed
}

/// prettier --check: exit 1 lists unformatted files; exit 2 is a real
/// failure (syntax error) on stderr.
pub fn parse_prettier(exit_code: i32, _stdout: &str, stderr: &str) -> Parsed {
    match exit_code {
        0 => Parsed::clean(),
        1 => Parsed::error("code style issues found"),
        code => crash_error("prettier", code, stderr),
    }
}

/// eslint --format unix: `file:line:col: msg [Error/rule]`; exit 2 means a
/// configuration or parse failure.
pub fn parse_eslint(exit_code: i32, stdout: &str, stderr: &str) -> Parsed {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"^(?P<file>.+?):(?P<line>\d+):(?P<col>\d+): (?P<msg>.+) \[(?P<sev>Error|Warning)(?:/(?P<rule>[^\]]+))?\]$",
    );

    let mut parsed = Parsed::clean();
    for line in stdout.lines() {
        let Some(caps) = re.captures(line.trim_end()) else {
            continue;
        };
        let message = caps["msg"].to_string();
        if &caps["sev"] == "Error" {
            parsed
                .errors
                .push(format!("line {}: {message}", &caps["line"]));
            parsed.diagnostics.push(Diagnostic {
                line: caps["line"].parse().unwrap_or(0),
                column: caps["col"].parse().ok(),
                rule: caps.name("rule").map(|r| r.as_str().to_string()),
                message,
            });
        } else {
            parsed.warnings.push(message);
        }
    }
    if parsed.errors.is_empty() && exit_code > 1 {
        return crash_error("eslint", exit_code, stderr);
    }
    parsed
}

/// yamllint --format parsable: `file:line:col: [severity] msg (rule)`.
pub fn parse_yamllint(exit_code: i32, stdout: &str, stderr: &str) -> Parsed {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"^(?P<file>.+?):(?P<line>\d+):(?P<col>\d+): \[(?P<sev>error|warning)\] (?P<msg>.+?)(?:\s+\((?P<rule>[a-z-]+)\))?$",
    );

    let mut parsed = Parsed::clean();
    for line in stdout.lines() {
        let Some(caps) = re.captures(line.trim_end()) else {
            continue;
        };
        let message = caps["msg"].to_string();
        if &caps["sev"] == "error" {
            parsed
                .errors
                .push(format!("line {}: {message}", &caps["line"]));
            parsed.diagnostics.push(Diagnostic {
                line: caps["line"].parse().unwrap_or(0),
                column: caps["col"].parse().ok(),
                rule: caps.name("rule").map(|r| r.as_str().to_string()),
                message,
            });
        } else {
            parsed.warnings.push(message);
        }
    }
    if parsed.errors.is_empty() && exit_code > 1 {
        return crash_error("yamllint", exit_code, stderr);
    }
    parsed
}

/// taplo fmt --check: nonzero means the file differs from canonical form.
pub fn parse_taplo(exit_code: i32, _stdout: &str, stderr: &str) -> Parsed {
    match exit_code {
        0 => Parsed::clean(),
        1 => Parsed::error("file is not formatted"),
        code => crash_error("taplo", code, stderr),
    }
}

/// terraform fmt -check: exit 3 means formatting differences; exit 2 is a
/// hard error.
pub fn parse_terraform_fmt(exit_code: i32, _stdout: &str, stderr: &str) -> Parsed {
    match exit_code {
        0 => Parsed::clean(),
        3 => Parsed::error("file is not formatted"),
        code => crash_error("terraform fmt", code, stderr),
    }
}

/// terraform validate -no-color: `Error:` / `Warning:` blocks on stdout.
pub fn parse_terraform_validate(exit_code: i32, stdout: &str, stderr: &str) -> Parsed {
    let mut parsed = Parsed::clean();
    for line in stdout.lines().chain(stderr.lines()) {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("Error: ") {
            parsed.errors.push(rest.to_string());
        } else if let Some(rest) = trimmed.strip_prefix("Warning: ") {
            parsed.warnings.push(rest.to_string());
        }
    }
    if parsed.errors.is_empty() && exit_code != 0 {
        return crash_error("terraform validate", exit_code, stderr);
    }
    parsed
}

/// tflint --format compact: `file:line:col: Severity - msg (rule)`.
pub fn parse_tflint(exit_code: i32, stdout: &str, stderr: &str) -> Parsed {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"^(?P<file>.+?):(?P<line>\d+):(?P<col>\d+): (?P<sev>Error|Warning|Notice) - (?P<msg>.+?)(?:\s+\((?P<rule>[a-z0-9_]+)\))?$",
    );

    let mut parsed = Parsed::clean();
    for line in stdout.lines() {
        let Some(caps) = re.captures(line.trim_end()) else {
            continue;
        };
        let message = caps["msg"].to_string();
        if &caps["sev"] == "Error" {
            parsed
                .errors
                .push(format!("line {}: {message}", &caps["line"]));
            parsed.diagnostics.push(Diagnostic {
                line: caps["line"].parse().unwrap_or(0),
                column: caps["col"].parse().ok(),
                rule: caps.name("rule").map(|r| r.as_str().to_string()),
                message,
            });
        } else {
            parsed.warnings.push(message);
        }
    }
    if parsed.errors.is_empty() && exit_code != 0 && exit_code != 2 {
        return crash_error("tflint", exit_code, stderr);
    }
    parsed
}

/// ansible-lint -p: `file:line: rule message`; exits 2 on violations.
pub fn parse_ansible_lint(exit_code: i32, stdout: &str, stderr: &str) -> Parsed {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"^(?P<file>.+?):(?P<line>\d+): (?P<rule>[a-z0-9\[\]_.-]+) (?P<msg>.+)$",
    );

    let mut parsed = Parsed::clean();
    for line in stdout.lines() {
        let Some(caps) = re.captures(line.trim_end()) else {
            continue;
        };
        let message = caps["msg"].to_string();
        parsed
            .errors
            .push(format!("line {}: {} {message}", &caps["line"], &caps["rule"]));
        parsed.diagnostics.push(Diagnostic {
            line: caps["line"].parse().unwrap_or(0),
            column: None,
            rule: Some(caps["rule"].to_string()),
            message,
        });
    }
    if parsed.errors.is_empty() && exit_code != 0 && exit_code != 2 {
        return crash_error("ansible-lint", exit_code, stderr);
    }
    parsed
}

/// shellcheck --format gcc: `file:line:col: severity: msg [SCnnnn]`.
pub fn parse_shellcheck(exit_code: i32, stdout: &str, stderr: &str) -> Parsed {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"^(?P<file>.+?):(?P<line>\d+):(?P<col>\d+): (?P<sev>error|warning|note): (?P<msg>.+?)(?:\s+\[(?P<rule>SC\d+)\])?$",
    );

    let mut parsed = Parsed::clean();
    for line in stdout.lines() {
        let Some(caps) = re.captures(line.trim_end()) else {
            continue;
        };
        let message = caps["msg"].to_string();
        match &caps["sev"] {
            "error" => {
                parsed
                    .errors
                    .push(format!("line {}: {message}", &caps["line"]));
                parsed.diagnostics.push(Diagnostic {
                    line: caps["line"].parse().unwrap_or(0),
                    column: caps["col"].parse().ok(),
                    rule: caps.name("rule").map(|r| r.as_str().to_string()),
                    message,
                });
            }
            "warning" => parsed.warnings.push(message),
            _ => {}
        }
    }
    if parsed.errors.is_empty() && parsed.warnings.is_empty() && exit_code > 1 {
        return crash_error("shellcheck", exit_code, stderr);
    }
    parsed
}

/// shfmt -d: exit 1 with a diff means reformatting needed; parse errors
/// land on stderr as `file:line:col: message`.
pub fn parse_shfmt(exit_code: i32, _stdout: &str, stderr: &str) -> Parsed {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, r"^(?P<file>.+?):(?P<line>\d+):(?P<col>\d+): (?P<msg>.+)$");

    match exit_code {
        0 => Parsed::clean(),
        1 => Parsed::error("file is not formatted"),
        code => {
            let mut parsed = Parsed::clean();
            for line in stderr.lines() {
                if let Some(caps) = re.captures(line.trim_end()) {
                    parsed
                        .errors
                        .push(format!("line {}: {}", &caps["line"], &caps["msg"]));
                }
            }
            if parsed.errors.is_empty() {
                crash_error("shfmt", code, stderr)
            } else {
                parsed
            }
        }
    }
}

/// hadolint: `file:line RULE severity: msg`; info/style never fail.
pub fn parse_hadolint(exit_code: i32, stdout: &str, stderr: &str) -> Parsed {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"^(?P<file>.+?):(?P<line>\d+) (?P<rule>(?:DL|SC)\d+) (?P<sev>error|warning|info|style): (?P<msg>.+)$",
    );

    let mut parsed = Parsed::clean();
    for line in stdout.lines() {
        let Some(caps) = re.captures(line.trim_end()) else {
            continue;
        };
        let message = caps["msg"].to_string();
        if &caps["sev"] == "error" {
            parsed
                .errors
                .push(format!("line {}: {message}", &caps["line"]));
            parsed.diagnostics.push(Diagnostic {
                line: caps["line"].parse().unwrap_or(0),
                column: None,
                rule: Some(caps["rule"].to_string()),
                message,
            });
        } else {
            parsed.warnings.push(message);
        }
    }
    if parsed.errors.is_empty() && parsed.warnings.is_empty() && exit_code != 0 {
        return crash_error("hadolint", exit_code, stderr);
    }
    parsed
}

/// check-jsonschema against the GitLab CI schema: violation lines carry a
/// `::` separated instance path.
pub fn parse_gitlab_ci(exit_code: i32, stdout: &str, stderr: &str) -> Parsed {
    if exit_code == 0 {
        return Parsed::clean();
    }
    let mut parsed = Parsed::clean();
    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.contains("::") {
            parsed.errors.push(trimmed.to_string());
        }
    }
    if parsed.errors.is_empty() {
        return crash_error("check-jsonschema", exit_code, stderr);
    }
    parsed
}

/// chplcheck: `file:line: message`.
pub fn parse_chplcheck(exit_code: i32, stdout: &str, stderr: &str) -> Parsed {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, r"^(?P<file>.+?):(?P<line>\d+): (?P<msg>.+)$");

    let mut parsed = Parsed::clean();
    for line in stdout.lines() {
        let Some(caps) = re.captures(line.trim_end()) else {
            continue;
        };
        parsed
            .errors
            .push(format!("line {}: {}", &caps["line"], &caps["msg"]));
        parsed.diagnostics.push(Diagnostic {
            line: caps["line"].parse().unwrap_or(0),
            column: None,
            rule: None,
            message: caps["msg"].to_string(),
        });
    }
    if parsed.errors.is_empty() && exit_code != 0 {
        return crash_error("chplcheck", exit_code, stderr);
    }
    parsed
}

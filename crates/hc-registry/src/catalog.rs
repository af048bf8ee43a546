//! The tool catalog. Adding support for a new linter or formatter is a
//! data change here: matcher, argv templates, parser, confidence, timeout,
//! and dependency set.

use std::path::Path;
use std::time::Duration;

use hc_core::FixConfidence;

use crate::descriptor::{FileMatch, ToolDescriptor};
use crate::parse;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Whole-project checkers (type checkers, provider resolution, template
/// rendering) get double the budget.
const HEAVY_TIMEOUT: Duration = Duration::from_secs(60);

fn path_str(file: &Path) -> String {
    file.to_string_lossy().into_owned()
}

fn args(fixed: &[&str], extra: &[String], file: &Path) -> Vec<String> {
    fixed
        .iter()
        .map(|s| s.to_string())
        .chain(extra.iter().cloned())
        .chain(std::iter::once(path_str(file)))
        .collect()
}

// Ansible content is selected by repository layout, never by bare
// extension: a random .yml file must not trigger ansible-lint.
fn ansible_predicate(path: &Path) -> bool {
    const MARKERS: &[&str] = &[
        "playbooks",
        "roles",
        "tasks",
        "handlers",
        "group_vars",
        "host_vars",
    ];
    let is_yaml = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|e| e == "yml" || e == "yaml");
    is_yaml
        && path
            .components()
            .any(|c| MARKERS.contains(&c.as_os_str().to_string_lossy().as_ref()))
}

fn dockerfile_predicate(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    name == "Dockerfile"
        || name.starts_with("Dockerfile.")
        || name.to_ascii_lowercase().ends_with(".dockerfile")
}

fn gitlab_ci_predicate(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name == ".gitlab-ci.yml")
}

fn black_check(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["--check", "--quiet"], extra, file)
}
fn black_fix(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["--quiet"], extra, file)
}

fn ruff_check(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["check", "--quiet", "--no-fix"], extra, file)
}
fn ruff_fix(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["check", "--quiet", "--fix"], extra, file)
}

fn mypy_check(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["--no-error-summary", "--no-color-output"], extra, file)
}

fn prettier_check(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["--check", "--log-level", "warn"], extra, file)
}
fn prettier_fix(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["--write", "--log-level", "warn"], extra, file)
}

fn eslint_check(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["--format", "unix"], extra, file)
}
fn eslint_fix(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["--fix", "--format", "unix"], extra, file)
}

fn yamllint_check(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["--format", "parsable"], extra, file)
}

fn taplo_check(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["fmt", "--check"], extra, file)
}
fn taplo_fix(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["fmt"], extra, file)
}

fn terraform_fmt_check(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["fmt", "-check"], extra, file)
}
fn terraform_fmt_fix(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["fmt"], extra, file)
}

fn terraform_validate_check(file: &Path, extra: &[String]) -> Vec<String> {
    let dir = file.parent().unwrap_or_else(|| Path::new("."));
    let mut argv = vec![
        format!("-chdir={}", dir.display()),
        "validate".to_string(),
        "-no-color".to_string(),
    ];
    argv.extend(extra.iter().cloned());
    argv
}

fn tflint_check(file: &Path, extra: &[String]) -> Vec<String> {
    let dir = file.parent().unwrap_or_else(|| Path::new("."));
    let mut argv = vec![
        "--format".to_string(),
        "compact".to_string(),
        format!("--chdir={}", dir.display()),
    ];
    argv.extend(extra.iter().cloned());
    argv
}

fn ansible_lint_check(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["-p", "--nocolor"], extra, file)
}
fn ansible_lint_fix(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["-p", "--nocolor", "--fix"], extra, file)
}

fn shellcheck_check(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["--format", "gcc"], extra, file)
}

fn shfmt_check(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["-d"], extra, file)
}
fn shfmt_fix(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["-w"], extra, file)
}

fn hadolint_check(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["--no-color"], extra, file)
}

fn gitlab_ci_check(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["--builtin-schema", "vendor.gitlab-ci"], extra, file)
}

fn chplcheck_check(file: &Path, extra: &[String]) -> Vec<String> {
    args(&[], extra, file)
}
fn chplcheck_fix(file: &Path, extra: &[String]) -> Vec<String> {
    args(&["--fix"], extra, file)
}

/// Every tool huskycat knows how to drive, in stable display order.
pub static CATALOG: &[ToolDescriptor] = &[
    ToolDescriptor {
        name: "black",
        executable: "black",
        matcher: FileMatch::Extensions(&["py"]),
        check_args: black_check,
        fix_args: Some(black_fix),
        parser: parse::parse_black,
        fix_confidence: FixConfidence::Safe,
        timeout: DEFAULT_TIMEOUT,
        depends_on: &[],
        slow: false,
    },
    ToolDescriptor {
        name: "ruff",
        executable: "ruff",
        matcher: FileMatch::Extensions(&["py"]),
        check_args: ruff_check,
        fix_args: Some(ruff_fix),
        parser: parse::parse_ruff,
        fix_confidence: FixConfidence::Likely,
        timeout: DEFAULT_TIMEOUT,
        // Lint after formatting so line/column findings refer to the final
        // layout.
        depends_on: &["black"],
        slow: false,
    },
    ToolDescriptor {
        name: "mypy",
        executable: "mypy",
        matcher: FileMatch::Extensions(&["py"]),
        check_args: mypy_check,
        fix_args: None,
        parser: parse::parse_mypy,
        fix_confidence: FixConfidence::Manual,
        timeout: HEAVY_TIMEOUT,
        depends_on: &["black", "ruff"],
        slow: true,
    },
    ToolDescriptor {
        name: "prettier",
        executable: "prettier",
        matcher: FileMatch::Extensions(&["js", "jsx", "ts", "tsx", "json", "css", "md"]),
        check_args: prettier_check,
        fix_args: Some(prettier_fix),
        parser: parse::parse_prettier,
        fix_confidence: FixConfidence::Safe,
        timeout: DEFAULT_TIMEOUT,
        depends_on: &[],
        slow: false,
    },
    ToolDescriptor {
        name: "eslint",
        executable: "eslint",
        matcher: FileMatch::Extensions(&["js", "jsx", "ts", "tsx"]),
        check_args: eslint_check,
        fix_args: Some(eslint_fix),
        parser: parse::parse_eslint,
        fix_confidence: FixConfidence::Likely,
        timeout: HEAVY_TIMEOUT,
        depends_on: &["prettier"],
        slow: false,
    },
    ToolDescriptor {
        name: "yamllint",
        executable: "yamllint",
        matcher: FileMatch::Extensions(&["yaml", "yml"]),
        check_args: yamllint_check,
        fix_args: None,
        parser: parse::parse_yamllint,
        fix_confidence: FixConfidence::Manual,
        timeout: DEFAULT_TIMEOUT,
        depends_on: &[],
        slow: false,
    },
    ToolDescriptor {
        name: "taplo",
        executable: "taplo",
        matcher: FileMatch::Extensions(&["toml"]),
        check_args: taplo_check,
        fix_args: Some(taplo_fix),
        parser: parse::parse_taplo,
        fix_confidence: FixConfidence::Safe,
        timeout: DEFAULT_TIMEOUT,
        depends_on: &[],
        slow: false,
    },
    ToolDescriptor {
        name: "terraform-fmt",
        executable: "terraform",
        matcher: FileMatch::Extensions(&["tf", "tfvars"]),
        check_args: terraform_fmt_check,
        fix_args: Some(terraform_fmt_fix),
        parser: parse::parse_terraform_fmt,
        fix_confidence: FixConfidence::Safe,
        timeout: DEFAULT_TIMEOUT,
        depends_on: &[],
        slow: false,
    },
    ToolDescriptor {
        name: "terraform-validate",
        executable: "terraform",
        matcher: FileMatch::Extensions(&["tf"]),
        check_args: terraform_validate_check,
        fix_args: None,
        parser: parse::parse_terraform_validate,
        fix_confidence: FixConfidence::Manual,
        timeout: HEAVY_TIMEOUT,
        depends_on: &["terraform-fmt"],
        slow: true,
    },
    ToolDescriptor {
        name: "tflint",
        executable: "tflint",
        matcher: FileMatch::Extensions(&["tf"]),
        check_args: tflint_check,
        fix_args: None,
        parser: parse::parse_tflint,
        fix_confidence: FixConfidence::Manual,
        timeout: HEAVY_TIMEOUT,
        depends_on: &["terraform-fmt"],
        slow: true,
    },
    ToolDescriptor {
        name: "ansible-lint",
        executable: "ansible-lint",
        matcher: FileMatch::Predicate(ansible_predicate),
        check_args: ansible_lint_check,
        fix_args: Some(ansible_lint_fix),
        parser: parse::parse_ansible_lint,
        fix_confidence: FixConfidence::Uncertain,
        timeout: HEAVY_TIMEOUT,
        depends_on: &["yamllint"],
        slow: true,
    },
    ToolDescriptor {
        name: "shellcheck",
        executable: "shellcheck",
        matcher: FileMatch::Extensions(&["sh", "bash"]),
        check_args: shellcheck_check,
        fix_args: None,
        parser: parse::parse_shellcheck,
        fix_confidence: FixConfidence::Manual,
        timeout: DEFAULT_TIMEOUT,
        depends_on: &[],
        slow: false,
    },
    ToolDescriptor {
        name: "shfmt",
        executable: "shfmt",
        matcher: FileMatch::Extensions(&["sh", "bash"]),
        check_args: shfmt_check,
        fix_args: Some(shfmt_fix),
        parser: parse::parse_shfmt,
        fix_confidence: FixConfidence::Safe,
        timeout: DEFAULT_TIMEOUT,
        depends_on: &[],
        slow: false,
    },
    ToolDescriptor {
        name: "hadolint",
        executable: "hadolint",
        matcher: FileMatch::Predicate(dockerfile_predicate),
        check_args: hadolint_check,
        fix_args: None,
        parser: parse::parse_hadolint,
        fix_confidence: FixConfidence::Manual,
        timeout: DEFAULT_TIMEOUT,
        depends_on: &[],
        slow: false,
    },
    ToolDescriptor {
        name: "gitlab-ci-lint",
        executable: "check-jsonschema",
        matcher: FileMatch::Predicate(gitlab_ci_predicate),
        check_args: gitlab_ci_check,
        fix_args: None,
        parser: parse::parse_gitlab_ci,
        fix_confidence: FixConfidence::Manual,
        timeout: HEAVY_TIMEOUT,
        depends_on: &["yamllint"],
        slow: true,
    },
    ToolDescriptor {
        name: "chplcheck",
        executable: "chplcheck",
        matcher: FileMatch::Extensions(&["chpl"]),
        check_args: chplcheck_check,
        fix_args: Some(chplcheck_fix),
        parser: parse::parse_chplcheck,
        fix_confidence: FixConfidence::Uncertain,
        timeout: DEFAULT_TIMEOUT,
        depends_on: &[],
        slow: false,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    #[test]
    fn catalog_names_are_unique() {
        let mut seen = HashSet::new();
        for descriptor in CATALOG {
            assert!(seen.insert(descriptor.name), "duplicate {}", descriptor.name);
        }
    }

    #[test]
    fn dependencies_reference_catalog_tools() {
        let names: HashSet<&str> = CATALOG.iter().map(|d| d.name).collect();
        for descriptor in CATALOG {
            for dep in descriptor.depends_on {
                assert!(names.contains(dep), "{} depends on unknown {dep}", descriptor.name);
            }
        }
    }

    #[test]
    fn catalog_dependency_graph_is_acyclic() {
        // Every dependency must appear earlier in the catalog; catalog order
        // is therefore already a topological order.
        let mut seen = HashSet::new();
        for descriptor in CATALOG {
            for dep in descriptor.depends_on {
                assert!(seen.contains(dep), "{} before its dependency {dep}", descriptor.name);
            }
            seen.insert(descriptor.name);
        }
    }

    #[test]
    fn ansible_predicate_requires_layout_marker() {
        assert!(ansible_predicate(&PathBuf::from("playbooks/site.yml")));
        assert!(ansible_predicate(&PathBuf::from("env/roles/web/tasks/main.yaml")));
        assert!(!ansible_predicate(&PathBuf::from("config/app.yml")), "bare yaml must not match");
        assert!(!ansible_predicate(&PathBuf::from("roles/readme.md")));
    }

    #[test]
    fn dockerfile_predicate_variants() {
        assert!(dockerfile_predicate(&PathBuf::from("Dockerfile")));
        assert!(dockerfile_predicate(&PathBuf::from("images/Dockerfile.alpine")));
        assert!(dockerfile_predicate(&PathBuf::from("build/web.dockerfile")));
        assert!(!dockerfile_predicate(&PathBuf::from("dockerfiles.txt")));
        assert!(!dockerfile_predicate(&PathBuf::from("compose.yml")));
    }

    #[test]
    fn gitlab_ci_predicate_is_exact() {
        assert!(gitlab_ci_predicate(&PathBuf::from(".gitlab-ci.yml")));
        assert!(gitlab_ci_predicate(&PathBuf::from("repo/.gitlab-ci.yml")));
        assert!(!gitlab_ci_predicate(&PathBuf::from("gitlab-ci.yml")));
    }

    #[test]
    fn argv_templates_place_extra_flags_before_file() {
        let extra = vec!["--line-length".to_string(), "100".to_string()];
        let argv = black_fix(&PathBuf::from("a.py"), &extra);
        assert_eq!(argv, ["--quiet", "--line-length", "100", "a.py"]);
    }

    #[test]
    fn timeouts_follow_the_thirty_sixty_split() {
        for descriptor in CATALOG {
            let expected = match descriptor.name {
                "mypy" | "eslint" | "terraform-validate" | "tflint" | "ansible-lint"
                | "gitlab-ci-lint" => HEAVY_TIMEOUT,
                _ => DEFAULT_TIMEOUT,
            };
            assert_eq!(descriptor.timeout, expected, "{}", descriptor.name);
        }
    }

    #[test]
    fn manual_tools_are_never_fixable() {
        for descriptor in CATALOG {
            if descriptor.fix_confidence == hc_core::FixConfidence::Manual {
                assert!(!descriptor.fixable(), "{}", descriptor.name);
            }
        }
    }
}

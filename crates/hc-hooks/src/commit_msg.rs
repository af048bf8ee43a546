//! Conventional commit-message check: `type(scope): subject` with a fixed
//! type set. Merge, revert, fixup and squash messages pass through
//! unchanged.

use std::sync::OnceLock;

use regex::Regex;

const TYPES: &[&str] = &["feat", "fix", "docs", "style", "refactor", "test", "chore"];

fn subject_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(feat|fix|docs|style|refactor|test|chore)(\([a-z0-9._/-]+\))?!?: \S.*$")
            .expect("static regex")
    })
}

/// Validate a commit message. Returns a human-readable rejection reason on
/// failure.
pub fn check_commit_message(message: &str) -> Result<(), String> {
    // First non-comment, non-empty line is the subject.
    let subject = message
        .lines()
        .find(|line| !line.trim().is_empty() && !line.starts_with('#'));
    let Some(subject) = subject else {
        return Err("empty commit message".to_string());
    };

    // Machine-generated messages are not ours to police.
    if subject.starts_with("Merge ")
        || subject.starts_with("Revert ")
        || subject.starts_with("fixup!")
        || subject.starts_with("squash!")
    {
        return Ok(());
    }

    if subject_regex().is_match(subject) {
        Ok(())
    } else {
        Err(format!(
            "commit subject must match 'type(scope): subject' with type in {{{}}}, got: {subject}",
            TYPES.join(", ")
        ))
    }
}

//! Environment-variable surface, all under the `HUSKYCAT_` prefix.

use hc_core::{AppError, Mode};

/// Parse a boolean feature-flag value, case-insensitively, from the
/// documented set {true, false, 1, 0, yes, no, on, off}.
pub fn parse_flag_value(flag: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(AppError::BadFlagValue {
            flag: flag.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Forced mode from `HUSKYCAT_MODE`, if set and valid.
pub fn mode_override() -> Result<Option<Mode>, AppError> {
    match std::env::var("HUSKYCAT_MODE") {
        Ok(value) if !value.is_empty() => value.parse().map(Some),
        _ => Ok(None),
    }
}

/// `HUSKYCAT_SKIP_HOOKS` bypasses validation entirely in GitHooks mode.
/// Any truthy value counts; unparseable values are ignored (hooks run).
pub fn skip_hooks_requested() -> bool {
    std::env::var("HUSKYCAT_SKIP_HOOKS")
        .ok()
        .and_then(|v| parse_flag_value("HUSKYCAT_SKIP_HOOKS", &v).ok())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_values_parse_case_insensitively() {
        for truthy in ["true", "TRUE", "1", "yes", "Yes", "on", "ON"] {
            assert!(parse_flag_value("f", truthy).unwrap(), "{truthy}");
        }
        for falsy in ["false", "FALSE", "0", "no", "No", "off", "OFF"] {
            assert!(!parse_flag_value("f", falsy).unwrap(), "{falsy}");
        }
    }

    #[test]
    fn bad_flag_value_is_config_error() {
        let err = parse_flag_value("parallel_execution", "maybe").unwrap_err();
        assert_eq!(err.exit_code(), hc_core::EXIT_CONFIG);
    }
}

//! Plan file validation helpers.
//!
//! These checks run before any planning happens, so that naming and
//! formatting mistakes are reported against the plan file rather than as
//! allocation failures.

use std::collections::HashSet;

/// Log levels accepted in `general.log_level`
const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Validate a log level name
///
/// # Examples
/// ```
/// use ipam_planner::utils::validation::validate_log_level;
///
/// assert!(validate_log_level("info").is_ok());
/// assert!(validate_log_level("DEBUG").is_ok());
/// assert!(validate_log_level("verbose").is_err());
/// ```
pub fn validate_log_level(level: &str) -> Result<(), String> {
    if LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(format!("Unknown log level '{}', expected one of {:?}", level, LOG_LEVELS))
    }
}

/// Check that a list of names is non-empty per entry and free of duplicates
///
/// # Arguments
/// * `kind` - What is being named, used in error messages (e.g. "pool")
/// * `names` - The names to check
///
/// # Examples
/// ```
/// use ipam_planner::utils::validation::validate_unique_names;
///
/// assert!(validate_unique_names("pool", ["root", "dev"]).is_ok());
/// assert!(validate_unique_names("pool", ["root", "root"]).is_err());
/// assert!(validate_unique_names("pool", ["root", ""]).is_err());
/// ```
pub fn validate_unique_names<'a>(kind: &str, names: impl IntoIterator<Item = &'a str>) -> Result<(), String> {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(format!("{} name cannot be empty", kind));
        }
        if !seen.insert(name) {
            return Err(format!("Duplicate {} name '{}'", kind, name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        for level in LOG_LEVELS {
            assert!(validate_log_level(level).is_ok());
        }
        assert!(validate_log_level("Warn").is_ok());
        assert!(validate_log_level("loud").is_err());
    }

    #[test]
    fn test_duplicate_names() {
        let err = validate_unique_names("scope", ["shared", "lab", "shared"]).unwrap_err();
        assert!(err.contains("Duplicate scope name 'shared'"));
    }
}

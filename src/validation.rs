//! Validation of the segments that make up a fully-qualified name.

use crate::{Result, SenvarError};

/// Validates one `app`, `stage` or `name` segment.
///
/// A segment must be non-empty, must not contain `/` (it would shift the
/// path structure), and must not contain control characters.
///
/// # Errors
///
/// Returns [`SenvarError::Configuration`] naming the offending field.
///
/// # Example
///
/// ```
/// use senvar::validation::validate_segment;
///
/// assert!(validate_segment("name", "dbPassword").is_ok());
/// assert!(validate_segment("name", "api-key.v2").is_ok());
///
/// assert!(validate_segment("app", "").is_err());
/// assert!(validate_segment("stage", "prod/eu").is_err());
/// ```
pub fn validate_segment(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(SenvarError::Configuration(format!("{} cannot be empty", field)));
    }

    if value.contains('/') {
        return Err(SenvarError::Configuration(format!(
            "{} must not contain '/': {}",
            field, value
        )));
    }

    if value.chars().any(char::is_control) {
        return Err(SenvarError::Configuration(format!(
            "{} contains control characters",
            field
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_segments() {
        assert!(validate_segment("name", "my-secret").is_ok());
        assert!(validate_segment("name", "API_KEY_123").is_ok());
        assert!(validate_segment("name", "database.password").is_ok());
        assert!(validate_segment("app", "shop").is_ok());
    }

    #[test]
    fn test_empty_segment() {
        let result = validate_segment("stage", "");
        assert!(result.unwrap_err().to_string().contains("stage cannot be empty"));
    }

    #[test]
    fn test_long_segment_accepted() {
        assert!(validate_segment("name", &"a".repeat(256)).is_ok());
    }

    #[test]
    fn test_slash_rejected() {
        let result = validate_segment("name", "nested/name");
        assert!(result.unwrap_err().to_string().contains("'/'"));
    }

    #[test]
    fn test_control_characters() {
        let result = validate_segment("name", "name\x01with\ncontrol");
        assert!(result.unwrap_err().to_string().contains("control"));
    }
}

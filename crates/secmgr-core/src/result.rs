//! Convenience result type alias for the security manager.

use crate::error::AppError;

/// A specialized `Result` type for security manager operations.
///
/// This is defined as a convenience so that every crate does not need to
/// write `Result<T, AppError>` explicitly.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn parse_minutes(raw: &str) -> AppResult<u64> {
        let minutes: u64 = serde_json::from_str(raw)?;
        if minutes == 0 {
            return Err(AppError::validation("Timeout must be positive"));
        }
        Ok(minutes)
    }

    #[test]
    fn test_question_mark_converts_into_app_error() {
        assert_eq!(parse_minutes("30").unwrap(), 30);
        assert_eq!(parse_minutes("\"x\"").unwrap_err().kind, ErrorKind::Serialization);
        assert_eq!(parse_minutes("0").unwrap_err().kind, ErrorKind::Validation);
    }
}

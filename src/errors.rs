//! Error types shared by the license manager and its host capabilities.

use thiserror::Error;

/// Errors raised while loading, storing or checking add-on licenses.
///
/// Public manager operations never surface these to callers; they are
/// logged and folded into the license data instead. Construction and the
/// host capabilities return them directly.
#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("storage error: {0}")]
    StorageError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("license server error: {0}")]
    ServerError(String),

    #[error("scheduler error: {0}")]
    SchedulerError(String),
}

/// Convenience alias used throughout the crate.
pub type LicenseResult<T> = Result<T, LicenseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_into_storage_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: LicenseError = io.into();
        assert!(matches!(err, LicenseError::StorageError(_)));
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn display_includes_context() {
        let err = LicenseError::ServerError("HTTP 503".to_string());
        assert_eq!(err.to_string(), "license server error: HTTP 503");
    }
}

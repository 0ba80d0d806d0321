use serde::Serialize;
use thiserror::Error;

/// Engine error types. The matcher and countdown never produce these; they
/// come from construction, configuration and the fired-set store.
#[derive(Debug, Clone, Serialize, Error)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    /// No usable clock source
    #[error("Clock error: {0}")]
    Clock(String),
    /// Errors related to fired-set persistence
    #[error("Storage error: {0}")]
    Storage(String),
    /// Invalid configuration values
    #[error("Config error: {0}")]
    Config(String),
    /// Errors related to data validation
    #[error("Validation error: {0}")]
    Validation(String),
    /// The background driver task failed or was already gone
    #[error("Engine error: {0}")]
    Engine(String),
}

// Convenience constructors
impl AppError {
    pub fn clock<S: Into<String>>(msg: S) -> Self {
        AppError::Clock(msg.into())
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        AppError::Storage(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        AppError::Config(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn engine<S: Into<String>>(msg: S) -> Self {
        AppError::Engine(msg.into())
    }
}

/// Result type alias for engine operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::storage("file not found");
        assert_eq!(err.to_string(), "Storage error: file not found");
    }

    #[test]
    fn test_clock_error_display() {
        let err = AppError::clock("clock reports 1969");
        assert!(err.to_string().starts_with("Clock error"));
    }

    #[test]
    fn test_error_constructors() {
        let storage_err = AppError::storage("test");
        assert!(matches!(storage_err, AppError::Storage(_)));

        let config_err = AppError::config("test");
        assert!(matches!(config_err, AppError::Config(_)));

        let engine_err = AppError::engine("test");
        assert!(matches!(engine_err, AppError::Engine(_)));
    }

    #[test]
    fn test_error_serialization() {
        let err = AppError::validation("invalid input");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("Validation"));
        assert!(json.contains("invalid input"));
    }
}

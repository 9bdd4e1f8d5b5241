use serde::Serialize;
use thiserror::Error;

/// Engine error types surfaced to the caller or kept as the last visible error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    /// Input rejected before any request was made
    #[error("Validation error: {0}")]
    Validation(String),
    /// Transport failure or non-success HTTP status
    #[error("Network error: {0}")]
    Network(String),
    /// Response that could not be decoded or made no sense
    #[error("API error: {0}")]
    Api(String),
    /// Errors related to local preference storage
    #[error("Storage error: {0}")]
    Storage(String),
    /// Reminder id unknown to the local store
    #[error("Not found: {0}")]
    NotFound(String),
}

// Convenience constructors
impl AppError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        AppError::Network(msg.into())
    }

    pub fn api<S: Into<String>>(msg: S) -> Self {
        AppError::Api(msg.into())
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        AppError::Storage(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        AppError::NotFound(msg.into())
    }

    /// Validation errors are the caller's to fix; everything else may succeed later.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AppError::Validation(_) | AppError::NotFound(_))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        AppError::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Api(error.to_string())
    }
}

impl From<ureq::Error> for AppError {
    fn from(error: ureq::Error) -> Self {
        match error {
            ureq::Error::Status(code, response) => {
                AppError::Network(format!("HTTP {} from {}", code, response.get_url()))
            }
            ureq::Error::Transport(transport) => AppError::Network(transport.to_string()),
        }
    }
}

/// Result type alias used across the engine
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
    fn test_error_constructors() {
        assert!(matches!(AppError::validation("x"), AppError::Validation(_)));
        assert!(matches!(AppError::network("x"), AppError::Network(_)));
        assert!(matches!(AppError::not_found("x"), AppError::NotFound(_)));
    }

    #[test]
    fn test_only_validation_and_not_found_are_final() {
        assert!(!AppError::validation("empty text").is_retryable());
        assert!(!AppError::not_found("reminder 3").is_retryable());
        assert!(AppError::network("timeout").is_retryable());
        assert!(AppError::api("bad json").is_retryable());
    }

    #[test]
    fn test_error_serialization() {
        let err = AppError::validation("invalid input");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("Validation"));
        assert!(json.contains("invalid input"));
    }
}

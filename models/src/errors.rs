// models/src/errors.rs

pub use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    /// A write-once field is already set, the status would not move forward,
    /// or an optimistic version check failed.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("{0} was not found")]
    NotFound(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Failed to acquire lock: {0}")]
    LockError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("An internal error occurred: {0}")]
    InternalError(String),
}

impl DispatchError {
    /// Errors a client recovers from by keeping its last state and trying
    /// again on the next cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DispatchError::NetworkError(_)
                | DispatchError::Timeout(_)
                | DispatchError::StorageError(_)
                | DispatchError::LockError(_)
        )
    }

    /// Errors that reject a single action without touching the request.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DispatchError::Conflict(_)
                | DispatchError::InvalidTransition(_)
                | DispatchError::NotFound(_)
                | DispatchError::Validation(_)
        )
    }

    pub fn request_not_found(id: u64) -> Self {
        DispatchError::NotFound(format!("emergency request {}", id))
    }

    pub fn hospital_not_found(id: u64) -> Self {
        DispatchError::NotFound(format!("hospital {}", id))
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::SerializationError(format!("JSON processing error: {}", err))
    }
}

/// A validation error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    /// An actor identifier has an invalid length.
    #[error("identifier has invalid length")]
    InvalidIdentifierLength,
    /// A latitude outside [-90, 90] or a non-finite value.
    #[error("latitude {0} is out of range")]
    InvalidLatitude(f64),
    /// A longitude outside [-180, 180] or a non-finite value.
    #[error("longitude {0} is out of range")]
    InvalidLongitude(f64),
    #[error("unknown nature of emergency: {0}")]
    UnknownNatureOfEmergency(String),
    #[error("unknown request status: {0}")]
    UnknownStatus(String),
    #[error("unknown actor role: {0}")]
    UnknownRole(String),
    /// A transition patch that sets nothing.
    #[error("patch does not set any field")]
    EmptyPatch,
    #[error("required field {0} is missing")]
    MissingField(&'static str),
    #[error("field {0} must not be empty")]
    EmptyField(&'static str),
    /// Input refused by a remote store, carrying its message.
    #[error("invalid input: {0}")]
    Rejected(String),
}

/// A type alias for a `Result` that returns a `DispatchError` on failure.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// A type alias for a `Result` that returns a `ValidationError` on failure.
pub type ValidationResult<T> = Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::{DispatchError, ValidationError};

    #[test]
    fn should_classify_transient_errors() {
        assert!(DispatchError::NetworkError("down".into()).is_transient());
        assert!(DispatchError::Timeout("slow".into()).is_transient());
        assert!(!DispatchError::Conflict("taken".into()).is_transient());
    }

    #[test]
    fn should_classify_rejections() {
        assert!(DispatchError::Conflict("taken".into()).is_rejection());
        assert!(DispatchError::from(ValidationError::EmptyPatch).is_rejection());
        assert!(!DispatchError::StorageError("disk".into()).is_rejection());
    }

    #[test]
    fn should_format_not_found() {
        assert_eq!(
            DispatchError::request_not_found(7).to_string(),
            "emergency request 7 was not found"
        );
    }
}

//! Shared error types for the Hippo memory engine.

use thiserror::Error;

/// Top-level error type for the Hippo system.
#[derive(Error, Debug)]
pub enum HippoError {
    /// The store stayed locked after every retry attempt. The caller may
    /// back off and retry the whole logical operation.
    #[error("Storage busy after {attempts} attempts: {reason}")]
    StorageBusy {
        /// How many attempts the store made before giving up.
        attempts: u32,
        /// The last lock error reported by SQLite.
        reason: String,
    },

    /// A persisted row or the schema violates an invariant. Fatal.
    #[error("Storage corrupt: {0}")]
    StorageCorrupt(String),

    /// Any other storage failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A status change that the soft-delete lifecycle does not allow.
    #[error("Invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        /// The record being changed.
        id: String,
        /// Its current status.
        from: String,
        /// The requested status.
        to: String,
    },

    /// The inference backend could not be reached or refused the call.
    #[error("Inference unavailable: {0}")]
    InferenceUnavailable(String),

    /// The inference backend answered with something that could not be parsed.
    #[error("Malformed inference response: {0}")]
    InferenceMalformedResponse(String),

    /// Configuration failed to load or validate. Fatal at startup.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HippoError {
    /// True when the caller may retry the whole logical operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HippoError::StorageBusy { .. })
    }

    /// True when the process should halt rather than continue a batch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HippoError::StorageCorrupt(_) | HippoError::ConfigInvalid(_)
        )
    }

    /// True for inference failures that only affect the current unit of work.
    pub fn is_recoverable_inference(&self) -> bool {
        matches!(
            self,
            HippoError::InferenceUnavailable(_) | HippoError::InferenceMalformedResponse(_)
        )
    }
}

impl From<serde_json::Error> for HippoError {
    fn from(e: serde_json::Error) -> Self {
        HippoError::Serialization(e.to_string())
    }
}

/// Alias for Result with HippoError.
pub type HippoResult<T> = Result<T, HippoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_is_retryable_not_fatal() {
        let err = HippoError::StorageBusy {
            attempts: 5,
            reason: "database is locked".to_string(),
        };
        assert!(err.is_retryable());
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("5 attempts"));
    }

    #[test]
    fn test_fatal_kinds() {
        assert!(HippoError::StorageCorrupt("bad status".into()).is_fatal());
        assert!(HippoError::ConfigInvalid("half_life_days".into()).is_fatal());
        assert!(!HippoError::InferenceUnavailable("down".into()).is_fatal());
    }

    #[test]
    fn test_inference_errors_recoverable() {
        assert!(HippoError::InferenceUnavailable("x".into()).is_recoverable_inference());
        assert!(HippoError::InferenceMalformedResponse("x".into()).is_recoverable_inference());
        assert!(!HippoError::Storage("x".into()).is_recoverable_inference());
    }
}

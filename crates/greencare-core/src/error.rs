//! Error types for the GreenCare advisory pipeline.

use serde::Serialize;
use thiserror::Error;

/// A shared error type for the entire GreenCare application.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait.
///
/// Note that a compliance `Blocked` verdict is deliberately *not* an error
/// variant: the gate resolves it fail-closed into the fallback disclaimer,
/// and a normalizer outage degrades the response instead of failing it.
#[derive(Error, Debug, Clone, Serialize)]
pub enum GreencareError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The current query alone (with zero history) exceeds the context budget.
    /// Fatal before dispatch; the caller must reject or shorten the query.
    #[error("Context too large: requires {required_bytes} bytes, budget is {budget_bytes}")]
    ContextTooLarge {
        budget_bytes: usize,
        required_bytes: usize,
    },

    /// Every specialist call failed after retries. Terminal for the request.
    #[error("All specialist dispatches failed: health: {health}; financial: {financial}")]
    DispatchFailed { health: String, financial: String },

    /// Persistence failure (profile/turn store). Surfaced to the caller but
    /// must never suppress an already-computed answer.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request was cancelled by the caller.
    #[error("Request cancelled")]
    Cancelled,

    /// The global request deadline elapsed before the pipeline finished.
    #[error("Request deadline of {deadline_secs}s exceeded")]
    DeadlineExceeded { deadline_secs: u64 },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GreencareError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error terminates the pipeline before any content is
    /// produced (converted into a "service unavailable, please retry" outcome
    /// by the surrounding application).
    pub fn is_terminal_for_request(&self) -> bool {
        matches!(
            self,
            Self::ContextTooLarge { .. }
                | Self::DispatchFailed { .. }
                | Self::Cancelled
                | Self::DeadlineExceeded { .. }
        )
    }
}

impl From<std::io::Error> for GreencareError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for GreencareError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for GreencareError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for GreencareError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from anyhow::Error (at binary boundaries)
impl From<anyhow::Error> for GreencareError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, GreencareError>`.
pub type Result<T> = std::result::Result<T, GreencareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_classification() {
        assert!(
            GreencareError::ContextTooLarge {
                budget_bytes: 10,
                required_bytes: 20
            }
            .is_terminal_for_request()
        );
        assert!(
            GreencareError::DispatchFailed {
                health: "timeout".into(),
                financial: "timeout".into()
            }
            .is_terminal_for_request()
        );
        assert!(!GreencareError::Persistence("disk full".into()).is_terminal_for_request());
    }

    #[test]
    fn io_conversion_keeps_kind() {
        let err: GreencareError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        match err {
            GreencareError::Io { message } => assert!(message.contains("NotFound")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}

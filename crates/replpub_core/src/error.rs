//! Error types for the publisher.

use crate::status::Status;
use thiserror::Error;

/// Result type for publisher operations.
pub type PublisherResult<T> = Result<T, PublisherError>;

/// Errors that can escape a capture entry point.
///
/// Replication failures only surface here when the configuration asks for
/// them to be reported and the call site permits raising.
#[derive(Debug, Error)]
pub enum PublisherError {
    /// The downstream replicator failed and the policy reports errors.
    #[error("replication failed: {status}")]
    Replication {
        /// Status of the failed replication call.
        status: Status,
    },

    /// A field value could not be converted between record formats.
    #[error("conversion error: {message}")]
    Conversion {
        /// Description of the failed conversion.
        message: String,
    },

    /// A record format or record image is malformed.
    #[error("invalid record format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl PublisherError {
    /// Creates a replication error carrying the given status.
    pub fn replication(status: Status) -> Self {
        Self::Replication { status }
    }

    /// Creates a conversion error.
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns the replication status if this error came from the replicator.
    #[must_use]
    pub fn status(&self) -> Option<&Status> {
        match self {
            Self::Replication { status } => Some(status),
            _ => None,
        }
    }
}

//! Error types for liveread

use thiserror::Error;

/// Failure reported by a [`TransferEndpoint`](crate::TransferEndpoint) call.
///
/// The first three variants are conditions the download loop knows how to
/// wait out. Everything else is fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("object not found")]
    NotFound,

    #[error("requested range not satisfiable")]
    RangeNotSatisfiable,

    #[error("response stream interrupted: {0}")]
    Interrupted(String),

    #[error("HTTP status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl EndpointError {
    /// Whether the condition is expected to clear up by itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EndpointError::NotFound
                | EndpointError::RangeNotSatisfiable
                | EndpointError::Interrupted(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum LiveReadError {
    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{operation} failed for {bucket}/{key}: {source}")]
    Endpoint {
        operation: &'static str,
        bucket: String,
        key: String,
        #[source]
        source: EndpointError,
    },

    #[error("No upload to complete")]
    NoUploadCreated,

    #[error("Invalid upload state: {0}")]
    InvalidState(String),

    #[error("Relay closed")]
    RelayClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LiveReadError {
    /// Wrap an endpoint failure with the operation and object it concerns.
    pub fn endpoint(
        operation: &'static str,
        bucket: &crate::BucketId,
        key: &crate::Key,
        source: EndpointError,
    ) -> Self {
        LiveReadError::Endpoint {
            operation,
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        }
    }
}

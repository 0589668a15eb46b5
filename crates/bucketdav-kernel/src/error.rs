//! Protocol-level error taxonomy.
//!
//! Every verb handler failure is a [`DavError`]; [`DavError::status`] is the
//! one place that turns it into a protocol status code.

use http::StatusCode;
use thiserror::Error;

use crate::vfs::StoreError;

/// Verb handler error.
#[derive(Debug, Error)]
pub enum DavError {
    /// Malformed or missing header, identical source and destination.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Capability missing, or a mutation aimed at a reserved boundary.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Unresolvable mount, missing configuration or missing source.
    #[error("not found: {0}")]
    NotFound(String),

    /// Target already exists or an ancestor is missing.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Destination exists and overwrite was disallowed.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Source and destination live on different mounts.
    #[error("cross-mount transfer from {source_mount} to {dest_mount} is not supported")]
    UnsupportedCrossMount {
        source_mount: String,
        dest_mount: String,
    },

    /// A multi-object operation stopped after `completed` objects.
    ///
    /// Objects already transferred are left in place.
    #[error("partial failure after {completed} objects at {failed_key}: {source}")]
    PartialFailure {
        completed: usize,
        failed_key: String,
        source: StoreError,
    },

    /// Method not handled by this server.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Opaque storage failure.
    #[error("backend error: {0}")]
    Backend(StoreError),
}

impl DavError {
    /// Create a BadRequest error.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Create a Forbidden error.
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Create a NotFound error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a Conflict error.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a PreconditionFailed error.
    pub fn precondition_failed(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    /// Protocol status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            DavError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DavError::Forbidden(_) => StatusCode::FORBIDDEN,
            DavError::NotFound(_) => StatusCode::NOT_FOUND,
            DavError::Conflict(_) => StatusCode::CONFLICT,
            DavError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            DavError::UnsupportedCrossMount { .. } => StatusCode::BAD_GATEWAY,
            DavError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            DavError::PartialFailure { .. } | DavError::Backend(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// A storage 404 is a protocol 404; anything else stays opaque.
impl From<StoreError> for DavError {
    fn from(e: StoreError) -> Self {
        if e.is_not_found() {
            DavError::NotFound(e.to_string())
        } else {
            DavError::Backend(e)
        }
    }
}

/// Verb handler result type.
pub type DavResult<T> = Result<T, DavError>;

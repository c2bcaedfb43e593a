//! Error types for git-lfs-gateway operations.
//!
//! Every failure a handler can report, whether raised locally during request
//! validation or by one of the injected backends, is one of these variants.
//! The `Display` output of each variant is exactly the message sent to the client.

use serde::Serialize;
use thiserror::Error;

use crate::locks::Lock;

/// Result type for git-lfs-gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving an LFS request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The request (or one of its objects) failed validation
    #[error("{0}")]
    Validation(String),

    /// The repository does not exist for the user
    #[error("{0}")]
    RepositoryNotFound(String),

    /// The user has read, but not write access
    #[error("{0}")]
    RepositoryReadOnly(String),

    /// The user hit a rate limit
    #[error("{0}")]
    RateLimitExceeded(String),

    /// The bandwidth limit for the user or repository was exceeded
    #[error("{0}")]
    BandwidthLimitExceeded(String),

    /// The server ran out of storage
    #[error("{0}")]
    InsufficientStorage(String),

    /// LFS (or file locking) is not available
    #[error("{0}")]
    Unavailable(String),

    /// Credentials are missing or were rejected
    #[error("{0}")]
    Unauthorized(String),

    /// A lock already covers the requested path
    #[error("{message}")]
    LockExists { message: String, lock: Box<Lock> },

    /// The lock operation is not allowed for this user
    #[error("{0}")]
    LockUnauthorized(String),

    /// A request the gateway cannot route, such as a malformed lock path
    #[error("{0}")]
    Protocol(String),

    /// Any other failure; the detail is logged, never sent to the client
    #[error("{0}")]
    Internal(String),
}

/// Message sent to the client in place of an [`Error::Internal`] detail.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Discriminant of [`Error`], one per row of the status table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidationError,
    RepositoryNotFound,
    RepositoryReadOnly,
    RateLimitExceeded,
    BandwidthLimitExceeded,
    InsufficientStorage,
    ServiceUnavailable,
    Unauthorized,
    LockConflict,
    LockOperationUnauthorized,
    Internal,
}

impl ErrorKind {
    /// HTTP status code the LFS protocol prescribes for this kind of error.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::ValidationError => 422,
            ErrorKind::RepositoryNotFound => 404,
            ErrorKind::RepositoryReadOnly => 403,
            ErrorKind::RateLimitExceeded => 429,
            ErrorKind::BandwidthLimitExceeded => 509,
            ErrorKind::InsufficientStorage => 507,
            ErrorKind::ServiceUnavailable => 503,
            ErrorKind::Unauthorized => 401,
            ErrorKind::LockConflict => 409,
            ErrorKind::LockOperationUnauthorized => 403,
            ErrorKind::Internal => 500,
        }
    }
}

/// JSON body of an error response.
///
/// `lock` is only present for lock conflicts.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody<'a> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<&'a Lock>,
}

impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Create a generic protocol error. Its message is sent to the client.
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(message.into())
    }

    /// Create an internal error. Its message is only logged.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }

    /// Create a lock conflict error carrying the lock that already exists.
    pub fn lock_exists(message: impl Into<String>, lock: Lock) -> Self {
        Error::LockExists {
            message: message.into(),
            lock: Box::new(lock),
        }
    }

    /// Create an error for a lock operation the user may not perform.
    pub fn lock_unauthorized(operation: &str, path: &str) -> Self {
        Error::LockUnauthorized(format!(
            "Not authorized to {} lock for path {}",
            operation, path
        ))
    }

    /// Get the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::ValidationError,
            Error::RepositoryNotFound(_) => ErrorKind::RepositoryNotFound,
            Error::RepositoryReadOnly(_) => ErrorKind::RepositoryReadOnly,
            Error::RateLimitExceeded(_) => ErrorKind::RateLimitExceeded,
            Error::BandwidthLimitExceeded(_) => ErrorKind::BandwidthLimitExceeded,
            Error::InsufficientStorage(_) => ErrorKind::InsufficientStorage,
            Error::Unavailable(_) => ErrorKind::ServiceUnavailable,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::LockExists { .. } => ErrorKind::LockConflict,
            Error::LockUnauthorized(_) => ErrorKind::LockOperationUnauthorized,
            Error::Protocol(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Get the JSON body for this error.
    pub fn body(&self) -> ErrorBody<'_> {
        let lock = match self {
            Error::LockExists { lock, .. } => Some(lock.as_ref()),
            _ => None,
        };
        let message = match self {
            Error::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        };
        ErrorBody { message, lock }
    }
}

//! Transport-neutral HTTP responses.
//!
//! Handlers never talk to a web framework directly. They produce an
//! [`LfsResponse`] which the embedding server copies onto the wire.

use serde::Serialize;

use crate::Error;

/// Content type used by both LFS APIs, for requests and responses.
pub const CONTENT_TYPE: &str = "application/vnd.git-lfs+json; charset=utf-8";

/// Body sent when a response cannot be serialized.
const SERIALIZATION_FAILED: &[u8] = br#"{"message":"failed to serialize response"}"#;

/// A status code plus a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LfsResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON-encoded body.
    pub body: Vec<u8>,
}

impl LfsResponse {
    /// Serialize `value` as the body of a response with the given status.
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => LfsResponse { status, body },
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize LFS response");
                LfsResponse {
                    status: 500,
                    body: SERIALIZATION_FAILED.to_vec(),
                }
            }
        }
    }

    /// Render the outcome of a handler: `status` on success, the error table otherwise.
    pub fn from_result<T: Serialize>(status: u16, result: crate::Result<T>) -> Self {
        match result {
            Ok(value) => LfsResponse::json(status, &value),
            Err(err) => LfsResponse::from(err),
        }
    }

    /// Get the content type of this response.
    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    /// Decode the body as JSON.
    pub fn json_body(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

impl From<Error> for LfsResponse {
    fn from(err: Error) -> Self {
        let status = err.status_code();
        match &err {
            Error::Internal(detail) => {
                tracing::error!(status, error = %detail, "LFS request failed");
            }
            Error::Protocol(message) => {
                tracing::warn!(status, error = %message, "malformed LFS request");
            }
            other => {
                tracing::debug!(status, error = %other, "LFS request rejected");
            }
        }
        LfsResponse::json(status, &err.body())
    }
}

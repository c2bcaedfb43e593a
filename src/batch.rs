//! LFS Batch API types.
//!
//! The Batch API is used to request upload/download/verify actions for LFS objects.
//! See: https://github.com/git-lfs/git-lfs/blob/main/docs/api/batch.md

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// The only transfer adapter this gateway speaks.
pub const BASIC_TRANSFER: &str = "basic";

/// Operation type for batch requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Download objects from the server.
    Download,
    /// Upload objects to the server.
    Upload,
    /// Verify objects were stored by the server.
    Verify,
}

impl Operation {
    /// Get the wire name of this operation.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Download => "download",
            Operation::Upload => "upload",
            Operation::Verify => "verify",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "download" => Ok(Operation::Download),
            "upload" => Ok(Operation::Upload),
            "verify" => Ok(Operation::Verify),
            other => Err(Error::validation(format!("Invalid operation: {}", other))),
        }
    }
}

/// Reference information for a batch or lock request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefInfo {
    /// The fully-qualified reference name (e.g., "refs/heads/main").
    pub name: String,
}

/// An object in a batch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSpec {
    /// The object id, opaque to the gateway.
    pub oid: String,
    /// The size of the object in bytes.
    #[serde(default)]
    pub size: u64,
}

impl ObjectSpec {
    /// Create a new object spec.
    pub fn new(oid: &str, size: u64) -> Self {
        ObjectSpec {
            oid: oid.to_string(),
            size,
        }
    }
}

/// Batch request as it arrives on the wire, before validation.
#[derive(Debug, Deserialize)]
struct WireBatchRequest {
    operation: String,
    #[serde(default)]
    objects: Vec<ObjectSpec>,
    #[serde(default)]
    r#ref: Option<RefInfo>,
    #[serde(default)]
    transfers: Option<Vec<String>>,
}

/// A validated batch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    operation: Operation,
    objects: Vec<ObjectSpec>,
    r#ref: Option<RefInfo>,
    transfers: Option<Vec<String>>,
}

impl BatchRequest {
    /// Create a request with no ref and no transfer list ("basic" implied).
    pub fn new(operation: Operation, objects: Vec<ObjectSpec>) -> Self {
        BatchRequest {
            operation,
            objects,
            r#ref: None,
            transfers: None,
        }
    }

    /// Parse and validate a JSON request body.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let wire: WireBatchRequest = serde_json::from_slice(body)
            .map_err(|e| Error::validation(format!("Invalid batch request: {}", e)))?;
        BatchRequest::from_wire(wire)
    }

    /// Set the reference for this request.
    pub fn with_ref(mut self, name: &str) -> Self {
        self.r#ref = Some(RefInfo {
            name: name.to_string(),
        });
        self
    }

    /// Set the transfer adapters the client supports. Must include "basic".
    pub fn with_transfers(mut self, transfers: Vec<String>) -> Result<Self> {
        check_transfers(&transfers)?;
        self.transfers = Some(transfers);
        Ok(self)
    }

    /// Get the operation.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Get the requested objects, in request order.
    pub fn objects(&self) -> &[ObjectSpec] {
        &self.objects
    }

    /// Get the ref name the objects belong to.
    pub fn ref_name(&self) -> Option<&str> {
        self.r#ref.as_ref().map(|r| r.name.as_str())
    }

    /// Get the transfer adapters declared by the client.
    pub fn transfers(&self) -> Option<&[String]> {
        self.transfers.as_deref()
    }

    fn from_wire(wire: WireBatchRequest) -> Result<Self> {
        let operation = wire.operation.parse()?;
        if let Some(transfers) = &wire.transfers {
            check_transfers(transfers)?;
        }
        Ok(BatchRequest {
            operation,
            objects: wire.objects,
            r#ref: wire.r#ref,
            transfers: wire.transfers,
        })
    }
}

fn check_transfers(transfers: &[String]) -> Result<()> {
    if transfers.iter().any(|t| t == BASIC_TRANSFER) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "Missing 'basic' in transfer property: {:?}",
            transfers
        )))
    }
}

/// A batch response from the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// The transfer adapter to use.
    #[serde(default = "default_transfer")]
    pub transfer: String,
    /// The objects with their actions.
    pub objects: Vec<ObjectResponse>,
}

fn default_transfer() -> String {
    BASIC_TRANSFER.to_string()
}

impl BatchResponse {
    /// Create a "basic" transfer response.
    pub fn new(objects: Vec<ObjectResponse>) -> Self {
        BatchResponse {
            transfer: default_transfer(),
            objects,
        }
    }
}

/// An object in a batch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectResponse {
    /// The object id, echoed from the request.
    pub oid: String,
    /// The size of the object in bytes.
    pub size: u64,
    /// Whether the actions are already authenticated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticated: Option<bool>,
    /// Actions available for this object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<HashMap<String, Action>>,
    /// Error information if the object failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ObjectError>,
}

impl ObjectResponse {
    /// An entry for `object` with no actions.
    pub fn new(object: &ObjectSpec) -> Self {
        ObjectResponse {
            oid: object.oid.clone(),
            size: object.size,
            authenticated: None,
            actions: None,
            error: None,
        }
    }

    /// Add an action under `name` ("download", "upload" or "verify").
    pub fn with_action(mut self, name: &str, action: Action) -> Self {
        self.actions
            .get_or_insert_with(HashMap::new)
            .insert(name.to_string(), action);
        self
    }

    /// Mark this entry as failed.
    pub fn with_error(mut self, code: u16, message: impl Into<String>) -> Self {
        self.error = Some(ObjectError {
            code,
            message: message.into(),
        });
        self
    }

    /// Get the download action if available.
    pub fn download_action(&self) -> Option<&Action> {
        self.actions.as_ref()?.get("download")
    }

    /// Get the upload action if available.
    pub fn upload_action(&self) -> Option<&Action> {
        self.actions.as_ref()?.get("upload")
    }

    /// Get the verify action if available (for uploads).
    pub fn verify_action(&self) -> Option<&Action> {
        self.actions.as_ref()?.get("verify")
    }

    /// Check if this object has an error.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// An action (upload/download/verify URL) for an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// The URL for the action.
    pub href: String,
    /// HTTP headers to include in the request.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub header: HashMap<String, String>,
    /// Seconds until the action expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Absolute expiration time (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl Action {
    /// Create an action pointing at `href`.
    pub fn new(href: impl Into<String>) -> Self {
        Action {
            href: href.into(),
            header: HashMap::new(),
            expires_in: None,
            expires_at: None,
        }
    }

    /// Add a header the client must send with the action.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.header.insert(name.to_string(), value.to_string());
        self
    }

    /// Set a relative expiry.
    pub fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(seconds);
        self
    }
}

/// Error information for a batch object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectError {
    /// HTTP status code.
    pub code: u16,
    /// Error message.
    pub message: String,
}

//! # git-lfs-gateway
//!
//! Server side of the Git LFS (Large File Storage) Batch and File Locking APIs.
//!
//! This crate provides:
//! - Batch API request validation and per-operation upload/download/verify responses
//! - File Locking API create/list/verify/unlock endpoints
//! - Basic-Auth username extraction and read/write access checks
//! - The LFS error taxonomy and its mapping onto HTTP status codes
//! - Optional axum wiring (`server` feature)
//!
//! Object storage, lock persistence and the authorization policy are supplied
//! by the embedder through the [`LargeFileRepository`], [`LockManager`] and
//! [`RepositoryAccessor`] traits.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use git_lfs_gateway::{
//!     Action, BatchHandler, LargeFileRepository, RequestContext, Result,
//! };
//!
//! struct Store;
//!
//! impl LargeFileRepository for Store {
//!     fn size(&self, _oid: &str) -> Result<Option<u64>> {
//!         Ok(None)
//!     }
//!     fn download_action(&self, oid: &str) -> Result<Action> {
//!         Ok(Action::new(format!("https://cdn.example.com/{}", oid)))
//!     }
//!     fn upload_action(&self, oid: &str, _size: u64) -> Result<Action> {
//!         Ok(Action::new(format!("https://cdn.example.com/{}", oid)))
//!     }
//!     fn verify_action(&self, _oid: &str) -> Result<Option<Action>> {
//!         Ok(None)
//!     }
//! }
//!
//! let handler = BatchHandler::new(Arc::new(Store));
//! let ctx = RequestContext::new().with_basic_auth("alice", "secret");
//! let response = handler.handle(
//!     &ctx,
//!     br#"{"operation":"upload","objects":[{"oid":"abc","size":3}]}"#,
//! );
//! assert_eq!(response.status, 200);
//! ```

mod access;
mod auth;
mod batch;
mod config;
mod error;
mod locking;
mod locks;
mod protocol;
mod response;
mod transfer;

#[cfg(feature = "server")]
pub mod server;

pub use access::{Access, AccessGate, RepositoryAccessor};
pub use auth::{resolve_principal, Principal, RequestContext};
pub use batch::{
    Action, BatchRequest, BatchResponse, ObjectError, ObjectResponse, ObjectSpec, Operation,
    RefInfo, BASIC_TRANSFER,
};
pub use config::GatewayConfig;
pub use error::{Error, ErrorBody, ErrorKind, Result, INTERNAL_ERROR_MESSAGE};
pub use locking::{LockAction, LockingHandler};
pub use locks::{
    CreateLockRequest, DeleteLockRequest, Lock, LockFilter, LockList, LockManager, LockOwner,
    LockResponse, LocksToVerify, VerifyLocksRequest,
};
pub use protocol::BatchHandler;
pub use response::{LfsResponse, CONTENT_TYPE};
pub use transfer::{for_operation, LargeFileRepository, TransferHandler};

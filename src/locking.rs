//! LFS File Locking API endpoints.
//!
//! Serves, relative to the locks base path:
//!
//! - `GET  /locks` - list locks
//! - `POST /locks` - create a lock
//! - `POST /locks/verify` - list locks for verification, split into ours/theirs
//! - `POST /locks/:id/unlock` - delete a lock
//!
//! The routes below `/locks` are resolved here from the path info so that a
//! malformed path is reported in the protocol's own error format.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::access::{AccessGate, RepositoryAccessor};
use crate::locks::{
    CreateLockRequest, DeleteLockRequest, Lock, LockFilter, LockList, LockManager, LockResponse,
    LocksToVerify, VerifyLocksRequest,
};
use crate::{Error, LfsResponse, Principal, RequestContext, Result};

/// The locking operations, as seen by the access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockAction {
    ListLocks,
    CreateLock,
    ListLocksToVerify,
    DeleteLock,
}

/// Handler for the file locking endpoints.
///
/// This type is cheaply cloneable - clones share the same backends.
#[derive(Clone, Default)]
pub struct LockingHandler {
    lock_manager: Option<Arc<dyn LockManager>>,
    gate: AccessGate,
}

impl LockingHandler {
    /// Create a handler with no lock manager; every call reports locking as unavailable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve locks from `lock_manager`.
    pub fn with_lock_manager(mut self, lock_manager: Arc<dyn LockManager>) -> Self {
        self.lock_manager = Some(lock_manager);
        self
    }

    /// Check read/write access to the main repository with `accessor`.
    pub fn with_accessor(mut self, accessor: Arc<dyn RepositoryAccessor>) -> Self {
        self.gate = AccessGate::new(accessor);
        self
    }

    /// Handle `GET /locks`. `path_info` is whatever followed `/locks` in the URL.
    pub fn handle_get(
        &self,
        ctx: &RequestContext,
        path_info: Option<&str>,
        query: Option<&str>,
    ) -> LfsResponse {
        tracing::debug!(?path_info, ?query, "locks GET");
        LfsResponse::from_result(200, self.get(ctx, path_info, query))
    }

    fn get(
        &self,
        ctx: &RequestContext,
        path_info: Option<&str>,
        query: Option<&str>,
    ) -> Result<LockList> {
        if let Some(path_info) = path_info.filter(|p| !p.is_empty()) {
            return Err(Error::protocol(format!(
                "Invalid path info in the GET request: {}",
                path_info
            )));
        }
        let filter = LockFilter::from_query(query.unwrap_or(""))?;
        let principal = ctx.principal()?;
        self.list_locks(&principal, &filter)
    }

    /// Handle `POST /locks`, `POST /locks/verify` and `POST /locks/:id/unlock`.
    pub fn handle_post(
        &self,
        ctx: &RequestContext,
        path_info: Option<&str>,
        body: &[u8],
    ) -> LfsResponse {
        tracing::debug!(?path_info, "locks POST");
        let principal = match ctx.principal() {
            Ok(principal) => principal,
            Err(err) => return err.into(),
        };

        match path_info.filter(|p| !p.is_empty()) {
            None => LfsResponse::from_result(
                201,
                parse_body(body).and_then(|request| {
                    self.create_lock(&principal, &request)
                        .map(|lock| LockResponse { lock })
                }),
            ),
            Some("/verify") => LfsResponse::from_result(
                200,
                parse_body(body).and_then(|request| self.verify_locks(&principal, &request)),
            ),
            Some(path_info) => LfsResponse::from_result(
                200,
                unlock_id(path_info).and_then(|id| {
                    let request = parse_body(body)?;
                    self.delete_lock(&principal, id, &request)
                        .map(|lock| LockResponse { lock })
                }),
            ),
        }
    }

    /// List locks. Requires read access.
    pub fn list_locks(&self, principal: &Principal, filter: &LockFilter) -> Result<LockList> {
        self.gate
            .check(LockAction::ListLocks, filter.refspec.as_deref(), principal)?;
        let lock_manager = self.lock_manager()?;
        tracing::debug!(
            path = ?filter.path,
            id = ?filter.id,
            cursor = ?filter.cursor,
            limit = filter.limit,
            refspec = ?filter.refspec,
            "retrieving locks"
        );
        lock_manager.list_locks(filter)
    }

    /// Create a lock held by `principal`. Requires write access.
    pub fn create_lock(&self, principal: &Principal, request: &CreateLockRequest) -> Result<Lock> {
        let ref_name = request.ref_name();
        self.gate
            .check(LockAction::CreateLock, ref_name, principal)?;
        let lock_manager = self.lock_manager()?;
        tracing::debug!(
            path = %request.path,
            ref_name = ?ref_name,
            username = ?principal.username(),
            "creating lock"
        );
        lock_manager.create_lock(&request.path, ref_name, principal.username())
    }

    /// List locks on a ref, split into those `principal` holds and the rest.
    ///
    /// Requires write access, like the other mutating lock operations.
    pub fn verify_locks(
        &self,
        principal: &Principal,
        request: &VerifyLocksRequest,
    ) -> Result<LocksToVerify> {
        let ref_name = request.ref_name();
        self.gate
            .check(LockAction::ListLocksToVerify, ref_name, principal)?;
        let lock_manager = self.lock_manager()?;
        let limit = request.limit.unwrap_or(0);
        tracing::debug!(
            cursor = ?request.cursor,
            limit,
            ref_name = ?ref_name,
            username = ?principal.username(),
            "retrieving locks for verification"
        );
        let page = lock_manager.list_locks_to_verify(
            ref_name,
            principal.username(),
            request.cursor.as_deref(),
            limit,
        )?;
        Ok(LocksToVerify::partition(page, principal.username()))
    }

    /// Delete lock `id`. Requires write access.
    ///
    /// `force` is dropped unless `principal` is a lock administrator.
    pub fn delete_lock(
        &self,
        principal: &Principal,
        id: &str,
        request: &DeleteLockRequest,
    ) -> Result<Lock> {
        let ref_name = request.ref_name();
        self.gate
            .check(LockAction::DeleteLock, ref_name, principal)?;
        let lock_manager = self.lock_manager()?;
        let force =
            request.force && lock_manager.is_lock_administrator(principal.username())?;
        tracing::debug!(
            id,
            ref_name = ?ref_name,
            username = ?principal.username(),
            force,
            "deleting lock"
        );
        lock_manager.delete_lock(id, ref_name, principal.username(), force)
    }

    fn lock_manager(&self) -> Result<&dyn LockManager> {
        self.lock_manager
            .as_deref()
            .ok_or_else(|| Error::Unavailable("LFS file locking service is unavailable".into()))
    }
}

impl std::fmt::Debug for LockingHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockingHandler")
            .field("lock_manager", &self.lock_manager.is_some())
            .field("gate", &self.gate)
            .finish()
    }
}

/// Extract the lock id from a `/:id/unlock` path. Trailing slashes are ignored.
fn unlock_id(path_info: &str) -> Result<&str> {
    let invalid =
        || Error::protocol(format!("Invalid delete lock endpoint: {}", path_info));
    let rest = path_info
        .strip_prefix('/')
        .ok_or_else(invalid)?
        .trim_end_matches('/');
    let mut segments = rest.split('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(id), Some("unlock"), None) if !id.is_empty() => Ok(id),
        _ => Err(invalid()),
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| Error::validation(format!("Invalid locking request: {}", e)))
}

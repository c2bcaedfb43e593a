//! In-memory collaborators shared by the integration tests.
//!
//! Note: #[allow(dead_code)] because each test file compiles common/ separately.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use git_lfs_gateway::{
    Action, BatchHandler, BatchRequest, Error, LargeFileRepository, Lock, LockFilter, LockList,
    LockManager, LockingHandler, Operation, Principal, RepositoryAccessor, Result,
};

/// Page size the lock manager applies when the client sets no limit.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Object store keeping sizes in a map and counting every backend call.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, u64>>,
    with_verify: bool,
    failure: Mutex<Option<Error>>,
    refusal: Mutex<Option<Error>>,
    opens: Mutex<Vec<(Operation, Option<String>)>>,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that asks clients to call a verify action after uploading.
    pub fn with_verify() -> Self {
        MemoryStore {
            with_verify: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, oid: &str, size: u64) {
        self.objects.lock().unwrap().insert(oid.to_string(), size);
    }

    /// Make every subsequent per-object call fail with `err`.
    pub fn fail_with(&self, err: Error) {
        *self.failure.lock().unwrap() = Some(err);
    }

    /// Refuse every subsequent request in `open` with `err`.
    pub fn refuse_with(&self, err: Error) {
        *self.refusal.lock().unwrap() = Some(err);
    }

    /// Every `open` call as (operation, username).
    pub fn opens(&self) -> Vec<(Operation, Option<String>)> {
        self.opens.lock().unwrap().clone()
    }

    /// Number of per-object calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl LargeFileRepository for MemoryStore {
    fn open(&self, request: &BatchRequest, principal: &Principal) -> Result<()> {
        self.opens.lock().unwrap().push((
            request.operation(),
            principal.username().map(String::from),
        ));
        match self.refusal.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn size(&self, oid: &str) -> Result<Option<u64>> {
        self.enter()?;
        Ok(self.objects.lock().unwrap().get(oid).copied())
    }

    fn download_action(&self, oid: &str) -> Result<Action> {
        self.enter()?;
        Ok(Action::new(format!("https://objects.test/{}", oid))
            .with_header("Authorization", "RemoteAuth download")
            .with_expires_in(3600))
    }

    fn upload_action(&self, oid: &str, size: u64) -> Result<Action> {
        self.enter()?;
        Ok(Action::new(format!("https://objects.test/{}", oid))
            .with_header("Content-Length", &size.to_string()))
    }

    fn verify_action(&self, oid: &str) -> Result<Option<Action>> {
        self.enter()?;
        Ok(self
            .with_verify
            .then(|| Action::new(format!("https://objects.test/{}/verify", oid))))
    }
}

/// Lock manager holding locks in creation order.
#[derive(Default)]
pub struct MemoryLockManager {
    locks: Mutex<Vec<Lock>>,
    admins: HashSet<String>,
    calls: AtomicUsize,
    deletes: Mutex<Vec<(String, Option<String>, bool)>>,
}

impl MemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admin(mut self, username: &str) -> Self {
        self.admins.insert(username.to_string());
        self
    }

    /// Insert a lock directly, bypassing the gateway.
    pub fn seed(&self, path: &str, owner: Option<&str>) -> Lock {
        let lock = Lock::new(&uuid::Uuid::new_v4().to_string(), path, owner, Utc::now());
        self.locks.lock().unwrap().push(lock.clone());
        lock
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every `delete_lock` call as (id, username, force).
    pub fn deletes(&self) -> Vec<(String, Option<String>, bool)> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    fn page(locks: Vec<Lock>, cursor: Option<&str>, limit: u32) -> Result<LockList> {
        let start = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| Error::validation(format!("bad cursor {}", cursor)))?,
            None => 0,
        };
        let size = if limit == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            limit as usize
        };
        let end = (start + size).min(locks.len());
        let next_cursor = (end < locks.len()).then(|| end.to_string());
        Ok(LockList {
            locks: locks.get(start..end).map(<[Lock]>::to_vec).unwrap_or_default(),
            next_cursor,
        })
    }
}

impl LockManager for MemoryLockManager {
    fn create_lock(
        &self,
        path: &str,
        _ref_name: Option<&str>,
        username: Option<&str>,
    ) -> Result<Lock> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut locks = self.locks.lock().unwrap();
        if let Some(existing) = locks.iter().find(|l| l.path == path) {
            return Err(Error::lock_exists("already created lock", existing.clone()));
        }
        let lock = Lock::new(&uuid::Uuid::new_v4().to_string(), path, username, Utc::now());
        locks.push(lock.clone());
        Ok(lock)
    }

    fn list_locks(&self, filter: &LockFilter) -> Result<LockList> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let matching: Vec<Lock> = self
            .locks
            .lock()
            .unwrap()
            .iter()
            .filter(|l| filter.path.as_deref().map_or(true, |p| l.path == p))
            .filter(|l| filter.id.as_deref().map_or(true, |id| l.id == id))
            .cloned()
            .collect();
        Self::page(matching, filter.cursor.as_deref(), filter.limit)
    }

    fn list_locks_to_verify(
        &self,
        _ref_name: Option<&str>,
        _username: Option<&str>,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<LockList> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let all = self.locks.lock().unwrap().clone();
        Self::page(all, cursor, limit)
    }

    fn delete_lock(
        &self,
        id: &str,
        _ref_name: Option<&str>,
        username: Option<&str>,
        force: bool,
    ) -> Result<Lock> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.deletes.lock().unwrap().push((
            id.to_string(),
            username.map(String::from),
            force,
        ));
        let mut locks = self.locks.lock().unwrap();
        let index = locks
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| Error::LockUnauthorized(format!("Lock {} not found", id)))?;
        if !force && !locks[index].is_owned_by(username) {
            return Err(Error::lock_unauthorized("delete", &locks[index].path));
        }
        Ok(locks.remove(index))
    }

    fn is_lock_administrator(&self, username: Option<&str>) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(username.map_or(false, |u| self.admins.contains(u)))
    }
}

/// Accessor that records every check and denies what it is told to.
#[derive(Default)]
pub struct RecordingAccessor {
    checks: Mutex<Vec<(&'static str, Option<String>, Option<String>)>>,
    deny_read: Option<Error>,
    deny_write: Option<Error>,
}

impl RecordingAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denying_read(mut self, err: Error) -> Self {
        self.deny_read = Some(err);
        self
    }

    pub fn denying_write(mut self, err: Error) -> Self {
        self.deny_write = Some(err);
        self
    }

    /// Every check performed, as (kind, ref, username).
    pub fn checks(&self) -> Vec<(&'static str, Option<String>, Option<String>)> {
        self.checks.lock().unwrap().clone()
    }

    fn record(
        &self,
        kind: &'static str,
        ref_name: Option<&str>,
        username: Option<&str>,
        deny: &Option<Error>,
    ) -> Result<()> {
        self.checks.lock().unwrap().push((
            kind,
            ref_name.map(String::from),
            username.map(String::from),
        ));
        match deny {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl RepositoryAccessor for RecordingAccessor {
    fn check_read_access(&self, ref_name: Option<&str>, username: Option<&str>) -> Result<()> {
        self.record("read", ref_name, username, &self.deny_read)
    }

    fn check_write_access(&self, ref_name: Option<&str>, username: Option<&str>) -> Result<()> {
        self.record("write", ref_name, username, &self.deny_write)
    }
}

/// Batch handler over `store`, gated by `accessor`.
pub fn batch_handler(store: &Arc<MemoryStore>, accessor: &Arc<RecordingAccessor>) -> BatchHandler {
    BatchHandler::new(store.clone()).with_accessor(accessor.clone())
}

/// Locking handler over `manager`, gated by `accessor`.
pub fn locking_handler(
    manager: &Arc<MemoryLockManager>,
    accessor: &Arc<RecordingAccessor>,
) -> LockingHandler {
    LockingHandler::new()
        .with_lock_manager(manager.clone())
        .with_accessor(accessor.clone())
}

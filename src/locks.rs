//! LFS File Locking API types.
//!
//! See: https://github.com/git-lfs/git-lfs/blob/main/docs/api/locking.md

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::RefInfo;
use crate::{Error, Result};

/// The user holding a lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    pub name: String,
}

/// An active lock on a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// Lock id, unique within the repository.
    pub id: String,
    /// The locked path, relative to the repository root.
    pub path: String,
    /// The lock holder, absent for locks created anonymously.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<LockOwner>,
    /// When the lock was created.
    pub locked_at: DateTime<Utc>,
}

impl Lock {
    /// Create a lock descriptor.
    pub fn new(id: &str, path: &str, owner: Option<&str>, locked_at: DateTime<Utc>) -> Self {
        Lock {
            id: id.to_string(),
            path: path.to_string(),
            owner: owner.map(|name| LockOwner {
                name: name.to_string(),
            }),
            locked_at,
        }
    }

    /// Get the name of the lock holder.
    pub fn owner_name(&self) -> Option<&str> {
        self.owner.as_ref().map(|o| o.name.as_str())
    }

    /// Whether `username` holds this lock. Anonymous users own nothing.
    pub fn is_owned_by(&self, username: Option<&str>) -> bool {
        match (username, self.owner_name()) {
            (Some(user), Some(owner)) => user == owner,
            _ => false,
        }
    }
}

/// Body of a create-lock request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLockRequest {
    /// Path to lock.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<RefInfo>,
}

impl CreateLockRequest {
    pub fn ref_name(&self) -> Option<&str> {
        self.r#ref.as_ref().map(|r| r.name.as_str())
    }
}

/// Body of a list-locks-to-verify request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyLocksRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    /// Page size; 0 or absent leaves it to the lock manager.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<RefInfo>,
}

impl VerifyLocksRequest {
    pub fn ref_name(&self) -> Option<&str> {
        self.r#ref.as_ref().map(|r| r.name.as_str())
    }
}

/// Body of a delete-lock request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteLockRequest {
    /// Delete the lock even if another user holds it. Administrators only.
    #[serde(default)]
    pub force: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<RefInfo>,
}

impl DeleteLockRequest {
    pub fn ref_name(&self) -> Option<&str> {
        self.r#ref.as_ref().map(|r| r.name.as_str())
    }
}

/// Query parameters of a list-locks request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockFilter {
    pub path: Option<String>,
    pub id: Option<String>,
    pub cursor: Option<String>,
    /// Page size; 0 means no client-imposed limit.
    pub limit: u32,
    pub refspec: Option<String>,
}

impl LockFilter {
    /// Parse a URL query string. The first value of each parameter wins.
    pub fn from_query(query: &str) -> Result<Self> {
        let mut filter = LockFilter::default();
        let mut limit: Option<String> = None;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match &*key {
                "path" => &mut filter.path,
                "id" => &mut filter.id,
                "cursor" => &mut filter.cursor,
                "limit" => &mut limit,
                "refspec" => &mut filter.refspec,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        if let Some(limit) = limit.filter(|l| !l.is_empty()) {
            filter.limit = limit
                .parse()
                .map_err(|_| Error::validation(format!("Invalid limit parameter: {}", limit)))?;
        }
        Ok(filter)
    }
}

/// One page of locks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockList {
    pub locks: Vec<Lock>,
    /// Cursor for the next page, absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// One page of locks split by holder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocksToVerify {
    /// Locks held by the requesting user.
    pub ours: Vec<Lock>,
    /// Locks held by anyone else.
    pub theirs: Vec<Lock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl LocksToVerify {
    /// Split a page of locks into those held by `username` and the rest.
    pub fn partition(page: LockList, username: Option<&str>) -> Self {
        let (ours, theirs) = page
            .locks
            .into_iter()
            .partition(|lock| lock.is_owned_by(username));
        LocksToVerify {
            ours,
            theirs,
            next_cursor: page.next_cursor,
        }
    }
}

/// Response body of a successful create or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockResponse {
    pub lock: Lock,
}

/// Persistent lock storage behind the locking endpoints.
///
/// The manager owns every consistency guarantee: creating a lock must
/// atomically check that no active lock covers the path.
pub trait LockManager: Send + Sync {
    /// Create a lock on `path` held by `username`.
    ///
    /// Fails with [`Error::LockExists`] carrying the existing lock if the path is taken.
    fn create_lock(
        &self,
        path: &str,
        ref_name: Option<&str>,
        username: Option<&str>,
    ) -> Result<Lock>;

    /// List locks matching `filter`.
    fn list_locks(&self, filter: &LockFilter) -> Result<LockList>;

    /// List one page of the locks on `ref_name` for verification by `username`.
    fn list_locks_to_verify(
        &self,
        ref_name: Option<&str>,
        username: Option<&str>,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<LockList>;

    /// Delete lock `id`. Without `force` only the holder may delete it.
    ///
    /// Fails with [`Error::LockUnauthorized`] or [`Error::RepositoryNotFound`]
    /// style errors as the manager sees fit; the gateway adds no state of its own.
    fn delete_lock(
        &self,
        id: &str,
        ref_name: Option<&str>,
        username: Option<&str>,
        force: bool,
    ) -> Result<Lock>;

    /// Whether `username` may force-delete other users' locks.
    fn is_lock_administrator(&self, username: Option<&str>) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lock(id: &str, owner: Option<&str>) -> Lock {
        Lock::new(
            id,
            &format!("file-{}.bin", id),
            owner,
            Utc.with_ymd_and_hms(2016, 5, 17, 15, 49, 6).unwrap(),
        )
    }

    #[test]
    fn test_lock_json_roundtrip() {
        let original = lock("some-uuid", Some("Jane Doe"));
        let json = serde_json::to_string(&original).unwrap();
        let decoded: Lock = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.id, original.id);
        assert_eq!(decoded.path, original.path);
        assert_eq!(decoded.owner_name(), Some("Jane Doe"));
        assert_eq!(decoded.locked_at, original.locked_at);
    }

    #[test]
    fn test_lock_decodes_protocol_example() {
        let json = r#"{
            "id": "some-uuid",
            "path": "/path/to/file",
            "locked_at": "2016-05-17T15:49:06+00:00",
            "owner": { "name": "Jane Doe" }
        }"#;
        let decoded: Lock = serde_json::from_str(json).unwrap();
        assert_eq!(
            decoded,
            Lock::new("some-uuid", "/path/to/file", Some("Jane Doe"), decoded.locked_at)
        );
        assert_eq!(
            decoded.locked_at,
            Utc.with_ymd_and_hms(2016, 5, 17, 15, 49, 6).unwrap()
        );
    }

    #[test]
    fn test_anonymous_owns_nothing() {
        assert!(!lock("1", None).is_owned_by(None));
        assert!(!lock("1", Some("alice")).is_owned_by(None));
        assert!(lock("1", Some("alice")).is_owned_by(Some("alice")));
        assert!(!lock("1", Some("alice")).is_owned_by(Some("bob")));
    }

    #[test]
    fn test_filter_from_query() {
        let filter = LockFilter::from_query(
            "path=foo%2Fbar%20baz.psd&id=7&cursor=abc&limit=25&refspec=refs%2Fheads%2Fmain&path=ignored",
        )
        .unwrap();
        assert_eq!(filter.path.as_deref(), Some("foo/bar baz.psd"));
        assert_eq!(filter.id.as_deref(), Some("7"));
        assert_eq!(filter.cursor.as_deref(), Some("abc"));
        assert_eq!(filter.limit, 25);
        assert_eq!(filter.refspec.as_deref(), Some("refs/heads/main"));
    }

    #[test]
    fn test_filter_limit_defaults() {
        assert_eq!(LockFilter::from_query("").unwrap().limit, 0);
        assert_eq!(LockFilter::from_query("limit=").unwrap().limit, 0);
        assert_eq!(LockFilter::from_query("limit=0").unwrap().limit, 0);
    }

    #[test]
    fn test_filter_rejects_bad_limit() {
        let err = LockFilter::from_query("limit=ten").unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.to_string(), "Invalid limit parameter: ten");
        assert!(LockFilter::from_query("limit=-1").is_err());
    }

    #[test]
    fn test_partition_by_owner() {
        let page = LockList {
            locks: vec![lock("1", Some("alice")), lock("2", Some("bob")), lock("3", None)],
            next_cursor: Some("next".into()),
        };
        let split = LocksToVerify::partition(page, Some("alice"));
        assert_eq!(split.ours.len(), 1);
        assert_eq!(split.ours[0].id, "1");
        assert_eq!(split.theirs.len(), 2);
        assert_eq!(split.next_cursor.as_deref(), Some("next"));
    }

    #[test]
    fn test_delete_request_defaults() {
        let request: DeleteLockRequest = serde_json::from_str("{}").unwrap();
        assert!(!request.force);
        assert_eq!(request.ref_name(), None);

        let request: DeleteLockRequest =
            serde_json::from_str(r#"{"force":true,"ref":{"name":"refs/heads/dev"}}"#).unwrap();
        assert!(request.force);
        assert_eq!(request.ref_name(), Some("refs/heads/dev"));
    }
}

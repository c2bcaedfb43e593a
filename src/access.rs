//! Read/write authorization against the main git repository.

use std::sync::Arc;

use crate::batch::Operation;
use crate::locking::LockAction;
use crate::{Principal, Result};

/// Decides whether a user may read or write the git repository the LFS
/// objects and locks belong to.
///
/// Implementations signal denial with the matching error:
/// [`Error::RepositoryNotFound`](crate::Error::RepositoryNotFound) when the
/// repository does not exist for the user,
/// [`Error::RepositoryReadOnly`](crate::Error::RepositoryReadOnly) when the
/// user may read but not write, or
/// [`Error::Unauthorized`](crate::Error::Unauthorized).
pub trait RepositoryAccessor: Send + Sync {
    /// Check read access to `ref_name` (or the repository as a whole).
    fn check_read_access(&self, ref_name: Option<&str>, username: Option<&str>) -> Result<()>;

    /// Check write access to `ref_name` (or the repository as a whole).
    fn check_write_access(&self, ref_name: Option<&str>, username: Option<&str>) -> Result<()>;
}

/// Which check an operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No check at all.
    None,
    Read,
    Write,
}

impl From<Operation> for Access {
    // Verify is intentionally unchecked.
    fn from(operation: Operation) -> Self {
        match operation {
            Operation::Download => Access::Read,
            Operation::Upload => Access::Write,
            Operation::Verify => Access::None,
        }
    }
}

impl From<LockAction> for Access {
    fn from(action: LockAction) -> Self {
        match action {
            LockAction::ListLocks => Access::Read,
            LockAction::CreateLock | LockAction::ListLocksToVerify | LockAction::DeleteLock => {
                Access::Write
            }
        }
    }
}

/// Runs the access check an operation requires, if an accessor is configured.
#[derive(Clone, Default)]
pub struct AccessGate {
    accessor: Option<Arc<dyn RepositoryAccessor>>,
}

impl AccessGate {
    /// A gate that grants everything.
    pub fn open() -> Self {
        AccessGate { accessor: None }
    }

    /// A gate backed by `accessor`.
    pub fn new(accessor: Arc<dyn RepositoryAccessor>) -> Self {
        AccessGate {
            accessor: Some(accessor),
        }
    }

    /// Whether an accessor is configured.
    pub fn is_enforcing(&self) -> bool {
        self.accessor.is_some()
    }

    /// Check `access` for `principal` on `ref_name`, propagating the accessor's error.
    pub fn check(
        &self,
        access: impl Into<Access>,
        ref_name: Option<&str>,
        principal: &Principal,
    ) -> Result<()> {
        let Some(accessor) = &self.accessor else {
            return Ok(());
        };
        match access.into() {
            Access::None => Ok(()),
            Access::Read => accessor.check_read_access(ref_name, principal.username()),
            Access::Write => accessor.check_write_access(ref_name, principal.username()),
        }
    }
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("enforcing", &self.is_enforcing())
            .finish()
    }
}

//! Gateway configuration.

use serde::Deserialize;

/// Default base path of both APIs, as used by git-lfs for `<remote>/info/lfs`.
pub const DEFAULT_BASE_PATH: &str = "/info/lfs";

/// Default request body limit (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Where the gateway mounts its endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base path of the batch endpoint (`{batch_path}/objects/batch`).
    pub batch_path: String,
    /// Base path of the locking endpoints (`{locks_path}/locks`).
    pub locks_path: String,
    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            batch_path: DEFAULT_BASE_PATH.to_string(),
            locks_path: DEFAULT_BASE_PATH.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl GatewayConfig {
    /// Set the base path of the batch endpoint.
    pub fn with_batch_path(mut self, path: &str) -> Self {
        self.batch_path = path.to_string();
        self
    }

    /// Set the base path of the locking endpoints.
    pub fn with_locks_path(mut self, path: &str) -> Self {
        self.locks_path = path.to_string();
        self
    }

    /// Set the request body limit.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Full route of the batch endpoint.
    pub fn batch_route(&self) -> String {
        format!("{}/objects/batch", normalize(&self.batch_path))
    }

    /// Full route of the lock collection.
    pub fn locks_route(&self) -> String {
        format!("{}/locks", normalize(&self.locks_path))
    }
}

/// Leading slash, no trailing slash; the root becomes "".
fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

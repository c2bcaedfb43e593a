//! LFS Batch API endpoint.
//!
//! Implements `POST {base}/objects/batch`.
//! See: https://github.com/git-lfs/git-lfs/blob/main/docs/api/batch.md

use std::sync::Arc;

use crate::access::{AccessGate, RepositoryAccessor};
use crate::batch::{BatchRequest, BatchResponse};
use crate::transfer::{self, LargeFileRepository};
use crate::{LfsResponse, Principal, RequestContext, Result};

/// Handler for batch requests.
///
/// This type is cheaply cloneable - clones share the same backends.
#[derive(Clone)]
pub struct BatchHandler {
    repository: Arc<dyn LargeFileRepository>,
    gate: AccessGate,
}

impl BatchHandler {
    /// Create a handler serving objects from `repository`, without access checks.
    pub fn new(repository: Arc<dyn LargeFileRepository>) -> Self {
        BatchHandler {
            repository,
            gate: AccessGate::open(),
        }
    }

    /// Check read/write access to the main repository with `accessor`.
    pub fn with_accessor(mut self, accessor: Arc<dyn RepositoryAccessor>) -> Self {
        self.gate = AccessGate::new(accessor);
        self
    }

    /// Handle a raw request body, always producing a response.
    pub fn handle(&self, ctx: &RequestContext, body: &[u8]) -> LfsResponse {
        let result = ctx.principal().and_then(|principal| {
            let request = BatchRequest::from_json(body)?;
            self.process(&principal, &request)
        });
        LfsResponse::from_result(200, result)
    }

    /// Authorize `request` for `principal`, let the storage backend admit it,
    /// then ask the backend for per-object actions.
    pub fn process(&self, principal: &Principal, request: &BatchRequest) -> Result<BatchResponse> {
        tracing::debug!(
            operation = %request.operation(),
            objects = request.objects().len(),
            ref_name = ?request.ref_name(),
            username = ?principal.username(),
            "processing batch request"
        );
        self.gate
            .check(request.operation(), request.ref_name(), principal)?;
        self.repository.open(request, principal)?;
        transfer::for_operation(
            request.operation(),
            self.repository.as_ref(),
            request.objects(),
        )
        .process()
    }
}

impl std::fmt::Debug for BatchHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchHandler")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

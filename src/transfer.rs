//! Storage backend contract and the per-operation transfer strategies.

use crate::batch::{Action, BatchRequest, BatchResponse, ObjectResponse, ObjectSpec, Operation};
use crate::{Principal, Result};

/// The large-object store behind the batch endpoint.
///
/// Every method may fail with any [`Error`](crate::Error); such a failure
/// aborts the whole batch request. Absence of a single object is not a
/// failure, it is reported through [`LargeFileRepository::size`].
pub trait LargeFileRepository: Send + Sync {
    /// Admit `request` for `principal` before any object is looked at.
    ///
    /// Called once per batch request, after the access check and even when
    /// the request names no objects. Quota, rate and availability errors
    /// belong here.
    fn open(&self, _request: &BatchRequest, _principal: &Principal) -> Result<()> {
        Ok(())
    }

    /// Size of the stored object, or `None` if the store does not have it.
    fn size(&self, oid: &str) -> Result<Option<u64>>;

    /// Action the client follows to download a stored object.
    fn download_action(&self, oid: &str) -> Result<Action>;

    /// Action the client follows to upload an object of `size` bytes.
    fn upload_action(&self, oid: &str, size: u64) -> Result<Action>;

    /// Action the client calls after uploading, if the store wants one.
    fn verify_action(&self, oid: &str) -> Result<Option<Action>>;
}

/// Produces the batch response for one operation.
pub trait TransferHandler {
    /// Ask the backend about every object, in request order.
    fn process(&self) -> Result<BatchResponse>;
}

/// Get the strategy for `operation`, bound to `repository` and `objects`.
pub fn for_operation<'a>(
    operation: Operation,
    repository: &'a dyn LargeFileRepository,
    objects: &'a [ObjectSpec],
) -> Box<dyn TransferHandler + 'a> {
    match operation {
        Operation::Upload => Box::new(Upload {
            repository,
            objects,
        }),
        Operation::Download => Box::new(Download {
            repository,
            objects,
        }),
        Operation::Verify => Box::new(Verify {
            repository,
            objects,
        }),
    }
}

fn not_found(object: &ObjectSpec) -> ObjectResponse {
    ObjectResponse::new(object).with_error(404, format!("Object {} not found", object.oid))
}

/// Upload: hand out upload (and verify) actions for objects the store lacks.
struct Upload<'a> {
    repository: &'a dyn LargeFileRepository,
    objects: &'a [ObjectSpec],
}

impl TransferHandler for Upload<'_> {
    fn process(&self) -> Result<BatchResponse> {
        let mut objects = Vec::with_capacity(self.objects.len());
        for object in self.objects {
            let mut entry = ObjectResponse::new(object);
            // Objects already stored get no actions; the client skips them.
            if self.repository.size(&object.oid)?.is_none() {
                entry = entry.with_action(
                    "upload",
                    self.repository.upload_action(&object.oid, object.size)?,
                );
                if let Some(verify) = self.repository.verify_action(&object.oid)? {
                    entry = entry.with_action("verify", verify);
                }
            }
            objects.push(entry);
        }
        Ok(BatchResponse::new(objects))
    }
}

/// Download: hand out download actions, or a per-object 404.
struct Download<'a> {
    repository: &'a dyn LargeFileRepository,
    objects: &'a [ObjectSpec],
}

impl TransferHandler for Download<'_> {
    fn process(&self) -> Result<BatchResponse> {
        let mut objects = Vec::with_capacity(self.objects.len());
        for object in self.objects {
            let entry = match self.repository.size(&object.oid)? {
                Some(_) => ObjectResponse::new(object)
                    .with_action("download", self.repository.download_action(&object.oid)?),
                None => not_found(object),
            };
            objects.push(entry);
        }
        Ok(BatchResponse::new(objects))
    }
}

/// Verify: confirm each object is stored with the size the client expects.
struct Verify<'a> {
    repository: &'a dyn LargeFileRepository,
    objects: &'a [ObjectSpec],
}

impl TransferHandler for Verify<'_> {
    fn process(&self) -> Result<BatchResponse> {
        let mut objects = Vec::with_capacity(self.objects.len());
        for object in self.objects {
            let entry = match self.repository.size(&object.oid)? {
                None => not_found(object),
                Some(stored) if stored != object.size => {
                    ObjectResponse::new(object).with_error(
                        422,
                        format!(
                            "Object {} size mismatch: expected {}, stored {}",
                            object.oid, object.size, stored
                        ),
                    )
                }
                Some(_) => ObjectResponse::new(object),
            };
            objects.push(entry);
        }
        Ok(BatchResponse::new(objects))
    }
}

use serde::{Deserialize, Serialize};

use crate::object::ObjectDescriptor;
use crate::uri::StorageUri;
use crate::BATCH_SIZE;

/// A batch of objects to copy from `src_uri` to `dest_uri`, all belonging to
/// the same named bucket pair. Immutable once enqueued; `objects.len()` is
/// never more than [`BATCH_SIZE`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub bucket_name: String,
    pub src_uri: StorageUri,
    pub dest_uri: StorageUri,
    pub objects: Vec<ObjectDescriptor>,
}

impl Task {
    pub fn new(
        bucket_name: impl Into<String>,
        src_uri: StorageUri,
        dest_uri: StorageUri,
        objects: Vec<ObjectDescriptor>,
    ) -> Self {
        debug_assert!(objects.len() <= BATCH_SIZE);
        Self {
            bucket_name: bucket_name.into(),
            src_uri,
            dest_uri,
            objects,
        }
    }
}

/// Outcome of executing one [`Task`] inside a worker.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub bucket_name: String,
    pub worker_id: String,
    pub success: Vec<String>,
    pub failed: Vec<String>,
    pub bytes_delta: u64,
}

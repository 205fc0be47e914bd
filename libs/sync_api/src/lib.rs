//! Shared data types for the bucket-sync coordinator/worker pair.
//!
//! Anything that crosses the wire between `coordinator` and `worker`, or
//! that more than one of the `libs/*` crates needs to agree on, lives here
//! rather than being duplicated.

pub mod acl;
pub mod config;
pub mod error;
pub mod object;
pub mod pairing;
pub mod stats;
pub mod task;
pub mod uri;

pub use acl::CannedAcl;
pub use config::RunConfig;
pub use error::{ErrorKind, SyncError};
pub use object::ObjectDescriptor;
pub use pairing::{BucketInfo, BucketPairing, Orientation};
pub use stats::BucketStats;
pub use task::{Task, TaskResult};
pub use uri::{AccountUri, ResourceType, StorageUri};

/// Maximum number of object descriptors carried by a single [`Task`].
pub const BATCH_SIZE: usize = 500;

/// Capacity of the bounded task queue shared between listing producers and
/// the dispatch server.
pub const TASK_QUEUE_CAPACITY: usize = 1024;

/// Default multipart part size: 50 MiB.
pub const DEFAULT_PART_SIZE: u64 = 50 * 1024 * 1024;

/// Objects at or above this size use multipart upload / ranged parallel
/// download instead of a single-shot copy.
pub const MAX_BLOCK_SIZE: u64 = 100 * 1024 * 1024;

/// How long a worker sleeps after `HasMore` reports an empty queue.
pub const WORKER_IDLE_BACKOFF: std::time::Duration = std::time::Duration::from_secs(10);

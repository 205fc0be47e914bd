use serde::{Deserialize, Serialize};

/// One bucket as reported by a provider's account-level inventory listing
/// (`storage::inventory::list_buckets`), before it's been paired with a
/// counterpart on the other side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub domain: String,
}

/// Direction of copy for a bucket pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Source has the bucket, destination doesn't: one-way src -> dst.
    To,
    /// Symmetric reverse of `To`: destination has the bucket, source doesn't.
    From,
    /// Both sides have a bucket of this name: diff-based sync, src -> dst only.
    With,
}

/// One row of a computed sync plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketPairing {
    pub name: String,
    pub src_bucket_domain: String,
    pub dest_bucket_domain: String,
    pub orientation: Orientation,
}

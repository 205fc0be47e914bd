use serde::{Deserialize, Serialize};

/// A single object (or "directory" marker) as returned by a listing or
/// `Head` call.
///
/// Directory descriptors are synthesized by backends that expose a
/// filesystem-like hierarchy (see `storage::backends::file`); their `key`
/// ends in `/` and `size` is always zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    pub key: String,
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub mtime: i64,
    pub is_dir: bool,
}

impl ObjectDescriptor {
    pub fn new(key: impl Into<String>, size: u64, mtime: i64) -> Self {
        let key = key.into();
        let is_dir = key.ends_with('/');
        Self {
            key,
            size,
            mtime,
            is_dir,
        }
    }

    pub fn directory(key: impl Into<String>, mtime: i64) -> Self {
        let mut key = key.into();
        if !key.ends_with('/') {
            key.push('/');
        }
        Self {
            key,
            size: 0,
            mtime,
            is_dir: true,
        }
    }
}

impl PartialOrd for ObjectDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectDescriptor {
    /// Descriptors are ordered by key alone: the listing iterator and the
    /// diff-listing merge-walk both depend on this being the *only* field
    /// that participates in ordering.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

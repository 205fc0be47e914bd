//! Generated gRPC types for the `Pipe` service plus the
//! conversions to/from `sync_api`'s domain types. Kept as its own crate so
//! that neither `coordinator` nor `worker` needs to depend on the other
//! just to share wire types, and so `sync_api` itself stays free of a
//! `tonic`/`prost` dependency.

#![allow(clippy::derive_partial_eq_without_eq)]

tonic::include_proto!("sync.v1");

use std::str::FromStr;

use sync_api::SyncError;

impl From<sync_api::ObjectDescriptor> for ObjectDescriptor {
    fn from(d: sync_api::ObjectDescriptor) -> Self {
        ObjectDescriptor {
            key: d.key,
            size: d.size,
            mtime: d.mtime,
            is_dir: d.is_dir,
        }
    }
}

impl From<ObjectDescriptor> for sync_api::ObjectDescriptor {
    fn from(d: ObjectDescriptor) -> Self {
        sync_api::ObjectDescriptor {
            key: d.key,
            size: d.size,
            mtime: d.mtime,
            is_dir: d.is_dir,
        }
    }
}

impl From<sync_api::StorageUri> for StorageUri {
    fn from(u: sync_api::StorageUri) -> Self {
        StorageUri {
            resource_type: u.resource_type.to_string(),
            bucket_domain: u.bucket_domain,
            access_key: u.access_key,
            secret_key: u.secret_key,
        }
    }
}

impl TryFrom<StorageUri> for sync_api::StorageUri {
    type Error = SyncError;

    fn try_from(u: StorageUri) -> Result<Self, Self::Error> {
        Ok(sync_api::StorageUri {
            resource_type: sync_api::ResourceType::from_str(&u.resource_type)?,
            bucket_domain: u.bucket_domain,
            access_key: u.access_key,
            secret_key: u.secret_key,
        })
    }
}

impl From<sync_api::AccountUri> for AccountUri {
    fn from(u: sync_api::AccountUri) -> Self {
        AccountUri {
            resource_type: u.resource_type.to_string(),
            region: u.region,
            access_key: u.access_key,
            secret_key: u.secret_key,
        }
    }
}

impl TryFrom<AccountUri> for sync_api::AccountUri {
    type Error = SyncError;

    fn try_from(u: AccountUri) -> Result<Self, Self::Error> {
        Ok(sync_api::AccountUri {
            resource_type: sync_api::ResourceType::from_str(&u.resource_type)?,
            region: u.region,
            access_key: u.access_key,
            secret_key: u.secret_key,
        })
    }
}

impl From<sync_api::Task> for Task {
    fn from(t: sync_api::Task) -> Self {
        Task {
            bucket_name: t.bucket_name,
            src_uri: Some(t.src_uri.into()),
            dest_uri: Some(t.dest_uri.into()),
            objects: t.objects.into_iter().map(Into::into).collect(),
        }
    }
}

impl TryFrom<Task> for sync_api::Task {
    type Error = SyncError;

    fn try_from(t: Task) -> Result<Self, Self::Error> {
        let src_uri = t
            .src_uri
            .ok_or_else(|| SyncError::Invalid("task missing src_uri".into()))?
            .try_into()?;
        let dest_uri = t
            .dest_uri
            .ok_or_else(|| SyncError::Invalid("task missing dest_uri".into()))?
            .try_into()?;
        Ok(sync_api::Task::new(
            t.bucket_name,
            src_uri,
            dest_uri,
            t.objects.into_iter().map(Into::into).collect(),
        ))
    }
}

impl From<Option<sync_api::Task>> for TaskEnvelope {
    fn from(task: Option<sync_api::Task>) -> Self {
        TaskEnvelope {
            task: task.map(Into::into),
        }
    }
}

impl From<sync_api::StatsSnapshot> for Totals {
    fn from(s: sync_api::StatsSnapshot) -> Self {
        Totals {
            scanned: s.scanned,
            copied: s.copied,
            failed: s.failed,
            skipped: s.skipped,
            size_bytes: s.size_bytes,
        }
    }
}

impl From<(String, sync_api::StatsSnapshot)> for BucketSummary {
    fn from((name, s): (String, sync_api::StatsSnapshot)) -> Self {
        BucketSummary {
            name,
            scan: s.scanned,
            success: s.copied,
            fail: s.failed,
            finish: s.finish,
        }
    }
}

impl From<sync_api::BucketPairing> for BucketPairRow {
    fn from(p: sync_api::BucketPairing) -> Self {
        let orientation = match p.orientation {
            sync_api::Orientation::To => "To",
            sync_api::Orientation::From => "From",
            sync_api::Orientation::With => "With",
        };
        BucketPairRow {
            name: p.name,
            src_bucket_domain: p.src_bucket_domain,
            dest_bucket_domain: p.dest_bucket_domain,
            orientation: orientation.to_string(),
        }
    }
}

/// Maps a [`SyncError`]'s kind onto the gRPC status codes workers translate
/// back into human-readable messages (`CANCELLED`, `UNKNOWN`,
/// `UNAVAILABLE`, others -> "unknown").
pub fn to_tonic_status(err: &SyncError) -> tonic::Status {
    use sync_api::ErrorKind::*;
    let code = match err.kind() {
        NotFound => tonic::Code::NotFound,
        Transient => tonic::Code::Unavailable,
        Auth => tonic::Code::Unauthenticated,
        Unsupported => tonic::Code::Unimplemented,
        ChecksumMismatch => tonic::Code::DataLoss,
        Cancelled => tonic::Code::Cancelled,
        Invalid => tonic::Code::InvalidArgument,
    };
    tonic::Status::new(code, err.to_string())
}

/// Worker-side translation of an RPC failure's code into a human-readable
/// message: codes 1 (`CANCELLED`), 2 (`UNKNOWN`) and 14
/// (`UNAVAILABLE`) get specific text, everything else is "unknown".
pub fn describe_status(status: &tonic::Status) -> String {
    match status.code() {
        tonic::Code::Cancelled => "operation cancelled".to_string(),
        tonic::Code::Unknown => "unknown coordinator error".to_string(),
        tonic::Code::Unavailable => "service unavailable".to_string(),
        _ => format!("unknown error ({})", status.code() as i32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_round_trips_through_wire_type() {
        let uri = sync_api::StorageUri {
            resource_type: sync_api::ResourceType::S3,
            bucket_domain: "b.us-east-1.amazonaws.com".into(),
            access_key: "ak".into(),
            secret_key: "sk".into(),
        };
        let task = sync_api::Task::new(
            "bucket",
            uri.clone(),
            uri,
            vec![sync_api::ObjectDescriptor::new("a", 5, 0)],
        );
        let wire: Task = task.clone().into();
        let back: sync_api::Task = wire.try_into().unwrap();
        assert_eq!(back.bucket_name, task.bucket_name);
        assert_eq!(back.objects.len(), 1);
        assert_eq!(back.objects[0].key, "a");
    }

    #[test]
    fn describe_status_matches_known_codes() {
        let s = tonic::Status::new(tonic::Code::Unavailable, "down");
        assert_eq!(describe_status(&s), "service unavailable");
    }
}

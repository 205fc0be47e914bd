//! `TransferEngine`: size-based dispatch between the single-shot and
//! multipart copy paths, with the retry policy each path is assigned.

use std::sync::Arc;

use storage::Storage;
use sync_api::{CannedAcl, ObjectDescriptor, ResourceType, RunConfig, SyncError};
use tokio::sync::Semaphore;

use crate::multipart::{do_copy_multiple, MultipartCopyParams};
use crate::ratelimit::TokenBucket;
use crate::single::{do_copy_single, SingleCopyParams};
use crate::BufferPool;

/// One worker's transfer engine: owns the concurrency permit pool and
/// optional rate limiter shared by every object it copies.
pub struct TransferEngine {
    permits: Arc<Semaphore>,
    limiter: Option<Arc<TokenBucket>>,
    max_block_bytes: u64,
    default_part_size: u64,
    downloader_concurrency: usize,
    pool: BufferPool,
}

impl TransferEngine {
    pub fn new(config: &RunConfig) -> Self {
        // Derived from ceil(batchSize / 2); RunConfig.worker_concurrency
        // is the operator-facing knob a site can use to override that default.
        let concurrency = config.worker_concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            limiter: config
                .rate_limit_bytes_per_sec
                .map(|r| Arc::new(TokenBucket::new(r))),
            max_block_bytes: config.max_block_bytes,
            default_part_size: config.part_size_bytes,
            downloader_concurrency: concurrency,
            pool: BufferPool::new(),
        }
    }

    /// The worker-wide multipart/stream buffer pool, shared by every
    /// object this engine copies.
    pub fn buffer_pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Copies one object, choosing single-shot vs. multipart by size, and
    /// applying each path's retry policy (`i^2` sec back-off for
    /// single, constant back-off handled inside the multipart path itself).
    pub async fn copy_object(
        &self,
        src: &Arc<dyn Storage>,
        dest: &Arc<dyn Storage>,
        descriptor: &ObjectDescriptor,
        acl: CannedAcl,
        src_type: ResourceType,
        dest_type: ResourceType,
    ) -> Result<(), SyncError> {
        if descriptor.size < self.max_block_bytes {
            return self
                .copy_single_with_retry(src, dest, descriptor, acl, src_type, dest_type)
                .await;
        }

        let multipart_params = MultipartCopyParams {
            default_part_size: self.default_part_size,
            pool: self.pool.clone(),
        };
        match do_copy_multiple(src, dest, descriptor, acl, &self.permits, self.limiter.as_ref(), &multipart_params)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == sync_api::ErrorKind::Unsupported => {
                self.copy_single_with_retry(src, dest, descriptor, acl, src_type, dest_type)
                    .await
            }
            Err(e) => Err(e),
        }
    }

    async fn copy_single_with_retry(
        &self,
        src: &Arc<dyn Storage>,
        dest: &Arc<dyn Storage>,
        descriptor: &ObjectDescriptor,
        acl: CannedAcl,
        src_type: ResourceType,
        dest_type: ResourceType,
    ) -> Result<(), SyncError> {
        let is_url_source = src_type == ResourceType::Url;
        let source_is_rangeable = !matches!(src_type, ResourceType::Url | ResourceType::File);
        let dest_is_file = dest_type == ResourceType::File;
        let params = SingleCopyParams {
            max_block_bytes: self.max_block_bytes,
            downloader_concurrency: self.downloader_concurrency,
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = do_copy_single(
                src,
                dest,
                descriptor,
                acl,
                &self.permits,
                self.limiter.as_ref(),
                &params,
                source_is_rangeable,
                is_url_source,
                dest_is_file,
            )
            .await;
            match result {
                Ok(()) => return Ok(()),
                Err(e) if attempt < 3 && e.kind() != sync_api::ErrorKind::NotFound => {
                    let backoff = std::time::Duration::from_secs((attempt * attempt) as u64);
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permit_pool_matches_configured_concurrency() {
        let config = RunConfig {
            worker_concurrency: 37,
            ..RunConfig::default()
        };
        let engine = TransferEngine::new(&config);
        assert_eq!(engine.permits.available_permits(), 37);
    }
}

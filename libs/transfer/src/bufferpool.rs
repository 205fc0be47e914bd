//! The two-level buffer pool: one size class fixed at 32 KiB for
//! streaming single-shot copies, one bucketed by power-of-two for
//! multipart bodies (part sizes vary per upload). Total outstanding bytes
//! are tracked so a future metrics exporter can surface pool pressure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

pub const STREAM_BUFFER_SIZE: usize = 32 * 1024;

struct Inner {
    stream_free: Mutex<Vec<Vec<u8>>>,
    multipart_free: Mutex<std::collections::HashMap<usize, Vec<Vec<u8>>>>,
    allocated_bytes: AtomicU64,
}

#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<Inner>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                stream_free: Mutex::new(Vec::new()),
                multipart_free: Mutex::new(std::collections::HashMap::new()),
                allocated_bytes: AtomicU64::new(0),
            }),
        }
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.inner.allocated_bytes.load(Ordering::Relaxed)
    }

    /// A fixed 32 KiB buffer for streaming single-object copies.
    pub fn take_stream_buffer(&self) -> PooledBuffer {
        let buf = self
            .inner
            .stream_free
            .lock()
            .pop()
            .unwrap_or_else(|| vec_with_capacity(STREAM_BUFFER_SIZE, &self.inner));
        PooledBuffer {
            buf: Some(buf),
            class: BufferClass::Stream,
            pool: self.inner.clone(),
        }
    }

    /// A buffer sized to the next power of two at or above `min_size`, for
    /// multipart part reads/uploads whose size varies by upload.
    pub fn take_multipart_buffer(&self, min_size: usize) -> PooledBuffer {
        let class_size = min_size.next_power_of_two().max(1);
        let buf = {
            let mut free = self.inner.multipart_free.lock();
            free.get_mut(&class_size).and_then(Vec::pop)
        }
        .unwrap_or_else(|| vec_with_capacity(class_size, &self.inner));
        PooledBuffer {
            buf: Some(buf),
            class: BufferClass::Multipart(class_size),
            pool: self.inner.clone(),
        }
    }
}

fn vec_with_capacity(size: usize, inner: &Inner) -> Vec<u8> {
    inner
        .allocated_bytes
        .fetch_add(size as u64, Ordering::Relaxed);
    vec![0u8; size]
}

enum BufferClass {
    Stream,
    Multipart(usize),
}

/// An owned buffer borrowed from a [`BufferPool`]; returned to the pool's
/// matching size-class free list on drop rather than deallocated.
pub struct PooledBuffer {
    buf: Option<Vec<u8>>,
    class: BufferClass,
    pool: Arc<Inner>,
}

impl std::ops::Deref for PooledBuffer {
    type Target = Vec<u8>;
    fn deref(&self) -> &Vec<u8> {
        self.buf.as_ref().expect("buffer taken exactly once")
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.buf.as_mut().expect("buffer taken exactly once")
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let Some(buf) = self.buf.take() else { return };
        match self.class {
            BufferClass::Stream => self.pool.stream_free.lock().push(buf),
            BufferClass::Multipart(size) => {
                self.pool.multipart_free.lock().entry(size).or_default().push(buf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_buffers_round_up_to_power_of_two() {
        let pool = BufferPool::new();
        let buf = pool.take_multipart_buffer(5_000_000);
        assert_eq!(buf.len(), 5_000_000usize.next_power_of_two());
    }

    #[test]
    fn dropped_buffers_are_reused_rather_than_reallocated() {
        let pool = BufferPool::new();
        {
            let _buf = pool.take_stream_buffer();
        }
        let before = pool.allocated_bytes();
        {
            let _buf = pool.take_stream_buffer();
        }
        assert_eq!(pool.allocated_bytes(), before);
    }
}

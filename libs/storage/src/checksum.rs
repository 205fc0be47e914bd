//! Checksum-on-write and checksum-verifying-on-read.
//!
//! `Put` computes a whole-body checksum and stores it under a
//! backend-specific metadata key; `Get(key, 0, None)` wraps the returned
//! reader so that a mismatch surfaces as an error exactly at EOF, after all
//! bytes have been delivered to the caller (matching the original's
//! "fail the read at EOF" behavior rather than failing eagerly).

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

use crate::BoxReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Crc32c,
    Md5,
}

enum Hasher {
    Crc32c(u32),
    Md5(md5::Context),
}

impl Hasher {
    fn new(algo: ChecksumAlgorithm) -> Self {
        match algo {
            ChecksumAlgorithm::Crc32c => Hasher::Crc32c(0),
            ChecksumAlgorithm::Md5 => Hasher::Md5(md5::Context::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Hasher::Crc32c(crc) => *crc = crc32c::crc32c_append(*crc, bytes),
            Hasher::Md5(ctx) => ctx.consume(bytes),
        }
    }

    fn finish(self) -> String {
        match self {
            Hasher::Crc32c(crc) => format!("{crc:08x}"),
            Hasher::Md5(ctx) => format!("{:x}", ctx.compute()),
        }
    }
}

/// A body fully buffered in memory together with its checksum, ready to be
/// handed to a backend's `put`/`upload_part` along with the digest for the
/// metadata header.
pub struct BufferedBody {
    pub bytes: bytes::Bytes,
    pub digest: String,
}

/// Drains `reader` fully, computing its checksum as it goes. Backends that
/// need the digest available *before* issuing the HTTP request (almost all
/// of them, since the checksum travels in a request header) buffer the body
/// this way rather than streaming it untouched.
pub async fn buffer_and_checksum(
    mut reader: BoxReader,
    algo: ChecksumAlgorithm,
) -> io::Result<BufferedBody> {
    use tokio::io::AsyncReadExt;
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    let mut hasher = Hasher::new(algo);
    hasher.update(&buf);
    Ok(BufferedBody {
        bytes: buf.into(),
        digest: hasher.finish(),
    })
}

/// Wraps a reader so that the checksum is recomputed as bytes are consumed,
/// and the final read (the one that observes EOF) fails with
/// [`io::ErrorKind::InvalidData`] if the recomputed digest doesn't match
/// `expected`.
pub struct VerifyingReader {
    inner: BoxReader,
    hasher: Option<Hasher>,
    expected: String,
    done: bool,
}

impl VerifyingReader {
    pub fn new(inner: BoxReader, algo: ChecksumAlgorithm, expected: String) -> Self {
        Self {
            inner,
            hasher: Some(Hasher::new(algo)),
            expected,
            done: false,
        }
    }
}

impl AsyncRead for VerifyingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let chunk_len = buf.filled().len() - before;
                if chunk_len == 0 {
                    if !this.done {
                        this.done = true;
                        if let Some(hasher) = this.hasher.take() {
                            let digest = hasher.finish();
                            if digest != this.expected {
                                return Poll::Ready(Err(io::Error::new(
                                    io::ErrorKind::InvalidData,
                                    format!(
                                        "checksum mismatch: expected {}, got {digest}",
                                        this.expected
                                    ),
                                )));
                            }
                        }
                    }
                } else if let Some(hasher) = this.hasher.as_mut() {
                    hasher.update(&buf.filled()[before..]);
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn buffer_and_checksum_matches_oneshot_crc32c() {
        let data = b"hello world".to_vec();
        let reader: BoxReader = Box::pin(std::io::Cursor::new(data.clone()));
        let buffered = buffer_and_checksum(reader, ChecksumAlgorithm::Crc32c)
            .await
            .unwrap();
        assert_eq!(buffered.digest, format!("{:08x}", crc32c::crc32c(&data)));
    }

    #[tokio::test]
    async fn verifying_reader_passes_through_on_match() {
        let data = b"some payload bytes".to_vec();
        let digest = format!("{:08x}", crc32c::crc32c(&data));
        let inner: BoxReader = Box::pin(std::io::Cursor::new(data.clone()));
        let mut verifying = VerifyingReader::new(inner, ChecksumAlgorithm::Crc32c, digest);
        let mut out = Vec::new();
        verifying.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn verifying_reader_fails_at_eof_on_mismatch() {
        let data = b"some payload bytes".to_vec();
        let inner: BoxReader = Box::pin(std::io::Cursor::new(data));
        let mut verifying =
            VerifyingReader::new(inner, ChecksumAlgorithm::Crc32c, "deadbeef".to_string());
        let mut out = Vec::new();
        let err = verifying.read_to_end(&mut out).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}

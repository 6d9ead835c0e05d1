//! Streaming content hashing for deduplication.
//!
//! SHA-256 over the raw upload bytes, read in fixed-size chunks so memory
//! stays bounded regardless of file size. Identical bytes always yield the
//! identical digest, independent of how the stream is chunked.

use crate::config::DEFAULT_HASH_BUFFER_BYTES;
use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::io::Read;

/// Streaming SHA-256 content hasher.
///
/// # Example
///
/// ```rust
/// use filedup::ContentHasher;
///
/// let hasher = ContentHasher::default();
/// let digest = hasher.digest(&mut &b"hello world"[..]).unwrap();
/// assert_eq!(digest.len(), 64);
/// assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
#[derive(Debug, Clone)]
pub struct ContentHasher {
    buffer_bytes: usize,
}

impl ContentHasher {
    /// Creates a hasher with the given read chunk size.
    #[must_use]
    pub const fn new(buffer_bytes: usize) -> Self {
        Self { buffer_bytes }
    }

    /// Reads the stream to completion and returns the lowercase hex SHA-256
    /// digest (64 characters).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnreadableStream`] if the stream cannot be fully read.
    /// No partial digest is ever produced.
    pub fn digest(&self, source: &mut dyn Read) -> Result<String> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.buffer_bytes.max(1)];

        loop {
            let n = source.read(&mut buf).map_err(|e| Error::UnreadableStream {
                cause: e.to_string(),
            })?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Digests the stream while copying every byte read into `sink`.
    ///
    /// The upload path uses this to spool bytes to a temp file in the same
    /// single pass that computes the digest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnreadableStream`] on a short or failed read, and
    /// [`Error::OperationFailed`] if the sink cannot be written.
    pub fn digest_with_copy(
        &self,
        source: &mut dyn Read,
        sink: &mut dyn std::io::Write,
    ) -> Result<(String, u64)> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.buffer_bytes.max(1)];
        let mut total: u64 = 0;

        loop {
            let n = source.read(&mut buf).map_err(|e| Error::UnreadableStream {
                cause: e.to_string(),
            })?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            sink.write_all(&buf[..n]).map_err(|e| Error::OperationFailed {
                operation: "spool_write".to_string(),
                cause: e.to_string(),
            })?;
            total += n as u64;
        }
        sink.flush().map_err(|e| Error::OperationFailed {
            operation: "spool_flush".to_string(),
            cause: e.to_string(),
        })?;

        Ok((hex::encode(hasher.finalize()), total))
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_BUFFER_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Read};

    #[test]
    fn test_digest_is_64_hex_chars() {
        let digest = ContentHasher::default().digest(&mut &b"content"[..]).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_identical_bytes_identical_digest() {
        let hasher = ContentHasher::default();
        let a = hasher.digest(&mut &b"same bytes"[..]).unwrap();
        let b = hasher.digest(&mut &b"same bytes"[..]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_chunk_boundary_independence() {
        // The same content digested with radically different chunk sizes
        // must produce the same digest.
        let content = vec![7u8; 10_000];
        let small = ContentHasher::new(3).digest(&mut content.as_slice()).unwrap();
        let large = ContentHasher::new(4096).digest(&mut content.as_slice()).unwrap();
        assert_eq!(small, large);
    }

    #[test]
    fn test_known_vector() {
        // SHA-256 of the empty input
        let digest = ContentHasher::default().digest(&mut io::empty()).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    /// Reader that fails after yielding a prefix of its content.
    struct TruncatedReader {
        remaining: usize,
    }

    impl Read for TruncatedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream cut short",
                ));
            }
            let n = self.remaining.min(buf.len());
            buf[..n].fill(0xAB);
            self.remaining -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_truncated_stream_is_unreadable() {
        let mut reader = TruncatedReader { remaining: 100 };
        let err = ContentHasher::default().digest(&mut reader).unwrap_err();
        assert!(matches!(err, crate::Error::UnreadableStream { .. }));
    }

    #[test]
    fn test_digest_with_copy_spools_everything() {
        let content = b"spool me through the hasher".to_vec();
        let mut sink = Vec::new();
        let (digest, total) = ContentHasher::new(4)
            .digest_with_copy(&mut content.as_slice(), &mut sink)
            .unwrap();

        assert_eq!(sink, content);
        assert_eq!(total, content.len() as u64);
        let direct = ContentHasher::default().digest(&mut content.as_slice()).unwrap();
        assert_eq!(digest, direct);
    }
}

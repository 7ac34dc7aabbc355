//! Core data types for liveread

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest part the backend accepts for every part but the last.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Largest part the backend accepts.
pub const MAX_PART_SIZE: usize = 5 * 1024 * 1024 * 1024;

pub const DEFAULT_CHUNK_SIZE: usize = MIN_PART_SIZE;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of chunks (or tasks) the relay buffers.
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

/// Header that lets the backend serve and accept data for unfinished uploads.
pub const LIVE_READ_HEADER: &str = "x-backblaze-live-read-enabled";

/// Bucket name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketId(String);

impl BucketId {
    /// Create a new bucket ID with validation
    pub fn new(name: &str) -> crate::Result<Self> {
        if name.is_empty() {
            return Err(crate::LiveReadError::InvalidBucketName("empty name".to_string()));
        }

        // Letters, digits, hyphens and dots
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.') {
            return Err(crate::LiveReadError::InvalidBucketName(
                format!("invalid characters in '{}'", name)
            ));
        }

        Ok(BucketId(name.to_string()))
    }

    /// Get the bucket name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BucketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object key within a bucket
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(String);

impl Key {
    /// Create a new key with validation
    pub fn new(key: &str) -> crate::Result<Self> {
        if key.is_empty() {
            return Err(crate::LiveReadError::InvalidKey("empty key".to_string()));
        }

        if key.chars().any(|c| c.is_control()) {
            return Err(crate::LiveReadError::InvalidKey(
                "control characters not allowed".to_string()
            ));
        }

        Ok(Key(key.to_string()))
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a multipart upload.
///
/// The backend uses the same value as the version id of the object being
/// assembled, so it doubles as the version a reader pins itself to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(String);

impl UploadId {
    pub fn new(id: impl Into<String>) -> Self {
        UploadId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open byte range `[start, start + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub len: u64,
}

impl ByteRange {
    pub fn new(start: u64, len: u64) -> Self {
        ByteRange { start, len }
    }

    /// Exclusive end offset
    pub fn end(&self) -> u64 {
        self.start + self.len
    }

    /// Render as an HTTP `Range` header value, whose end is inclusive.
    pub fn to_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end().saturating_sub(1))
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_header())
    }
}

/// Result of a successful range read.
#[derive(Debug, Clone)]
pub struct RangeRead {
    pub data: Bytes,
    /// Content length announced by the endpoint. A body shorter than this
    /// was cut off in transit.
    pub content_length: u64,
}

/// A part that the endpoint has accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub part_number: u32,
    pub e_tag: String,
}

/// An immutable buffer plus its position in the transfer.
///
/// For downloads the position is the byte offset of the first byte; for
/// uploads it is the part number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub position: u64,
    pub data: Bytes,
}

impl Chunk {
    pub fn new(position: u64, data: Bytes) -> Self {
        Chunk { position, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Lifecycle of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadState {
    Idle,
    Created,
    Uploading,
    Completing,
    Done,
    Aborted,
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Done | UploadState::Aborted)
    }
}

/// Lifecycle of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadState {
    ResolvingVersion,
    Streaming,
    Polling,
    Completed,
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadState::Completed)
    }
}

/// Per-transfer state owned by a single reader or uploader.
#[derive(Debug, Clone)]
pub struct TransferSession {
    pub bucket: BucketId,
    pub key: Key,
    pub upload_id: Option<UploadId>,
    pub offset: u64,
    pub chunk_size: usize,
    pub poll_interval: Duration,
}

impl TransferSession {
    /// Create a session with default chunk size and poll interval
    pub fn new(bucket: BucketId, key: Key) -> Self {
        TransferSession {
            bucket,
            key,
            upload_id: None,
            offset: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The range starting at the current offset
    pub fn next_range(&self) -> ByteRange {
        ByteRange::new(self.offset, self.chunk_size as u64)
    }

    /// Advance past `n` bytes that were actually returned.
    pub fn advance(&mut self, n: u64) {
        self.offset += n;
    }
}

/// Check that `size` is acceptable as a part size for uploads.
pub fn validate_part_size(size: usize) -> crate::Result<usize> {
    if !(MIN_PART_SIZE..=MAX_PART_SIZE).contains(&size) {
        return Err(crate::LiveReadError::InvalidConfig(format!(
            "chunk size {} outside [{}, {}]",
            size, MIN_PART_SIZE, MAX_PART_SIZE
        )));
    }
    Ok(size)
}

//! The object-storage operations the transfer engines rely on

use async_trait::async_trait;
use bytes::Bytes;

use crate::{BucketId, ByteRange, EndpointError, Key, Part, RangeRead, UploadId};

pub type EndpointResult<T> = std::result::Result<T, EndpointError>;

/// Object-storage backend able to serve and accept live multipart uploads.
///
/// Implementations must attach [`LIVE_READ_HEADER`](crate::LIVE_READ_HEADER)
/// to every request they send.
#[async_trait]
pub trait TransferEndpoint: Send + Sync {
    /// Read `range` of the object, pinned to `version` when given.
    ///
    /// Fewer bytes than requested may be returned at the tail of an object
    /// that is still being written.
    async fn get_object_range(
        &self,
        bucket: &BucketId,
        key: &Key,
        version: Option<&UploadId>,
        range: ByteRange,
    ) -> EndpointResult<RangeRead>;

    /// Uploads still in progress for exactly `key`, oldest first.
    async fn list_in_progress_uploads(
        &self,
        bucket: &BucketId,
        key: &Key,
    ) -> EndpointResult<Vec<UploadId>>;

    async fn create_multipart_upload(&self, bucket: &BucketId, key: &Key)
        -> EndpointResult<UploadId>;

    /// Upload one part and return its entity tag.
    async fn upload_part(
        &self,
        bucket: &BucketId,
        key: &Key,
        upload_id: &UploadId,
        part_number: u32,
        data: Bytes,
    ) -> EndpointResult<String>;

    async fn complete_multipart_upload(
        &self,
        bucket: &BucketId,
        key: &Key,
        upload_id: &UploadId,
        parts: &[Part],
    ) -> EndpointResult<()>;

    async fn abort_multipart_upload(
        &self,
        bucket: &BucketId,
        key: &Key,
        upload_id: &UploadId,
    ) -> EndpointResult<()>;

    /// Most recently started upload for `key`, if any.
    async fn latest_upload(&self, bucket: &BucketId, key: &Key) -> EndpointResult<Option<UploadId>> {
        Ok(self.list_in_progress_uploads(bucket, key).await?.pop())
    }
}

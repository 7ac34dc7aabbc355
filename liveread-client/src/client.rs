//! S3 endpoint implementation

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;
use liveread_core::*;
use tracing::debug;

/// [`TransferEndpoint`] backed by an S3-compatible service.
///
/// Every request carries [`LIVE_READ_HEADER`], which asks the backend to
/// serve ranges of uploads that have not been completed yet.
#[derive(Clone, Debug)]
pub struct S3Endpoint {
    client: aws_sdk_s3::Client,
}

impl S3Endpoint {
    /// Build a client from the standard AWS environment and profile chain.
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::from_conf(&config)
    }

    pub fn from_conf(config: &SdkConfig) -> Self {
        S3Endpoint {
            client: aws_sdk_s3::Client::new(config),
        }
    }

    pub fn client(&self) -> &aws_sdk_s3::Client {
        &self.client
    }
}

/// Map an HTTP status (if a response arrived at all) to an endpoint error.
pub fn classify(status: Option<u16>, message: String) -> EndpointError {
    match status {
        Some(404) => EndpointError::NotFound,
        Some(416) => EndpointError::RangeNotSatisfiable,
        Some(status) => EndpointError::Status { status, message },
        None => EndpointError::Transport(message),
    }
}

fn endpoint_error<E>(err: SdkError<E>) -> EndpointError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|response| response.status().as_u16());
    classify(status, DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl TransferEndpoint for S3Endpoint {
    async fn get_object_range(
        &self,
        bucket: &BucketId,
        key: &Key,
        version: Option<&UploadId>,
        range: ByteRange,
    ) -> EndpointResult<RangeRead> {
        let output = self
            .client
            .get_object()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .set_version_id(version.map(|v| v.as_str().to_string()))
            .range(range.to_header())
            .customize()
            .mutate_request(|req| {
                req.headers_mut().insert(LIVE_READ_HEADER, "true");
            })
            .send()
            .await
            .map_err(endpoint_error)?;

        let content_length = output.content_length().unwrap_or_default().max(0) as u64;

        // The body streams separately from the headers and can fail midway
        let data: Bytes = output
            .body
            .collect()
            .await
            .map_err(|e| EndpointError::Interrupted(DisplayErrorContext(&e).to_string()))?
            .into_bytes();

        Ok(RangeRead { data, content_length })
    }

    async fn list_in_progress_uploads(
        &self,
        bucket: &BucketId,
        key: &Key,
    ) -> EndpointResult<Vec<UploadId>> {
        let mut uploads = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut upload_id_marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_multipart_uploads()
                .bucket(bucket.as_str())
                .prefix(key.as_str())
                .set_key_marker(key_marker.take())
                .set_upload_id_marker(upload_id_marker.take())
                .customize()
                .mutate_request(|req| {
                    req.headers_mut().insert(LIVE_READ_HEADER, "true");
                })
                .send()
                .await
                .map_err(endpoint_error)?;

            // The prefix also matches longer keys
            uploads.extend(
                output
                    .uploads()
                    .iter()
                    .filter(|upload| upload.key() == Some(key.as_str()))
                    .filter_map(|upload| upload.upload_id())
                    .map(UploadId::new),
            );

            if output.is_truncated() != Some(true) {
                break;
            }
            key_marker = output.next_key_marker().map(String::from);
            upload_id_marker = output.next_upload_id_marker().map(String::from);
            if key_marker.is_none() && upload_id_marker.is_none() {
                break;
            }
        }

        debug!("{} upload(s) in progress for {}/{}", uploads.len(), bucket, key);
        Ok(uploads)
    }

    async fn create_multipart_upload(
        &self,
        bucket: &BucketId,
        key: &Key,
    ) -> EndpointResult<UploadId> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .customize()
            .mutate_request(|req| {
                req.headers_mut().insert(LIVE_READ_HEADER, "true");
            })
            .send()
            .await
            .map_err(endpoint_error)?;

        output
            .upload_id()
            .map(UploadId::new)
            .ok_or_else(|| EndpointError::Transport("CreateMultipartUpload returned no UploadId".to_string()))
    }

    async fn upload_part(
        &self,
        bucket: &BucketId,
        key: &Key,
        upload_id: &UploadId,
        part_number: u32,
        data: Bytes,
    ) -> EndpointResult<String> {
        let output = self
            .client
            .upload_part()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .upload_id(upload_id.as_str())
            .part_number(part_number as i32)
            .body(ByteStream::from(data))
            .customize()
            .mutate_request(|req| {
                req.headers_mut().insert(LIVE_READ_HEADER, "true");
            })
            .send()
            .await
            .map_err(endpoint_error)?;

        output
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| EndpointError::Transport(format!("part {} returned no ETag", part_number)))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &BucketId,
        key: &Key,
        upload_id: &UploadId,
        parts: &[Part],
    ) -> EndpointResult<()> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|part| {
                        CompletedPart::builder()
                            .e_tag(&part.e_tag)
                            .part_number(part.part_number as i32)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .upload_id(upload_id.as_str())
            .multipart_upload(completed)
            .customize()
            .mutate_request(|req| {
                req.headers_mut().insert(LIVE_READ_HEADER, "true");
            })
            .send()
            .await
            .map_err(endpoint_error)?;
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &BucketId,
        key: &Key,
        upload_id: &UploadId,
    ) -> EndpointResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .upload_id(upload_id.as_str())
            .customize()
            .mutate_request(|req| {
                req.headers_mut().insert(LIVE_READ_HEADER, "true");
            })
            .send()
            .await
            .map_err(endpoint_error)?;
        Ok(())
    }
}

//! Environment configuration
//!
//! Credentials, region and endpoint URL come from the standard AWS variables
//! (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_ENDPOINT_URL`,
//! `AWS_REGION`) and are resolved by `aws-config`. Only the bucket is ours.

use liveread_core::BucketId;

use crate::{ClientError, Result};

/// Variable naming the bucket to transfer to or from
pub const BUCKET_ENV: &str = "LIVEREAD_BUCKET";

/// Read and validate the bucket name from [`BUCKET_ENV`].
pub fn bucket_from_env() -> Result<BucketId> {
    let name = std::env::var(BUCKET_ENV).map_err(|_| ClientError::MissingEnv {
        name: BUCKET_ENV.to_string(),
    })?;
    Ok(BucketId::new(name.trim())?)
}

//! S3-compatible endpoint for live read/write transfers

pub mod client;
pub mod config;
pub mod error;

pub use client::S3Endpoint;
pub use config::{bucket_from_env, BUCKET_ENV};
pub use error::ClientError;

pub type Result<T> = std::result::Result<T, ClientError>;

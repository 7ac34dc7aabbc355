//! Client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Missing environment variable: {name}")]
    MissingEnv { name: String },

    #[error("Core error: {0}")]
    Core(#[from] liveread_core::LiveReadError),
}

//! Core data models and types for liveread

pub mod endpoint;
pub mod error;
pub mod types;

pub use endpoint::*;
pub use error::*;
pub use types::*;

/// Result type alias for liveread operations
pub type Result<T> = std::result::Result<T, LiveReadError>;

//! Live read/write transfer engines
//!
//! [`PollingReader`] follows an object that another process is still
//! uploading, and [`Uploader`] publishes one part at a time so such a reader
//! can start early. Each runs on its own task and talks to its caller through
//! a [`BoundedRelay`].

pub mod download;
pub mod ingest;
pub mod relay;
pub mod shutdown;
pub mod upload;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use download::*;
pub use ingest::*;
pub use relay::*;
pub use shutdown::*;
pub use upload::*;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryEndpoint;

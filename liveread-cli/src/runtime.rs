//! Tokio runtime for the binary

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// How long exit waits for blocking-pool threads.
///
/// A stdin read left pending by a shutdown request only returns when more
/// input arrives, so the runtime is not allowed to wait for it indefinitely.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

pub fn tokio_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread().enable_all().build()
}

/// Run `future` to completion on a fresh runtime, then shut the runtime down
/// without waiting more than [`SHUTDOWN_TIMEOUT`] for blocking work.
pub fn block_on<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio_runtime()?;
    let output = runtime.block_on(future);
    debug!("Shutting down runtime");
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    Ok(output)
}

//! Producer loop feeding an uploader from a byte source

use bytes::Bytes;
use liveread_core::{LiveReadError, Result};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

use crate::shutdown::ShutdownController;
use crate::upload::{Task, UploadHandle};

/// What the producer handed to the uploader
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub bytes: u64,
    pub parts: u32,
    /// Input was cut short by a shutdown request
    pub interrupted: bool,
}

/// Read `reader` in `chunk_size` pieces and queue the full upload protocol:
/// Create, one UploadPart per piece, then Complete.
///
/// Only the last piece can be shorter than `chunk_size`. When `shutdown`
/// fires, reading stops, whatever is buffered goes out as the final part and
/// the upload is completed.
pub async fn ingest<R>(
    mut reader: R,
    chunk_size: usize,
    uploader: &UploadHandle,
    shutdown: &ShutdownController,
) -> Result<IngestSummary>
where
    R: AsyncRead + Unpin,
{
    if chunk_size == 0 {
        return Err(LiveReadError::InvalidConfig(
            "chunk size must be at least 1 byte".to_string(),
        ));
    }

    uploader.submit(Task::Create).await?;

    let mut summary = IngestSummary::default();
    loop {
        let (buffer, more) = fill_buffer(&mut reader, chunk_size, shutdown).await?;
        if !buffer.is_empty() {
            summary.bytes += buffer.len() as u64;
            summary.parts += 1;
            debug!("Queueing part {} with size {}", summary.parts, buffer.len());
            uploader.submit(Task::UploadPart(buffer)).await?;
        }
        if !more {
            break;
        }
    }

    summary.interrupted = shutdown.is_requested();
    if summary.interrupted {
        info!("Stopped reading input after {} bytes", summary.bytes);
    }

    uploader.submit(Task::Complete).await?;
    Ok(summary)
}

/// Fill one buffer. The flag is true when more input may follow.
async fn fill_buffer<R>(
    reader: &mut R,
    chunk_size: usize,
    shutdown: &ShutdownController,
) -> Result<(Bytes, bool)>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; chunk_size];
    let mut filled = 0;

    while filled < chunk_size {
        if shutdown.is_requested() {
            buffer.truncate(filled);
            return Ok((Bytes::from(buffer), false));
        }

        // `read` is cancel safe: losing the race to shutdown drops no input
        let n = tokio::select! {
            biased;
            _ = shutdown.requested() => continue,
            n = reader.read(&mut buffer[filled..]) => n?,
        };

        if n == 0 {
            buffer.truncate(filled);
            return Ok((Bytes::from(buffer), false));
        }
        filled += n;
    }

    Ok((Bytes::from(buffer), true))
}

//! `liveread read`: follow a live object into a file or stdout

use std::io::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use liveread_core::{BucketId, TransferEndpoint, TransferSession};
use liveread_engine::{DownloadHandle, DownloadSummary, PollingReader};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::config::ReadSettings;

pub async fn run<E>(endpoint: Arc<E>, bucket: BucketId, settings: &ReadSettings) -> Result<DownloadSummary>
where
    E: TransferEndpoint + ?Sized + 'static,
{
    let session = TransferSession::new(bucket, settings.key.clone())
        .with_chunk_size(settings.chunk_size)
        .with_poll_interval(settings.poll_interval);
    let mut handle = PollingReader::new(endpoint, session, settings.mode)?.spawn(settings.queue_depth)?;

    match &settings.output {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("failed to create {}", path.display()))?;
            copy_chunks(&mut handle, file, settings.progress).await?;
        }
        None => {
            copy_chunks(&mut handle, tokio::io::stdout(), settings.progress).await?;
        }
    }

    let summary = handle.finish().await?;
    if settings.progress {
        eprintln!();
    }
    Ok(summary)
}

/// Write every chunk as it arrives, flushing so downstream readers see it at once.
pub async fn copy_chunks<W>(handle: &mut DownloadHandle, mut out: W, progress: bool) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(chunk) = handle.recv().await {
        out.write_all(&chunk.data).await.context("failed to write output")?;
        out.flush().await.context("failed to flush output")?;
        written += chunk.len() as u64;
        debug!("Wrote {} bytes at offset {}", chunk.len(), chunk.position);

        if progress {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, ".");
            let _ = stderr.flush();
        }
    }
    out.shutdown().await.context("failed to close output")?;
    Ok(written)
}

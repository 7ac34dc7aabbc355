//! `liveread write`: publish a file or stdin as a live multipart upload

use std::sync::Arc;

use anyhow::{Context, Result};
use liveread_core::{BucketId, LiveReadError, TransferEndpoint};
use liveread_engine::{ingest, IngestSummary, ShutdownController, UploadOutcome, Uploader};
use serde::Serialize;
use tokio::io::AsyncRead;

use crate::config::WriteSettings;

/// What `write` reports with `--summary`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub input: IngestSummary,
    pub upload: UploadOutcome,
}

pub async fn run<E>(
    endpoint: Arc<E>,
    bucket: BucketId,
    settings: &WriteSettings,
    shutdown: &ShutdownController,
) -> Result<WriteReport>
where
    E: TransferEndpoint + ?Sized + 'static,
{
    match &settings.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            upload(endpoint, bucket, settings, file, shutdown).await
        }
        None => upload(endpoint, bucket, settings, tokio::io::stdin(), shutdown).await,
    }
}

/// Stream `input` through a spawned [`Uploader`] and wait for it to finish.
pub async fn upload<E, R>(
    endpoint: Arc<E>,
    bucket: BucketId,
    settings: &WriteSettings,
    input: R,
    shutdown: &ShutdownController,
) -> Result<WriteReport>
where
    E: TransferEndpoint + ?Sized + 'static,
    R: AsyncRead + Unpin,
{
    let uploader = Uploader::new(endpoint, bucket, settings.key.clone()).spawn(settings.queue_depth)?;

    let ingested = ingest(input, settings.chunk_size, &uploader, shutdown).await;
    let outcome = uploader.wait_until_complete().await;

    let input = match ingested {
        Ok(input) => input,
        // The uploader stopped taking tasks; its own error says why
        Err(LiveReadError::RelayClosed) => {
            outcome?;
            return Err(LiveReadError::RelayClosed.into());
        }
        Err(e) => return Err(anyhow::Error::new(e).context("failed to read input")),
    };

    Ok(WriteReport { input, upload: outcome? })
}

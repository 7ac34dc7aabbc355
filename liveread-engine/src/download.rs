//! Polling download of an object that may still be being written

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use liveread_core::*;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::relay::{BoundedRelay, RelayReceiver};

/// How the reader behaves when no upload is in progress at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMode {
    /// Poll until an upload for the key appears, then follow it.
    #[default]
    WaitForUpload,
    /// Read the object as it stands without pinning an upload, and stop at
    /// the first range that is not there yet. May race the end of an upload.
    Immediate,
}

/// Totals reported once a download has finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    pub bytes: u64,
    pub chunks: u64,
    pub upload_id: Option<UploadId>,
}

/// Download state machine.
///
/// Requests `[offset, offset + chunk_size)` over and over. Data advances the
/// offset by however many bytes came back. An unsatisfiable range means
/// either "not written yet" (the pinned upload is still listed, so poll) or
/// "finished" (it is not, so stop).
pub struct PollingReader<E: ?Sized> {
    endpoint: Arc<E>,
    session: TransferSession,
    mode: StartMode,
    state: DownloadState,
    // Offset we last announced polling for, so retries at the same point stay quiet
    polling_offset: Option<u64>,
    logged_not_found: bool,
    chunks: u64,
}

impl<E> PollingReader<E>
where
    E: TransferEndpoint + ?Sized + 'static,
{
    pub fn new(endpoint: Arc<E>, session: TransferSession, mode: StartMode) -> Result<Self> {
        if session.chunk_size == 0 {
            return Err(LiveReadError::InvalidConfig(
                "chunk size must be at least 1 byte".to_string(),
            ));
        }
        Ok(PollingReader {
            endpoint,
            session,
            mode,
            state: DownloadState::ResolvingVersion,
            polling_offset: None,
            logged_not_found: false,
            chunks: 0,
        })
    }

    pub fn state(&self) -> DownloadState {
        self.state
    }

    pub fn session(&self) -> &TransferSession {
        &self.session
    }

    pub fn summary(&self) -> DownloadSummary {
        DownloadSummary {
            bytes: self.session.offset,
            chunks: self.chunks,
            upload_id: self.session.upload_id.clone(),
        }
    }

    /// Pin the reader to the most recent upload for the key.
    ///
    /// In [`StartMode::WaitForUpload`] this blocks until an upload exists.
    /// [`StartMode::Immediate`] never pins.
    pub async fn resolve_version(&mut self) -> Result<()> {
        if self.mode == StartMode::Immediate {
            debug!("Reading {} directly without waiting for an upload", self.session.key);
            self.state = DownloadState::Streaming;
            return Ok(());
        }

        let mut logged = false;
        let upload_id = loop {
            let latest = self
                .endpoint
                .latest_upload(&self.session.bucket, &self.session.key)
                .await
                .map_err(|e| self.fatal("ListMultipartUploads", e))?;

            if let Some(upload_id) = latest {
                break upload_id;
            }

            if !logged {
                info!(
                    "No active upload for {}/{}. Will retry every {:?}.",
                    self.session.bucket, self.session.key, self.session.poll_interval
                );
                logged = true;
            }
            tokio::time::sleep(self.session.poll_interval).await;
        };

        debug!("Reading UploadId {}", upload_id);
        self.session.upload_id = Some(upload_id);
        self.state = DownloadState::Streaming;
        Ok(())
    }

    /// Next chunk of the object, or `None` once the upload has finished and
    /// every byte has been returned.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        if self.state == DownloadState::ResolvingVersion {
            self.resolve_version().await?;
        }

        loop {
            if self.state.is_terminal() {
                return Ok(None);
            }

            let range = self.session.next_range();
            if self.polling_offset != Some(self.session.offset) {
                debug!("Getting range {}", range);
            }

            let result = self
                .endpoint
                .get_object_range(
                    &self.session.bucket,
                    &self.session.key,
                    self.session.upload_id.as_ref(),
                    range,
                )
                .await;

            match result {
                Ok(read) if (read.data.len() as u64) < read.content_length => {
                    debug!(
                        "Body for range {} ended after {} of {} bytes. Will retry.",
                        range,
                        read.data.len(),
                        read.content_length
                    );
                    continue;
                }
                Ok(read) if !read.data.is_empty() => {
                    return Ok(Some(self.accept(range, read.data)));
                }
                Ok(_) | Err(EndpointError::RangeNotSatisfiable) => {
                    if !self.upload_in_progress().await? {
                        info!("Download is complete. Downloaded {} bytes", self.session.offset);
                        self.state = DownloadState::Completed;
                        return Ok(None);
                    }
                    if self.polling_offset != Some(self.session.offset) {
                        warn!(
                            "Polling every {:?} for range {}.",
                            self.session.poll_interval, range
                        );
                        self.polling_offset = Some(self.session.offset);
                    }
                }
                Err(EndpointError::NotFound) => {
                    if !self.logged_not_found {
                        warn!(
                            "{}/{} does not (yet?) exist. Will check every {:?}",
                            self.session.bucket, self.session.key, self.session.poll_interval
                        );
                        self.logged_not_found = true;
                    }
                }
                Err(EndpointError::Interrupted(reason)) => {
                    debug!("Response stream interrupted: {}. Will retry.", reason);
                    continue;
                }
                Err(e) => return Err(self.fatal("GetObject", e)),
            }

            self.state = DownloadState::Polling;
            tokio::time::sleep(self.session.poll_interval).await;
        }
    }

    /// Run the reader on its own task, handing chunks over through a relay
    /// that holds at most `queue_depth` of them.
    pub fn spawn(self, queue_depth: usize) -> Result<DownloadHandle> {
        let (tx, rx) = BoundedRelay::new(queue_depth)?;

        let task = tokio::spawn(async move {
            let mut reader = self;
            info!("Starting multipart download");
            while let Some(chunk) = reader.next_chunk().await? {
                if tx.send(chunk).await.is_err() {
                    debug!("Consumer went away; stopping download");
                    break;
                }
            }
            info!("Finished multipart download");
            Ok::<_, LiveReadError>(reader.summary())
        });

        Ok(DownloadHandle { chunks: rx, task })
    }

    fn accept(&mut self, range: ByteRange, data: Bytes) -> Chunk {
        let n = data.len() as u64;
        debug!("Got range {} with size {}", range, n);

        let chunk = Chunk::new(self.session.offset, data);
        self.session.advance(n);
        self.chunks += 1;
        self.state = DownloadState::Streaming;
        chunk
    }

    async fn upload_in_progress(&self) -> Result<bool> {
        // Without a pinned upload there is nothing to wait for
        let Some(upload_id) = &self.session.upload_id else {
            return Ok(false);
        };

        let uploads = self
            .endpoint
            .list_in_progress_uploads(&self.session.bucket, &self.session.key)
            .await
            .map_err(|e| self.fatal("ListMultipartUploads", e))?;

        Ok(uploads.iter().any(|id| id == upload_id))
    }

    fn fatal(&self, operation: &'static str, source: EndpointError) -> LiveReadError {
        LiveReadError::endpoint(operation, &self.session.bucket, &self.session.key, source)
    }
}

/// Consumer end of a spawned [`PollingReader`].
///
/// Yields chunks in offset order; the stream ends after the last chunk, at
/// which point [`DownloadHandle::finish`] reports how the download ended.
pub struct DownloadHandle {
    chunks: RelayReceiver<Chunk>,
    task: JoinHandle<Result<DownloadSummary>>,
}

impl DownloadHandle {
    pub async fn recv(&mut self) -> Option<Chunk> {
        self.chunks.recv().await
    }

    /// Wait for the reader task and return its summary or its fatal error.
    pub async fn finish(mut self) -> Result<DownloadSummary> {
        self.chunks.close();
        self.task
            .await
            .map_err(|e| LiveReadError::Internal(format!("download task failed: {}", e)))?
    }
}

impl Stream for DownloadHandle {
    type Item = Chunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().chunks.poll_recv(cx)
    }
}

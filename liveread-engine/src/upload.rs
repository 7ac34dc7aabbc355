//! Sequential multipart upload driven by a task queue

use std::sync::Arc;

use bytes::Bytes;
use liveread_core::*;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::relay::{BoundedRelay, RelayReceiver, RelaySender};

/// One step of the upload protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Create,
    UploadPart(Bytes),
    Complete,
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::Create => write!(f, "Create task"),
            Task::UploadPart(buffer) => {
                write!(f, "Upload task with buffer length {}", buffer.len())
            }
            Task::Complete => write!(f, "Complete task"),
        }
    }
}

/// Parts accepted so far, in part-number order
#[derive(Debug, Default, Clone)]
pub struct PartAccumulator {
    parts: Vec<Part>,
}

impl PartAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number the next uploaded part must carry
    pub fn next_part_number(&self) -> u32 {
        self.parts.len() as u32 + 1
    }

    /// Record an accepted part. Numbers must continue the sequence exactly.
    pub fn push(&mut self, part: Part) -> Result<()> {
        let expected = self.next_part_number();
        if part.part_number != expected {
            return Err(LiveReadError::Internal(format!(
                "part number {} out of sequence, expected {}",
                part.part_number, expected
            )));
        }
        self.parts.push(part);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }
}

/// How an upload ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    Completed { upload_id: UploadId, parts: usize, bytes: u64 },
    /// No data was produced, so the upload was discarded.
    Aborted { upload_id: UploadId },
}

/// Upload state machine.
///
/// Executes [`Task`]s strictly in submission order. Create opens the upload,
/// each UploadPart adds the next numbered part, and Complete either commits
/// the parts or, when there are none, aborts the upload.
pub struct Uploader<E: ?Sized> {
    endpoint: Arc<E>,
    bucket: BucketId,
    key: Key,
    upload_id: Option<UploadId>,
    parts: PartAccumulator,
    state: UploadState,
    min_part_size: usize,
    // Set once a part below the minimum size was sent; it must be the last one
    short_part: Option<u32>,
    bytes: u64,
}

impl<E> Uploader<E>
where
    E: TransferEndpoint + ?Sized + 'static,
{
    pub fn new(endpoint: Arc<E>, bucket: BucketId, key: Key) -> Self {
        Uploader {
            endpoint,
            bucket,
            key,
            upload_id: None,
            parts: PartAccumulator::new(),
            state: UploadState::Idle,
            min_part_size: MIN_PART_SIZE,
            short_part: None,
            bytes: 0,
        }
    }

    /// Override the minimum size of non-final parts.
    pub fn with_min_part_size(mut self, min_part_size: usize) -> Self {
        self.min_part_size = min_part_size;
        self
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn upload_id(&self) -> Option<&UploadId> {
        self.upload_id.as_ref()
    }

    pub fn parts(&self) -> &PartAccumulator {
        &self.parts
    }

    /// Run one task. Returns the outcome once the upload reached a terminal state.
    pub async fn execute(&mut self, task: Task) -> Result<Option<UploadOutcome>> {
        debug!("Executing {}", task);
        if self.state.is_terminal() {
            return Err(LiveReadError::InvalidState(format!(
                "{} received after upload finished",
                task
            )));
        }

        match task {
            Task::Create => {
                self.create_multipart_upload().await?;
                Ok(None)
            }
            Task::UploadPart(buffer) => {
                self.upload_part(buffer).await?;
                Ok(None)
            }
            Task::Complete => self.complete_multipart_upload().await.map(Some),
        }
    }

    async fn create_multipart_upload(&mut self) -> Result<()> {
        if let Some(existing) = &self.upload_id {
            return Err(LiveReadError::InvalidState(format!(
                "multipart upload {} already created",
                existing
            )));
        }

        let upload_id = self
            .endpoint
            .create_multipart_upload(&self.bucket, &self.key)
            .await
            .map_err(|e| self.fatal("CreateMultipartUpload", e))?;

        debug!("Created multipart upload. UploadId is {}", upload_id);
        self.upload_id = Some(upload_id);
        self.state = UploadState::Created;
        Ok(())
    }

    async fn upload_part(&mut self, buffer: Bytes) -> Result<()> {
        let Some(upload_id) = self.upload_id.clone() else {
            return Err(LiveReadError::InvalidState(
                "part submitted before the upload was created".to_string(),
            ));
        };
        if let Some(short) = self.short_part {
            return Err(LiveReadError::InvalidState(format!(
                "part {} was below the minimum part size and must be the last part",
                short
            )));
        }

        let part_number = self.parts.next_part_number();
        let size = buffer.len();
        debug!("Uploading part number {} with size {}", part_number, size);

        let e_tag = self
            .endpoint
            .upload_part(&self.bucket, &self.key, &upload_id, part_number, buffer)
            .await
            .map_err(|e| self.fatal("UploadPart", e))?;

        debug!("Uploaded part number {}; ETag is {}", part_number, e_tag);
        self.parts.push(Part { part_number, e_tag })?;
        self.bytes += size as u64;
        if size < self.min_part_size {
            self.short_part = Some(part_number);
        }
        self.state = UploadState::Uploading;
        Ok(())
    }

    async fn complete_multipart_upload(&mut self) -> Result<UploadOutcome> {
        let Some(upload_id) = self.upload_id.clone() else {
            return Err(LiveReadError::NoUploadCreated);
        };
        self.state = UploadState::Completing;

        if self.parts.is_empty() {
            warn!("Aborting multipart upload since there are no parts!");
            self.endpoint
                .abort_multipart_upload(&self.bucket, &self.key, &upload_id)
                .await
                .map_err(|e| self.fatal("AbortMultipartUpload", e))?;
            self.state = UploadState::Aborted;
            return Ok(UploadOutcome::Aborted { upload_id });
        }

        debug!("Completing multipart upload with {} parts", self.parts.len());
        self.endpoint
            .complete_multipart_upload(&self.bucket, &self.key, &upload_id, self.parts.parts())
            .await
            .map_err(|e| self.fatal("CompleteMultipartUpload", e))?;

        self.state = UploadState::Done;
        Ok(UploadOutcome::Completed {
            upload_id,
            parts: self.parts.len(),
            bytes: self.bytes,
        })
    }

    /// Discard the upload after a failure so no partial upload is left behind.
    async fn abandon(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        let Some(upload_id) = self.upload_id.clone() else {
            return;
        };

        warn!("Aborting multipart upload {}", upload_id);
        match self
            .endpoint
            .abort_multipart_upload(&self.bucket, &self.key, &upload_id)
            .await
        {
            Ok(()) => self.state = UploadState::Aborted,
            Err(e) => error!("Failed to abort multipart upload {}: {}", upload_id, e),
        }
    }

    /// Drain `tasks` until Complete has run.
    pub async fn run(mut self, mut tasks: RelayReceiver<Task>) -> Result<UploadOutcome> {
        info!("Starting multipart upload");

        while let Some(task) = tasks.recv().await {
            match self.execute(task).await {
                Ok(Some(outcome)) => {
                    info!("Finished multipart upload");
                    return Ok(outcome);
                }
                Ok(None) => {}
                Err(e) => {
                    tasks.close();
                    self.abandon().await;
                    return Err(e);
                }
            }
        }

        self.abandon().await;
        Err(LiveReadError::InvalidState(
            "task queue closed before the upload was completed".to_string(),
        ))
    }

    /// Run the uploader on its own task behind a relay of `queue_depth` tasks.
    pub fn spawn(self, queue_depth: usize) -> Result<UploadHandle> {
        let (tx, rx) = BoundedRelay::new(queue_depth)?;
        let task = tokio::spawn(self.run(rx));
        Ok(UploadHandle { tasks: tx, task })
    }

    fn fatal(&self, operation: &'static str, source: EndpointError) -> LiveReadError {
        LiveReadError::endpoint(operation, &self.bucket, &self.key, source)
    }
}

/// Producer end of a spawned [`Uploader`]
pub struct UploadHandle {
    tasks: RelaySender<Task>,
    task: JoinHandle<Result<UploadOutcome>>,
}

impl UploadHandle {
    /// Queue a task. Only waits when the uploader has fallen behind.
    pub async fn submit(&self, task: Task) -> Result<()> {
        self.tasks.send(task).await
    }

    /// Wait for the uploader to drain its queue and finish.
    pub async fn wait_until_complete(self) -> Result<UploadOutcome> {
        drop(self.tasks);
        self.task
            .await
            .map_err(|e| LiveReadError::Internal(format!("upload task failed: {}", e)))?
    }
}

//! In-memory endpoint for tests
//!
//! Behaves like a live-read capable object store for a single bucket:
//! in-progress uploads can be read while parts are still arriving, and a
//! completed upload becomes the object version with the same id. Every call
//! is recorded, and failures can be queued per operation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use liveread_core::*;

/// Endpoint operation, used to target injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetObject,
    ListUploads,
    Create,
    UploadPart,
    Complete,
    Abort,
}

/// A recorded endpoint call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetObject {
        version: Option<UploadId>,
        range: ByteRange,
        /// Bytes returned, or the error handed back
        outcome: std::result::Result<usize, EndpointError>,
    },
    ListUploads { found: Vec<UploadId> },
    Create { upload_id: UploadId },
    UploadPart { upload_id: UploadId, part_number: u32, size: usize },
    Complete { upload_id: UploadId, part_numbers: Vec<u32> },
    Abort { upload_id: UploadId },
}

#[derive(Debug)]
struct Upload {
    id: UploadId,
    key: Key,
    parts: Vec<(u32, Bytes)>,
}

impl Upload {
    fn contents(&self) -> Bytes {
        let mut parts: Vec<&(u32, Bytes)> = self.parts.iter().collect();
        parts.sort_by_key(|(n, _)| *n);
        let mut data = BytesMut::new();
        for (_, bytes) in parts {
            data.extend_from_slice(bytes);
        }
        data.freeze()
    }
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    uploads: Vec<Upload>,
    // Completed versions per key, oldest first
    objects: HashMap<Key, Vec<(UploadId, Bytes)>>,
    faults: HashMap<Operation, VecDeque<EndpointError>>,
    // Bytes to keep from upcoming successful reads; the announced length stays whole
    short_reads: VecDeque<usize>,
    calls: Vec<Call>,
}

impl Inner {
    fn take_fault(&mut self, op: Operation) -> Option<EndpointError> {
        self.faults.get_mut(&op).and_then(VecDeque::pop_front)
    }

    fn upload_mut(&mut self, key: &Key, id: &UploadId) -> EndpointResult<&mut Upload> {
        self.uploads
            .iter_mut()
            .find(|u| &u.key == key && &u.id == id)
            .ok_or_else(|| no_such_upload(id))
    }

    fn contents(&self, key: &Key, version: Option<&UploadId>) -> Option<Bytes> {
        let objects = self.objects.get(key);
        match version {
            Some(id) => self
                .uploads
                .iter()
                .find(|u| &u.key == key && &u.id == id)
                .map(Upload::contents)
                .or_else(|| {
                    objects?
                        .iter()
                        .find(|(v, _)| v == id)
                        .map(|(_, data)| data.clone())
                }),
            None => objects
                .and_then(|versions| versions.last())
                .map(|(_, data)| data.clone())
                .or_else(|| {
                    self.uploads
                        .iter()
                        .rev()
                        .find(|u| &u.key == key)
                        .map(Upload::contents)
                }),
        }
    }
}

fn no_such_upload(id: &UploadId) -> EndpointError {
    EndpointError::Status {
        status: 404,
        message: format!("NoSuchUpload: {}", id),
    }
}

/// Live-read object store held in memory
#[derive(Debug, Default)]
pub struct MemoryEndpoint {
    inner: Mutex<Inner>,
}

impl MemoryEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next call to `op` fail with `error`.
    pub fn fail_next(&self, op: Operation, error: EndpointError) {
        self.lock().faults.entry(op).or_default().push_back(error);
    }

    /// Cut the body of the next successful range read to `keep` bytes.
    pub fn truncate_next_read(&self, keep: usize) {
        self.lock().short_reads.push_back(keep);
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Latest completed version of `key`
    pub fn object(&self, key: &Key) -> Option<Bytes> {
        self.lock()
            .objects
            .get(key)
            .and_then(|versions| versions.last())
            .map(|(_, data)| data.clone())
    }

    /// Uploads currently in progress for `key`
    pub fn in_progress(&self, key: &Key) -> Vec<UploadId> {
        self.lock()
            .uploads
            .iter()
            .filter(|u| &u.key == key)
            .map(|u| u.id.clone())
            .collect()
    }
}

#[async_trait]
impl TransferEndpoint for MemoryEndpoint {
    async fn get_object_range(
        &self,
        _bucket: &BucketId,
        key: &Key,
        version: Option<&UploadId>,
        range: ByteRange,
    ) -> EndpointResult<RangeRead> {
        let mut inner = self.lock();

        let result = match inner.take_fault(Operation::GetObject) {
            Some(fault) => Err(fault),
            None => match inner.contents(key, version) {
                None => Err(EndpointError::NotFound),
                Some(data) if range.start >= data.len() as u64 => {
                    Err(EndpointError::RangeNotSatisfiable)
                }
                Some(data) => {
                    let end = range.end().min(data.len() as u64);
                    let slice = data.slice(range.start as usize..end as usize);
                    let content_length = slice.len() as u64;
                    let data = match inner.short_reads.pop_front() {
                        Some(keep) => slice.slice(..keep.min(slice.len())),
                        None => slice,
                    };
                    Ok(RangeRead { data, content_length })
                }
            },
        };

        inner.calls.push(Call::GetObject {
            version: version.cloned(),
            range,
            outcome: result.as_ref().map(|r| r.data.len()).map_err(|e| e.clone()),
        });
        result
    }

    async fn list_in_progress_uploads(
        &self,
        _bucket: &BucketId,
        key: &Key,
    ) -> EndpointResult<Vec<UploadId>> {
        let mut inner = self.lock();
        if let Some(fault) = inner.take_fault(Operation::ListUploads) {
            return Err(fault);
        }

        let found: Vec<UploadId> = inner
            .uploads
            .iter()
            .filter(|u| &u.key == key)
            .map(|u| u.id.clone())
            .collect();
        inner.calls.push(Call::ListUploads { found: found.clone() });
        Ok(found)
    }

    async fn create_multipart_upload(
        &self,
        _bucket: &BucketId,
        key: &Key,
    ) -> EndpointResult<UploadId> {
        let mut inner = self.lock();
        if let Some(fault) = inner.take_fault(Operation::Create) {
            return Err(fault);
        }

        inner.next_id += 1;
        let upload_id = UploadId::new(format!("upload-{}", inner.next_id));
        inner.uploads.push(Upload {
            id: upload_id.clone(),
            key: key.clone(),
            parts: Vec::new(),
        });
        inner.calls.push(Call::Create { upload_id: upload_id.clone() });
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &BucketId,
        key: &Key,
        upload_id: &UploadId,
        part_number: u32,
        data: Bytes,
    ) -> EndpointResult<String> {
        let mut inner = self.lock();
        if let Some(fault) = inner.take_fault(Operation::UploadPart) {
            return Err(fault);
        }

        let size = data.len();
        let upload = inner.upload_mut(key, upload_id)?;
        upload.parts.retain(|(n, _)| *n != part_number);
        upload.parts.push((part_number, data));

        inner.calls.push(Call::UploadPart {
            upload_id: upload_id.clone(),
            part_number,
            size,
        });
        Ok(format!("\"{}-{}\"", upload_id, part_number))
    }

    async fn complete_multipart_upload(
        &self,
        _bucket: &BucketId,
        key: &Key,
        upload_id: &UploadId,
        parts: &[Part],
    ) -> EndpointResult<()> {
        let mut inner = self.lock();
        if let Some(fault) = inner.take_fault(Operation::Complete) {
            return Err(fault);
        }
        if parts.is_empty() {
            return Err(EndpointError::Status {
                status: 400,
                message: "MalformedXML: no parts".to_string(),
            });
        }

        let index = inner
            .uploads
            .iter()
            .position(|u| &u.key == key && &u.id == upload_id)
            .ok_or_else(|| no_such_upload(upload_id))?;
        let upload = inner.uploads.remove(index);
        let data = upload.contents();

        inner.calls.push(Call::Complete {
            upload_id: upload_id.clone(),
            part_numbers: parts.iter().map(|p| p.part_number).collect(),
        });
        inner
            .objects
            .entry(key.clone())
            .or_default()
            .push((upload_id.clone(), data));
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &BucketId,
        key: &Key,
        upload_id: &UploadId,
    ) -> EndpointResult<()> {
        let mut inner = self.lock();
        if let Some(fault) = inner.take_fault(Operation::Abort) {
            return Err(fault);
        }

        let before = inner.uploads.len();
        inner.uploads.retain(|u| !(&u.key == key && &u.id == upload_id));
        if inner.uploads.len() == before {
            return Err(no_such_upload(upload_id));
        }
        inner.calls.push(Call::Abort { upload_id: upload_id.clone() });
        Ok(())
    }
}

//! Integration tests for the task-driven uploader

use std::sync::Arc;

use bytes::Bytes;
use liveread_core::*;
use liveread_engine::memory::{Call, Operation};
use liveread_engine::*;

fn ids() -> (BucketId, Key) {
    (BucketId::new("live-bucket").unwrap(), Key::new("capture.bin").unwrap())
}

fn uploader(endpoint: &Arc<MemoryEndpoint>) -> Uploader<MemoryEndpoint> {
    let (bucket, key) = ids();
    Uploader::new(endpoint.clone(), bucket, key).with_min_part_size(4)
}

#[tokio::test]
async fn completes_with_every_part_in_order() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let handle = uploader(&endpoint).spawn(2).unwrap();

    handle.submit(Task::Create).await.unwrap();
    for part in [&b"abcd"[..], &b"efgh"[..], &b"ij"[..]] {
        handle.submit(Task::UploadPart(Bytes::copy_from_slice(part))).await.unwrap();
    }
    handle.submit(Task::Complete).await.unwrap();

    let outcome = handle.wait_until_complete().await.unwrap();
    let upload_id = UploadId::new("upload-1");
    assert_eq!(
        outcome,
        UploadOutcome::Completed { upload_id: upload_id.clone(), parts: 3, bytes: 10 }
    );

    assert_eq!(
        endpoint.calls(),
        vec![
            Call::Create { upload_id: upload_id.clone() },
            Call::UploadPart { upload_id: upload_id.clone(), part_number: 1, size: 4 },
            Call::UploadPart { upload_id: upload_id.clone(), part_number: 2, size: 4 },
            Call::UploadPart { upload_id: upload_id.clone(), part_number: 3, size: 2 },
            Call::Complete { upload_id, part_numbers: vec![1, 2, 3] },
        ]
    );

    let (_, key) = ids();
    assert_eq!(endpoint.object(&key).unwrap(), Bytes::from_static(b"abcdefghij"));
    assert!(endpoint.in_progress(&key).is_empty());
}

#[tokio::test]
async fn aborts_instead_of_completing_when_no_parts_were_sent() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let handle = uploader(&endpoint).spawn(2).unwrap();

    handle.submit(Task::Create).await.unwrap();
    handle.submit(Task::Complete).await.unwrap();

    let outcome = handle.wait_until_complete().await.unwrap();
    assert_eq!(outcome, UploadOutcome::Aborted { upload_id: UploadId::new("upload-1") });

    let calls = endpoint.calls();
    assert!(calls.iter().any(|c| matches!(c, Call::Abort { .. })));
    assert!(!calls.iter().any(|c| matches!(c, Call::Complete { .. })));

    let (_, key) = ids();
    assert!(endpoint.in_progress(&key).is_empty());
    assert!(endpoint.object(&key).is_none());
}

#[tokio::test]
async fn complete_without_create_is_fatal() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let handle = uploader(&endpoint).spawn(1).unwrap();

    handle.submit(Task::Complete).await.unwrap();
    let result = handle.wait_until_complete().await;

    assert!(matches!(result, Err(LiveReadError::NoUploadCreated)));
    assert!(endpoint.calls().is_empty());
}

#[tokio::test]
async fn state_follows_each_task() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let mut uploader = uploader(&endpoint);
    assert_eq!(uploader.state(), UploadState::Idle);

    assert_eq!(uploader.execute(Task::Create).await.unwrap(), None);
    assert_eq!(uploader.state(), UploadState::Created);
    assert!(uploader.upload_id().is_some());

    uploader
        .execute(Task::UploadPart(Bytes::from_static(b"data")))
        .await
        .unwrap();
    assert_eq!(uploader.state(), UploadState::Uploading);
    assert_eq!(uploader.parts().next_part_number(), 2);

    let outcome = uploader.execute(Task::Complete).await.unwrap();
    assert!(matches!(outcome, Some(UploadOutcome::Completed { parts: 1, .. })));
    assert_eq!(uploader.state(), UploadState::Done);

    // Terminal: nothing more is accepted
    let late = uploader.execute(Task::UploadPart(Bytes::from_static(b"late"))).await;
    assert!(matches!(late, Err(LiveReadError::InvalidState(_))));
}

#[tokio::test]
async fn part_before_create_is_rejected() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let mut uploader = uploader(&endpoint);

    let result = uploader.execute(Task::UploadPart(Bytes::from_static(b"early"))).await;
    assert!(matches!(result, Err(LiveReadError::InvalidState(_))));
    assert!(endpoint.calls().is_empty());
}

#[tokio::test]
async fn second_create_is_rejected() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let mut uploader = uploader(&endpoint);

    uploader.execute(Task::Create).await.unwrap();
    let result = uploader.execute(Task::Create).await;
    assert!(matches!(result, Err(LiveReadError::InvalidState(_))));
    assert_eq!(endpoint.calls().len(), 1);
}

#[tokio::test]
async fn short_part_must_be_last() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let handle = uploader(&endpoint).spawn(4).unwrap();

    handle.submit(Task::Create).await.unwrap();
    handle.submit(Task::UploadPart(Bytes::from_static(b"ab"))).await.unwrap();
    // The worker may already have stopped by the time these are queued
    let _ = handle.submit(Task::UploadPart(Bytes::from_static(b"cdef"))).await;
    let _ = handle.submit(Task::Complete).await;

    let result = handle.wait_until_complete().await;
    assert!(matches!(result, Err(LiveReadError::InvalidState(_))));

    let calls = endpoint.calls();
    let uploads = calls.iter().filter(|c| matches!(c, Call::UploadPart { .. })).count();
    assert_eq!(uploads, 1);
    assert!(matches!(calls.last(), Some(Call::Abort { .. })));
}

#[tokio::test]
async fn failed_part_aborts_the_upload() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    endpoint.fail_next(
        Operation::UploadPart,
        EndpointError::Status { status: 500, message: "InternalError".to_string() },
    );
    let handle = uploader(&endpoint).spawn(2).unwrap();

    handle.submit(Task::Create).await.unwrap();
    let _ = handle.submit(Task::UploadPart(Bytes::from_static(b"abcd"))).await;
    let _ = handle.submit(Task::Complete).await;

    match handle.wait_until_complete().await {
        Err(LiveReadError::Endpoint { operation, source, .. }) => {
            assert_eq!(operation, "UploadPart");
            assert!(matches!(source, EndpointError::Status { status: 500, .. }));
        }
        other => panic!("expected UploadPart failure, got {:?}", other),
    }

    let calls = endpoint.calls();
    assert!(matches!(calls.last(), Some(Call::Abort { .. })));
    assert!(!calls.iter().any(|c| matches!(c, Call::Complete { .. })));
}

#[tokio::test]
async fn closing_the_queue_early_discards_the_upload() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let handle = uploader(&endpoint).spawn(2).unwrap();

    handle.submit(Task::Create).await.unwrap();
    handle.submit(Task::UploadPart(Bytes::from_static(b"abcd"))).await.unwrap();
    // Producer gives up without sending Complete
    let result = handle.wait_until_complete().await;

    assert!(matches!(result, Err(LiveReadError::InvalidState(_))));
    let (_, key) = ids();
    assert!(endpoint.in_progress(&key).is_empty());
    assert!(endpoint.object(&key).is_none());
    assert!(matches!(endpoint.calls().last(), Some(Call::Abort { .. })));
}

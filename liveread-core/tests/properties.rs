//! Property-based tests for liveread core

use proptest::prelude::*;
use liveread_core::*;

proptest! {
    #[test]
    fn props_offset_tracks_returned_bytes(
        reads in prop::collection::vec(0u64..10_000, 0..50),
        chunk_size in 1usize..20_000,
    ) {
        let mut session = TransferSession::new(
            BucketId::new("test-bucket").unwrap(),
            Key::new("test-key").unwrap(),
        )
        .with_chunk_size(chunk_size);

        let mut previous = 0;
        for n in &reads {
            session.advance(*n);
            // Offset never moves backwards
            prop_assert!(session.offset >= previous);
            previous = session.offset;
        }

        prop_assert_eq!(session.offset, reads.iter().sum::<u64>());
        prop_assert_eq!(session.next_range().start, session.offset);
        prop_assert_eq!(session.next_range().len, chunk_size as u64);
    }

    #[test]
    fn props_range_header_covers_exactly_len_bytes(
        start in 0u64..u64::MAX / 4,
        len in 1u64..u64::MAX / 4,
    ) {
        let header = ByteRange::new(start, len).to_header();
        let bounds = header.strip_prefix("bytes=").unwrap();
        let (first, last) = bounds.split_once('-').unwrap();
        let first: u64 = first.parse().unwrap();
        let last: u64 = last.parse().unwrap();
        prop_assert_eq!(first, start);
        prop_assert_eq!(last - first + 1, len);
    }
}

#[test]
fn test_part_serializes_for_reporting() {
    let part = Part { part_number: 3, e_tag: "\"abc\"".to_string() };
    let json = serde_json::to_string(&part).unwrap();
    assert_eq!(json, r#"{"part_number":3,"e_tag":"\"abc\""}"#);

    let back: Part = serde_json::from_str(&json).unwrap();
    assert_eq!(back, part);
}

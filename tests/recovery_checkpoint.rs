use graft::storage::{
    recover, LogRecord, RecoveryError, SegmentFileError, SegmentFileSet, SegmentHeader, Watermark,
};
use std::fs;
use tempfile::tempdir;

fn write_segment(files: &SegmentFileSet, header: SegmentHeader, records: &[LogRecord]) {
    let mut bytes = header.encode().to_vec();
    for record in records {
        bytes.extend_from_slice(&record.encode());
    }
    fs::write(files.path_for(header.segment_id), bytes).unwrap();
}

#[test]
fn partial_tail_after_rotation_is_repaired() {
    // Segment 0 holds indexes 0..=2 at term 0; segment 1 was opened at that
    // boundary but crashed a few bytes into its first record.
    let temp = tempdir().unwrap();
    let files = SegmentFileSet::new(temp.path());
    write_segment(
        &files,
        SegmentHeader::new(0, -1, -1),
        &[
            LogRecord::new(0, 0, b"first".to_vec()),
            LogRecord::new(1, 0, b"second".to_vec()),
            LogRecord::new(2, 0, b"third".to_vec()),
        ],
    );
    let mut tail = SegmentHeader::new(1, 2, 0).encode().to_vec();
    tail.extend_from_slice(&LogRecord::new(3, 0, b"doomed".to_vec()).encode()[..4]);
    fs::write(files.path_for(1), tail).unwrap();

    let recovered = recover(&files).unwrap();
    assert_eq!(
        recovered.watermark,
        Watermark {
            current_segment: 1,
            prev_index: -1,
            prev_term: -1,
            append_index: 2,
            term: 0,
        }
    );
    assert_eq!(
        files.handle(1).size().unwrap(),
        graft::HEADER_LENGTH as u64,
        "partial record bytes must be gone"
    );
    assert_eq!(recovered.ranges.lookup(2), Some(0));
}

#[test]
fn recovery_makes_no_writes_when_storage_is_damaged() {
    let temp = tempdir().unwrap();
    let files = SegmentFileSet::new(temp.path());
    write_segment(
        &files,
        SegmentHeader::new(0, -1, -1),
        &[LogRecord::new(0, 0, b"a".to_vec())],
    );
    // Gap: segment 1 is missing.
    let mut tail = SegmentHeader::new(2, 0, 0).encode().to_vec();
    tail.extend_from_slice(&[0xff; 3]);
    fs::write(files.path_for(2), &tail).unwrap();
    let damaged_len = tail.len() as u64;

    let err = recover(&files).unwrap_err();
    assert!(matches!(err, RecoveryError::MissingSegment { expected: 1 }));
    // The damaged tail was not truncated on the way out.
    assert_eq!(files.handle(2).size().unwrap(), damaged_len);
}

#[test]
fn filename_id_disagreeing_with_header_is_damage() {
    let temp = tempdir().unwrap();
    let files = SegmentFileSet::new(temp.path());
    fs::write(
        files.path_for(0),
        SegmentHeader::new(3, -1, -1).encode(),
    )
    .unwrap();

    match recover(&files).unwrap_err() {
        RecoveryError::Files(SegmentFileError::HeaderMismatch { expected, actual, .. }) => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 3);
        }
        other => panic!("expected header mismatch, got {other:?}"),
    }
}

#[test]
fn orphan_files_after_headerless_segment_are_damage() {
    let temp = tempdir().unwrap();
    let files = SegmentFileSet::new(temp.path());
    write_segment(&files, SegmentHeader::new(0, -1, -1), &[]);
    fs::write(files.path_for(1), b"").unwrap();
    write_segment(&files, SegmentHeader::new(2, 9, 1), &[]);

    let err = recover(&files).unwrap_err();
    assert!(matches!(err, RecoveryError::OrphanSegments { .. }));
}

#[test]
fn repeated_recovery_converges() {
    let temp = tempdir().unwrap();
    let files = SegmentFileSet::new(temp.path());
    write_segment(
        &files,
        SegmentHeader::new(0, -1, -1),
        &[LogRecord::new(0, 2, b"alpha".to_vec())],
    );
    let mut tail = SegmentHeader::new(1, 0, 2).encode().to_vec();
    tail.extend_from_slice(&[0xab, 0xcd]);
    fs::write(files.path_for(1), tail).unwrap();

    let first = recover(&files).unwrap();
    let second = recover(&files).unwrap();
    assert_eq!(first.watermark, second.watermark);
    assert_eq!(first.ranges, second.ranges);
    assert_eq!(first.watermark.append_index, 0);
    assert_eq!(first.watermark.term, 2);
}

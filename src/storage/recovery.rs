use crate::storage::files::{SegmentFile, SegmentFileError, SegmentFileSet};
use crate::storage::header::SegmentHeader;
use crate::storage::ranges::{RangeError, SegmentRanges};
use log::{info, warn};
use std::io;
use thiserror::Error;

/// Durable position reached by a completed recovery: the last stored record,
/// the boundary of the earliest retained segment, and the segment currently
/// open for appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    pub current_segment: u64,
    pub prev_index: i64,
    pub prev_term: i64,
    pub append_index: i64,
    pub term: i64,
}

#[derive(Debug)]
pub struct RecoveredLog {
    pub watermark: Watermark,
    pub ranges: SegmentRanges,
}

/// Rebuilds the watermark and range index from the segment files on disk.
///
/// Walks segments oldest to newest, validating header continuity. The only
/// condition repaired silently is a partially written tail in the newest
/// well-formed segment; every other irregularity aborts recovery before any
/// write happens. Running recovery twice over the same files yields the same
/// watermark.
pub fn recover(files: &SegmentFileSet) -> Result<RecoveredLog, RecoveryError> {
    let segments = files.files_in_version_order()?;
    check_contiguous(&segments)?;

    let mut ranges = SegmentRanges::new();
    let mut current: Option<SegmentFile> = None;
    let mut prev_index = -1;
    let mut prev_term = -1;
    let mut append_index = -1;
    let mut term = -1;
    let mut missing_header: Option<usize> = None;

    for (position, segment) in segments.iter().enumerate() {
        let Some(header) = segment.read_header()? else {
            missing_header = Some(position);
            break;
        };
        if current.is_none() {
            prev_index = header.prev_index;
            prev_term = header.prev_term;
        }
        ranges.add(header.segment_id, header.prev_index)?;
        append_index = header.prev_index;
        term = header.prev_term;
        current = Some(segment.clone());
    }

    if let Some(position) = missing_header {
        let beyond = segments.len() - position - 1;
        if beyond > 0 {
            return Err(RecoveryError::OrphanSegments {
                empty_segment: segments[position].segment_id(),
                beyond,
            });
        }
    }

    if let Some(segment) = &current {
        let scan = segment.scan_records()?;
        for positioned in &scan.records {
            append_index = positioned.record.index;
            term = positioned.record.term;
        }
        if scan.file_size > scan.boundary {
            warn!(
                "event=log_tail_truncated segment={} boundary={} removed_bytes={}",
                segment.segment_id(),
                scan.boundary,
                scan.file_size - scan.boundary
            );
            segment.truncate(scan.boundary)?;
        }
    }

    let current_segment = match (current, missing_header) {
        (None, None) => {
            // First startup ever: materialize segment 0.
            let segment = files.create(0)?;
            let header = SegmentHeader::new(0, -1, -1);
            segment.write_header(&header)?;
            ranges.add(header.segment_id, header.prev_index)?;
            0
        }
        (_, Some(position)) => {
            // A fresh segment was pre-allocated before a crash (or truncated
            // to nothing). Stamp it so appends can resume behind it.
            let segment = &segments[position];
            let header = SegmentHeader::new(segment.segment_id(), append_index, term);
            segment.write_header(&header)?;
            ranges.add(header.segment_id, header.prev_index)?;
            segment.segment_id()
        }
        (Some(segment), None) => segment.segment_id(),
    };

    let watermark = Watermark {
        current_segment,
        prev_index,
        prev_term,
        append_index,
        term,
    };
    info!(
        "event=log_recovered current_segment={} append_index={} term={} prev_index={}",
        watermark.current_segment, watermark.append_index, watermark.term, watermark.prev_index
    );
    Ok(RecoveredLog { watermark, ranges })
}

fn check_contiguous(segments: &[SegmentFile]) -> Result<(), RecoveryError> {
    for pair in segments.windows(2) {
        let expected = pair[0].segment_id() + 1;
        if pair[1].segment_id() != expected {
            return Err(RecoveryError::MissingSegment { expected });
        }
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Files(#[from] SegmentFileError),
    #[error(transparent)]
    Ranges(#[from] RangeError),
    #[error("missing segment file {expected}")]
    MissingSegment { expected: u64 },
    #[error("segment {empty_segment} has no header but {beyond} file(s) with higher ids exist")]
    OrphanSegments { empty_segment: u64, beyond: usize },
}

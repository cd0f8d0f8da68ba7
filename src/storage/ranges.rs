use std::collections::VecDeque;
use thiserror::Error;

/// The run of log indexes `(prev_index, last_index]` stored in one segment.
/// `last_index` stays unbounded until a later segment closes the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRange {
    segment_id: u64,
    prev_index: i64,
    last_index: i64,
}

impl SegmentRange {
    fn new(segment_id: u64, prev_index: i64) -> Self {
        Self {
            segment_id,
            prev_index,
            last_index: i64::MAX,
        }
    }

    pub fn segment_id(&self) -> u64 {
        self.segment_id
    }

    pub fn prev_index(&self) -> i64 {
        self.prev_index
    }

    pub fn last_index(&self) -> i64 {
        self.last_index
    }

    pub fn includes(&self, index: i64) -> bool {
        index > self.prev_index && index <= self.last_index
    }

    fn end_at(&mut self, last_index: i64) {
        self.last_index = last_index;
    }
}

/// Ordered mapping from log index to the segment file containing it.
///
/// Derived entirely from segment headers; rebuilt by recovery and never
/// authoritative over the files themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentRanges {
    ranges: VecDeque<SegmentRange>,
}

impl SegmentRanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the range opened by a new segment. Any existing range whose
    /// start lies at or beyond `prev_index` is superseded and removed; the
    /// surviving predecessor is closed at `prev_index`.
    pub fn add(&mut self, segment_id: u64, prev_index: i64) -> Result<(), RangeError> {
        if let Some(last) = self.ranges.back() {
            if last.segment_id >= segment_id {
                return Err(RangeError::OutOfOrderSegment {
                    last: last.segment_id,
                    attempted: segment_id,
                });
            }
        }
        while let Some(last) = self.ranges.back_mut() {
            if last.prev_index >= prev_index {
                self.ranges.pop_back();
            } else {
                last.end_at(prev_index);
                break;
            }
        }
        self.ranges.push_back(SegmentRange::new(segment_id, prev_index));
        Ok(())
    }

    /// Newest-to-oldest scan; most lookups hit the most recent range.
    pub fn lookup(&self, index: i64) -> Option<u64> {
        self.ranges
            .iter()
            .rev()
            .find(|range| range.includes(index))
            .map(|range| range.segment_id)
    }

    /// Drops all ranges with `segment_id <= up_to_segment` from the front.
    pub fn prune(&mut self, up_to_segment: u64) {
        while let Some(first) = self.ranges.front() {
            if first.segment_id <= up_to_segment {
                self.ranges.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn lowest_segment(&self) -> Option<u64> {
        self.ranges.front().map(|range| range.segment_id)
    }

    pub fn highest_segment(&self) -> Option<u64> {
        self.ranges.back().map(|range| range.segment_id)
    }

    /// Index boundary below which entries are no longer reachable.
    pub fn lowest_prev_index(&self) -> Option<i64> {
        self.ranges.front().map(|range| range.prev_index)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Ranges covering `index` and everything after it, oldest first.
    pub fn spanning_from(&self, index: i64) -> Vec<SegmentRange> {
        self.ranges
            .iter()
            .filter(|range| range.last_index >= index)
            .copied()
            .collect()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("segment {attempted} added out of order, already accepted {last}")]
    OutOfOrderSegment { last: u64, attempted: u64 },
}

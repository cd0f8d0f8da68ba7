use crate::health::Health;
use crate::storage::files::{SegmentFile, SegmentFileError, SegmentFileSet, SegmentWriter};
use crate::storage::header::SegmentHeader;
use crate::storage::ranges::{RangeError, SegmentRange, SegmentRanges};
use crate::storage::record::LogRecord;
use crate::storage::recovery::{recover, RecoveryError, Watermark};
use log::info;
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    /// Byte size at which the open segment is sealed and a new one started.
    pub rotate_at_bytes: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            rotate_at_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Append surface over the segmented on-disk log.
///
/// Opening the log runs recovery; afterwards a single writer appends while
/// readers pull entries through [`SegmentedLog::entries_from`] cursors. Any
/// I/O failure on the durable write path panics the shared [`Health`] handle
/// because a torn append is indistinguishable from a valid short log on the
/// next recovery.
#[derive(Debug)]
pub struct SegmentedLog {
    files: SegmentFileSet,
    ranges: SegmentRanges,
    watermark: Watermark,
    writer: SegmentWriter,
    config: LogConfig,
    health: Health,
}

impl SegmentedLog {
    pub fn open(
        dir: impl AsRef<Path>,
        config: LogConfig,
        health: Health,
    ) -> Result<Self, RecoveryError> {
        let files = SegmentFileSet::new(dir.as_ref());
        files.ensure()?;
        let recovered = recover(&files)?;
        let writer = SegmentWriter::open(&files.handle(recovered.watermark.current_segment))?;
        Ok(Self {
            files,
            ranges: recovered.ranges,
            watermark: recovered.watermark,
            writer,
            config,
            health,
        })
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    pub fn append_index(&self) -> i64 {
        self.watermark.append_index
    }

    pub fn term(&self) -> i64 {
        self.watermark.term
    }

    /// Durably appends a payload under `term`, returning the index assigned
    /// to it. Terms never decrease across the log.
    pub fn append(&mut self, term: i64, payload: &[u8]) -> Result<i64, LogError> {
        if term < self.watermark.term {
            return Err(LogError::TermRegression {
                current: self.watermark.term,
                attempted: term,
            });
        }
        if self.writer.size() >= self.config.rotate_at_bytes {
            self.start_segment(
                self.watermark.current_segment + 1,
                self.watermark.append_index,
                self.watermark.term,
            )?;
        }
        let index = self.watermark.append_index + 1;
        let record = LogRecord::new(index, term, payload.to_vec());
        let written = self.writer.append(&record.encode()).map(|_| ());
        self.fatal(written)?;
        self.watermark.append_index = index;
        self.watermark.term = term;
        Ok(index)
    }

    /// Lazy cursor over records starting at `index`, bridging segment
    /// boundaries and skipping entries superseded by later segments.
    pub fn entries_from(&self, index: i64) -> Result<LogCursor, LogError> {
        let lowest = self
            .ranges
            .lowest_prev_index()
            .unwrap_or(self.watermark.prev_index);
        if index <= lowest {
            return Err(LogError::Compacted {
                requested: index,
                lowest: lowest + 1,
            });
        }
        let segments = self
            .ranges
            .spanning_from(index)
            .into_iter()
            .map(|range| (self.files.handle(range.segment_id()), range))
            .collect();
        Ok(LogCursor {
            segments,
            position: 0,
            pending: VecDeque::new(),
            next_index: index,
        })
    }

    /// Term of the record at `index`, consulting segment files as needed.
    pub fn term_of(&self, index: i64) -> Result<i64, LogError> {
        if index == self.watermark.prev_index {
            return Ok(self.watermark.prev_term);
        }
        let mut cursor = self.entries_from(index)?;
        match cursor.next() {
            Some(Ok(record)) if record.index == index => Ok(record.term),
            Some(Err(err)) => Err(err),
            _ => Err(LogError::UnknownIndex { index }),
        }
    }

    /// Discards `from_index` and everything after it by starting a fresh
    /// segment whose header supersedes the abandoned entries. Used when a
    /// leader change overwrites tentative entries.
    pub fn truncate_from(&mut self, from_index: i64) -> Result<(), LogError> {
        if from_index > self.watermark.append_index {
            return Err(LogError::TruncateOutOfBounds {
                requested: from_index,
                append_index: self.watermark.append_index,
            });
        }
        let prev = from_index - 1;
        let prev_term = if prev == self.watermark.prev_index {
            self.watermark.prev_term
        } else {
            self.term_of(prev)?
        };
        self.start_segment(self.watermark.current_segment + 1, prev, prev_term)?;
        self.watermark.append_index = prev;
        self.watermark.term = prev_term;
        Ok(())
    }

    /// Deletes segment files up to and including `up_to_segment`. The open
    /// segment is never pruned.
    pub fn prune(&mut self, up_to_segment: u64) -> Result<(), LogError> {
        if self.watermark.current_segment == 0 {
            return Ok(());
        }
        let effective = up_to_segment.min(self.watermark.current_segment - 1);
        let mut removed = 0usize;
        for segment in self.files.files_in_version_order()? {
            if segment.segment_id() <= effective {
                self.files.remove(segment.segment_id())?;
                removed += 1;
            }
        }
        if removed == 0 {
            return Ok(());
        }
        self.ranges.prune(effective);
        let lowest = self.files.handle(effective + 1);
        if let Some(header) = lowest.read_header()? {
            self.watermark.prev_index = header.prev_index;
            self.watermark.prev_term = header.prev_term;
        }
        info!(
            "event=log_pruned up_to_segment={effective} removed_files={removed} prev_index={}",
            self.watermark.prev_index
        );
        Ok(())
    }

    fn start_segment(&mut self, segment_id: u64, prev_index: i64, prev_term: i64) -> Result<(), LogError> {
        let segment = self.fatal(self.files.create(segment_id))?;
        let header = SegmentHeader::new(segment_id, prev_index, prev_term);
        self.fatal(segment.write_header(&header))?;
        self.ranges.add(segment_id, prev_index)?;
        self.writer = self.fatal(SegmentWriter::open(&segment))?;
        self.watermark.current_segment = segment_id;
        info!("event=segment_started segment={segment_id} prev_index={prev_index} prev_term={prev_term}");
        Ok(())
    }

    fn fatal<T>(&self, result: Result<T, SegmentFileError>) -> Result<T, LogError> {
        result.map_err(|err| {
            self.health.panic(&err);
            LogError::from(err)
        })
    }
}

/// Restartable reading position inside the log. Loads one segment at a time;
/// abandoning it and asking for a fresh cursor at the next unread index is
/// always safe.
#[derive(Debug)]
pub struct LogCursor {
    segments: Vec<(SegmentFile, SegmentRange)>,
    position: usize,
    pending: VecDeque<LogRecord>,
    next_index: i64,
}

impl Iterator for LogCursor {
    type Item = Result<LogRecord, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                self.next_index = record.index + 1;
                return Some(Ok(record));
            }
            if self.position >= self.segments.len() {
                return None;
            }
            let (file, range) = &self.segments[self.position];
            self.position += 1;
            match file.scan_records() {
                Ok(scan) => {
                    let next_index = self.next_index;
                    self.pending = scan
                        .records
                        .into_iter()
                        .map(|positioned| positioned.record)
                        .filter(|record| record.index >= next_index && range.includes(record.index))
                        .collect();
                }
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Files(#[from] SegmentFileError),
    #[error(transparent)]
    Ranges(#[from] RangeError),
    #[error("index {requested} is below the lowest retained index {lowest}")]
    Compacted { requested: i64, lowest: i64 },
    #[error("term regression: current={current}, attempted={attempted}")]
    TermRegression { current: i64, attempted: i64 },
    #[error("cannot truncate from {requested}, append index is {append_index}")]
    TruncateOutOfBounds { requested: i64, append_index: i64 },
    #[error("no record stored at index {index}")]
    UnknownIndex { index: i64 },
}

//! Physical storage for the replicated log: segment codecs, the version
//! range index, the on-disk file set, crash recovery, and the append surface.

pub mod files;
pub mod header;
pub mod log;
pub mod ranges;
pub mod record;
pub mod recovery;

pub use files::{
    PositionedRecord, SegmentFile, SegmentFileError, SegmentFileSet, SegmentScan, SegmentWriter,
    BASE_FILE_NAME,
};
pub use header::{SegmentHeader, HEADER_LENGTH};
pub use log::{LogConfig, LogCursor, LogError, SegmentedLog};
pub use ranges::{RangeError, SegmentRange, SegmentRanges};
pub use record::{read_record, LogRecord, RecordRead};
pub use recovery::{recover, RecoveredLog, RecoveryError, Watermark};

use crate::storage::header::{SegmentHeader, HEADER_LENGTH};
use crate::storage::record::{read_record, LogRecord, RecordRead};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const BASE_FILE_NAME: &str = "raft.log";
const VERSION_SEPARATOR: &str = ".";

/// The ordered collection of segment files under one log directory.
///
/// Segment files are named `raft.log.<segment_id>`. The file set owns naming
/// and discovery; reading and writing goes through [`SegmentFile`] handles.
#[derive(Debug, Clone)]
pub struct SegmentFileSet {
    dir: PathBuf,
}

impl SegmentFileSet {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure(&self) -> Result<(), SegmentFileError> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    pub fn path_for(&self, segment_id: u64) -> PathBuf {
        self.dir
            .join(format!("{BASE_FILE_NAME}{VERSION_SEPARATOR}{segment_id}"))
    }

    pub fn handle(&self, segment_id: u64) -> SegmentFile {
        SegmentFile {
            segment_id,
            path: self.path_for(segment_id),
        }
    }

    /// Segment files in ascending id order. A file carrying the log base name
    /// with an unparseable suffix is a fatal layout error, never skipped.
    pub fn files_in_version_order(&self) -> Result<Vec<SegmentFile>, SegmentFileError> {
        let mut segments = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(suffix) = name.strip_prefix(BASE_FILE_NAME) else {
                continue;
            };
            let Some(digits) = suffix.strip_prefix(VERSION_SEPARATOR) else {
                continue;
            };
            let segment_id = digits
                .parse()
                .map_err(|_| SegmentFileError::InvalidSegmentName { path: entry.path() })?;
            segments.push(SegmentFile {
                segment_id,
                path: entry.path(),
            });
        }
        segments.sort_by_key(|segment| segment.segment_id);
        Ok(segments)
    }

    pub fn create(&self, segment_id: u64) -> Result<SegmentFile, SegmentFileError> {
        let path = self.path_for(segment_id);
        File::create(&path)?;
        Ok(SegmentFile { segment_id, path })
    }

    pub fn remove(&self, segment_id: u64) -> Result<(), SegmentFileError> {
        fs::remove_file(self.path_for(segment_id))?;
        Ok(())
    }
}

/// Handle onto one segment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFile {
    segment_id: u64,
    path: PathBuf,
}

/// All records of a segment plus the byte boundary after the last decodable
/// one. `file_size > boundary` means a partially written tail remains.
#[derive(Debug)]
pub struct SegmentScan {
    pub records: Vec<PositionedRecord>,
    pub boundary: u64,
    pub file_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedRecord {
    pub record: LogRecord,
    pub start: u64,
    pub end: u64,
}

impl SegmentFile {
    pub fn segment_id(&self) -> u64 {
        self.segment_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> Result<u64, SegmentFileError> {
        Ok(fs::metadata(&self.path)?.len())
    }

    /// Reads the header, `Ok(None)` when the file is too short to hold one.
    /// A decoded header whose id disagrees with the filename id means the
    /// storage is damaged.
    pub fn read_header(&self) -> Result<Option<SegmentHeader>, SegmentFileError> {
        let mut file = File::open(&self.path)?;
        let mut bytes = [0u8; HEADER_LENGTH];
        let mut filled = 0;
        while filled < HEADER_LENGTH {
            let read = file.read(&mut bytes[filled..])?;
            if read == 0 {
                return Ok(None);
            }
            filled += read;
        }
        let Some(header) = SegmentHeader::decode(&bytes) else {
            return Ok(None);
        };
        if header.segment_id != self.segment_id {
            return Err(SegmentFileError::HeaderMismatch {
                path: self.path.clone(),
                expected: self.segment_id,
                actual: header.segment_id,
            });
        }
        Ok(Some(header))
    }

    pub fn write_header(&self, header: &SegmentHeader) -> Result<(), SegmentFileError> {
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header.encode())?;
        file.sync_data()?;
        Ok(())
    }

    /// Decodes every record after the header, stopping at the first
    /// truncated or corrupt frame.
    pub fn scan_records(&self) -> Result<SegmentScan, SegmentFileError> {
        let buf = self.read_bytes()?;
        let mut records = Vec::new();
        let mut cursor = HEADER_LENGTH.min(buf.len());
        let mut boundary = cursor as u64;
        loop {
            match read_record(&buf, cursor) {
                RecordRead::Record { record, start, end } => {
                    cursor = end as usize;
                    boundary = end;
                    records.push(PositionedRecord { record, start, end });
                }
                RecordRead::EndOfRecords { .. } | RecordRead::Corrupt { .. } => break,
            }
        }
        Ok(SegmentScan {
            records,
            boundary,
            file_size: buf.len() as u64,
        })
    }

    pub fn truncate(&self, offset: u64) -> Result<(), SegmentFileError> {
        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(offset)?;
        file.sync_data()?;
        Ok(())
    }

    fn read_bytes(&self) -> Result<Vec<u8>, SegmentFileError> {
        let mut file = File::open(&self.path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Append cursor onto the tail of a segment file.
#[derive(Debug)]
pub struct SegmentWriter {
    segment_id: u64,
    file: File,
    cursor: u64,
}

impl SegmentWriter {
    pub fn open(segment: &SegmentFile) -> Result<Self, SegmentFileError> {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(segment.path())?;
        let cursor = file.seek(SeekFrom::End(0))?;
        Ok(Self {
            segment_id: segment.segment_id,
            file,
            cursor,
        })
    }

    pub fn segment_id(&self) -> u64 {
        self.segment_id
    }

    pub fn size(&self) -> u64 {
        self.cursor
    }

    /// Appends a frame and syncs it to disk, returning its byte range.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(u64, u64), SegmentFileError> {
        let start = self.cursor;
        self.file.write_all(bytes)?;
        self.file.sync_data()?;
        self.cursor += bytes.len() as u64;
        Ok((start, self.cursor))
    }
}

#[derive(Debug, Error)]
pub enum SegmentFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid segment filename: {path:?}")]
    InvalidSegmentName { path: PathBuf },
    #[error("segment file {path:?} should contain segment {expected} but contains {actual}")]
    HeaderMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

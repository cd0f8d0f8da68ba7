use crc32fast::Hasher as Crc32Hasher;

const RECORD_PREFIX: usize = 8 + 8 + 4; // index + term + payload_len
const RECORD_TRAILER: usize = 4; // crc32

/// One replicated log entry as stored inside a segment file.
///
/// On-disk frame: `index (8) | term (8) | payload_len (4) | payload | crc32 (4)`,
/// all little endian, crc covering everything before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub index: i64,
    pub term: i64,
    pub payload: Vec<u8>,
}

impl LogRecord {
    pub fn new(index: i64, term: i64, payload: Vec<u8>) -> Self {
        Self {
            index,
            term,
            payload,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(RECORD_PREFIX + self.payload.len() + RECORD_TRAILER);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&self.term.to_le_bytes());
        bytes.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        let mut hasher = Crc32Hasher::new();
        hasher.update(&bytes);
        let crc = hasher.finalize();
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes
    }
}

/// Outcome of decoding one record at a stream cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRead {
    /// A record was decoded; `start..end` is the byte range it occupies.
    Record {
        record: LogRecord,
        start: u64,
        end: u64,
    },
    /// Fewer bytes remain than a full record requires. Not an error: this is
    /// the normal end of a segment, or the torn tail of a crashed append.
    EndOfRecords { offset: u64 },
    /// A full frame is present but its checksum does not match.
    Corrupt { offset: u64 },
}

/// Decodes the record starting at `cursor` within `buf`.
pub fn read_record(buf: &[u8], cursor: usize) -> RecordRead {
    let offset = cursor as u64;
    if buf.len().saturating_sub(cursor) < RECORD_PREFIX + RECORD_TRAILER {
        return RecordRead::EndOfRecords { offset };
    }
    let prefix = &buf[cursor..];
    let index = read_i64(&prefix[0..8]);
    let term = read_i64(&prefix[8..16]);
    let payload_len = read_u32(&prefix[16..20]) as usize;
    let total = RECORD_PREFIX + payload_len + RECORD_TRAILER;
    if buf.len() - cursor < total {
        return RecordRead::EndOfRecords { offset };
    }
    let frame = &buf[cursor..cursor + total];
    let mut hasher = Crc32Hasher::new();
    hasher.update(&frame[..RECORD_PREFIX + payload_len]);
    let crc = read_u32(&frame[RECORD_PREFIX + payload_len..]);
    if hasher.finalize() != crc {
        return RecordRead::Corrupt { offset };
    }
    RecordRead::Record {
        record: LogRecord::new(
            index,
            term,
            frame[RECORD_PREFIX..RECORD_PREFIX + payload_len].to_vec(),
        ),
        start: offset,
        end: offset + total as u64,
    }
}

fn read_i64(bytes: &[u8]) -> i64 {
    let mut array = [0u8; 8];
    array.copy_from_slice(&bytes[..8]);
    i64::from_le_bytes(array)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut array = [0u8; 4];
    array.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(array)
}

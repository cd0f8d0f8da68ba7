/// Byte length of the fixed header at offset 0 of every segment file.
pub const HEADER_LENGTH: usize = 8 + 8 + 8;

/// Fixed-layout prefix of a segment file: the segment's own id and the
/// `(index, term)` of the last entry before the segment starts. `-1` means
/// no such entry exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub segment_id: u64,
    pub prev_index: i64,
    pub prev_term: i64,
}

impl SegmentHeader {
    pub fn new(segment_id: u64, prev_index: i64, prev_term: i64) -> Self {
        Self {
            segment_id,
            prev_index,
            prev_term,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LENGTH] {
        let mut bytes = [0u8; HEADER_LENGTH];
        bytes[0..8].copy_from_slice(&self.segment_id.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.prev_index.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.prev_term.to_le_bytes());
        bytes
    }

    /// `None` when fewer than [`HEADER_LENGTH`] bytes are available, which is
    /// how a zero-length or partially created segment presents itself.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LENGTH {
            return None;
        }
        let segment_id = u64::from_le_bytes(bytes[0..8].try_into().ok()?);
        let prev_index = i64::from_le_bytes(bytes[8..16].try_into().ok()?);
        let prev_term = i64::from_le_bytes(bytes[16..24].try_into().ok()?);
        Some(Self {
            segment_id,
            prev_index,
            prev_term,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let header = SegmentHeader::new(7, 41, 3);
        let decoded = SegmentHeader::decode(&header.encode()).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn sentinel_values_survive() {
        let header = SegmentHeader::new(0, -1, -1);
        let decoded = SegmentHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded.prev_index, -1);
        assert_eq!(decoded.prev_term, -1);
    }

    #[test]
    fn short_buffer_is_no_header() {
        assert_eq!(SegmentHeader::decode(&[]), None);
        assert_eq!(SegmentHeader::decode(&[0u8; HEADER_LENGTH - 1]), None);
    }
}

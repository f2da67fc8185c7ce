use std::fs::{self, File};
use std::io::Write;
use crc32fast::Hasher;
use crate::core::error::Result;
use crate::storage::layout::StorageLayout;
use crate::storage::segment::Segment;

/// Segment file header
///
/// [ MAGIC (4) | VERSION (4) | CHECKSUM (4) | PAYLOAD LEN (4) ]
/// [ PAYLOAD: lz4 (size-prepended) of the bincode SegmentData ]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub version: u32,
    pub checksum: u32,  // CRC32 of the payload
    pub payload_len: u32,
}

impl SegmentHeader {
    pub const MAGIC: [u8; 4] = *b"SGIX";
    pub const VERSION: u32 = 1;
    pub const SIZE: usize = 16;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&Self::MAGIC);
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        out[12..16].copy_from_slice(&self.payload_len.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE || bytes[0..4] != Self::MAGIC {
            return None;
        }
        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Some(SegmentHeader {
            version: word(4),
            checksum: word(8),
            payload_len: word(12),
        })
    }
}

pub struct SegmentWriter;

impl SegmentWriter {
    /// Write the segment next to its final name, sync, then rename into place
    pub fn write(storage: &StorageLayout, segment: &Segment) -> Result<u64> {
        let data = bincode::serialize(&segment.to_data())?;
        let payload = lz4_flex::compress_prepend_size(&data);

        let mut hasher = Hasher::new();
        hasher.update(&payload);
        let header = SegmentHeader {
            version: SegmentHeader::VERSION,
            checksum: hasher.finalize(),
            payload_len: payload.len() as u32,
        };

        let path = storage.segment_path(&segment.id);
        let tmp = path.with_extension("seg.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&header.to_bytes())?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        segment.mark_persisted(path);
        Ok((SegmentHeader::SIZE + payload.len()) as u64)
    }
}

use std::fs;
use std::io;
use crc32fast::Hasher;
use crate::core::error::{Error, Result};
use crate::storage::layout::StorageLayout;
use crate::storage::segment::{Segment, SegmentData, SegmentId};
use crate::storage::segment_writer::SegmentHeader;

pub struct SegmentReader;

impl SegmentReader {
    /// Load and verify a segment file; any corruption is `Fatal`
    pub fn open(storage: &StorageLayout, segment_id: SegmentId) -> Result<Segment> {
        let path = storage.segment_path(&segment_id);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::fatal(format!("Segment {:?} is missing", path)),
            _ => Error::from(e),
        })?;

        let header = SegmentHeader::from_bytes(&bytes)
            .ok_or_else(|| Error::fatal(format!("Segment {:?} has no valid header", path)))?;

        // Verify version
        if header.version != SegmentHeader::VERSION {
            return Err(Error::fatal(format!(
                "Incompatible segment version {} in {:?}", header.version, path
            )));
        }

        let payload = &bytes[SegmentHeader::SIZE..];
        if payload.len() != header.payload_len as usize {
            return Err(Error::fatal(format!("Segment {:?} is truncated", path)));
        }

        let mut hasher = Hasher::new();
        hasher.update(payload);
        if hasher.finalize() != header.checksum {
            return Err(Error::fatal(format!("Checksum mismatch in segment {:?}", path)));
        }

        let data = lz4_flex::decompress_size_prepended(payload)
            .map_err(|e| Error::fatal(format!("Corrupted segment {:?}: {}", path, e)))?;
        let data: SegmentData = bincode::deserialize(&data)
            .map_err(|e| Error::fatal(format!("Corrupted segment {:?}: {}", path, e)))?;

        if data.id != segment_id {
            return Err(Error::fatal(format!("Segment {:?} holds id {:?}", path, data.id)));
        }

        Segment::from_data(data, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::types::{Document, FieldValue, IndexableField};
    use crate::storage::segment_writer::SegmentWriter;

    fn segment() -> Segment {
        let mut doc = Document::new("a", "a", 7);
        let mut field = IndexableField::single_term("body", b"hello".to_vec());
        field.stored = Some(FieldValue::Text("hello".into()));
        doc.add_field(field);
        Segment::build(&vec![doc]).unwrap()
    }

    #[test]
    fn test_write_then_open() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(tmp.path().to_path_buf()).unwrap();
        let segment = segment();
        SegmentWriter::write(&layout, &segment).unwrap();
        assert!(segment.is_persisted());

        let loaded = SegmentReader::open(&layout, segment.id).unwrap();
        assert_eq!(loaded.doc_count(), 1);
        assert_eq!(loaded.docs_for_id("a"), vec![0]);
        assert_eq!(loaded.stored(0).unwrap().get("body"), Some(&FieldValue::Text("hello".into())));
    }

    #[test]
    fn test_flipped_byte_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(tmp.path().to_path_buf()).unwrap();
        let segment = segment();
        SegmentWriter::write(&layout, &segment).unwrap();

        let path = layout.segment_path(&segment.id);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let err = SegmentReader::open(&layout, segment.id).err().unwrap();
        assert_eq!(err.kind, ErrorKind::Fatal);
    }
}

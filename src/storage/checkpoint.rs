use std::fs;
use std::io::Write;
use chrono::{DateTime, Utc};
use crc32fast::Hasher;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};
use crate::storage::layout::StorageLayout;
use crate::storage::segment::SegmentId;

/// A committed segment and the docs deleted from it at commit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentEntry {
    pub id: SegmentId,
    pub deletes: Vec<u8>,  // Serialized RoaringBitmap
}

impl SegmentEntry {
    pub fn new(id: SegmentId, deletes: &RoaringBitmap) -> Result<Self> {
        let mut bytes = Vec::with_capacity(deletes.serialized_size());
        deletes.serialize_into(&mut bytes)?;
        Ok(SegmentEntry { id, deletes: bytes })
    }

    pub fn deletes(&self) -> Result<RoaringBitmap> {
        RoaringBitmap::deserialize_from(&self.deletes[..])
            .map_err(|e| Error::fatal(format!("Corrupted delete set of {:?}: {}", self.id, e)))
    }
}

/// Durable state of the indexer as of the last commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub generation: u64,
    pub segments: Vec<SegmentEntry>,
    pub tombstones: Vec<(String, u64)>,        // id -> deletion ts
    pub prefix_tombstones: Vec<(String, u64)>, // id prefix -> deletion ts
    pub truncate_floor: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub doc_count: usize,
}

impl Checkpoint {
    pub fn empty() -> Self {
        Checkpoint {
            generation: 0,
            segments: Vec::new(),
            tombstones: Vec::new(),
            prefix_tombstones: Vec::new(),
            truncate_floor: None,
            timestamp: Utc::now(),
            doc_count: 0,
        }
    }

    /// Load checkpoint from disk; `None` for a fresh index
    pub fn load(storage: &StorageLayout) -> Result<Option<Self>> {
        let path = storage.checkpoint_path();
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;
        if bytes.len() < 4 {
            return Err(Error::fatal(format!("Checkpoint {:?} is truncated", path)));
        }
        let (crc, body) = bytes.split_at(4);
        let mut hasher = Hasher::new();
        hasher.update(body);
        if hasher.finalize() != u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]) {
            return Err(Error::fatal(format!("Checksum mismatch in checkpoint {:?}", path)));
        }

        let checkpoint = bincode::deserialize(body)
            .map_err(|e| Error::fatal(format!("Corrupted checkpoint {:?}: {}", path, e)))?;
        Ok(Some(checkpoint))
    }

    /// Save checkpoint to disk, replacing the previous one atomically
    pub fn save(&self, storage: &StorageLayout) -> Result<()> {
        let body = bincode::serialize(self)?;
        let mut hasher = Hasher::new();
        hasher.update(&body);

        let path = storage.checkpoint_path();
        let tmp = path.with_extension("bin.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&hasher.finalize().to_le_bytes())?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(tmp.path().to_path_buf()).unwrap();
        assert!(Checkpoint::load(&layout).unwrap().is_none());

        let mut deletes = RoaringBitmap::new();
        deletes.insert(3);
        let mut checkpoint = Checkpoint::empty();
        checkpoint.generation = 4;
        checkpoint.segments.push(SegmentEntry::new(SegmentId::new(), &deletes).unwrap());
        checkpoint.tombstones.push(("k1".into(), 20));
        checkpoint.truncate_floor = Some(9);
        checkpoint.save(&layout).unwrap();

        let loaded = Checkpoint::load(&layout).unwrap().unwrap();
        assert_eq!(loaded.generation, 4);
        assert_eq!(loaded.segments[0].deletes().unwrap(), deletes);
        assert_eq!(loaded.tombstones, vec![("k1".to_string(), 20)]);
        assert_eq!(loaded.truncate_floor, Some(9));
    }

    #[test]
    fn test_corrupted_checkpoint_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(tmp.path().to_path_buf()).unwrap();
        Checkpoint::empty().save(&layout).unwrap();

        let mut bytes = fs::read(layout.checkpoint_path()).unwrap();
        bytes[6] ^= 0x55;
        fs::write(layout.checkpoint_path(), bytes).unwrap();

        let err = Checkpoint::load(&layout).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Fatal);
    }
}

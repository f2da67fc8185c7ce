use std::fs;
use std::path::{Path, PathBuf};
use crate::core::error::Result;
use crate::storage::segment::SegmentId;

/// Directory structure of one index: `<base>/<keyspace>.<table>.<index>/`
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,      // Root directory of this index
    pub segments_dir: PathBuf,  // Sealed segments (.seg files)
    pub meta_dir: PathBuf,      // Checkpoint location
}

impl StorageLayout {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let segments_dir = base_dir.join("segments");
        let meta_dir = base_dir.join("meta");

        // Create directories
        fs::create_dir_all(&segments_dir)?;
        fs::create_dir_all(&meta_dir)?;

        Ok(StorageLayout {
            base_dir,
            segments_dir,
            meta_dir,
        })
    }

    pub fn index_dir(base: &Path, keyspace: &str, table: &str, index_name: &str) -> PathBuf {
        base.join(format!("{}.{}.{}", keyspace, table, index_name))
    }

    pub fn segment_path(&self, id: &SegmentId) -> PathBuf {
        self.segments_dir.join(format!("{}.seg", id.0))
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.meta_dir.join("checkpoint.bin")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join(".lock")
    }

    /// Segment files currently on disk
    pub fn list_segments(&self) -> Result<Vec<SegmentId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.segments_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("seg") {
                continue;
            }
            let parsed = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| uuid::Uuid::parse_str(s).ok());
            if let Some(uuid) = parsed {
                ids.push(SegmentId(uuid));
            }
        }
        Ok(ids)
    }

    pub fn remove_all(&self) -> Result<()> {
        if self.base_dir.exists() {
            fs::remove_dir_all(&self.base_dir)?;
        }
        Ok(())
    }
}

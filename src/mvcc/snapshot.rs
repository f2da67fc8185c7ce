use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use roaring::RoaringBitmap;
use crate::storage::segment::Segment;

/// A segment paired with the docs deleted from it
///
/// The bitmap is copy-on-write: the writer clones it with `Arc::make_mut`
/// before adding deletes, so published snapshots never see later deletes.
#[derive(Clone)]
pub struct SegmentSlot {
    pub segment: Arc<Segment>,
    pub deletes: Arc<RoaringBitmap>,
}

impl SegmentSlot {
    pub fn new(segment: Arc<Segment>) -> Self {
        SegmentSlot {
            segment,
            deletes: Arc::new(RoaringBitmap::new()),
        }
    }

    pub fn is_deleted(&self, doc: u32) -> bool {
        self.deletes.contains(doc)
    }

    pub fn live_docs(&self) -> u64 {
        self.segment.doc_count() as u64 - self.deletes.len()
    }

    /// Every doc of the segment is deleted
    pub fn is_empty(&self) -> bool {
        self.live_docs() == 0
    }
}

/// Snapshot of index at a point in time
#[derive(Clone)]
pub struct Snapshot {
    pub version: u64,
    pub slots: Vec<SegmentSlot>,
    pub timestamp: DateTime<Utc>,
    pub doc_count: usize,  // Live docs across slots
}

impl Snapshot {
    pub fn empty() -> Self {
        Snapshot {
            version: 0,
            slots: Vec::new(),
            timestamp: Utc::now(),
            doc_count: 0,
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &Arc<Segment>> {
        self.slots.iter().map(|s| &s.segment)
    }

    pub fn size_bytes(&self) -> usize {
        self.segments().map(|s| s.metadata.size_bytes).sum()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot::empty()
    }
}

/// Publishes snapshots; readers take an `Arc` without waiting on writers
pub struct SnapshotController {
    current: RwLock<Arc<Snapshot>>,
    current_version: AtomicU64,
}

impl SnapshotController {
    pub fn new() -> Self {
        SnapshotController {
            current: RwLock::new(Arc::new(Snapshot::empty())),
            current_version: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, slots: Vec<SegmentSlot>) -> Arc<Snapshot> {
        let version = self.current_version.fetch_add(1, Ordering::SeqCst) + 1;

        // Calculate live doc count
        let doc_count = slots.iter().map(|s| s.live_docs() as usize).sum();

        let snapshot = Arc::new(Snapshot {
            version,
            slots,
            timestamp: Utc::now(),
            doc_count,
        });
        *self.current.write() = snapshot.clone();
        snapshot
    }

    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.current_version.load(Ordering::Acquire)
    }
}

impl Default for SnapshotController {
    fn default() -> Self {
        Self::new()
    }
}

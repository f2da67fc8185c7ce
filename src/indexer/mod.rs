use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::analysis::analyzer::Analyzer;
use crate::core::error::Result;
use crate::core::types::Document;
use crate::index::inverted::Term;
use crate::mvcc::snapshot::Snapshot;

pub mod nrt;
pub mod writer_state;

pub use nrt::NearRealTimeIndexer;

/// Segmented index with near-real-time visibility
///
/// Every mutation is keyed by the document id and resolved by timestamp,
/// so callers never need to order concurrent writes themselves.
pub trait Indexer: Send + Sync {
    /// Replace the document of `doc.id` unless a newer write or delete exists
    fn upsert(&self, doc: Document) -> Result<()>;

    fn delete_by_id(&self, id: &str, ts_del: u64) -> Result<()>;

    fn delete_by_term(&self, term: &Term) -> Result<()>;

    fn delete_prefix(&self, prefix: &str, ts_del: u64) -> Result<()>;

    fn ids_with_prefix(&self, prefix: &str) -> Result<Vec<(String, u64)>>;

    fn delete_version(&self, id: &str, ts: u64) -> Result<()>;

    fn truncate(&self, ts_cut: u64) -> Result<()>;

    /// Publish buffered writes to new searchers without touching disk
    fn refresh(&self) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn remove_all(&self) -> Result<()>;

    fn acquire_searcher(&self) -> Result<IndexSearcher>;

    fn live_size(&self) -> u64;

    fn latest_ts(&self, id: &str) -> Option<u64>;
}

/// A pinned snapshot plus the analyzer queries are compiled with
///
/// Segments of the snapshot stay alive (in memory and on disk) until the
/// searcher is dropped or released.
pub struct IndexSearcher {
    snapshot: Arc<Snapshot>,
    analyzer: Arc<Analyzer>,
    active: Arc<AtomicUsize>,
}

impl IndexSearcher {
    pub(crate) fn new(snapshot: Arc<Snapshot>, analyzer: Arc<Analyzer>, active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        IndexSearcher { snapshot, analyzer, active }
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    pub fn analyzer(&self) -> &Arc<Analyzer> {
        &self.analyzer
    }

    pub fn release(self) {}
}

impl Drop for IndexSearcher {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

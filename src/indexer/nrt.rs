use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;
use chrono::Utc;
use log::{debug, error, warn};
use parking_lot::Mutex;
use crate::analysis::analyzer::Analyzer;
use crate::core::config::IndexerConfig;
use crate::core::error::{Error, Result};
use crate::core::types::Document;
use crate::index::inverted::Term;
use crate::indexer::writer_state::{VersionEntry, WriterState};
use crate::indexer::{IndexSearcher, Indexer};
use crate::mvcc::snapshot::{SegmentSlot, SnapshotController};
use crate::storage::checkpoint::{Checkpoint, SegmentEntry};
use crate::storage::file_lock::FileLock;
use crate::storage::layout::StorageLayout;
use crate::storage::merge_policy::{MergePolicy, TieredMergePolicy};
use crate::storage::segment::Segment;
use crate::storage::segment_reader::SegmentReader;
use crate::storage::segment_writer::SegmentWriter;

/// Near-real-time indexer over one index directory
///
/// Mutations go through a single writer mutex. Searchers read the last
/// published snapshot, so they never wait for a commit's disk I/O or for a
/// merge. Merges run one at a time, on a worker thread when
/// `background_merge` is set.
pub struct NearRealTimeIndexer {
    inner: Arc<Inner>,
}

struct Inner {
    layout: StorageLayout,
    config: IndexerConfig,
    analyzer: Arc<Analyzer>,
    state: Mutex<WriterState>,
    snapshots: SnapshotController,
    commit_lock: Mutex<()>,
    merge_policy: Box<dyn MergePolicy>,
    merging: AtomicBool,
    pending: AtomicBool,  // Mirrors `state.dirty` for lock-free checks
    closed: AtomicBool,
    failure: Option<String>,
    active_searchers: Arc<AtomicUsize>,
    _lock: FileLock,
}

impl NearRealTimeIndexer {
    /// Open (or create) the index stored in `dir`
    ///
    /// A corrupted checkpoint or segment does not fail the open: the indexer
    /// comes up unusable and every operation reports `Fatal`.
    pub fn open(dir: PathBuf, config: IndexerConfig, analyzer: Arc<Analyzer>) -> Result<Self> {
        let layout = StorageLayout::new(dir)?;
        let lock = FileLock::acquire(&layout)?;

        let (state, failure) = match recover(&layout) {
            Ok(state) => (state, None),
            Err(e) if e.is_fatal() => {
                error!("Index at {:?} is corrupted and must be rebuilt: {}", layout.base_dir, e);
                (WriterState::new(), Some(e.context))
            }
            Err(e) => return Err(e),
        };

        let snapshots = SnapshotController::new();
        snapshots.publish(state.slots.clone());
        debug!(
            "Opened index {:?}: {} segments, {} ids",
            layout.base_dir, state.slots.len(), state.versions.len()
        );

        let merge_policy = Box::new(TieredMergePolicy::from_config(&config.merge_policy));
        Ok(NearRealTimeIndexer {
            inner: Arc::new(Inner {
                layout,
                config,
                analyzer,
                state: Mutex::new(state),
                snapshots,
                commit_lock: Mutex::new(()),
                merge_policy,
                merging: AtomicBool::new(false),
                pending: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                failure,
                active_searchers: Arc::new(AtomicUsize::new(0)),
                _lock: lock,
            }),
        })
    }

    /// Run merges until the policy is satisfied; returns whether any ran
    pub fn merge_now(&self) -> Result<bool> {
        let mut merged = false;
        while self.inner.merge_once()? {
            merged = true;
        }
        Ok(merged)
    }

    pub fn active_searchers(&self) -> usize {
        self.inner.active_searchers.load(Ordering::Acquire)
    }

    pub fn segment_count(&self) -> usize {
        self.inner.state.lock().slots.len()
    }

    pub fn generation(&self) -> u64 {
        self.inner.state.lock().generation
    }

    pub fn is_failed(&self) -> bool {
        self.inner.failure.is_some()
    }

    pub fn directory(&self) -> &std::path::Path {
        &self.inner.layout.base_dir
    }
}

impl Indexer for NearRealTimeIndexer {
    fn upsert(&self, doc: Document) -> Result<()> {
        self.inner.write(|state| {
            let id = doc.id.clone();
            if !state.upsert(doc) {
                debug!("Discarded stale write for id '{}'", id);
            }
        })
    }

    fn delete_by_id(&self, id: &str, ts_del: u64) -> Result<()> {
        self.inner.write(|state| {
            state.delete_by_id(id, ts_del);
        })
    }

    fn delete_by_term(&self, term: &Term) -> Result<()> {
        self.inner.write(|state| {
            state.delete_by_term(term);
        })
    }

    fn delete_prefix(&self, prefix: &str, ts_del: u64) -> Result<()> {
        self.inner.write(|state| {
            state.delete_prefix(prefix, ts_del);
        })
    }

    fn ids_with_prefix(&self, prefix: &str) -> Result<Vec<(String, u64)>> {
        self.inner.ensure_usable()?;
        Ok(self.inner.state.lock().ids_with_prefix(prefix))
    }

    fn delete_version(&self, id: &str, ts: u64) -> Result<()> {
        self.inner.write(|state| {
            state.delete_version(id, ts);
        })
    }

    fn truncate(&self, ts_cut: u64) -> Result<()> {
        self.inner.ensure_usable()?;
        let mut state = self.inner.state.lock();
        let removed = state.truncate(ts_cut);
        self.inner.refresh_locked(&mut state)?;
        warn!("Truncated {} documents at or below ts {} in {:?}", removed, ts_cut, self.inner.layout.base_dir);
        Ok(())
    }

    fn refresh(&self) -> Result<()> {
        self.inner.ensure_usable()?;
        let sealed = {
            let mut state = self.inner.state.lock();
            self.inner.refresh_locked(&mut state)?
        };
        if sealed {
            self.inner.maybe_merge();
        }
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.inner.commit()
    }

    fn remove_all(&self) -> Result<()> {
        let inner = &self.inner;
        let _commit = inner.commit_lock.lock();
        if inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        *inner.state.lock() = WriterState::new();
        inner.snapshots.publish(Vec::new());
        inner.layout.remove_all()?;
        warn!("Removed index directory {:?}", inner.layout.base_dir);
        Ok(())
    }

    fn acquire_searcher(&self) -> Result<IndexSearcher> {
        let inner = &self.inner;
        inner.ensure_usable()?;

        if inner.pending.load(Ordering::Acquire) {
            let sealed = {
                let mut state = inner.state.lock();
                if state.dirty && state.last_refresh.elapsed() >= inner.config.refresh_interval() {
                    inner.refresh_locked(&mut state)?
                } else {
                    false
                }
            };
            if sealed {
                inner.maybe_merge();
            }
        }

        Ok(IndexSearcher::new(
            inner.snapshots.current_snapshot(),
            inner.analyzer.clone(),
            inner.active_searchers.clone(),
        ))
    }

    fn live_size(&self) -> u64 {
        self.inner.snapshots.current_snapshot().size_bytes() as u64
    }

    fn latest_ts(&self, id: &str) -> Option<u64> {
        self.inner.state.lock().latest_ts(id)
    }
}

impl Inner {
    fn ensure_usable(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::invalid_state("Indexer has been removed"));
        }
        if let Some(reason) = &self.failure {
            return Err(Error::fatal(format!("Indexer is unusable: {}", reason)));
        }
        Ok(())
    }

    fn write<F>(self: &Arc<Self>, f: F) -> Result<()>
    where
        F: FnOnce(&mut WriterState),
    {
        self.ensure_usable()?;
        let sealed = {
            let mut state = self.state.lock();
            f(&mut state);
            if state.dirty {
                self.pending.store(true, Ordering::Release);
            }
            if state.buffer.len() >= self.config.max_buffered_docs {
                self.refresh_locked(&mut state)?
            } else {
                false
            }
        };
        if sealed {
            self.maybe_merge();
        }
        Ok(())
    }

    /// Seal the buffer and publish; returns whether a segment was sealed
    fn refresh_locked(&self, state: &mut WriterState) -> Result<bool> {
        let sealed = state.seal()?;
        state.retire_empty();
        state.dirty = false;
        state.last_refresh = Instant::now();
        self.pending.store(false, Ordering::Release);
        let snapshot = self.snapshots.publish(state.slots.clone());
        debug!("Published snapshot v{} with {} live docs", snapshot.version, snapshot.doc_count);
        Ok(sealed)
    }

    fn commit(self: &Arc<Self>) -> Result<()> {
        self.ensure_usable()?;
        let _commit = self.commit_lock.lock();
        self.ensure_usable()?;

        let (slots, checkpoint, retired, sealed) = {
            let mut state = self.state.lock();
            let sealed = self.refresh_locked(&mut state)?;
            state.compact_tombstones();
            state.generation += 1;
            let checkpoint = Checkpoint {
                generation: state.generation,
                segments: Vec::with_capacity(state.slots.len()),
                tombstones: state.tombstones(),
                prefix_tombstones: state.prefix_tombstones.iter().map(|(p, ts)| (p.clone(), *ts)).collect(),
                truncate_floor: state.truncate_floor,
                timestamp: Utc::now(),
                doc_count: state.slots.iter().map(|s| s.live_docs() as usize).sum(),
            };
            (state.slots.clone(), checkpoint, std::mem::take(&mut state.retired), sealed)
        };

        if let Err(e) = self.persist(&slots, checkpoint) {
            error!("Commit of {:?} failed, will retry on next commit: {}", self.layout.base_dir, e);
            self.state.lock().retired.extend(retired);
            return Err(e);
        }
        for segment in retired {
            segment.mark_obsolete();
        }
        debug!("Committed {:?} with {} segments", self.layout.base_dir, slots.len());

        if sealed {
            self.maybe_merge();
        }
        Ok(())
    }

    fn persist(&self, slots: &[SegmentSlot], mut checkpoint: Checkpoint) -> Result<()> {
        for slot in slots {
            if !slot.segment.is_persisted() {
                SegmentWriter::write(&self.layout, &slot.segment)?;
            }
            checkpoint.segments.push(SegmentEntry::new(slot.segment.id, &slot.deletes)?);
        }
        checkpoint.save(&self.layout)
    }

    fn maybe_merge(self: &Arc<Self>) {
        if self.merging.swap(true, Ordering::AcqRel) {
            return;
        }
        if !self.config.background_merge {
            self.merge_loop();
            return;
        }

        let inner = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("sgindex-merge".to_string())
            .spawn(move || inner.merge_loop());
        if let Err(e) = spawned {
            error!("Failed to start merge thread: {}", e);
            self.merging.store(false, Ordering::Release);
        }
    }

    fn merge_loop(&self) {
        loop {
            match self.merge_once() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    error!("Merge failed in {:?}: {}", self.layout.base_dir, e);
                    break;
                }
            }
        }
        self.merging.store(false, Ordering::Release);
    }

    fn merge_once(&self) -> Result<bool> {
        if self.closed.load(Ordering::Acquire) || self.failure.is_some() {
            return Ok(false);
        }

        let sources: Vec<SegmentSlot> = {
            let state = self.state.lock();
            let segments: Vec<Arc<Segment>> = state.slots.iter().map(|s| s.segment.clone()).collect();
            if !self.merge_policy.should_merge(&segments) {
                return Ok(false);
            }
            let chosen = self.merge_policy.select_segments_to_merge(&segments);
            state.slots
                .iter()
                .filter(|slot| chosen.iter().any(|c| Arc::ptr_eq(c, &slot.segment)))
                .cloned()
                .collect()
        };
        if sources.len() < 2 {
            return Ok(false);
        }

        let pairs: Vec<_> = sources.iter().map(|s| (s.segment.clone(), s.deletes.clone())).collect();
        let (merged, remaps) = Segment::merge(&pairs)?;

        let mut state = self.state.lock();
        if self.closed.load(Ordering::Acquire) {
            return Ok(false);
        }
        if !state.install_merge(&sources, merged, &remaps) {
            debug!("Dropped merge of {} segments, a source was retired", sources.len());
            return Ok(false);
        }
        self.refresh_locked(&mut state)?;
        debug!("Merged {} segments, {} remain", sources.len(), state.slots.len());
        Ok(true)
    }
}

/// Rebuild writer state from the last checkpoint
fn recover(layout: &StorageLayout) -> Result<WriterState> {
    let mut state = WriterState::new();
    let checkpoint = Checkpoint::load(layout)?.unwrap_or_else(Checkpoint::empty);

    for entry in &checkpoint.segments {
        let segment = SegmentReader::open(layout, entry.id)?;
        let deletes = entry.deletes()?;
        for doc in 0..segment.doc_count() {
            if deletes.contains(doc) {
                continue;
            }
            if let Some(stored) = segment.stored(doc) {
                state.versions.insert(stored.id.clone(), VersionEntry { ts: stored.ts, tombstone: false });
            }
        }
        state.slots.push(SegmentSlot {
            segment: Arc::new(segment),
            deletes: Arc::new(deletes),
        });
    }

    for (id, ts) in checkpoint.tombstones {
        state.versions.entry(id).or_insert(VersionEntry { ts, tombstone: true });
    }
    state.prefix_tombstones = checkpoint.prefix_tombstones.into_iter().collect();
    state.truncate_floor = checkpoint.truncate_floor;
    state.generation = checkpoint.generation;

    // Segments written by a commit that never saved its checkpoint
    for id in layout.list_segments()? {
        if !checkpoint.segments.iter().any(|e| e.id == id) {
            let path = layout.segment_path(&id);
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed orphan segment {:?}", path),
                Err(e) => warn!("Failed to remove orphan segment {:?}: {}", path, e),
            }
        }
    }
    Ok(state)
}

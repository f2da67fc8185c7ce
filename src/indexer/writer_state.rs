use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use log::debug;
use roaring::RoaringBitmap;
use crate::core::error::Result;
use crate::core::types::{Document, ID_FIELD, PK_FIELD, TS_FIELD};
use crate::encoding::terms::encode_ts;
use crate::index::inverted::{Term, TermRange};
use crate::mvcc::snapshot::SegmentSlot;
use crate::storage::segment::Segment;

/// Latest accepted write for an id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionEntry {
    pub ts: u64,
    pub tombstone: bool,
}

/// Everything guarded by the writer mutex
///
/// Invariant: for every id at most one non-deleted document exists across
/// the buffer and all slots, and it carries `versions[id].ts`.
pub struct WriterState {
    pub buffer: BTreeMap<String, Document>,
    pub slots: Vec<SegmentSlot>,
    pub versions: BTreeMap<String, VersionEntry>,
    pub prefix_tombstones: BTreeMap<String, u64>,
    pub truncate_floor: Option<u64>,
    pub retired: Vec<Arc<Segment>>,  // Awaiting a checkpoint that drops them
    pub dirty: bool,                 // Published snapshot lags this state
    pub last_refresh: Instant,
    pub generation: u64,
}

impl WriterState {
    pub fn new() -> Self {
        WriterState {
            buffer: BTreeMap::new(),
            slots: Vec::new(),
            versions: BTreeMap::new(),
            prefix_tombstones: BTreeMap::new(),
            truncate_floor: None,
            retired: Vec::new(),
            dirty: false,
            last_refresh: Instant::now(),
            generation: 0,
        }
    }

    /// Largest prefix deletion covering `id`
    fn prefix_deletion(&self, id: &str) -> Option<u64> {
        if self.prefix_tombstones.is_empty() {
            return None;
        }
        id.char_indices()
            .map(|(i, _)| i)
            .skip(1)
            .chain(std::iter::once(id.len()))
            .filter_map(|end| self.prefix_tombstones.get(&id[..end]).copied())
            .max()
    }

    /// Returns false when the write is stale and was discarded
    pub fn upsert(&mut self, doc: Document) -> bool {
        if self.truncate_floor.is_some_and(|floor| doc.ts <= floor) {
            return false;
        }
        if self.prefix_deletion(&doc.id).is_some_and(|ts_del| doc.ts <= ts_del) {
            return false;
        }
        match self.versions.get(&doc.id) {
            // A tie with a delete keeps the delete
            Some(entry) if entry.tombstone && doc.ts <= entry.ts => return false,
            Some(entry) if doc.ts < entry.ts => return false,
            _ => {}
        }

        self.remove_live(&doc.id);
        self.versions.insert(doc.id.clone(), VersionEntry { ts: doc.ts, tombstone: false });
        self.buffer.insert(doc.id.clone(), doc);
        self.dirty = true;
        true
    }

    /// Returns true when a live document was deleted
    pub fn delete_by_id(&mut self, id: &str, ts_del: u64) -> bool {
        match self.versions.get(id) {
            Some(entry) if !entry.tombstone && entry.ts > ts_del => return false,
            Some(entry) if entry.tombstone && entry.ts >= ts_del => return false,
            _ => {}
        }
        let removed = self.remove_live(id);
        if self.covers(id, ts_del) {
            self.versions.remove(id);
        } else {
            self.versions.insert(id.to_string(), VersionEntry { ts: ts_del, tombstone: true });
        }
        self.dirty = true;
        removed
    }

    /// True when a prefix deletion or the truncate floor already hides `id` at `ts`
    fn covers(&self, id: &str, ts: u64) -> bool {
        self.truncate_floor.is_some_and(|floor| ts <= floor)
            || self.prefix_deletion(id).is_some_and(|ts_del| ts <= ts_del)
    }

    /// Unconditionally delete every live document carrying `term`
    pub fn delete_by_term(&mut self, term: &Term) -> usize {
        let mut ids = Vec::new();

        for slot in &mut self.slots {
            let Some(list) = slot.segment.index.search_term(term) else {
                continue;
            };
            let hits: Vec<u32> = list.docs().filter(|d| !slot.deletes.contains(*d)).collect();
            if hits.is_empty() {
                continue;
            }
            let deletes = Arc::make_mut(&mut slot.deletes);
            for doc in hits {
                deletes.insert(doc);
                if let Some(stored) = slot.segment.stored(doc) {
                    ids.push(stored.id.clone());
                }
            }
        }

        let buffered: Vec<String> = self.buffer
            .values()
            .filter(|doc| doc_has_term(doc, term))
            .map(|doc| doc.id.clone())
            .collect();
        for id in &buffered {
            self.buffer.remove(id);
        }
        ids.extend(buffered);

        for id in &ids {
            self.versions.remove(id);
        }
        if !ids.is_empty() {
            self.dirty = true;
        }
        debug!("Deleted {} documents by term on '{}'", ids.len(), term.field);
        ids.len()
    }

    /// Delete every document whose id starts with `prefix` and `ts <= ts_del`
    pub fn delete_prefix(&mut self, prefix: &str, ts_del: u64) -> usize {
        let matching: Vec<(String, VersionEntry)> = self.versions
            .range(prefix.to_string()..)
            .take_while(|(id, _)| id.starts_with(prefix))
            .filter(|(_, entry)| entry.ts <= ts_del)
            .map(|(id, entry)| (id.clone(), *entry))
            .collect();

        let mut removed = 0;
        for (id, entry) in matching {
            if !entry.tombstone && self.remove_live(&id) {
                removed += 1;
            }
            self.versions.remove(&id);
        }

        if !self.covers(prefix, ts_del) {
            // Longer prefixes deleted no later are subsumed
            self.prefix_tombstones.retain(|p, ts| !(p.starts_with(prefix) && *ts <= ts_del));
            self.prefix_tombstones.insert(prefix.to_string(), ts_del);
        }
        self.dirty = true;
        removed
    }

    /// Live ids starting with `prefix`, with their timestamps
    pub fn ids_with_prefix(&self, prefix: &str) -> Vec<(String, u64)> {
        self.versions
            .range(prefix.to_string()..)
            .take_while(|(id, _)| id.starts_with(prefix))
            .filter(|(_, entry)| !entry.tombstone)
            .map(|(id, entry)| (id.clone(), entry.ts))
            .collect()
    }

    /// Delete the exact `(id, ts)` version wherever it still lives
    pub fn delete_version(&mut self, id: &str, ts: u64) -> bool {
        let mut removed = false;
        if self.buffer.get(id).is_some_and(|doc| doc.ts == ts) {
            self.buffer.remove(id);
            removed = true;
        }
        for slot in &mut self.slots {
            let hits: Vec<u32> = slot.segment
                .docs_for_id(id)
                .into_iter()
                .filter(|d| !slot.deletes.contains(*d))
                .filter(|d| slot.segment.stored(*d).is_some_and(|s| s.ts == ts))
                .collect();
            if hits.is_empty() {
                continue;
            }
            Arc::make_mut(&mut slot.deletes).extend(hits);
            removed = true;
        }
        if removed {
            if self.versions.get(id).is_some_and(|e| !e.tombstone && e.ts == ts) {
                self.versions.remove(id);
            }
            self.dirty = true;
        }
        removed
    }

    /// Delete every document with `ts <= ts_cut`; later writes at or below it are discarded
    pub fn truncate(&mut self, ts_cut: u64) -> usize {
        let range = TermRange {
            lower: None,
            upper: Some(encode_ts(ts_cut).to_vec()),
            include_lower: true,
            include_upper: true,
        };
        let mut removed = 0;
        for slot in &mut self.slots {
            let Some(field) = slot.segment.field(TS_FIELD) else {
                continue;
            };
            let hits: Vec<u32> = field
                .range(&range)
                .into_iter()
                .flat_map(|list| list.docs())
                .filter(|d| !slot.deletes.contains(*d))
                .collect();
            if hits.is_empty() {
                continue;
            }
            removed += hits.len();
            Arc::make_mut(&mut slot.deletes).extend(hits);
        }

        let before = self.buffer.len();
        self.buffer.retain(|_, doc| doc.ts > ts_cut);
        removed += before - self.buffer.len();

        self.versions.retain(|_, entry| entry.ts > ts_cut);
        self.prefix_tombstones.retain(|_, ts| *ts > ts_cut);
        self.truncate_floor = Some(self.truncate_floor.map_or(ts_cut, |f| f.max(ts_cut)));
        self.dirty = true;
        removed
    }

    /// Seal the buffer into a new segment; returns false when nothing was buffered
    pub fn seal(&mut self) -> Result<bool> {
        if self.buffer.is_empty() {
            return Ok(false);
        }
        let segment = Segment::build(self.buffer.values())?;
        debug!("Sealed segment {:?} with {} docs", segment.id, segment.doc_count());
        self.slots.push(SegmentSlot::new(Arc::new(segment)));
        self.buffer.clear();
        Ok(true)
    }

    /// Move fully deleted slots to the retired list
    pub fn retire_empty(&mut self) {
        let (empty, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.slots)
            .into_iter()
            .partition(SegmentSlot::is_empty);
        self.slots = kept;
        self.retired.extend(empty.into_iter().map(|s| s.segment));
    }

    /// Swap merged `sources` for `merged`, carrying over deletes that landed meanwhile
    ///
    /// Returns false when a source is gone (retired by a concurrent truncate).
    pub fn install_merge(
        &mut self,
        sources: &[SegmentSlot],
        merged: Segment,
        remaps: &[Vec<Option<u32>>],
    ) -> bool {
        let mut positions = Vec::with_capacity(sources.len());
        for source in sources {
            match self.slots.iter().position(|s| Arc::ptr_eq(&s.segment, &source.segment)) {
                Some(pos) => positions.push(pos),
                None => return false,
            }
        }

        let mut carried = RoaringBitmap::new();
        for ((source, pos), remap) in sources.iter().zip(&positions).zip(remaps) {
            let current = &self.slots[*pos].deletes;
            for doc in current.as_ref() - source.deletes.as_ref() {
                if let Some(Some(new_doc)) = remap.get(doc as usize) {
                    carried.insert(*new_doc);
                }
            }
        }

        let first = positions.iter().copied().min().unwrap_or(self.slots.len());
        let merged_slot = SegmentSlot {
            segment: Arc::new(merged),
            deletes: Arc::new(carried),
        };

        let mut slots = Vec::with_capacity(self.slots.len() + 1 - sources.len());
        for (pos, slot) in std::mem::take(&mut self.slots).into_iter().enumerate() {
            if pos == first {
                slots.push(merged_slot.clone());
            }
            if positions.contains(&pos) {
                self.retired.push(slot.segment);
            } else {
                slots.push(slot);
            }
        }
        self.slots = slots;
        self.dirty = true;
        true
    }

    /// Drop id and prefix tombstones that a shorter prefix deletion or the
    /// truncate floor already covers; returns the number dropped
    pub fn compact_tombstones(&mut self) -> usize {
        let before = self.versions.len() + self.prefix_tombstones.len();

        let prefixes: Vec<(String, u64)> = self.prefix_tombstones
            .iter()
            .map(|(p, ts)| (p.clone(), *ts))
            .collect();
        let floor = self.truncate_floor;
        self.prefix_tombstones.retain(|p, ts| {
            floor.map_or(true, |f| *ts > f)
                && !prefixes.iter().any(|(other, other_ts)| {
                    other.len() < p.len() && p.starts_with(other.as_str()) && *ts <= *other_ts
                })
        });

        let stale: Vec<String> = self.versions
            .iter()
            .filter(|(id, entry)| entry.tombstone && self.covers(id, entry.ts))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            self.versions.remove(id);
        }

        let dropped = before - self.versions.len() - self.prefix_tombstones.len();
        if dropped > 0 {
            debug!("Compacted {} covered tombstones", dropped);
        }
        dropped
    }

    /// Tombstones worth persisting: ids deleted without a newer write
    pub fn tombstones(&self) -> Vec<(String, u64)> {
        self.versions
            .iter()
            .filter(|(_, entry)| entry.tombstone)
            .map(|(id, entry)| (id.clone(), entry.ts))
            .collect()
    }

    pub fn latest_ts(&self, id: &str) -> Option<u64> {
        self.versions.get(id).map(|entry| entry.ts)
    }

    /// Remove the live document of `id` from the buffer or its segment
    fn remove_live(&mut self, id: &str) -> bool {
        if self.buffer.remove(id).is_some() {
            return true;
        }
        let mut removed = false;
        for slot in &mut self.slots {
            let hits: Vec<u32> = slot.segment
                .docs_for_id(id)
                .into_iter()
                .filter(|d| !slot.deletes.contains(*d))
                .collect();
            if !hits.is_empty() {
                Arc::make_mut(&mut slot.deletes).extend(hits);
                removed = true;
            }
        }
        removed
    }
}

impl Default for WriterState {
    fn default() -> Self {
        Self::new()
    }
}

/// Term match against a buffered (not yet sealed) document
fn doc_has_term(doc: &Document, term: &Term) -> bool {
    match term.field.as_str() {
        ID_FIELD => doc.id.as_bytes() == term.bytes.as_slice(),
        PK_FIELD => doc.partition.as_bytes() == term.bytes.as_slice(),
        TS_FIELD => encode_ts(doc.ts).as_slice() == term.bytes.as_slice(),
        name => doc.fields
            .iter()
            .filter(|f| f.name == name)
            .any(|f| f.tokens.iter().any(|t| t.term == term.bytes)),
    }
}

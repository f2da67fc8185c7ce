use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use parking_lot::Mutex;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::core::error::Result;
use crate::core::types::{Document, FieldToken, SortValue, StoredDocument, ID_FIELD, PK_FIELD, TS_FIELD};
use crate::encoding::terms::encode_ts;
use crate::index::inverted::{FieldIndex, FieldIndexData, InvertedIndex, InvertedIndexBuilder};
use crate::index::posting::Posting;

/// Unique segment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub Uuid);

impl SegmentId {
    pub fn new() -> Self {
        SegmentId(Uuid::new_v4())
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub created_at: DateTime<Utc>,
    pub doc_count: u32,
    pub size_bytes: usize,
}

/// Immutable index segment
///
/// A segment lives in memory from the refresh that sealed it. Commit writes
/// it to `file`; once it is marked obsolete the file is removed when the
/// last `Arc` (held by the writer or a pinned snapshot) goes away.
pub struct Segment {
    pub id: SegmentId,
    pub metadata: SegmentMetadata,
    pub index: InvertedIndex,
    pub stored: Vec<StoredDocument>,
    pub sort_columns: HashMap<String, Vec<Option<SortValue>>>,
    file: Mutex<Option<PathBuf>>,
    obsolete: AtomicBool,
}

/// Serialized form of a segment
#[derive(Serialize, Deserialize)]
pub struct SegmentData {
    pub id: SegmentId,
    pub metadata: SegmentMetadata,
    pub fields: Vec<(String, FieldIndexData)>,
    pub stored: Vec<StoredDocument>,
    pub sort_columns: Vec<(String, Vec<Option<SortValue>>)>,
}

impl Segment {
    fn assemble(
        id: SegmentId,
        index: InvertedIndex,
        stored: Vec<StoredDocument>,
        sort_columns: HashMap<String, Vec<Option<SortValue>>>,
    ) -> Self {
        let size_bytes = index.size_bytes() + stored.len() * 64;
        Segment {
            id,
            metadata: SegmentMetadata {
                created_at: Utc::now(),
                doc_count: index.doc_count,
                size_bytes,
            },
            index,
            stored,
            sort_columns,
            file: Mutex::new(None),
            obsolete: AtomicBool::new(false),
        }
    }

    /// Seal buffered documents into a segment, numbered in iteration order
    pub fn build<'a, I>(docs: I) -> Result<Segment>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut builder = InvertedIndexBuilder::new();
        let mut stored = Vec::new();
        let mut sorts: HashMap<String, Vec<Option<SortValue>>> = HashMap::new();

        for (doc_num, doc) in docs.into_iter().enumerate() {
            let doc_num = doc_num as u32;
            builder.add_tokens(doc_num, ID_FIELD, &[single(doc.id.as_bytes())]);
            builder.add_tokens(doc_num, PK_FIELD, &[single(doc.partition.as_bytes())]);
            builder.add_tokens(doc_num, TS_FIELD, &[single(&encode_ts(doc.ts))]);
            set_sort(&mut sorts, ID_FIELD, doc_num, SortValue::Str(doc.id.clone()));
            set_sort(&mut sorts, TS_FIELD, doc_num, SortValue::Unsigned(doc.ts));

            let mut values = Vec::new();
            for field in &doc.fields {
                builder.add_tokens(doc_num, &field.name, &field.tokens);
                if let Some(sort) = &field.sort {
                    set_sort(&mut sorts, &field.name, doc_num, sort.clone());
                }
                if let Some(value) = &field.stored {
                    values.push((field.name.clone(), value.clone()));
                }
            }
            stored.push(StoredDocument {
                id: doc.id.clone(),
                partition: doc.partition.clone(),
                ts: doc.ts,
                fields: values,
            });
        }

        let doc_count = stored.len() as u32;
        for column in sorts.values_mut() {
            column.resize(doc_count as usize, None);
        }
        let index = builder.build(doc_count)?;
        Ok(Segment::assemble(SegmentId::new(), index, stored, sorts))
    }

    /// Merge the live documents of `sources` into one segment
    ///
    /// Returns the segment and, per source, the new number of each old doc
    /// (`None` for docs that were already deleted).
    pub fn merge(sources: &[(Arc<Segment>, Arc<RoaringBitmap>)]) -> Result<(Segment, Vec<Vec<Option<u32>>>)> {
        let mut remaps = Vec::with_capacity(sources.len());
        let mut next = 0u32;
        for (segment, deletes) in sources {
            let mapping: Vec<Option<u32>> = (0..segment.metadata.doc_count)
                .map(|doc| {
                    if deletes.contains(doc) {
                        None
                    } else {
                        next += 1;
                        Some(next - 1)
                    }
                })
                .collect();
            remaps.push(mapping);
        }
        let doc_count = next;

        let mut builder = InvertedIndexBuilder::new();
        let mut stored = Vec::with_capacity(doc_count as usize);
        let mut sorts: HashMap<String, Vec<Option<SortValue>>> = HashMap::new();

        for ((segment, _), mapping) in sources.iter().zip(&remaps) {
            for (name, field) in &segment.index.fields {
                for (term, list) in field.terms() {
                    for posting in &list.postings {
                        if let Some(Some(doc)) = mapping.get(posting.doc as usize) {
                            builder.add_posting(name, &term, Posting { doc: *doc, ..posting.clone() });
                        }
                    }
                }
                for (old, len) in field.lengths.iter().enumerate() {
                    if let Some(Some(doc)) = mapping.get(old) {
                        builder.add_length(name, *doc, *len);
                    }
                }
            }
            for (name, column) in &segment.sort_columns {
                for (old, value) in column.iter().enumerate() {
                    if let (Some(Some(doc)), Some(value)) = (mapping.get(old), value) {
                        set_sort(&mut sorts, name, *doc, value.clone());
                    }
                }
            }
            for (old, doc) in segment.stored.iter().enumerate() {
                if let Some(Some(_)) = mapping.get(old) {
                    stored.push(doc.clone());
                }
            }
        }

        for column in sorts.values_mut() {
            column.resize(doc_count as usize, None);
        }
        let index = builder.build(doc_count)?;
        debug!("Merged {} segments into {} docs", sources.len(), doc_count);
        Ok((Segment::assemble(SegmentId::new(), index, stored, sorts), remaps))
    }

    /// Doc numbers carrying `_id == id`, deleted or not
    pub fn docs_for_id(&self, id: &str) -> Vec<u32> {
        self.index
            .field(ID_FIELD)
            .and_then(|f| f.postings(id.as_bytes()))
            .map(|list| list.docs().collect())
            .unwrap_or_default()
    }

    pub fn stored(&self, doc: u32) -> Option<&StoredDocument> {
        self.stored.get(doc as usize)
    }

    pub fn sort_value(&self, field: &str, doc: u32) -> Option<&SortValue> {
        self.sort_columns.get(field)?.get(doc as usize)?.as_ref()
    }

    pub fn field(&self, name: &str) -> Option<&FieldIndex> {
        self.index.field(name)
    }

    pub fn doc_count(&self) -> u32 {
        self.metadata.doc_count
    }

    pub fn is_persisted(&self) -> bool {
        self.file.lock().is_some()
    }

    pub fn mark_persisted(&self, path: PathBuf) {
        *self.file.lock() = Some(path);
    }

    /// The file goes away with the last reference
    pub fn mark_obsolete(&self) {
        self.obsolete.store(true, Ordering::Release);
    }

    pub fn to_data(&self) -> SegmentData {
        let mut fields: Vec<(String, FieldIndexData)> = self.index.fields
            .iter()
            .map(|(name, field)| (name.clone(), field.to_data()))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        let mut sort_columns: Vec<_> = self.sort_columns
            .iter()
            .map(|(name, column)| (name.clone(), column.clone()))
            .collect();
        sort_columns.sort_by(|a, b| a.0.cmp(&b.0));
        SegmentData {
            id: self.id,
            metadata: self.metadata.clone(),
            fields,
            stored: self.stored.clone(),
            sort_columns,
        }
    }

    pub fn from_data(data: SegmentData, path: PathBuf) -> Result<Segment> {
        let mut fields = HashMap::with_capacity(data.fields.len());
        for (name, field) in data.fields {
            fields.insert(name, FieldIndex::from_data(field)?);
        }
        let index = InvertedIndex { fields, doc_count: data.metadata.doc_count };
        Ok(Segment {
            id: data.id,
            metadata: data.metadata,
            index,
            stored: data.stored,
            sort_columns: data.sort_columns.into_iter().collect(),
            file: Mutex::new(Some(path)),
            obsolete: AtomicBool::new(false),
        })
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        if !self.obsolete.load(Ordering::Acquire) {
            return;
        }
        if let Some(path) = self.file.get_mut().take() {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed obsolete segment {:?}", path),
                Err(e) => warn!("Failed to remove obsolete segment {:?}: {}", path, e),
            }
        }
    }
}

fn single(term: &[u8]) -> FieldToken {
    FieldToken { term: term.to_vec(), position: 0 }
}

// First value wins for multi-valued fields
fn set_sort(sorts: &mut HashMap<String, Vec<Option<SortValue>>>, field: &str, doc: u32, value: SortValue) {
    let column = sorts.entry(field.to_string()).or_default();
    let idx = doc as usize;
    if column.len() <= idx {
        column.resize(idx + 1, None);
    }
    if column[idx].is_none() {
        column[idx] = Some(value);
    }
}

use std::sync::Arc;
use log::warn;
use crate::core::error::Result;
use crate::core::types::{Document, IndexableField};
use crate::encoding::field::{coerce, encode_value};
use crate::encoding::json::project_json;
use crate::host::filter::ColumnFilter;
use crate::host::row::{Cell, ColumnBatch, Row};
use crate::host::value::CellValue;
use crate::schema::field::FieldType;
use crate::schema::options::Options;

pub mod key;
pub mod simple;
pub mod wide;

/// A deletion the indexer must apply
#[derive(Debug, Clone, PartialEq)]
pub enum Tombstone {
    /// Every document of the partition written at or before `ts`
    Partition { partition: String, ts: u64 },
    /// Documents of the partition whose clustering lies in `[start, end]`
    Range {
        partition: String,
        start: Vec<CellValue>,
        end: Vec<CellValue>,
        ts: u64,
    },
    Row { id: String, ts: u64 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub upserts: Vec<Document>,
    pub tombstones: Vec<Tombstone>,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.tombstones.is_empty()
    }
}

/// Turns a host write into documents and deletions
///
/// Documents cover whole logical rows: the batch is merged over the rows the
/// host already stores, so partial writes keep the columns they don't touch.
pub trait RowProjector: Send + Sync {
    /// The part of the partition `project` needs read back, `None` when the
    /// batch writes no indexed column
    fn read_filter(&self, batch: &ColumnBatch) -> Option<ColumnFilter>;

    /// `stored` is the partition as returned for `read_filter`
    fn project(&self, partition_key: &[CellValue], batch: &ColumnBatch, stored: &[Row]) -> Result<Projection>;
}

/// Per column, the newer of the stored and the written cell; a tie keeps
/// the written one. Stored cells for which `shadowed` holds are dropped.
pub(crate) fn merge_cells<'a>(
    stored: &'a [Cell],
    written: &[&'a Cell],
    shadowed: impl Fn(&Cell) -> bool,
) -> Vec<&'a Cell> {
    let mut merged: Vec<&Cell> = written.to_vec();
    for cell in stored.iter().filter(|c| !shadowed(c)) {
        match merged.iter_mut().find(|m| m.column.eq_ignore_ascii_case(&cell.column)) {
            Some(current) if current.ts < cell.ts => *current = cell,
            Some(_) => {}
            None => merged.push(cell),
        }
    }
    merged
}

/// Shared per-cell projection used by both projectors
pub(crate) struct CellProjector {
    options: Arc<Options>,
}

impl CellProjector {
    pub fn new(options: Arc<Options>) -> Self {
        CellProjector { options }
    }

    pub fn is_indexed(&self, cell: &Cell) -> bool {
        self.options.indexes_column(&cell.column)
    }

    /// Fields of a live indexed cell; values that do not fit are skipped
    pub fn fields_of(&self, cell: &Cell) -> Vec<IndexableField> {
        let name = cell.column.trim().to_lowercase();
        let (Some(props), Some(value)) = (self.options.fields.get(&name), cell.value.as_ref()) else {
            return Vec::new();
        };

        if props.field_type == FieldType::Json {
            let raw = match value {
                CellValue::Text(raw) => raw,
                other => {
                    warn!("Skipping json column '{}': not a text value ({:?})", name, other.cell_type());
                    return Vec::new();
                }
            };
            return match project_json(&name, props, raw) {
                Ok(fields) => fields,
                Err(e) => {
                    warn!("Skipping json column '{}': {}", name, e.context);
                    Vec::new()
                }
            };
        }

        match coerce(props.field_type, value) {
            Ok(v) => vec![encode_value(&name, props, v)],
            Err(e) => {
                warn!("Skipping column '{}': {}", name, e.context);
                Vec::new()
            }
        }
    }

    pub fn writes_indexed(&self, cells: &[&Cell]) -> bool {
        cells.iter().any(|c| self.is_indexed(c))
    }

    /// Build a document from the merged cells of one logical row, or the row
    /// tombstone when none of its indexed cells is live. The document ts is
    /// the newest indexed cell, deleted ones included.
    pub fn project_row(&self, id: String, partition: &str, cells: &[&Cell]) -> Option<RowOutcome> {
        let indexed: Vec<&Cell> = cells.iter().copied().filter(|c| self.is_indexed(c)).collect();
        let ts = indexed.iter().map(|c| c.ts).max()?;

        if !indexed.iter().any(|c| c.is_live()) {
            return Some(RowOutcome::Deleted(Tombstone::Row { id, ts }));
        }

        let mut doc = Document::new(id, partition, ts);
        for cell in indexed.iter().filter(|c| c.is_live()) {
            for field in self.fields_of(cell) {
                doc.add_field(field);
            }
        }
        Some(RowOutcome::Live(doc))
    }
}

pub(crate) enum RowOutcome {
    Live(Document),
    Deleted(Tombstone),
}

impl RowOutcome {
    pub fn push_into(self, projection: &mut Projection) {
        match self {
            RowOutcome::Live(doc) => projection.upserts.push(doc),
            RowOutcome::Deleted(tombstone) => projection.tombstones.push(tombstone),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_newest_cell_per_column() {
        let stored = vec![
            Cell::live("body", CellValue::Text("old".into()), 5),
            Cell::live("rank", CellValue::Int(1), 9),
            Cell::live("tag", CellValue::Text("t".into()), 3),
        ];
        let body = Cell::live("Body", CellValue::Text("new".into()), 7);
        let rank = Cell::tombstone("rank", 8);
        let merged = merge_cells(&stored, &[&body, &rank], |c| c.column == "tag");

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].value, Some(CellValue::Text("new".into())));
        assert_eq!(merged[1].value, Some(CellValue::Int(1)));
    }
}

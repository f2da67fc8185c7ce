use serde::{Deserialize, Serialize};
use crate::host::value::CellValue;

/// A column cell; `value == None` is a cell tombstone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub column: String,
    pub value: Option<CellValue>,
    pub ts: u64,
}

impl Cell {
    pub fn live(column: impl Into<String>, value: CellValue, ts: u64) -> Self {
        Cell { column: column.into(), value: Some(value), ts }
    }

    pub fn tombstone(column: impl Into<String>, ts: u64) -> Self {
        Cell { column: column.into(), value: None, ts }
    }

    pub fn is_live(&self) -> bool {
        self.value.is_some()
    }
}

/// A cell of a write batch, addressed by its clustering prefix
/// (empty for static cells and for simple tables)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCell {
    pub clustering: Vec<CellValue>,
    pub cell: Cell,
}

/// Deletes every row of the partition whose clustering lies in `[start, end]`,
/// comparing prefixes; an empty bound is open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeTombstone {
    pub start: Vec<CellValue>,
    pub end: Vec<CellValue>,
    pub ts: u64,
}

/// Everything one host write applies to one partition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnBatch {
    pub partition_deletion: Option<u64>,
    pub range_tombstones: Vec<RangeTombstone>,
    pub cells: Vec<BatchCell>,
}

impl ColumnBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(mut self, clustering: Vec<CellValue>, cell: Cell) -> Self {
        self.cells.push(BatchCell { clustering, cell });
        self
    }

    pub fn static_cell(self, cell: Cell) -> Self {
        self.cell(Vec::new(), cell)
    }

    pub fn delete_partition(mut self, ts: u64) -> Self {
        self.partition_deletion = Some(ts);
        self
    }

    pub fn delete_range(mut self, start: Vec<CellValue>, end: Vec<CellValue>, ts: u64) -> Self {
        self.range_tombstones.push(RangeTombstone { start, end, ts });
        self
    }
}

/// A materialized logical row returned by the host read path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub partition_key: Vec<CellValue>,
    pub clustering: Vec<CellValue>,
    pub cells: Vec<Cell>,
    pub is_static: bool,
}

impl Row {
    pub fn new(partition_key: Vec<CellValue>, clustering: Vec<CellValue>) -> Self {
        Row {
            partition_key,
            clustering,
            cells: Vec::new(),
            is_static: false,
        }
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|c| c.column.eq_ignore_ascii_case(column))
            .and_then(|c| c.value.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        !self.cells.iter().any(Cell::is_live)
    }

    pub fn push(&mut self, cell: Cell) {
        self.cells.push(cell);
    }
}

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use parking_lot::Mutex;
use tempfile::TempDir;
use sgindex::analysis::analyzer::AnalyzerRegistry;
use sgindex::host::filter::{clustering_in_range, ColumnFilter, Expression, ExtendedFilter, Operator};
use sgindex::host::reader::RowReader;
use sgindex::host::row::{Cell, ColumnBatch, Row};
use sgindex::host::table::TableSchema;
use sgindex::host::value::{compare_prefix, CellValue};
use sgindex::projection::key::encode_components;
use sgindex::{Error, IndexDefinition, IndexerConfig, Result, RowIndex};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Synchronous merges and searchers that always see the latest writes
pub fn test_config(dir: &Path) -> IndexerConfig {
    let mut config = IndexerConfig::with_base_dir(dir);
    config.refresh_interval_ms = 0;
    config.background_merge = false;
    config.build_wait_timeout_ms = 2_000;
    config
}

#[derive(Default)]
struct MemPartition {
    key: Vec<CellValue>,
    statics: Vec<Cell>,
    rows: Vec<(Vec<CellValue>, Vec<Cell>)>,
}

/// Host table kept in memory, applying batches last-write-wins per cell
pub struct MemTable {
    schema: TableSchema,
    partitions: Mutex<BTreeMap<String, MemPartition>>,
    failing: Mutex<HashSet<String>>,
}

impl MemTable {
    pub fn new(schema: TableSchema) -> Self {
        MemTable {
            schema,
            partitions: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Reads of this partition fail until cleared
    pub fn fail_reads(&self, partition_key: &[CellValue]) {
        self.failing.lock().insert(encode_components(partition_key));
    }

    pub fn apply(&self, partition_key: &[CellValue], batch: &ColumnBatch) {
        let mut partitions = self.partitions.lock();
        let partition = partitions.entry(encode_components(partition_key)).or_default();
        partition.key = partition_key.to_vec();

        if let Some(ts) = batch.partition_deletion {
            partition.statics.retain(|c| c.ts > ts);
            for (_, cells) in partition.rows.iter_mut() {
                cells.retain(|c| c.ts > ts);
            }
        }
        for range in &batch.range_tombstones {
            for (clustering, cells) in partition.rows.iter_mut() {
                if clustering_in_range(clustering, &range.start, &range.end) {
                    cells.retain(|c| c.ts > range.ts);
                }
            }
        }
        for batch_cell in &batch.cells {
            let cells = if self.schema.is_static(&batch_cell.cell.column) {
                &mut partition.statics
            } else {
                let position = partition.rows.iter().position(|(ck, _)| *ck == batch_cell.clustering);
                let index = match position {
                    Some(index) => index,
                    None => {
                        partition.rows.push((batch_cell.clustering.clone(), Vec::new()));
                        partition.rows.sort_by(|a, b| compare_prefix(&a.0, &b.0));
                        partition.rows.iter().position(|(ck, _)| *ck == batch_cell.clustering).unwrap()
                    }
                };
                &mut partition.rows[index].1
            };
            upsert_cell(cells, &batch_cell.cell);
        }
    }
}

fn upsert_cell(cells: &mut Vec<Cell>, cell: &Cell) {
    match cells.iter_mut().find(|c| c.column.eq_ignore_ascii_case(&cell.column)) {
        Some(existing) if existing.ts <= cell.ts => *existing = cell.clone(),
        Some(_) => {}
        None => cells.push(cell.clone()),
    }
}

impl RowReader for MemTable {
    fn read_partition(&self, partition_key: &[CellValue], filter: &ColumnFilter) -> Result<Vec<Row>> {
        let key = encode_components(partition_key);
        if self.failing.lock().contains(&key) {
            return Err(Error::transient_read(format!("Injected read failure for '{}'", key)));
        }
        let partitions = self.partitions.lock();
        let Some(partition) = partitions.get(&key) else {
            return Ok(Vec::new());
        };

        let mut rows = Vec::new();
        if filter.selects_static() && partition.statics.iter().any(Cell::is_live) {
            let mut row = Row::new(partition.key.clone(), Vec::new());
            row.is_static = true;
            row.cells = partition.statics.iter().filter(|c| c.is_live()).cloned().collect();
            rows.push(row);
        }
        for (clustering, cells) in &partition.rows {
            if !filter.selects(clustering) {
                continue;
            }
            let mut row = Row::new(partition.key.clone(), clustering.clone());
            row.cells = cells.iter().filter(|c| c.is_live()).cloned().collect();
            if !row.is_empty() {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

/// A table, its index and the temp directory behind it
pub struct Harness {
    pub table: Arc<MemTable>,
    pub index: RowIndex,
    pub column: String,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(schema: TableSchema, column: &str, options_json: &str) -> Self {
        let dir = TempDir::new().unwrap();
        Self::open_in(dir, schema, column, options_json)
    }

    pub fn open_in(dir: TempDir, schema: TableSchema, column: &str, options_json: &str) -> Self {
        init_logging();
        let table = Arc::new(MemTable::new(schema.clone()));
        let index = RowIndex::new(
            schema,
            IndexDefinition::new("idx", column, options_json),
            table.clone(),
            test_config(dir.path()),
            Arc::new(AnalyzerRegistry::new()),
        );
        index.init().unwrap();
        index.mark_built();
        Harness { table, index, column: column.to_string(), dir }
    }

    /// Apply a write to the table and its index, as the host does
    pub fn write(&self, partition_key: &[CellValue], batch: ColumnBatch) {
        self.table.apply(partition_key, &batch);
        self.index.index(partition_key, &batch).unwrap();
    }

    pub fn filter(&self, json: &str) -> ExtendedFilter {
        ExtendedFilter::new(vec![Expression::new(self.column.as_str(), Operator::Eq, CellValue::Text(json.to_string()))])
    }

    pub fn try_search(&self, filter: ExtendedFilter) -> Result<Vec<Row>> {
        let searcher = self.index.create_searcher([self.column.as_str()])?;
        Ok(searcher.search(filter)?.collect())
    }

    pub fn search(&self, json: &str) -> Vec<Row> {
        self.try_search(self.filter(json)).unwrap()
    }
}

pub fn text(value: &str) -> CellValue {
    CellValue::Text(value.to_string())
}

/// Score carried by the `{"score":x}` payload of `column`
pub fn score_of(row: &Row, column: &str) -> f32 {
    let Some(CellValue::Text(payload)) = row.get(column) else {
        panic!("row has no score column '{}'", column);
    };
    let value: serde_json::Value = serde_json::from_str(payload).unwrap();
    value["score"].as_f64().unwrap() as f32
}

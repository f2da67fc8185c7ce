use std::sync::Arc;
use log::debug;
use crate::core::error::Result;
use crate::host::filter::{clustering_in_range, ColumnFilter, Slice};
use crate::host::row::{Cell, ColumnBatch, Row};
use crate::host::table::TableSchema;
use crate::host::value::CellValue;
use crate::projection::key::KeyCodec;
use crate::projection::{merge_cells, CellProjector, Projection, RowOutcome, RowProjector, Tombstone};
use crate::schema::options::Options;

/// Projector for partitions with clustering rows and optional static columns
pub struct WideRowProjector {
    cells: CellProjector,
    keys: KeyCodec,
    table: TableSchema,
}

impl WideRowProjector {
    pub fn new(table: &TableSchema, options: Arc<Options>) -> Self {
        WideRowProjector {
            cells: CellProjector::new(options),
            keys: KeyCodec::new(table),
            table: table.clone(),
        }
    }

    // Logical rows in first-seen order, static cells split off
    fn group<'a>(&self, batch: &'a ColumnBatch) -> (Vec<&'a Cell>, Vec<(&'a [CellValue], Vec<&'a Cell>)>) {
        let mut statics = Vec::new();
        let mut rows: Vec<(&[CellValue], Vec<&Cell>)> = Vec::new();

        for batch_cell in &batch.cells {
            if batch_cell.clustering.is_empty() || self.table.is_static(&batch_cell.cell.column) {
                statics.push(&batch_cell.cell);
                continue;
            }
            match rows.iter_mut().find(|(ck, _)| *ck == batch_cell.clustering.as_slice()) {
                Some((_, cells)) => cells.push(&batch_cell.cell),
                None => rows.push((batch_cell.clustering.as_slice(), vec![&batch_cell.cell])),
            }
        }
        (statics, rows)
    }
}

/// Whether the batch's partition or range deletions cover `cell` of the row
/// under `clustering`
fn shadowed(batch: &ColumnBatch, clustering: &[CellValue], cell: &Cell) -> bool {
    batch.partition_deletion.is_some_and(|ts| cell.ts <= ts)
        || (!clustering.is_empty()
            && batch.range_tombstones
                .iter()
                .any(|r| cell.ts <= r.ts && clustering_in_range(clustering, &r.start, &r.end)))
}

impl RowProjector for WideRowProjector {
    fn read_filter(&self, batch: &ColumnBatch) -> Option<ColumnFilter> {
        let (statics, rows) = self.group(batch);
        if self.cells.writes_indexed(&statics) {
            // Every row of the partition carries the statics
            return Some(ColumnFilter::All);
        }

        let mut slices: Vec<Slice> = rows
            .iter()
            .filter(|(_, cells)| self.cells.writes_indexed(cells))
            .map(|(clustering, _)| Slice::prefix(clustering))
            .collect();
        if slices.is_empty() {
            return None;
        }
        if self.table.has_static_columns() {
            slices.insert(0, Slice::Static);
        }
        Some(ColumnFilter::Slices(slices))
    }

    fn project(&self, partition_key: &[CellValue], batch: &ColumnBatch, stored: &[Row]) -> Result<Projection> {
        let partition = self.keys.encode_partition(partition_key);
        let mut projection = Projection::default();

        if let Some(ts) = batch.partition_deletion {
            projection.tombstones.push(Tombstone::Partition { partition: partition.clone(), ts });
        }
        for range in &batch.range_tombstones {
            projection.tombstones.push(Tombstone::Range {
                partition: partition.clone(),
                start: range.start.clone(),
                end: range.end.clone(),
                ts: range.ts,
            });
        }

        let (written_statics, rows) = self.group(batch);
        let statics_changed = self.cells.writes_indexed(&written_statics);
        let stored_statics = stored.iter().find(|r| r.is_static).map(|r| r.cells.as_slice()).unwrap_or(&[]);
        let statics = merge_cells(stored_statics, &written_statics, |c| shadowed(batch, &[], c));

        // Rows the batch writes indexed cells to; all of them when an indexed static changed
        let mut targets: Vec<(&[CellValue], Vec<&Cell>)> = rows
            .into_iter()
            .filter(|(_, cells)| statics_changed || self.cells.writes_indexed(cells))
            .collect();
        if statics_changed {
            for row in stored.iter().filter(|r| !r.is_static) {
                if !targets.iter().any(|(ck, _)| *ck == row.clustering.as_slice()) {
                    targets.push((row.clustering.as_slice(), Vec::new()));
                }
            }
            debug!("Static update re-projects {} rows of partition '{}'", targets.len(), partition);
        }

        for (clustering, written) in targets {
            let id = self.keys.encode_row(partition_key, clustering);
            let written: Vec<&Cell> = written.into_iter().filter(|c| !shadowed(batch, clustering, c)).collect();
            let stored_cells = stored
                .iter()
                .find(|r| !r.is_static && r.clustering.as_slice() == clustering)
                .map(|r| r.cells.as_slice())
                .unwrap_or(&[]);
            let own = merge_cells(stored_cells, &written, |c| shadowed(batch, clustering, c));

            // Statics never keep a row alive on their own
            if !own.iter().any(|c| c.is_live()) {
                if let Some(ts) = own.iter().map(|c| c.ts).max() {
                    RowOutcome::Deleted(Tombstone::Row { id, ts }).push_into(&mut projection);
                }
                continue;
            }

            let mut cells = own;
            cells.extend(statics.iter().copied());
            if let Some(outcome) = self.cells.project_row(id, &partition, &cells) {
                outcome.push_into(&mut projection);
            }
        }

        Ok(projection)
    }
}

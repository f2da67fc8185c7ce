use std::sync::Arc;
use log::debug;
use crate::core::error::Result;
use crate::host::filter::ColumnFilter;
use crate::host::row::{Cell, ColumnBatch, Row};
use crate::host::table::TableSchema;
use crate::host::value::CellValue;
use crate::projection::key::KeyCodec;
use crate::projection::{merge_cells, CellProjector, Projection, RowProjector, Tombstone};
use crate::schema::options::Options;

/// Projector for tables whose partitions hold a single row
pub struct SimpleRowProjector {
    cells: CellProjector,
    keys: KeyCodec,
}

impl SimpleRowProjector {
    pub fn new(table: &TableSchema, options: Arc<Options>) -> Self {
        SimpleRowProjector {
            cells: CellProjector::new(options),
            keys: KeyCodec::new(table),
        }
    }
}

impl RowProjector for SimpleRowProjector {
    fn read_filter(&self, batch: &ColumnBatch) -> Option<ColumnFilter> {
        let written: Vec<&Cell> = batch.cells.iter().map(|c| &c.cell).collect();
        self.cells.writes_indexed(&written).then_some(ColumnFilter::All)
    }

    fn project(&self, partition_key: &[CellValue], batch: &ColumnBatch, stored: &[Row]) -> Result<Projection> {
        let id = self.keys.encode_partition(partition_key);
        let mut projection = Projection::default();

        let deleted_at = batch.partition_deletion;
        if let Some(ts) = deleted_at {
            projection.tombstones.push(Tombstone::Partition { partition: id.clone(), ts });
        }
        let shadowed = |c: &Cell| deleted_at.is_some_and(|ts| c.ts <= ts);

        let written: Vec<&Cell> = batch.cells.iter().map(|c| &c.cell).filter(|c| !shadowed(*c)).collect();
        if self.cells.writes_indexed(&written) {
            let stored_cells: Vec<Cell> = stored.iter().flat_map(|r| r.cells.iter().cloned()).collect();
            let cells = merge_cells(&stored_cells, &written, shadowed);
            if let Some(outcome) = self.cells.project_row(id.clone(), &id, &cells) {
                outcome.push_into(&mut projection);
            }
        }

        debug!("Projected row '{}': {} upserts, {} tombstones",
               id, projection.upserts.len(), projection.tombstones.len());
        Ok(projection)
    }
}

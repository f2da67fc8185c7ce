use std::cmp::Ordering;
use log::debug;
use crate::core::error::Result;
use crate::host::filter::{ColumnFilter, ExtendedFilter, Slice};
use crate::host::row::Row;
use crate::host::table::TableSchema;
use crate::host::value::{compare_prefix, CellValue};
use crate::projection::key::KeyCodec;
use crate::scan::scanner::RowScanner;

/// Reads hits of tables with clustering rows
///
/// Each hit reads a single clustering slice of its partition, plus the
/// static slice when the table has static columns; static cells are folded
/// into the returned row.
pub struct WideRowScanner {
    keys: KeyCodec,
    has_statics: bool,
}

impl WideRowScanner {
    pub fn new(table: &TableSchema) -> Self {
        WideRowScanner {
            keys: KeyCodec::new(table),
            has_statics: table.has_static_columns(),
        }
    }
}

impl RowScanner for WideRowScanner {
    fn key_and_filter(&self, id: &str, filter: &ExtendedFilter) -> Result<Option<(Vec<CellValue>, ColumnFilter)>> {
        let (partition, clustering) = self.keys.decode_row(id)?;
        if !filter.columns.selects(&clustering) {
            debug!("Row '{}' is outside the requested slices", id);
            return Ok(None);
        }

        let mut slices = Vec::with_capacity(2);
        if self.has_statics {
            slices.push(Slice::Static);
        }
        slices.push(Slice::prefix(&clustering));
        Ok(Some((partition, ColumnFilter::Slices(slices))))
    }

    fn materialize(&self, id: &str, rows: Vec<Row>) -> Result<Option<Row>> {
        let (_, clustering) = self.keys.decode_row(id)?;
        let mut statics = Vec::new();
        let mut data = None;
        for row in rows {
            if row.is_static || row.clustering.is_empty() {
                statics.extend(row.cells.into_iter().filter(|c| c.is_live()));
            } else if data.is_none() && compare_prefix(&row.clustering, &clustering) == Ordering::Equal {
                data = Some(row);
            }
        }

        let Some(mut row) = data.filter(|r| !r.is_empty()) else {
            return Ok(None);
        };
        for cell in statics {
            if row.get(&cell.column).is_none() {
                row.push(cell);
            }
        }
        Ok(Some(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::row::Cell;
    use crate::host::value::CellType;

    fn table(statics: bool) -> TableSchema {
        let table = TableSchema::new("ks", "events")
            .partition_key("p", CellType::Int)
            .clustering("c", CellType::Int)
            .regular("v", CellType::Text);
        if statics { table.static_column("s", CellType::Text) } else { table }
    }

    #[test]
    fn test_slices_cover_static_and_row() {
        let scanner = WideRowScanner::new(&table(true));
        let (key, columns) = scanner
            .key_and_filter("1:2", &ExtendedFilter::new(Vec::new()))
            .unwrap()
            .unwrap();
        assert_eq!(key, vec![CellValue::Int(1)]);
        assert_eq!(columns, ColumnFilter::Slices(vec![Slice::Static, Slice::prefix(&[CellValue::Int(2)])]));

        let plain = WideRowScanner::new(&table(false));
        let (_, columns) = plain.key_and_filter("1:2", &ExtendedFilter::new(Vec::new())).unwrap().unwrap();
        assert_eq!(columns, ColumnFilter::Slices(vec![Slice::prefix(&[CellValue::Int(2)])]));
    }

    #[test]
    fn test_rows_outside_caller_slices_are_skipped() {
        let scanner = WideRowScanner::new(&table(false));
        let filter = ExtendedFilter::new(Vec::new())
            .with_columns(ColumnFilter::Slices(vec![Slice::prefix(&[CellValue::Int(5)])]));
        assert!(scanner.key_and_filter("1:2", &filter).unwrap().is_none());
    }

    #[test]
    fn test_static_cells_fold_into_row() {
        let scanner = WideRowScanner::new(&table(true));
        let mut statics = Row::new(vec![CellValue::Int(1)], Vec::new());
        statics.is_static = true;
        statics.push(Cell::live("s", CellValue::Text("S".into()), 1));
        let mut data = Row::new(vec![CellValue::Int(1)], vec![CellValue::Int(2)]);
        data.push(Cell::live("v", CellValue::Text("y".into()), 2));

        let row = scanner.materialize("1:2", vec![statics.clone(), data]).unwrap().unwrap();
        assert_eq!(row.get("s"), Some(&CellValue::Text("S".into())));
        assert_eq!(row.clustering, vec![CellValue::Int(2)]);

        // A partition with only static cells has no row to return
        assert!(scanner.materialize("1:2", vec![statics]).unwrap().is_none());
    }
}

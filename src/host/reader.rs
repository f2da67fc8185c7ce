use crate::core::error::Result;
use crate::host::filter::ColumnFilter;
use crate::host::row::Row;
use crate::host::value::CellValue;

/// The host database's read path
///
/// Returns the live rows of one partition selected by `filter`, the static row
/// (if requested and present) first. Failures are reported as
/// `ErrorKind::TransientRead` and the scan skips the hit.
///
/// Indexing reads the written rows back too; the host may call
/// `RowIndex::index` before or after applying the batch.
pub trait RowReader: Send + Sync {
    fn read_partition(&self, partition_key: &[CellValue], filter: &ColumnFilter) -> Result<Vec<Row>>;
}

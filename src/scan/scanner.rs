use std::sync::Arc;
use log::{debug, warn};
use crate::core::error::Result;
use crate::host::filter::{ColumnFilter, ExtendedFilter};
use crate::host::reader::RowReader;
use crate::host::row::{Cell, Row};
use crate::host::value::CellValue;
use crate::indexer::{IndexSearcher, Indexer};
use crate::schema::options::PrimaryOptions;

/// Table-shape specific part of a scan
pub trait RowScanner: Send + Sync {
    /// Partition key and column filter reading the row of `id`, or `None`
    /// when the caller's filter cannot select that row
    fn key_and_filter(&self, id: &str, filter: &ExtendedFilter) -> Result<Option<(Vec<CellValue>, ColumnFilter)>>;

    /// Assemble the rows read for `id` into one result row; `None` when the
    /// row is gone
    fn materialize(&self, id: &str, rows: Vec<Row>) -> Result<Option<Row>>;
}

/// A hit of the search, resolved to its stored id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub ts: u64,
    pub score: f32,
}

/// Scan settings fixed when the iterator is created
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub indexed_column: String,
    pub primary: PrimaryOptions,
    pub needs_filtering: bool,
    pub stale_cleanup: bool,
}

/// Iterates the rows of ranked hits through the host read path
///
/// The snapshot stays pinned until the iterator is dropped or closed.
pub struct ScanIterator {
    searcher: Option<IndexSearcher>,
    hits: std::vec::IntoIter<Hit>,
    indexer: Arc<dyn Indexer>,
    scanner: Arc<dyn RowScanner>,
    reader: Arc<dyn RowReader>,
    filter: ExtendedFilter,
    context: ScanContext,
    skipped: usize,
}

impl ScanIterator {
    pub fn new(
        searcher: IndexSearcher,
        hits: Vec<Hit>,
        indexer: Arc<dyn Indexer>,
        scanner: Arc<dyn RowScanner>,
        reader: Arc<dyn RowReader>,
        filter: ExtendedFilter,
        context: ScanContext,
    ) -> Self {
        ScanIterator {
            searcher: Some(searcher),
            hits: hits.into_iter(),
            indexer,
            scanner,
            reader,
            filter,
            context,
            skipped: 0,
        }
    }

    /// Hits not yet visited
    pub fn remaining(&self) -> usize {
        self.hits.len()
    }

    /// Hits dropped so far: stale, unreadable, empty or filtered out
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Release the snapshot; later calls to `next` return `None`
    pub fn close(&mut self) {
        self.hits = Vec::new().into_iter();
        if let Some(searcher) = self.searcher.take() {
            searcher.release();
        }
    }

    fn is_stale(&self, hit: &Hit) -> bool {
        match self.indexer.latest_ts(&hit.id) {
            Some(latest) if latest > hit.ts => {
                debug!("Skipping stale hit '{}' at {}, latest is {}", hit.id, hit.ts, latest);
                if self.context.stale_cleanup {
                    if let Err(e) = self.indexer.delete_version(&hit.id, hit.ts) {
                        warn!("Could not delete stale version of '{}': {}", hit.id, e);
                    }
                }
                true
            }
            _ => false,
        }
    }

    fn fetch(&self, hit: &Hit) -> Result<Option<Row>> {
        let Some((key, columns)) = self.scanner.key_and_filter(&hit.id, &self.filter)? else {
            return Ok(None);
        };
        let rows = self.reader.read_partition(&key, &columns)?;
        let Some(mut row) = self.scanner.materialize(&hit.id, rows)? else {
            return Ok(None);
        };
        if row.is_empty() {
            return Ok(None);
        }
        if self.context.needs_filtering && !self.filter.is_satisfied_by(&row, &self.context.indexed_column) {
            return Ok(None);
        }
        row.push(self.score_cell(hit));
        Ok(Some(row))
    }

    fn score_cell(&self, hit: &Hit) -> Cell {
        let column = if self.context.primary.meta_column {
            &self.context.primary.score_column_name
        } else {
            &self.context.indexed_column
        };
        let payload = format!("{{\"score\":{}}}", hit.score);
        Cell::live(column.as_str(), CellValue::Text(payload), hit.ts)
    }
}

impl Iterator for ScanIterator {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.searcher.as_ref()?;
        while let Some(hit) = self.hits.next() {
            if self.is_stale(&hit) {
                self.skipped += 1;
                continue;
            }
            match self.fetch(&hit) {
                Ok(Some(row)) => return Some(row),
                Ok(None) => self.skipped += 1,
                Err(e) => {
                    warn!("Skipping row '{}': {}", hit.id, e);
                    self.skipped += 1;
                }
            }
        }
        self.close();
        None
    }
}

impl Drop for ScanIterator {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use parking_lot::Mutex;
    use crate::analysis::analyzer::Analyzer;
    use crate::core::error::Error;
    use crate::core::types::Document;
    use crate::index::inverted::Term;
    use crate::mvcc::snapshot::Snapshot;

    /// Reports `a` rewritten at 3 and `b` current at 5; records version deletes
    #[derive(Default)]
    struct RewrittenIndexer {
        deleted: Mutex<Vec<(String, u64)>>,
    }

    impl Indexer for RewrittenIndexer {
        fn upsert(&self, _doc: Document) -> Result<()> { Ok(()) }
        fn delete_by_id(&self, _id: &str, _ts_del: u64) -> Result<()> { Ok(()) }
        fn delete_by_term(&self, _term: &Term) -> Result<()> { Ok(()) }
        fn delete_prefix(&self, _prefix: &str, _ts_del: u64) -> Result<()> { Ok(()) }
        fn ids_with_prefix(&self, _prefix: &str) -> Result<Vec<(String, u64)>> { Ok(Vec::new()) }
        fn delete_version(&self, id: &str, ts: u64) -> Result<()> {
            self.deleted.lock().push((id.to_string(), ts));
            Ok(())
        }
        fn truncate(&self, _ts_cut: u64) -> Result<()> { Ok(()) }
        fn refresh(&self) -> Result<()> { Ok(()) }
        fn commit(&self) -> Result<()> { Ok(()) }
        fn remove_all(&self) -> Result<()> { Ok(()) }
        fn acquire_searcher(&self) -> Result<IndexSearcher> {
            Err(Error::invalid_state("not used by scans"))
        }
        fn live_size(&self) -> u64 { 0 }
        fn latest_ts(&self, id: &str) -> Option<u64> {
            Some(if id == "a" { 3 } else { 5 })
        }
    }

    struct KeyScanner;

    impl RowScanner for KeyScanner {
        fn key_and_filter(&self, id: &str, _filter: &ExtendedFilter) -> Result<Option<(Vec<CellValue>, ColumnFilter)>> {
            Ok(Some((vec![CellValue::Text(id.to_string())], ColumnFilter::All)))
        }

        fn materialize(&self, _id: &str, rows: Vec<Row>) -> Result<Option<Row>> {
            Ok(rows.into_iter().next())
        }
    }

    struct OneCellReader;

    impl RowReader for OneCellReader {
        fn read_partition(&self, partition_key: &[CellValue], _filter: &ColumnFilter) -> Result<Vec<Row>> {
            let mut row = Row::new(partition_key.to_vec(), Vec::new());
            row.push(Cell::live("body", CellValue::Text("x".into()), 1));
            Ok(vec![row])
        }
    }

    fn scan(indexer: Arc<RewrittenIndexer>, stale_cleanup: bool) -> (Vec<Row>, usize) {
        let searcher = IndexSearcher::new(
            Arc::new(Snapshot::empty()),
            Arc::new(Analyzer::standard()),
            Arc::new(AtomicUsize::new(0)),
        );
        let hits = vec![
            Hit { id: "a".into(), ts: 1, score: 2.0 },
            Hit { id: "b".into(), ts: 5, score: 1.0 },
        ];
        let context = ScanContext {
            indexed_column: "search".into(),
            primary: PrimaryOptions::default(),
            needs_filtering: false,
            stale_cleanup,
        };
        let mut iter = ScanIterator::new(
            searcher,
            hits,
            indexer,
            Arc::new(KeyScanner),
            Arc::new(OneCellReader),
            ExtendedFilter::new(Vec::new()),
            context,
        );
        let rows: Vec<Row> = iter.by_ref().collect();
        (rows, iter.skipped())
    }

    #[test]
    fn test_stale_hits_are_skipped() {
        let indexer = Arc::new(RewrittenIndexer::default());
        let (rows, skipped) = scan(indexer.clone(), false);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].partition_key, vec![CellValue::Text("b".into())]);
        assert_eq!(skipped, 1);
        assert!(indexer.deleted.lock().is_empty());
    }

    #[test]
    fn test_stale_cleanup_deletes_the_superseded_version() {
        let indexer = Arc::new(RewrittenIndexer::default());
        let (rows, skipped) = scan(indexer.clone(), true);
        assert_eq!(rows.len(), 1);
        assert_eq!(skipped, 1);
        assert_eq!(*indexer.deleted.lock(), vec![("a".to_string(), 1)]);
    }

    #[test]
    fn test_score_column_is_injected() {
        let (rows, _) = scan(Arc::new(RewrittenIndexer::default()), false);
        assert_eq!(rows[0].get("stargate"), Some(&CellValue::Text("{\"score\":1}".into())));
    }
}

use std::sync::Arc;
use log::debug;
use crate::core::error::{Error, Result};
use crate::host::filter::ExtendedFilter;
use crate::host::reader::RowReader;
use crate::host::value::CellValue;
use crate::indexer::{IndexSearcher, Indexer};
use crate::query::compiler::{CompiledSearch, QueryCompiler};
use crate::scan::{Hit, RowScanner, ScanContext, ScanIterator};
use crate::schema::options::Options;
use crate::search::executor::QueryExecutor;

/// Search handle bound to the snapshot current when it was created
pub struct RowSearcher {
    searcher: IndexSearcher,
    options: Arc<Options>,
    indexer: Arc<dyn Indexer>,
    scanner: Arc<dyn RowScanner>,
    reader: Arc<dyn RowReader>,
    stale_cleanup: bool,
    default_limit: usize,
}

impl RowSearcher {
    pub(crate) fn new(
        searcher: IndexSearcher,
        options: Arc<Options>,
        indexer: Arc<dyn Indexer>,
        scanner: Arc<dyn RowScanner>,
        reader: Arc<dyn RowReader>,
        stale_cleanup: bool,
        default_limit: usize,
    ) -> Self {
        RowSearcher {
            searcher,
            options,
            indexer,
            scanner,
            reader,
            stale_cleanup,
            default_limit,
        }
    }

    /// Snapshot version this handle reads
    pub fn version(&self) -> u64 {
        self.searcher.snapshot().version
    }

    pub fn compile(&self, json: &str) -> Result<CompiledSearch> {
        QueryCompiler::new(&self.options).compile_json(json)
    }

    /// Run the search carried by the filter's restriction on the indexed column
    ///
    /// Compile errors are returned here, before any row is read.
    pub fn search(self, filter: ExtendedFilter) -> Result<ScanIterator> {
        let json = match filter.expression_on(&self.options.indexed_column).map(|e| &e.value) {
            Some(CellValue::Text(json)) => json.clone(),
            Some(other) => {
                return Err(Error::bad_query(format!(
                    "Search on '{}' must be a JSON text value, got {:?}",
                    self.options.indexed_column,
                    other.cell_type()
                )));
            }
            None => {
                return Err(Error::bad_query(format!(
                    "No search expression on indexed column '{}'",
                    self.options.indexed_column
                )));
            }
        };
        let compiled = self.compile(&json)?;
        self.scan(compiled, filter)
    }

    /// Run an already compiled search, `filter` supplying the row cap and
    /// any extra restrictions
    pub fn scan(self, compiled: CompiledSearch, filter: ExtendedFilter) -> Result<ScanIterator> {
        let limit = filter.max_rows.unwrap_or(self.default_limit);
        let hits = {
            let executor = QueryExecutor::new(self.searcher.snapshot());
            executor
                .search(&compiled, limit)?
                .iter()
                .filter_map(|hit| {
                    executor.document(hit).map(|doc| Hit { id: doc.id.clone(), ts: doc.ts, score: hit.score })
                })
                .collect::<Vec<_>>()
        };
        debug!("Search on '{}' produced {} hits (limit {})", self.options.indexed_column, hits.len(), limit);

        let indexed_column = self.options.indexed_column.clone();
        let needs_filtering = filter
            .expressions
            .iter()
            .any(|e| !e.column.trim().eq_ignore_ascii_case(&indexed_column));
        let context = ScanContext {
            indexed_column,
            primary: self.options.primary.clone(),
            needs_filtering,
            stale_cleanup: self.stale_cleanup,
        };

        Ok(ScanIterator::new(
            self.searcher,
            hits,
            self.indexer,
            self.scanner,
            self.reader,
            filter,
            context,
        ))
    }
}

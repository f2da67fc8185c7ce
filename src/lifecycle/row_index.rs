use std::collections::HashMap;
use std::sync::Arc;
use log::{debug, warn};
use parking_lot::RwLock;
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::core::config::IndexerConfig;
use crate::core::error::{Error, Result};
use crate::core::types::PK_FIELD;
use crate::host::filter::clustering_in_range;
use crate::host::reader::RowReader;
use crate::host::row::ColumnBatch;
use crate::host::table::TableSchema;
use crate::host::value::CellValue;
use crate::index::inverted::Term;
use crate::indexer::{Indexer, NearRealTimeIndexer};
use crate::lifecycle::searcher::RowSearcher;
use crate::lifecycle::status::{IndexStatus, StatusCell};
use crate::projection::key::KeyCodec;
use crate::projection::simple::SimpleRowProjector;
use crate::projection::wide::WideRowProjector;
use crate::projection::{RowProjector, Tombstone};
use crate::scan::simple::SimpleRowScanner;
use crate::scan::wide::WideRowScanner;
use crate::scan::RowScanner;
use crate::schema::options::{Options, INDEX_OPTIONS_JSON};
use crate::storage::layout::StorageLayout;

/// The index as declared in the host schema
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,             // Columns the index is declared on
    pub options: HashMap<String, String>, // Index options; the options JSON under `sg_options`
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>, column: impl Into<String>, options_json: impl Into<String>) -> Self {
        let mut options = HashMap::new();
        options.insert(INDEX_OPTIONS_JSON.to_string(), options_json.into());
        IndexDefinition {
            name: name.into(),
            columns: vec![column.into()],
            options,
        }
    }

    pub fn options_json(&self) -> Option<&str> {
        self.options.get(INDEX_OPTIONS_JSON).map(String::as_str)
    }
}

/// Everything `init` builds; replaced as a whole under the exclusive lock
struct IndexState {
    options: Arc<Options>,
    indexer: Arc<NearRealTimeIndexer>,
    projector: Box<dyn RowProjector>,
    scanner: Arc<dyn RowScanner>,
    keys: KeyCodec,
}

/// Per-row search index of one table column
///
/// Writes, deletes, searches and truncates share the state lock; `init`
/// and `invalidate` take it exclusively to swap the indexer.
pub struct RowIndex {
    table: TableSchema,
    definition: RwLock<IndexDefinition>,
    reader: Arc<dyn RowReader>,
    config: IndexerConfig,
    registry: Arc<AnalyzerRegistry>,
    state: RwLock<Option<Arc<IndexState>>>,
    status: StatusCell,
}

impl RowIndex {
    pub fn new(
        table: TableSchema,
        definition: IndexDefinition,
        reader: Arc<dyn RowReader>,
        config: IndexerConfig,
        registry: Arc<AnalyzerRegistry>,
    ) -> Self {
        RowIndex {
            table,
            definition: RwLock::new(definition),
            reader,
            config,
            registry,
            state: RwLock::new(None),
            status: StatusCell::new(),
        }
    }

    /// Succeeds iff exactly one column is indexed and the options parse
    pub fn validate_options(&self) -> Result<()> {
        self.build_options(&self.definition.read()).map(|_| ())
    }

    fn build_options(&self, definition: &IndexDefinition) -> Result<Options> {
        if definition.columns.len() != 1 {
            return Err(Error::config(format!(
                "Index '{}' must be declared on exactly one column, got {}",
                definition.name,
                definition.columns.len()
            )));
        }
        let json = definition.options_json().ok_or_else(|| {
            Error::config(format!("Index '{}' has no {} option", definition.name, INDEX_OPTIONS_JSON))
        })?;
        let options = Options::from_json(&definition.columns[0], json, &self.registry)?;
        options.validate_columns(self.table.columns.iter().map(|c| c.name.as_str()))?;
        Ok(options)
    }

    /// Build options and open the indexer; a no-op once initialized
    pub fn init(&self) -> Result<()> {
        let mut state = self.state.write();
        if state.is_some() {
            return Ok(());
        }
        if self.status.get() == IndexStatus::Removed {
            return Err(Error::invalid_state(format!("Index '{}' has been removed", self.index_name())));
        }

        let definition = self.definition.read().clone();
        let options = Arc::new(self.build_options(&definition)?);
        let dir = StorageLayout::index_dir(&self.config.base_dir, &self.table.keyspace, &self.table.name, &definition.name);

        warn!("Creating new NRT indexer for {}", definition.name);
        let indexer = NearRealTimeIndexer::open(dir, self.config.clone(), options.default_analyzer.clone())?;

        let (projector, scanner): (Box<dyn RowProjector>, Arc<dyn RowScanner>) = if self.table.is_wide() {
            (
                Box::new(WideRowProjector::new(&self.table, options.clone())),
                Arc::new(WideRowScanner::new(&self.table)),
            )
        } else {
            (
                Box::new(SimpleRowProjector::new(&self.table, options.clone())),
                Arc::new(SimpleRowScanner::new(&self.table)),
            )
        };

        *state = Some(Arc::new(IndexState {
            options,
            indexer: Arc::new(indexer),
            projector,
            scanner,
            keys: KeyCodec::new(&self.table),
        }));
        self.status.transition(&[IndexStatus::Uninit], IndexStatus::Building);
        Ok(())
    }

    /// Index one host write to a partition
    ///
    /// The touched rows are read back through the host so their documents
    /// keep the indexed columns the batch doesn't write. A failed read falls
    /// back to the batch alone.
    pub fn index(&self, partition_key: &[CellValue], batch: &ColumnBatch) -> Result<()> {
        let guard = self.state.read();
        let state = self.initialized(&guard)?;

        let stored = match state.projector.read_filter(batch) {
            Some(filter) => self.reader.read_partition(partition_key, &filter).unwrap_or_else(|e| {
                warn!("{} Projecting write without stored rows: {}", self.index_name(), e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        let projection = state.projector.project(partition_key, batch, &stored)?;
        for tombstone in projection.tombstones {
            self.apply_tombstone(state, tombstone)?;
        }
        for doc in projection.upserts {
            state.indexer.upsert(doc)?;
        }
        Ok(())
    }

    /// Remove every document of the partition, regardless of timestamps
    pub fn delete(&self, partition_key: &[CellValue]) -> Result<()> {
        let guard = self.state.read();
        let state = self.initialized(&guard)?;
        let partition = state.keys.encode_partition(partition_key);
        debug!("Deleting partition '{}' from {}", partition, self.index_name());
        state.indexer.delete_by_term(&Term::new(PK_FIELD, partition.into_bytes()))
    }

    /// Delete the row of `id` written at or before `ts`
    pub fn delete_row(&self, id: &str, ts: u64) -> Result<()> {
        let guard = self.state.read();
        let state = self.initialized(&guard)?;
        state.indexer.delete_by_id(id, ts)
    }

    /// Wait until the index is built, then bind a searcher to the current
    /// snapshot
    pub fn create_searcher<'a, I>(&self, columns: I) -> Result<RowSearcher>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.status.wait_built(self.config.build_wait_timeout())?;

        let guard = self.state.read();
        let state = self.initialized(&guard)?;
        let columns: Vec<&str> = columns.into_iter().collect();
        debug!("Creating searcher on {} for columns {:?}", self.index_name(), columns);

        let indexer: Arc<dyn Indexer> = state.indexer.clone();
        Ok(RowSearcher::new(
            state.indexer.acquire_searcher()?,
            state.options.clone(),
            indexer,
            state.scanner.clone(),
            self.reader.clone(),
            self.config.stale_cleanup,
            self.config.default_limit,
        ))
    }

    pub fn force_blocking_flush(&self) -> Result<()> {
        match self.current() {
            Some(state) => state.indexer.commit(),
            None => Ok(()),
        }
    }

    pub fn truncate_blocking(&self, ts_cut: u64) -> Result<()> {
        let guard = self.state.read();
        if let Some(state) = guard.as_ref() {
            state.indexer.truncate(ts_cut)?;
            warn!("{} Truncated index at ts {}", self.index_name(), ts_cut);
        }
        Ok(())
    }

    /// Initialize if the options became available, otherwise commit
    pub fn reload(&self) -> Result<()> {
        warn!("{} Got call to RELOAD index", self.index_name());
        if self.current().is_none() && self.definition.read().options_json().is_some() {
            self.init()?;
        }
        match self.current() {
            Some(state) if self.status.get() == IndexStatus::Built => state.indexer.commit(),
            _ => Ok(()),
        }
    }

    /// Replace the definition, as after a schema change; applied by `reload`
    pub fn alter(&self, definition: IndexDefinition) {
        *self.definition.write() = definition;
    }

    /// Stop accepting writes and delete the on-disk index
    pub fn invalidate(&self) -> Result<()> {
        let mut guard = self.state.write();
        let result = match guard.take() {
            Some(state) => {
                warn!("Removing NRT indexer for {}", self.index_name());
                state.indexer.remove_all()
            }
            None => Ok(()),
        };
        self.status.set(IndexStatus::Removed);
        result
    }

    pub fn remove_index(&self) -> Result<()> {
        warn!("{} Got call to REMOVE index", self.index_name());
        self.invalidate()
    }

    /// The host starts a bulk build; searches wait until `mark_built`
    pub fn begin_build(&self) -> bool {
        self.status.transition(&[IndexStatus::Uninit, IndexStatus::Building, IndexStatus::Built], IndexStatus::Building)
    }

    pub fn mark_built(&self) -> bool {
        self.status.transition(&[IndexStatus::Uninit, IndexStatus::Building], IndexStatus::Built)
    }

    pub fn status(&self) -> IndexStatus {
        self.status.get()
    }

    pub fn index_name(&self) -> String {
        self.definition.read().name.clone()
    }

    /// Whether `column` is one of the fields of this index
    pub fn indexes(&self, column: &str) -> bool {
        let indexed = self.current().map(|s| s.options.indexes_column(column)).unwrap_or(false);
        debug!("Index {} indexes column '{}': {}", self.index_name(), column, indexed);
        indexed
    }

    pub fn live_size(&self) -> u64 {
        self.current().map(|s| s.indexer.live_size()).unwrap_or(0)
    }

    pub fn options(&self) -> Option<Arc<Options>> {
        self.current().map(|s| s.options.clone())
    }

    /// The indexer, for hosts that drive commits or merges directly
    pub fn indexer(&self) -> Option<Arc<NearRealTimeIndexer>> {
        self.current().map(|s| s.indexer.clone())
    }

    fn current(&self) -> Option<Arc<IndexState>> {
        self.state.read().clone()
    }

    fn initialized<'g>(&self, guard: &'g Option<Arc<IndexState>>) -> Result<&'g IndexState> {
        match guard {
            Some(state) => Ok(state.as_ref()),
            None if self.status.get() == IndexStatus::Removed => {
                Err(Error::invalid_state(format!("Index '{}' has been removed", self.index_name())))
            }
            None => Err(Error::invalid_state(format!("Index '{}' is not initialized", self.index_name()))),
        }
    }

    fn apply_tombstone(&self, state: &IndexState, tombstone: Tombstone) -> Result<()> {
        match tombstone {
            Tombstone::Partition { partition, ts } if self.table.is_wide() => {
                state.indexer.delete_prefix(&state.keys.partition_prefix(&partition), ts)
            }
            Tombstone::Partition { partition, ts } => state.indexer.delete_by_id(&partition, ts),
            Tombstone::Range { partition, start, end, ts } => {
                for (id, _) in state.indexer.ids_with_prefix(&state.keys.partition_prefix(&partition))? {
                    let clustering = match state.keys.decode_row(&id) {
                        Ok((_, clustering)) => clustering,
                        Err(e) => {
                            warn!("Skipping undecodable id '{}' in range delete: {}", id, e);
                            continue;
                        }
                    };
                    if clustering_in_range(&clustering, &start, &end) {
                        state.indexer.delete_by_id(&id, ts)?;
                    }
                }
                Ok(())
            }
            Tombstone::Row { id, ts } => state.indexer.delete_by_id(&id, ts),
        }
    }
}

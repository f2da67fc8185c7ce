//! Per-row full-text search index for wide-column tables.
//!
//! Host writes are projected into documents keyed by the row's primary key
//! and resolved last-write-wins by timestamp. Documents live in immutable
//! segments behind near-real-time snapshots; searches compile a JSON query
//! against the index options, rank hits over one snapshot and read the
//! matching rows back through the host.

pub mod core;
pub mod analysis;
pub mod schema;
pub mod encoding;
pub mod host;
pub mod projection;
pub mod index;
pub mod storage;
pub mod mvcc;
pub mod indexer;
pub mod query;
pub mod search;
pub mod scan;
pub mod lifecycle;

pub use crate::core::config::IndexerConfig;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::lifecycle::{IndexDefinition, IndexStatus, RowIndex, RowSearcher};

/*
┌──────────────────────────────── WRITE PATH ─────────────────────────────────┐
│                                                                             │
│  RowIndex::index(pk, ColumnBatch)                                           │
│     │                                                                       │
│     ▼                                                                       │
│  RowProjector (simple | wide) ──► Projection { upserts, tombstones }        │
│     │                                                                       │
│     ▼                                                                       │
│  NearRealTimeIndexer ── WriterState { buffer, slots, versions } ──┐         │
│     │ refresh                                                     │ commit  │
│     ▼                                                             ▼         │
│  SnapshotController::publish(slots)          segments/<id>.seg + checkpoint │
│                                                                             │
└─────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── READ PATH ──────────────────────────────────┐
│                                                                             │
│  RowIndex::create_searcher ──► RowSearcher (pinned Arc<Snapshot>)           │
│     │ search(ExtendedFilter)                                                │
│     ▼                                                                       │
│  QueryCompiler (Condition JSON ──► Query + Sort)                            │
│     │                                                                       │
│     ▼                                                                       │
│  QueryExecutor (rayon per segment, BM25) ──► TopK / sorted hits             │
│     │                                                                       │
│     ▼                                                                       │
│  ScanIterator ── RowScanner (simple | wide) ── RowReader (host) ──► Row     │
│                                                                             │
└─────────────────────────────────────────────────────────────────────────────┘
*/

mod common;

use common::{score_of, text, Harness};
use sgindex::host::filter::{ColumnFilter, Slice};
use sgindex::host::row::{Cell, ColumnBatch, Row};
use sgindex::host::table::TableSchema;
use sgindex::host::value::{CellType, CellValue};

const OPTIONS: &str = r#"{
    "fields": {
        "v": {"type": "string"},
        "s": {"type": "string"}
    },
    "primary": {"scoreColumnName": "rel"}
}"#;

fn schema() -> TableSchema {
    TableSchema::new("ks", "events")
        .partition_key("p", CellType::Int)
        .clustering("c", CellType::Int)
        .static_column("s", CellType::Text)
        .regular("v", CellType::Text)
        .regular("search", CellType::Text)
}

fn harness() -> Harness {
    Harness::new(schema(), "search", OPTIONS)
}

fn row(c: i32, v: &str, ts: u64) -> ColumnBatch {
    ColumnBatch::new().cell(vec![CellValue::Int(c)], Cell::live("v", text(v), ts))
}

fn keys(rows: &[Row]) -> Vec<(CellValue, CellValue)> {
    rows.iter().map(|r| (r.partition_key[0].clone(), r.clustering[0].clone())).collect()
}

fn match_v(value: &str) -> String {
    format!(r#"{{"query": {{"type": "match", "field": "v", "value": "{}"}}}}"#, value)
}

/// The two rows of partition 1, the first carrying the static column
fn with_static_partition(h: &Harness) {
    let one = [CellValue::Int(1)];
    h.write(&one, row(1, "x", 10).static_cell(Cell::live("s", text("S"), 10)));
    h.write(&one, row(2, "y", 11));
}

#[test]
fn test_wide_row_is_materialized_with_static() {
    let h = harness();
    with_static_partition(&h);

    let rows = h.search(&match_v("x"));
    assert_eq!(keys(&rows), vec![(CellValue::Int(1), CellValue::Int(1))]);
    assert_eq!(rows[0].get("s"), Some(&text("S")));
    assert_eq!(rows[0].get("v"), Some(&text("x")));
    assert!(score_of(&rows[0], "rel") > 0.0);
    assert!(rows[0].get("stargate").is_none());
}

#[test]
fn test_partition_tombstone_removes_every_row() {
    let h = harness();
    with_static_partition(&h);
    h.write(&[CellValue::Int(1)], ColumnBatch::new().delete_partition(u64::MAX));

    assert!(h.search(&match_v("x")).is_empty());
    assert!(h.search(&match_v("y")).is_empty());
    assert!(h.search(r#"{"query": {"type": "match_all"}}"#).is_empty());
}

#[test]
fn test_partition_tombstone_keeps_newer_rows() {
    let h = harness();
    with_static_partition(&h);
    h.write(&[CellValue::Int(1)], ColumnBatch::new().delete_partition(10));

    let rows = h.search(r#"{"query": {"type": "match_all"}}"#);
    assert_eq!(keys(&rows), vec![(CellValue::Int(1), CellValue::Int(2))]);
}

#[test]
fn test_range_tombstone_deletes_clustering_range() {
    let h = harness();
    let mut batch = ColumnBatch::new();
    for c in 1..=5 {
        batch = batch.cell(vec![CellValue::Int(c)], Cell::live("v", text("t"), 1));
    }
    h.write(&[CellValue::Int(7)], batch);
    h.write(&[CellValue::Int(7)], ColumnBatch::new().delete_range(vec![CellValue::Int(2)], vec![CellValue::Int(3)], 2));

    let rows = h.search(&match_v("t"));
    let clustering: Vec<CellValue> = rows.iter().map(|r| r.clustering[0].clone()).collect();
    assert_eq!(clustering, vec![CellValue::Int(1), CellValue::Int(4), CellValue::Int(5)]);
}

#[test]
fn test_deleting_indexed_cell_removes_only_that_row() {
    let h = harness();
    with_static_partition(&h);
    h.write(&[CellValue::Int(1)], ColumnBatch::new().cell(vec![CellValue::Int(2)], Cell::tombstone("v", 20)));

    assert!(h.search(&match_v("y")).is_empty());
    assert_eq!(h.search(&match_v("x")).len(), 1);
}

#[test]
fn test_static_only_partition_has_no_documents() {
    let h = harness();
    with_static_partition(&h);
    h.write(&[CellValue::Int(2)], ColumnBatch::new().static_cell(Cell::live("s", text("lonely"), 5)));

    let rows = h.search(r#"{"query": {"type": "match_all"}}"#);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.partition_key == vec![CellValue::Int(1)]));
    assert!(h.search(r#"{"query": {"type": "match", "field": "s", "value": "lonely"}}"#).is_empty());
}

#[test]
fn test_static_update_reindexes_partition_rows() {
    let h = harness();
    with_static_partition(&h);
    let match_s = |value: &str| format!(r#"{{"query": {{"type": "match", "field": "s", "value": "{}"}}}}"#, value);
    assert_eq!(h.search(&match_s("S")).len(), 2);

    h.write(&[CellValue::Int(1)], ColumnBatch::new().static_cell(Cell::live("s", text("T"), 20)));
    h.index.force_blocking_flush().unwrap();

    let rows = h.search(&match_s("T"));
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.get("s") == Some(&text("T"))));
    assert!(h.search(&match_s("S")).is_empty());
    // Row content is untouched by the static update
    assert_eq!(h.search(&match_v("y")).len(), 1);
}

#[test]
fn test_static_update_shows_on_later_reads() {
    let h = harness();
    with_static_partition(&h);
    h.write(&[CellValue::Int(1)], ColumnBatch::new().static_cell(Cell::live("s", text("T"), 30)));

    let rows = h.search(&match_v("x"));
    assert_eq!(rows[0].get("s"), Some(&text("T")));
}

#[test]
fn test_requested_slices_restrict_hits() {
    let h = harness();
    let mut batch = ColumnBatch::new();
    for c in 1..=4 {
        batch = batch.cell(vec![CellValue::Int(c)], Cell::live("v", text("t"), 1));
    }
    h.write(&[CellValue::Int(3)], batch);

    let filter = h
        .filter(&match_v("t"))
        .with_columns(ColumnFilter::Slices(vec![Slice::Range {
            start: vec![CellValue::Int(2)],
            end: vec![CellValue::Int(3)],
        }]));
    let rows = h.try_search(filter).unwrap();
    let clustering: Vec<CellValue> = rows.iter().map(|r| r.clustering[0].clone()).collect();
    assert_eq!(clustering, vec![CellValue::Int(2), CellValue::Int(3)]);
}

#[test]
fn test_wide_partition_larger_than_cap() {
    let h = harness();
    let mut batch = ColumnBatch::new();
    for c in 0..20 {
        batch = batch.cell(vec![CellValue::Int(c)], Cell::live("v", text("t"), 1));
    }
    h.write(&[CellValue::Int(9)], batch);

    let filter = h.filter(&match_v("t")).with_max_rows(5);
    assert_eq!(h.try_search(filter).unwrap().len(), 5);
    assert_eq!(h.search(&match_v("t")).len(), 20);
}

#[test]
fn test_composite_clustering_prefix_tombstone() {
    let schema = TableSchema::new("ks", "grid")
        .partition_key("p", CellType::Int)
        .clustering("a", CellType::Int)
        .clustering("b", CellType::Text)
        .regular("v", CellType::Text)
        .regular("search", CellType::Text);
    let h = Harness::new(schema, "search", r#"{"fields": {"v": {"type": "string"}}}"#);

    let mut batch = ColumnBatch::new();
    for (a, b) in [(1, "x"), (1, "y"), (2, "x")] {
        batch = batch.cell(vec![CellValue::Int(a), text(b)], Cell::live("v", text("t"), 1));
    }
    h.write(&[CellValue::Int(1)], batch);
    h.write(&[CellValue::Int(1)], ColumnBatch::new().delete_range(vec![CellValue::Int(1)], vec![CellValue::Int(1)], 5));

    let rows = h.search(&match_v("t"));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].clustering, vec![CellValue::Int(2), text("x")]);
    assert!(score_of(&rows[0], "stargate") > 0.0);
}

mod common;

use common::{score_of, text, Harness};
use sgindex::host::filter::{Expression, Operator};
use sgindex::host::row::{Cell, ColumnBatch};
use sgindex::host::table::TableSchema;
use sgindex::host::value::{CellType, CellValue};
use sgindex::{ErrorKind, IndexStatus};

const OPTIONS: &str = r#"{
    "fields": {
        "body": {"type": "text"},
        "tag": {"type": "string"},
        "rank": {"type": "int"},
        "meta": {"type": "json", "fields": {"user": {"type": "string"}}}
    }
}"#;

fn schema() -> TableSchema {
    TableSchema::new("ks", "docs")
        .partition_key("id", CellType::Text)
        .regular("body", CellType::Text)
        .regular("tag", CellType::Text)
        .regular("rank", CellType::Int)
        .regular("meta", CellType::Text)
        .regular("age", CellType::Int)
        .regular("search", CellType::Text)
}

fn harness() -> Harness {
    Harness::new(schema(), "search", OPTIONS)
}

fn put(h: &Harness, id: &str, ts: u64, cells: Vec<(&str, CellValue)>) {
    let mut batch = ColumnBatch::new();
    for (column, value) in cells {
        batch = batch.cell(Vec::new(), Cell::live(column, value, ts));
    }
    h.write(&[text(id)], batch);
}

fn ids(rows: &[sgindex::host::row::Row]) -> Vec<String> {
    rows.iter().map(|r| r.partition_key[0].render()).collect()
}

#[test]
fn test_upsert_then_search() {
    let h = harness();
    put(&h, "a", 10, vec![("body", text("hello"))]);
    h.index.force_blocking_flush().unwrap();

    let rows = h.search(r#"{"query": {"type": "match", "field": "body", "value": "hello"}}"#);
    assert_eq!(ids(&rows), vec!["a"]);
    assert_eq!(rows[0].get("body"), Some(&text("hello")));
    assert!(score_of(&rows[0], "stargate") > 0.0);
}

#[test]
fn test_stale_write_is_discarded() {
    let h = harness();
    put(&h, "a", 10, vec![("body", text("new"))]);
    put(&h, "a", 5, vec![("body", text("old"))]);
    h.index.force_blocking_flush().unwrap();

    assert!(h.search(r#"{"query": {"type": "match", "field": "body", "value": "old"}}"#).is_empty());
    assert_eq!(h.search(r#"{"query": {"type": "match", "field": "body", "value": "new"}}"#).len(), 1);
}

#[test]
fn test_latest_write_wins_in_any_order() {
    let h = harness();
    for ts in [3u64, 9, 1, 7] {
        put(&h, "a", ts, vec![("rank", CellValue::Int(ts as i32))]);
    }
    let rows = h.search(r#"{"query": {"type": "range", "field": "rank", "lower": 0, "upper": 100}}"#);
    assert_eq!(rows.len(), 1);

    let searcher = h.index.create_searcher(["search"]).unwrap();
    let hits = searcher.search(h.filter(r#"{"query": {"type": "match", "field": "rank", "value": 9}}"#)).unwrap();
    assert_eq!(hits.count(), 1);
}

#[test]
fn test_row_delete_hides_document() {
    let h = harness();
    put(&h, "a", 10, vec![("body", text("hello"))]);
    h.write(&[text("a")], ColumnBatch::new().cell(Vec::new(), Cell::tombstone("body", 11)));
    assert!(h.search(r#"{"query": {"type": "match", "field": "body", "value": "hello"}}"#).is_empty());

    // An older write cannot resurrect it
    put(&h, "a", 8, vec![("body", text("hello"))]);
    assert!(h.search(r#"{"query": {"type": "match", "field": "body", "value": "hello"}}"#).is_empty());
}

#[test]
fn test_write_to_unindexed_column_keeps_document() {
    let h = harness();
    put(&h, "a", 10, vec![("body", text("hello"))]);
    put(&h, "a", 11, vec![("age", CellValue::Int(30))]);
    h.index.force_blocking_flush().unwrap();

    let rows = h.search(r#"{"query": {"type": "match", "field": "body", "value": "hello"}}"#);
    assert_eq!(ids(&rows), vec!["a"]);
    assert_eq!(rows[0].get("age"), Some(&CellValue::Int(30)));
}

#[test]
fn test_partial_write_keeps_other_indexed_columns() {
    let h = harness();
    put(&h, "a", 10, vec![("body", text("hello")), ("tag", text("t"))]);
    put(&h, "a", 12, vec![("rank", CellValue::Int(7))]);
    // Deleting one indexed cell re-projects the rest of the row
    h.write(&[text("a")], ColumnBatch::new().cell(Vec::new(), Cell::tombstone("tag", 13)));
    h.index.force_blocking_flush().unwrap();

    assert_eq!(h.search(r#"{"query": {"type": "match", "field": "body", "value": "hello"}}"#).len(), 1);
    assert_eq!(h.search(r#"{"query": {"type": "match", "field": "rank", "value": 7}}"#).len(), 1);
    assert!(h.search(r#"{"query": {"type": "match", "field": "tag", "value": "t"}}"#).is_empty());
}

#[test]
fn test_partition_delete_by_term() {
    let h = harness();
    put(&h, "a", 1, vec![("tag", text("x"))]);
    put(&h, "b", 1, vec![("tag", text("x"))]);
    h.index.delete(&[text("a")]).unwrap();

    let rows = h.search(r#"{"query": {"type": "match", "field": "tag", "value": "x"}}"#);
    assert_eq!(ids(&rows), vec!["b"]);
}

#[test]
fn test_sorting_by_field() {
    let h = harness();
    put(&h, "x", 1, vec![("rank", CellValue::Int(3))]);
    put(&h, "y", 1, vec![("rank", CellValue::Int(1))]);
    put(&h, "z", 1, vec![("rank", CellValue::Int(2))]);

    let rows = h.search(r#"{"query": {"type": "match_all"}, "sort": {"fields": [{"field": "rank", "reverse": false}]}}"#);
    let ranks: Vec<CellValue> = rows.iter().map(|r| r.get("rank").cloned().unwrap()).collect();
    assert_eq!(ranks, vec![CellValue::Int(1), CellValue::Int(2), CellValue::Int(3)]);

    let rows = h.search(r#"{"sort": {"fields": [{"field": "rank", "reverse": true}]}}"#);
    assert_eq!(ids(&rows), vec!["x", "z", "y"]);
}

#[test]
fn test_truncate_hides_old_documents() {
    let h = harness();
    for ts in 1..=10u64 {
        put(&h, &format!("d{}", ts), ts, vec![("rank", CellValue::Int(ts as i32))]);
    }
    h.index.force_blocking_flush().unwrap();
    h.index.truncate_blocking(5).unwrap();

    let rows = h.search(r#"{"query": {"type": "match_all"}, "sort": {"fields": [{"field": "rank"}]}}"#);
    let ranks: Vec<CellValue> = rows.iter().map(|r| r.get("rank").cloned().unwrap()).collect();
    assert_eq!(ranks, (6..=10).map(CellValue::Int).collect::<Vec<_>>());
}

#[test]
fn test_truncate_at_max_timestamp_removes_everything() {
    let h = harness();
    for ts in 1..=3u64 {
        put(&h, &format!("d{}", ts), ts, vec![("tag", text("t"))]);
    }
    h.index.force_blocking_flush().unwrap();
    h.index.truncate_blocking(u64::MAX).unwrap();

    assert!(h.search(r#"{"query": {"type": "match_all"}}"#).is_empty());
    put(&h, "late", u64::MAX, vec![("tag", text("t"))]);
    assert!(h.search(r#"{"query": {"type": "match", "field": "tag", "value": "t"}}"#).is_empty());
}

#[test]
fn test_unknown_field_is_bad_query() {
    let h = harness();
    put(&h, "a", 1, vec![("body", text("hello"))]);

    let err = h
        .try_search(h.filter(r#"{"query": {"type": "match", "field": "nope", "value": "hello"}}"#))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadQuery);

    let err = h.try_search(h.filter("{not json")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadQuery);

    let err = h
        .try_search(h.filter(r#"{"query": {"type": "range", "field": "body", "lower": "a"}}"#))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadQuery);
}

#[test]
fn test_json_sub_fields_are_searchable() {
    let h = harness();
    put(&h, "a", 1, vec![("meta", text(r#"{"user": "Alice", "ignored": 3}"#))]);
    put(&h, "b", 1, vec![("meta", text(r#"{"user": "bob"}"#))]);

    let rows = h.search(r#"{"query": {"type": "match", "field": "meta.user", "value": "alice"}}"#);
    assert_eq!(ids(&rows), vec!["a"]);
    let err = h
        .try_search(h.filter(r#"{"query": {"type": "match", "field": "meta.ignored", "value": 3}}"#))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadQuery);
}

#[test]
fn test_extra_expressions_post_filter_rows() {
    let h = harness();
    put(&h, "young", 1, vec![("tag", text("t")), ("age", CellValue::Int(12))]);
    put(&h, "old", 1, vec![("tag", text("t")), ("age", CellValue::Int(40))]);

    let mut filter = h.filter(r#"{"query": {"type": "match", "field": "tag", "value": "t"}}"#);
    filter.expressions.push(Expression::new("age", Operator::Ge, CellValue::Int(18)));
    let rows = h.try_search(filter).unwrap();
    assert_eq!(ids(&rows), vec!["old"]);
}

#[test]
fn test_row_cap_and_failed_reads() {
    let h = harness();
    for id in ["a", "b", "c"] {
        put(&h, id, 1, vec![("tag", text("t"))]);
    }
    let capped = h.filter(r#"{"query": {"type": "match", "field": "tag", "value": "t"}}"#).with_max_rows(2);
    assert_eq!(h.try_search(capped).unwrap().len(), 2);

    // A failing row is skipped, the scan goes on
    h.table.fail_reads(&[text("b")]);
    let rows = h.search(r#"{"query": {"type": "match", "field": "tag", "value": "t"}}"#);
    assert_eq!(ids(&rows), vec!["a", "c"]);
}

#[test]
fn test_scan_sees_a_fixed_snapshot() {
    let h = harness();
    put(&h, "a", 1, vec![("tag", text("t"))]);
    put(&h, "b", 1, vec![("tag", text("t"))]);

    let searcher = h.index.create_searcher(["search"]).unwrap();
    let mut scan = searcher.search(h.filter(r#"{"query": {"type": "match", "field": "tag", "value": "t"}}"#)).unwrap();
    let first = scan.next().unwrap();

    // Written after the scan started: never part of it
    put(&h, "c", 1, vec![("tag", text("t"))]);
    let rest: Vec<_> = scan.collect();
    assert_eq!(rest.len(), 1);
    assert_ne!(first.partition_key, rest[0].partition_key);
}

#[test]
fn test_lifecycle_transitions() {
    let h = harness();
    assert_eq!(h.index.status(), IndexStatus::Built);
    assert!(h.index.validate_options().is_ok());
    assert!(h.index.indexes("Body"));
    assert!(!h.index.indexes("age"));
    assert_eq!(h.index.index_name(), "idx");

    put(&h, "a", 1, vec![("body", text("hello"))]);
    h.index.force_blocking_flush().unwrap();
    assert!(h.index.live_size() > 0);
    h.index.reload().unwrap();

    let dir = h.index.indexer().unwrap().directory().to_path_buf();
    assert!(dir.exists());
    h.index.remove_index().unwrap();
    assert!(!dir.exists());
    assert_eq!(h.index.status(), IndexStatus::Removed);
    assert_eq!(h.index.live_size(), 0);

    let err = h.index.create_searcher(["search"]).err().unwrap();
    assert_eq!(err.kind, ErrorKind::InvalidState);
    let err = h.index.index(&[text("a")], &ColumnBatch::new()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidState);
    assert_eq!(h.index.init().unwrap_err().kind, ErrorKind::InvalidState);
}

use std::cmp::Ordering;
use std::net::IpAddr;
use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Reserved field holding the string-encoded primary key
pub const ID_FIELD: &str = "_id";
/// Reserved field holding the write timestamp
pub const TS_FIELD: &str = "_ts";
/// Reserved field holding the partition-key encoding
pub const PK_FIELD: &str = "_pk";

/// A typed value after coercion to its field's declared type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Str(String),
    Text(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Uuid(Uuid),
    TimeUuid(Uuid),
    Inet(IpAddr),
    Date(DateTime<Utc>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) | FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            FieldValue::Long(v) => Some(*v),
            FieldValue::Date(d) => Some(d.timestamp_millis()),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            FieldValue::Double(v) => Some(*v),
            FieldValue::Long(v) => Some(*v as f64),
            _ => None,
        }
    }
}

/// Value used by field sorting, comparable across documents of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortValue {
    Long(i64),
    /// Write timestamps, which use the full u64 range
    Unsigned(u64),
    Double(f64),
    Str(String),
}

impl SortValue {
    pub fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Long(a), SortValue::Long(b)) => a.cmp(b),
            (SortValue::Unsigned(a), SortValue::Unsigned(b)) => a.cmp(b),
            (SortValue::Long(a), SortValue::Unsigned(b)) => i128::from(*a).cmp(&i128::from(*b)),
            (SortValue::Unsigned(a), SortValue::Long(b)) => i128::from(*a).cmp(&i128::from(*b)),
            (SortValue::Unsigned(a), SortValue::Double(b)) => (*a as f64).total_cmp(b),
            (SortValue::Double(a), SortValue::Unsigned(b)) => a.total_cmp(&(*b as f64)),
            (SortValue::Double(a), SortValue::Double(b)) => a.total_cmp(b),
            (SortValue::Str(a), SortValue::Str(b)) => a.cmp(b),
            (SortValue::Long(a), SortValue::Double(b)) => (*a as f64).total_cmp(b),
            (SortValue::Double(a), SortValue::Long(b)) => a.total_cmp(&(*b as f64)),
            // Mixed string/numeric never happens within one field; keep it total anyway
            (SortValue::Str(_), _) => Ordering::Greater,
            (_, SortValue::Str(_)) => Ordering::Less,
        }
    }
}

/// One indexed term occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldToken {
    pub term: Vec<u8>,
    pub position: u32,
}

/// A field ready to be written into a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexableField {
    pub name: String,
    pub tokens: Vec<FieldToken>,
    pub stored: Option<FieldValue>,
    pub sort: Option<SortValue>,
}

impl IndexableField {
    pub fn new(name: impl Into<String>) -> Self {
        IndexableField {
            name: name.into(),
            tokens: Vec::new(),
            stored: None,
            sort: None,
        }
    }

    pub fn single_term(name: impl Into<String>, term: Vec<u8>) -> Self {
        let mut field = IndexableField::new(name);
        field.tokens.push(FieldToken { term, position: 0 });
        field
    }
}

/// Document handed to the indexer: identity, timestamp and projected fields
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub partition: String,
    pub ts: u64,
    pub fields: Vec<IndexableField>,
}

impl Document {
    pub fn new(id: impl Into<String>, partition: impl Into<String>, ts: u64) -> Self {
        Document {
            id: id.into(),
            partition: partition.into(),
            ts,
            fields: Vec::new(),
        }
    }

    pub fn add_field(&mut self, field: IndexableField) {
        self.fields.push(field);
    }

    pub fn get_field(&self, name: &str) -> Option<&IndexableField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Stored part of a document as kept inside a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub partition: String,
    pub ts: u64,
    pub fields: Vec<(String, FieldValue)>,
}

impl StoredDocument {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

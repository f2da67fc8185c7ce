use std::cmp::Ordering;
use std::fmt;
use std::net::IpAddr;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::core::error::{Error, ErrorKind, Result};

/// Column validator of the host table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    Text,
    Int,
    BigInt,
    Float,
    Double,
    Boolean,
    Uuid,
    TimeUuid,
    Inet,
    Timestamp,
}

/// A decoded host cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Text(String),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Uuid(Uuid),
    TimeUuid(Uuid),
    Inet(IpAddr),
    Timestamp(DateTime<Utc>),
}

impl CellValue {
    pub fn cell_type(&self) -> CellType {
        match self {
            CellValue::Text(_) => CellType::Text,
            CellValue::Int(_) => CellType::Int,
            CellValue::BigInt(_) => CellType::BigInt,
            CellValue::Float(_) => CellType::Float,
            CellValue::Double(_) => CellType::Double,
            CellValue::Boolean(_) => CellType::Boolean,
            CellValue::Uuid(_) => CellType::Uuid,
            CellValue::TimeUuid(_) => CellType::TimeUuid,
            CellValue::Inet(_) => CellType::Inet,
            CellValue::Timestamp(_) => CellType::Timestamp,
        }
    }

    /// Canonical string rendering, the inverse of `parse`
    pub fn render(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Int(v) => v.to_string(),
            CellValue::BigInt(v) => v.to_string(),
            CellValue::Float(v) => v.to_string(),
            CellValue::Double(v) => v.to_string(),
            CellValue::Boolean(v) => v.to_string(),
            CellValue::Uuid(u) | CellValue::TimeUuid(u) => u.hyphenated().to_string(),
            CellValue::Inet(ip) => ip.to_string(),
            CellValue::Timestamp(t) => t.timestamp_millis().to_string(),
        }
    }

    pub fn parse(cell_type: CellType, raw: &str) -> Result<Self> {
        let invalid = |what: &str| Error::new(ErrorKind::Parse, format!("Invalid {} value '{}'", what, raw));
        let value = match cell_type {
            CellType::Text => CellValue::Text(raw.to_string()),
            CellType::Int => CellValue::Int(raw.parse().map_err(|_| invalid("int"))?),
            CellType::BigInt => CellValue::BigInt(raw.parse().map_err(|_| invalid("bigint"))?),
            CellType::Float => CellValue::Float(raw.parse().map_err(|_| invalid("float"))?),
            CellType::Double => CellValue::Double(raw.parse().map_err(|_| invalid("double"))?),
            CellType::Boolean => CellValue::Boolean(raw.parse().map_err(|_| invalid("boolean"))?),
            CellType::Uuid => CellValue::Uuid(Uuid::parse_str(raw).map_err(|_| invalid("uuid"))?),
            CellType::TimeUuid => CellValue::TimeUuid(Uuid::parse_str(raw).map_err(|_| invalid("timeuuid"))?),
            CellType::Inet => CellValue::Inet(raw.parse().map_err(|_| invalid("inet"))?),
            CellType::Timestamp => {
                let millis: i64 = raw.parse().map_err(|_| invalid("timestamp"))?;
                let ts = Utc.timestamp_millis_opt(millis).single().ok_or_else(|| invalid("timestamp"))?;
                CellValue::Timestamp(ts)
            }
        };
        Ok(value)
    }

    /// Order under the column's comparator; values of different types order by type
    pub fn compare(&self, other: &CellValue) -> Ordering {
        match (self, other) {
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            (CellValue::Int(a), CellValue::Int(b)) => a.cmp(b),
            (CellValue::BigInt(a), CellValue::BigInt(b)) => a.cmp(b),
            (CellValue::Float(a), CellValue::Float(b)) => a.total_cmp(b),
            (CellValue::Double(a), CellValue::Double(b)) => a.total_cmp(b),
            (CellValue::Boolean(a), CellValue::Boolean(b)) => a.cmp(b),
            (CellValue::Uuid(a), CellValue::Uuid(b)) => a.cmp(b),
            (CellValue::TimeUuid(a), CellValue::TimeUuid(b)) => {
                let ta = a.get_timestamp().map(|t| t.to_unix());
                let tb = b.get_timestamp().map(|t| t.to_unix());
                ta.cmp(&tb).then_with(|| a.cmp(b))
            }
            (CellValue::Inet(a), CellValue::Inet(b)) => a.cmp(b),
            (CellValue::Timestamp(a), CellValue::Timestamp(b)) => a.cmp(b),
            (a, b) => (a.cell_type() as u8).cmp(&(b.cell_type() as u8)),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Compare clustering prefixes component-wise; a shorter prefix sorts first
pub fn compare_prefix(a: &[CellValue], b: &[CellValue]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.compare(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

use std::net::IpAddr;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{FieldToken, FieldValue, IndexableField, SortValue};
use crate::encoding::terms;
use crate::host::value::CellValue;
use crate::schema::field::{FieldProperties, FieldType};

/// Coerce a host cell into the declared field type
pub fn coerce(field_type: FieldType, value: &CellValue) -> Result<FieldValue> {
    let mismatch = || {
        Error::new(
            ErrorKind::Parse,
            format!("Cannot index {:?} value '{}' as {}", value.cell_type(), value.render(), field_type),
        )
    };

    let coerced = match (field_type, value) {
        (FieldType::String, v) => FieldValue::Str(v.render()),
        (FieldType::Text, v) => FieldValue::Text(v.render()),
        (FieldType::Integer | FieldType::Long, CellValue::Int(v)) => FieldValue::Long(*v as i64),
        (FieldType::Integer | FieldType::Long, CellValue::BigInt(v)) => FieldValue::Long(*v),
        (FieldType::Integer | FieldType::Long, CellValue::Timestamp(t)) => FieldValue::Long(t.timestamp_millis()),
        (FieldType::Float | FieldType::Double, CellValue::Int(v)) => FieldValue::Double(*v as f64),
        (FieldType::Float | FieldType::Double, CellValue::BigInt(v)) => FieldValue::Double(*v as f64),
        (FieldType::Float | FieldType::Double, CellValue::Float(v)) => FieldValue::Double(*v as f64),
        (FieldType::Float | FieldType::Double, CellValue::Double(v)) => FieldValue::Double(*v),
        (FieldType::Boolean, CellValue::Boolean(v)) => FieldValue::Boolean(*v),
        (FieldType::Uuid, CellValue::Uuid(u) | CellValue::TimeUuid(u)) => FieldValue::Uuid(*u),
        (FieldType::TimeUuid, CellValue::TimeUuid(u)) => FieldValue::TimeUuid(*u),
        (FieldType::TimeUuid, CellValue::Uuid(u)) if u.get_version_num() == 1 => FieldValue::TimeUuid(*u),
        (FieldType::Inet, CellValue::Inet(ip)) => FieldValue::Inet(*ip),
        (FieldType::Date, CellValue::Timestamp(t)) => FieldValue::Date(*t),
        (FieldType::Date, CellValue::BigInt(v)) => FieldValue::Date(millis_to_date(*v).ok_or_else(mismatch)?),
        (FieldType::Json, _) => return Err(mismatch()),
        (field_type, CellValue::Text(raw)) => parse_str(field_type, raw).ok_or_else(mismatch)?,
        _ => return Err(mismatch()),
    };
    Ok(coerced)
}

/// Coerce a decoded JSON scalar into the declared field type
pub fn from_json(field_type: FieldType, value: &serde_json::Value) -> Result<FieldValue> {
    use serde_json::Value;

    let mismatch = || Error::new(ErrorKind::Parse, format!("Value {} does not fit a {} field", value, field_type));

    let coerced = match (field_type, value) {
        (FieldType::String, Value::String(s)) => FieldValue::Str(s.clone()),
        (FieldType::String, Value::Number(n)) => FieldValue::Str(n.to_string()),
        (FieldType::String, Value::Bool(b)) => FieldValue::Str(b.to_string()),
        (FieldType::Text, Value::String(s)) => FieldValue::Text(s.clone()),
        (FieldType::Integer | FieldType::Long, Value::Number(n)) => FieldValue::Long(n.as_i64().ok_or_else(mismatch)?),
        (FieldType::Float | FieldType::Double, Value::Number(n)) => FieldValue::Double(n.as_f64().ok_or_else(mismatch)?),
        (FieldType::Boolean, Value::Bool(b)) => FieldValue::Boolean(*b),
        (FieldType::Date, Value::Number(n)) => {
            FieldValue::Date(n.as_i64().and_then(millis_to_date).ok_or_else(mismatch)?)
        }
        (field_type, Value::String(s)) if field_type != FieldType::Json => {
            parse_str(field_type, s).ok_or_else(mismatch)?
        }
        _ => return Err(mismatch()),
    };
    Ok(coerced)
}

fn parse_str(field_type: FieldType, raw: &str) -> Option<FieldValue> {
    let raw = raw.trim();
    let value = match field_type {
        FieldType::String => FieldValue::Str(raw.to_string()),
        FieldType::Text => FieldValue::Text(raw.to_string()),
        FieldType::Integer | FieldType::Long => FieldValue::Long(raw.parse().ok()?),
        FieldType::Float | FieldType::Double => FieldValue::Double(raw.parse().ok()?),
        FieldType::Boolean => FieldValue::Boolean(raw.to_lowercase().parse().ok()?),
        FieldType::Uuid => FieldValue::Uuid(Uuid::parse_str(raw).ok()?),
        FieldType::TimeUuid => {
            let uuid = Uuid::parse_str(raw).ok()?;
            if uuid.get_version_num() != 1 {
                return None;
            }
            FieldValue::TimeUuid(uuid)
        }
        FieldType::Inet => FieldValue::Inet(raw.parse::<IpAddr>().ok()?),
        FieldType::Date => match raw.parse::<i64>() {
            Ok(millis) => FieldValue::Date(millis_to_date(millis)?),
            Err(_) => FieldValue::Date(DateTime::parse_from_rfc3339(raw).ok()?.with_timezone(&Utc)),
        },
        FieldType::Json => return None,
    };
    Some(value)
}

fn millis_to_date(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Single term for an untokenized value, strings normalized by the field analyzer
pub fn single_term(props: &FieldProperties, value: &FieldValue) -> Vec<u8> {
    match value {
        FieldValue::Str(s) => props.analyzer.normalize(s).into_bytes(),
        other => terms::term_of(other),
    }
}

/// Analyzed terms of a text value, with positions
pub fn text_tokens(props: &FieldProperties, text: &str) -> Vec<FieldToken> {
    props
        .analyzer
        .analyze(text)
        .into_iter()
        .map(|t| FieldToken { term: t.text.into_bytes(), position: t.position })
        .collect()
}

pub fn sort_value(props: &FieldProperties, value: &FieldValue) -> SortValue {
    match value {
        FieldValue::Long(v) => SortValue::Long(*v),
        FieldValue::Double(v) => SortValue::Double(*v),
        FieldValue::Date(d) => SortValue::Long(d.timestamp_millis()),
        FieldValue::Boolean(b) => SortValue::Long(*b as i64),
        FieldValue::Str(s) => SortValue::Str(props.analyzer.normalize(s)),
        FieldValue::Text(s) => SortValue::Str(s.clone()),
        FieldValue::Uuid(u) | FieldValue::TimeUuid(u) => SortValue::Str(u.hyphenated().to_string()),
        FieldValue::Inet(ip) => SortValue::Str(ip.to_string()),
    }
}

/// Build the indexable form of one value of field `name`
pub fn encode_value(name: &str, props: &FieldProperties, value: FieldValue) -> IndexableField {
    let mut field = IndexableField::new(name);
    if props.indexed {
        field.tokens = match &value {
            FieldValue::Text(text) => text_tokens(props, text),
            other => vec![FieldToken { term: single_term(props, other), position: 0 }],
        };
    }
    if props.sortable {
        field.sort = Some(sort_value(props, &value));
    }
    if props.stored {
        field.stored = Some(value);
    }
    field
}

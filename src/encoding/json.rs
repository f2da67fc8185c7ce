use std::borrow::Cow;
use log::{debug, warn};
use serde_json::Value;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::IndexableField;
use crate::encoding::field::{encode_value, from_json};
use crate::schema::field::{FieldProperties, FieldType};

/// Project a json column into `<root>.<path>` fields following the mapping
/// of `props`. Leaves without a mapping are ignored.
pub fn project_json(root: &str, props: &FieldProperties, raw: &str) -> Result<Vec<IndexableField>> {
    let document: Value = serde_json::from_str(&relax(raw))
        .map_err(|e| Error::new(ErrorKind::Parse, format!("Column '{}' is not valid json: {}", root, e)))?;

    let mut fields = Vec::new();
    walk(root, props, &document, &mut fields);
    Ok(fields)
}

/// Rewrite single-quoted strings and bare field names into strict json.
/// Input using neither comes back borrowed.
pub fn relax(raw: &str) -> Cow<'_, str> {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len() + 8);
    let mut changed = false;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '"' => {
                let end = string_end(&chars, i);
                out.extend(&chars[i..end]);
                i = end;
            }
            '\'' => {
                changed = true;
                out.push('"');
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    match chars[i] {
                        '\\' if chars.get(i + 1) == Some(&'\'') => {
                            out.push('\'');
                            i += 2;
                        }
                        '\\' => {
                            out.push('\\');
                            out.extend(chars.get(i + 1));
                            i += 2;
                        }
                        '"' => {
                            out.push_str("\\\"");
                            i += 1;
                        }
                        c => {
                            out.push(c);
                            i += 1;
                        }
                    }
                }
                out.push('"');
                i += 1;
            }
            c if is_name_start(c) => {
                let start = i;
                while i < chars.len() && (is_name_start(chars[i]) || chars[i].is_ascii_digit()) {
                    i += 1;
                }
                let next = chars[i..].iter().position(|c| !c.is_whitespace()).map(|n| i + n);
                let is_key = next.is_some_and(|n| chars[n] == ':');
                if is_key {
                    changed = true;
                    out.push('"');
                }
                out.extend(&chars[start..i]);
                if is_key {
                    out.push('"');
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    if changed { Cow::Owned(out) } else { Cow::Borrowed(raw) }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

/// Index just past the closing quote of the string opened at `start`
fn string_end(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '"' => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

fn walk(path: &str, props: &FieldProperties, value: &Value, out: &mut Vec<IndexableField>) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                walk(path, props, item, out);
            }
        }
        Value::Object(map) if props.field_type == FieldType::Json => {
            for (key, child) in map {
                if let Some(sub) = props.fields.get(&key.to_lowercase()) {
                    walk(&format!("{}.{}", path, key.to_lowercase()), sub, child, out);
                }
            }
        }
        Value::Object(_) => debug!("Skipping object under non-json mapping '{}'", path),
        scalar if props.field_type == FieldType::Json => {
            debug!("Skipping scalar {} where '{}' expects an object", scalar, path)
        }
        scalar => match from_json(props.field_type, scalar) {
            Ok(v) => out.push(encode_value(path, props, v)),
            Err(e) => warn!("Skipping json leaf '{}': {}", path, e.context),
        },
    }
}

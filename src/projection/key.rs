use crate::core::error::{Error, ErrorKind, Result};
use crate::host::table::TableSchema;
use crate::host::value::{CellType, CellValue};

const SEPARATOR: char = ':';
const ESCAPE: char = '\\';

/// Renders primary keys into document ids and back
///
/// Components are rendered canonically, `\` and `:` are escaped and the
/// results are joined with `:`. The partition part of a wide-row id followed
/// by `:` is the prefix shared by every row of the partition.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    partition_types: Vec<CellType>,
    clustering_types: Vec<CellType>,
}

impl KeyCodec {
    pub fn new(table: &TableSchema) -> Self {
        KeyCodec {
            partition_types: table.partition_key_types(),
            clustering_types: table.clustering_types(),
        }
    }

    pub fn encode_partition(&self, partition_key: &[CellValue]) -> String {
        encode_components(partition_key)
    }

    /// Prefix of every wide-row id in the partition
    pub fn partition_prefix(&self, partition: &str) -> String {
        format!("{}{}", partition, SEPARATOR)
    }

    pub fn encode_row(&self, partition_key: &[CellValue], clustering: &[CellValue]) -> String {
        if clustering.is_empty() {
            return self.encode_partition(partition_key);
        }
        let all: Vec<CellValue> = partition_key.iter().chain(clustering).cloned().collect();
        encode_components(&all)
    }

    pub fn decode_partition(&self, id: &str) -> Result<Vec<CellValue>> {
        let parts = split_components(id);
        if parts.len() != self.partition_types.len() {
            return Err(arity_error(id, self.partition_types.len(), parts.len()));
        }
        typed(&parts, &self.partition_types)
    }

    /// Split an id into partition key and clustering components
    pub fn decode_row(&self, id: &str) -> Result<(Vec<CellValue>, Vec<CellValue>)> {
        let parts = split_components(id);
        let pk_len = self.partition_types.len();
        let expected = pk_len + self.clustering_types.len();
        if parts.len() != expected {
            return Err(arity_error(id, expected, parts.len()));
        }
        let partition = typed(&parts[..pk_len], &self.partition_types)?;
        let clustering = typed(&parts[pk_len..], &self.clustering_types)?;
        Ok((partition, clustering))
    }
}

pub fn encode_components(values: &[CellValue]) -> String {
    let mut out = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        for ch in value.render().chars() {
            if ch == SEPARATOR || ch == ESCAPE {
                out.push(ESCAPE);
            }
            out.push(ch);
        }
    }
    out
}

pub fn split_components(id: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = id.chars();
    while let Some(ch) = chars.next() {
        match ch {
            ESCAPE => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            SEPARATOR => parts.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    parts.push(current);
    parts
}

fn typed(parts: &[String], types: &[CellType]) -> Result<Vec<CellValue>> {
    parts
        .iter()
        .zip(types)
        .map(|(raw, cell_type)| CellValue::parse(*cell_type, raw))
        .collect()
}

fn arity_error(id: &str, expected: usize, actual: usize) -> Error {
    Error::new(
        ErrorKind::Parse,
        format!("Id '{}' has {} components, expected {}", id, actual, expected),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> KeyCodec {
        let table = TableSchema::new("ks", "t")
            .partition_key("p", CellType::Text)
            .clustering("c1", CellType::Int)
            .clustering("c2", CellType::Text);
        KeyCodec::new(&table)
    }

    #[test]
    fn test_escaped_components_round_trip() {
        let codec = codec();
        let pk = vec![CellValue::Text("a:b\\c".into())];
        let ck = vec![CellValue::Int(7), CellValue::Text("x:".into())];
        let id = codec.encode_row(&pk, &ck);
        assert!(id.starts_with(&codec.partition_prefix(&codec.encode_partition(&pk))));
        assert_eq!(codec.decode_row(&id).unwrap(), (pk, ck));
    }

    #[test]
    fn test_prefixes_do_not_collide() {
        let codec = codec();
        let p1 = codec.partition_prefix(&codec.encode_partition(&[CellValue::Text("a".into())]));
        let other = codec.encode_row(&[CellValue::Text("a:1".into())], &[CellValue::Int(1), CellValue::Text("z".into())]);
        assert!(!other.starts_with(&p1));
    }

    #[test]
    fn test_wrong_arity_fails() {
        assert!(codec().decode_row("a:1").is_err());
    }
}

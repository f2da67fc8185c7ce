use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use crate::analysis::analyzer::Analyzer;
use crate::core::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Text,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    Uuid,
    TimeUuid,
    Inet,
    Date,
    Json,
}

impl FieldType {
    pub fn parse(name: &str) -> Result<Self> {
        let field_type = match name.trim().to_lowercase().as_str() {
            "string" | "keyword" | "ascii" | "varchar" => FieldType::String,
            "text" => FieldType::Text,
            "int" | "integer" => FieldType::Integer,
            "long" | "bigint" => FieldType::Long,
            "float" => FieldType::Float,
            "double" => FieldType::Double,
            "bool" | "boolean" => FieldType::Boolean,
            "uuid" => FieldType::Uuid,
            "timeuuid" => FieldType::TimeUuid,
            "inet" => FieldType::Inet,
            "date" | "timestamp" => FieldType::Date,
            "json" | "object" => FieldType::Json,
            other => return Err(Error::config(format!("Unknown field type '{}'", other))),
        };
        Ok(field_type)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Long | FieldType::Float | FieldType::Double)
    }

    /// Values of these types are ordered through their encoded terms
    pub fn supports_range(&self) -> bool {
        !matches!(self, FieldType::Text | FieldType::Json | FieldType::Boolean)
    }

    /// Term-level pattern queries (prefix, wildcard, regex, fuzzy)
    pub fn supports_patterns(&self) -> bool {
        matches!(
            self,
            FieldType::String | FieldType::Text | FieldType::Uuid | FieldType::TimeUuid | FieldType::Inet
        )
    }

    fn default_sortable(&self) -> bool {
        !matches!(self, FieldType::Text | FieldType::Json)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Resolved per-field properties
#[derive(Clone)]
pub struct FieldProperties {
    pub field_type: FieldType,
    pub analyzer: Arc<Analyzer>,
    pub indexed: bool,
    pub stored: bool,
    pub sortable: bool,
    pub fields: BTreeMap<String, FieldProperties>,  // Only for json
}

impl FieldProperties {
    pub fn new(field_type: FieldType, analyzer: Arc<Analyzer>) -> Self {
        FieldProperties {
            field_type,
            analyzer,
            indexed: true,
            stored: false,
            sortable: field_type.default_sortable(),
            fields: BTreeMap::new(),
        }
    }

    pub fn stored(mut self, stored: bool) -> Self {
        self.stored = stored;
        self
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    /// Follow a dotted path through json sub-field mappings
    pub fn sub_field<'a, I>(&self, path: I) -> Option<&FieldProperties>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut current = self;
        for part in path {
            current = current.fields.get(&part.to_lowercase())?;
        }
        Some(current)
    }
}

impl fmt::Debug for FieldProperties {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FieldProperties")
            .field("field_type", &self.field_type)
            .field("analyzer", &self.analyzer.name)
            .field("indexed", &self.indexed)
            .field("stored", &self.stored)
            .field("sortable", &self.sortable)
            .field("fields", &self.fields)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_aliases() {
        assert_eq!(FieldType::parse("int").unwrap(), FieldType::Integer);
        assert_eq!(FieldType::parse("BOOL").unwrap(), FieldType::Boolean);
        assert_eq!(FieldType::parse("timestamp").unwrap(), FieldType::Date);
        assert!(FieldType::parse("geo_point").is_err());
    }

    #[test]
    fn test_text_is_not_sortable_by_default() {
        let analyzer = Arc::new(Analyzer::standard());
        assert!(!FieldProperties::new(FieldType::Text, analyzer.clone()).sortable);
        assert!(FieldProperties::new(FieldType::Long, analyzer).sortable);
    }
}

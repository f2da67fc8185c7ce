use std::collections::BTreeMap;
use std::sync::Arc;
use serde::Deserialize;
use crate::analysis::analyzer::{Analyzer, AnalyzerRegistry};
use crate::core::error::{Error, Result};
use crate::core::types::{ID_FIELD, TS_FIELD};
use crate::encoding::json::relax;
use crate::schema::field::{FieldProperties, FieldType};

/// Index option key carrying the options JSON
pub const INDEX_OPTIONS_JSON: &str = "sg_options";
pub const DEFAULT_SCORE_COLUMN: &str = "stargate";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct OptionsJson {
    default_analyzer: Option<String>,
    #[serde(default)]
    fields: BTreeMap<String, FieldJson>,
    #[serde(default)]
    primary: Option<PrimaryJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldJson {
    #[serde(rename = "type")]
    field_type: String,
    analyzer: Option<String>,
    indexed: Option<bool>,
    stored: Option<bool>,
    sortable: Option<bool>,
    #[serde(default)]
    fields: BTreeMap<String, FieldJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrimaryJson {
    meta_column: Option<bool>,
    score_column_name: Option<String>,
}

/// How the relevance score is returned with each row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryOptions {
    pub meta_column: bool,
    pub score_column_name: String,
}

impl Default for PrimaryOptions {
    fn default() -> Self {
        PrimaryOptions {
            meta_column: true,
            score_column_name: DEFAULT_SCORE_COLUMN.to_string(),
        }
    }
}

/// Immutable per-index configuration
#[derive(Debug, Clone)]
pub struct Options {
    pub indexed_column: String,
    pub default_analyzer: Arc<Analyzer>,
    pub fields: BTreeMap<String, FieldProperties>,
    pub primary: PrimaryOptions,
    id_field: FieldProperties,
    ts_field: FieldProperties,
}

impl Options {
    pub fn from_json(indexed_column: &str, json: &str, registry: &AnalyzerRegistry) -> Result<Self> {
        let parsed: OptionsJson = serde_json::from_str(&relax(json))
            .map_err(|e| Error::config(format!("Invalid {}: {}", INDEX_OPTIONS_JSON, e)))?;

        let default_analyzer = match &parsed.default_analyzer {
            Some(name) => registry.resolve(name)?,
            None => registry.resolve("standard")?,
        };

        let mut fields = BTreeMap::new();
        for (name, field) in &parsed.fields {
            let props = Self::resolve_field(name, field, &default_analyzer, registry)?;
            fields.insert(name.trim().to_lowercase(), props);
        }
        if fields.is_empty() {
            return Err(Error::config("Options must declare at least one field"));
        }

        let primary = parsed.primary.map(|p| {
            let defaults = PrimaryOptions::default();
            PrimaryOptions {
                meta_column: p.meta_column.unwrap_or(defaults.meta_column),
                score_column_name: p.score_column_name.unwrap_or(defaults.score_column_name),
            }
        }).unwrap_or_default();

        let keyword = registry.resolve("keyword")?;
        Ok(Options {
            indexed_column: indexed_column.trim().to_lowercase(),
            default_analyzer,
            fields,
            primary,
            id_field: FieldProperties::new(FieldType::String, keyword.clone()).stored(true),
            ts_field: FieldProperties::new(FieldType::Long, keyword).stored(true),
        })
    }

    fn resolve_field(
        name: &str,
        field: &FieldJson,
        default_analyzer: &Arc<Analyzer>,
        registry: &AnalyzerRegistry,
    ) -> Result<FieldProperties> {
        let field_type = FieldType::parse(&field.field_type)
            .map_err(|e| Error::config(format!("Field '{}': {}", name, e.context)))?;
        let analyzer = match &field.analyzer {
            Some(alias) => registry.resolve(alias)?,
            None => default_analyzer.clone(),
        };

        let mut props = FieldProperties::new(field_type, analyzer);
        if let Some(indexed) = field.indexed {
            props.indexed = indexed;
        }
        if let Some(stored) = field.stored {
            props.stored = stored;
        }
        if let Some(sortable) = field.sortable {
            props.sortable = sortable;
        }

        match (field_type, field.fields.is_empty()) {
            (FieldType::Json, true) => {
                return Err(Error::config(format!("Json field '{}' declares no sub-fields", name)));
            }
            (FieldType::Json, false) => {
                for (sub_name, sub) in &field.fields {
                    let qualified = format!("{}.{}", name, sub_name);
                    let sub_props = Self::resolve_field(&qualified, sub, default_analyzer, registry)?;
                    props.fields.insert(sub_name.trim().to_lowercase(), sub_props);
                }
            }
            (_, false) => {
                return Err(Error::config(format!("Field '{}' of type {} cannot have sub-fields", name, field_type)));
            }
            _ => {}
        }

        Ok(props)
    }

    /// Fields declared in the options must be columns of the table
    pub fn validate_columns<'a, I>(&self, columns: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let known: Vec<String> = columns.into_iter().map(|c| c.trim().to_lowercase()).collect();
        for name in self.fields.keys() {
            if !known.contains(name) {
                return Err(Error::config(format!("Field '{}' is not a column of the table", name)));
            }
        }
        Ok(())
    }

    /// Look up a field by (possibly dotted) name; reserved fields included
    pub fn field(&self, name: &str) -> Option<&FieldProperties> {
        match name {
            ID_FIELD => return Some(&self.id_field),
            TS_FIELD => return Some(&self.ts_field),
            _ => {}
        }
        let lowered = name.trim().to_lowercase();
        if let Some(props) = self.fields.get(&lowered) {
            return Some(props);
        }
        let mut parts = lowered.split('.');
        let root = self.fields.get(parts.next()?)?;
        if root.field_type != FieldType::Json {
            return None;
        }
        root.sub_field(parts)
    }

    pub fn indexes_column(&self, column: &str) -> bool {
        self.fields.contains_key(&column.trim().to_lowercase())
    }

    pub fn id_field(&self) -> &FieldProperties {
        &self.id_field
    }
}

use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};
use crate::encoding::json::relax;
use crate::query::condition::Condition;

/// A search request: scoring query, non-scoring filter and sort
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Search {
    #[serde(default)]
    pub query: Option<Condition>,
    #[serde(default)]
    pub filter: Option<Condition>,
    #[serde(default)]
    pub sort: Option<Sorting>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sorting {
    #[serde(default)]
    pub fields: Vec<SortingField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortingField {
    pub field: String,
    #[serde(default)]
    pub reverse: bool,
}

impl Search {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(&relax(json)).map_err(|e| Error::bad_query(format!("Malformed search: {}", e)))
    }

    /// Sort fields, empty for relevance order
    pub fn sort_fields(&self) -> &[SortingField] {
        self.sort.as_ref().map(|s| s.fields.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn test_parse_full_search() {
        let search = Search::from_json(r#"{
            "query": {"type":"match","field":"body","value":"hello"},
            "filter": {"type":"range","field":"rank","lower":1},
            "sort": {"fields":[{"field":"rank","reverse":true}]}
        }"#).unwrap();
        assert!(search.query.is_some());
        assert!(search.filter.is_some());
        assert_eq!(search.sort_fields(), &[SortingField { field: "rank".into(), reverse: true }]);
    }

    #[test]
    fn test_empty_search_is_valid() {
        let search = Search::from_json("{}").unwrap();
        assert!(search.query.is_none());
        assert!(search.sort_fields().is_empty());
    }

    #[test]
    fn test_relaxed_search_json() {
        let search = Search::from_json("{query: {type: 'match', field: 'body', value: 'hello'}}").unwrap();
        assert_eq!(search.query, Some(Condition::Match {
            field: "body".into(),
            value: serde_json::Value::String("hello".into()),
            boost: None,
        }));
    }

    #[test]
    fn test_malformed_json_is_bad_query() {
        let err = Search::from_json(r#"{"query": {"type": "match""#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadQuery);
    }
}

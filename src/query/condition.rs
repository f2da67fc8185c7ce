use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One node of a search expression, as submitted in the search JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Analyzed match on text fields, exact term on every other type
    Match {
        field: String,
        value: Value,
        #[serde(default)]
        boost: Option<f32>,
    },
    /// Terms of `value` at consecutive positions
    Phrase {
        field: String,
        value: String,
        #[serde(default)]
        boost: Option<f32>,
    },
    Prefix {
        field: String,
        value: String,
        #[serde(default)]
        boost: Option<f32>,
    },
    /// `*` matches any run of characters, `?` exactly one
    Wildcard {
        field: String,
        value: String,
        #[serde(default)]
        boost: Option<f32>,
    },
    Regex {
        field: String,
        value: String,
        #[serde(default)]
        boost: Option<f32>,
    },
    Range {
        field: String,
        #[serde(default)]
        lower: Option<Value>,
        #[serde(default)]
        upper: Option<Value>,
        #[serde(default)]
        include_lower: bool,
        #[serde(default)]
        include_upper: bool,
        #[serde(default)]
        boost: Option<f32>,
    },
    Fuzzy {
        field: String,
        value: String,
        #[serde(default = "default_max_edits")]
        max_edits: u8,
        #[serde(default)]
        prefix_length: usize,
        #[serde(default = "default_transpositions")]
        transpositions: bool,
        #[serde(default)]
        boost: Option<f32>,
    },
    Boolean {
        #[serde(default)]
        must: Vec<Condition>,
        #[serde(default)]
        should: Vec<Condition>,
        #[serde(default, alias = "must_not")]
        not: Vec<Condition>,
        #[serde(default)]
        boost: Option<f32>,
    },
    MatchAll {
        #[serde(default)]
        boost: Option<f32>,
    },
}

fn default_max_edits() -> u8 {
    2
}

fn default_transpositions() -> bool {
    true
}

impl Condition {
    pub fn boost(&self) -> f32 {
        let boost = match self {
            Condition::Match { boost, .. }
            | Condition::Phrase { boost, .. }
            | Condition::Prefix { boost, .. }
            | Condition::Wildcard { boost, .. }
            | Condition::Regex { boost, .. }
            | Condition::Range { boost, .. }
            | Condition::Fuzzy { boost, .. }
            | Condition::Boolean { boost, .. }
            | Condition::MatchAll { boost } => boost,
        };
        boost.unwrap_or(1.0)
    }

    pub fn match_all() -> Self {
        Condition::MatchAll { boost: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boolean_with_must_not_alias() {
        let json = r#"{"type":"boolean",
            "must":[{"type":"match","field":"body","value":"hello"}],
            "must_not":[{"type":"prefix","field":"tag","value":"x"}]}"#;
        let condition: Condition = serde_json::from_str(json).unwrap();
        match condition {
            Condition::Boolean { must, not, should, .. } => {
                assert_eq!(must.len(), 1);
                assert_eq!(not.len(), 1);
                assert!(should.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fuzzy_defaults() {
        let condition: Condition =
            serde_json::from_str(r#"{"type":"fuzzy","field":"name","value":"jonh"}"#).unwrap();
        assert_eq!(condition, Condition::Fuzzy {
            field: "name".into(),
            value: "jonh".into(),
            max_edits: 2,
            prefix_length: 0,
            transpositions: true,
            boost: None,
        });
    }

    #[test]
    fn test_unknown_node_type_is_rejected() {
        assert!(serde_json::from_str::<Condition>(r#"{"type":"near","field":"a"}"#).is_err());
    }

    #[test]
    fn test_boost_defaults_to_one() {
        assert_eq!(Condition::match_all().boost(), 1.0);
    }
}

use log::debug;
use serde_json::Value;
use crate::core::error::{Error, Result};
use crate::core::types::{ID_FIELD, TS_FIELD};
use crate::encoding::field::{from_json, single_term, text_tokens};
use crate::encoding::terms::encode_ts;
use crate::index::inverted::{Term, TermRange};
use crate::query::ast::{BoolQuery, FuzzyQuery, PhraseQuery, PrefixQuery, Query, RangeQuery, RegexQuery, TermQuery};
use crate::query::condition::Condition;
use crate::query::search::{Search, SortingField};
use crate::query::sort::{Sort, SortKey};
use crate::schema::field::{FieldProperties, FieldType};
use crate::schema::options::Options;

/// Largest edit distance the fuzzy automaton supports
pub const MAX_FUZZY_EDITS: u8 = 2;

/// A search ready to execute against a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSearch {
    pub query: Query,
    pub sort: Sort,
}

/// Compiles search conditions against the encodings declared in `Options`
pub struct QueryCompiler<'a> {
    options: &'a Options,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(options: &'a Options) -> Self {
        QueryCompiler { options }
    }

    pub fn compile_json(&self, json: &str) -> Result<CompiledSearch> {
        self.compile(&Search::from_json(json)?)
    }

    pub fn compile(&self, search: &Search) -> Result<CompiledSearch> {
        let query = match &search.query {
            Some(condition) => self.condition(condition)?,
            None => Query::MatchAll { boost: 1.0 },
        };
        let query = match &search.filter {
            Some(filter) => Query::Bool(
                BoolQuery::new().with_must(query).with_filter(self.condition(filter)?),
            ),
            None => query,
        };
        let sort = self.sort(search.sort_fields())?;
        debug!("Compiled search into {:?}, sort {:?}", query, sort.keys);
        Ok(CompiledSearch { query, sort })
    }

    pub fn condition(&self, condition: &Condition) -> Result<Query> {
        let boost = condition.boost();
        let query = match condition {
            Condition::Match { field, value, .. } => {
                let (name, props) = self.indexed_field(field)?;
                if props.field_type == FieldType::Text {
                    let text = value.as_str().ok_or_else(|| {
                        Error::bad_query(format!("Match on text field '{}' needs a string, got {}", name, value))
                    })?;
                    let mut terms: Vec<Query> = text_tokens(props, text)
                        .into_iter()
                        .map(|t| Query::Term(TermQuery { term: Term::new(name.as_str(), t.term), boost: 1.0 }))
                        .collect();
                    match terms.len() {
                        0 => Query::MatchNone,
                        1 => with_boost(terms.remove(0), boost),
                        _ => Query::Bool(BoolQuery { should: terms, boost, ..BoolQuery::new() }),
                    }
                } else {
                    let term = self.encode(&name, props, value)?;
                    Query::Term(TermQuery { term: Term::new(name, term), boost })
                }
            }
            Condition::Phrase { field, value, .. } => {
                let (name, props) = self.indexed_field(field)?;
                if props.field_type != FieldType::Text {
                    return Err(Error::bad_query(format!(
                        "Phrase needs a text field, '{}' is {}", name, props.field_type
                    )));
                }
                let tokens = text_tokens(props, value);
                match tokens.len() {
                    0 => Query::MatchNone,
                    1 => Query::Term(TermQuery {
                        term: Term::new(name, tokens[0].term.clone()),
                        boost,
                    }),
                    _ => {
                        let first = tokens[0].position;
                        let terms = tokens.into_iter().map(|t| (t.position - first, t.term)).collect();
                        Query::Phrase(PhraseQuery { field: name, terms, boost })
                    }
                }
            }
            Condition::Prefix { field, value, .. } => {
                let (name, props) = self.pattern_field(field, "Prefix")?;
                let prefix = normalize_pattern(props, value);
                Query::Prefix(PrefixQuery { field: name, prefix, boost })
            }
            Condition::Wildcard { field, value, .. } => {
                let (name, props) = self.pattern_field(field, "Wildcard")?;
                let pattern = wildcard_to_regex(&normalize_pattern(props, value));
                regex::Regex::new(&pattern)?;
                Query::Regex(RegexQuery { field: name, pattern, boost })
            }
            Condition::Regex { field, value, .. } => {
                let (name, _) = self.pattern_field(field, "Regex")?;
                let pattern = format!("^(?:{})$", value);
                regex::Regex::new(&pattern)?;
                Query::Regex(RegexQuery { field: name, pattern, boost })
            }
            Condition::Range { field, lower, upper, include_lower, include_upper, .. } => {
                let (name, props) = self.indexed_field(field)?;
                if !props.field_type.supports_range() {
                    return Err(Error::bad_query(format!(
                        "Range is not supported on {} field '{}'", props.field_type, name
                    )));
                }
                let lower = self.bound(&name, props, lower.as_ref())?;
                let upper = self.bound(&name, props, upper.as_ref())?;
                Query::Range(RangeQuery {
                    field: name,
                    range: TermRange {
                        lower,
                        upper,
                        include_lower: *include_lower,
                        include_upper: *include_upper,
                    },
                    boost,
                })
            }
            Condition::Fuzzy { field, value, max_edits, prefix_length, transpositions, .. } => {
                let (name, props) = self.pattern_field(field, "Fuzzy")?;
                if *max_edits > MAX_FUZZY_EDITS {
                    return Err(Error::bad_query(format!(
                        "Fuzzy max_edits must be at most {}, got {}", MAX_FUZZY_EDITS, max_edits
                    )));
                }
                Query::Fuzzy(FuzzyQuery {
                    field: name,
                    term: normalize_pattern(props, value),
                    max_edits: *max_edits,
                    prefix_length: *prefix_length,
                    transpositions: *transpositions,
                    boost,
                })
            }
            Condition::Boolean { must, should, not, .. } => {
                let mut query = BoolQuery { boost, ..BoolQuery::new() };
                for clause in must {
                    query.must.push(self.condition(clause)?);
                }
                for clause in should {
                    query.should.push(self.condition(clause)?);
                }
                for clause in not {
                    query.must_not.push(self.condition(clause)?);
                }

                if query.must.is_empty() && query.should.is_empty() {
                    if query.must_not.is_empty() {
                        return Ok(Query::MatchAll { boost });
                    }
                    // A purely negative query excludes from all documents
                    query.must.push(Query::MatchAll { boost: 1.0 });
                }
                Query::Bool(query)
            }
            Condition::MatchAll { .. } => Query::MatchAll { boost },
        };
        Ok(query)
    }

    fn sort(&self, fields: &[SortingField]) -> Result<Sort> {
        let mut keys = Vec::with_capacity(fields.len());
        for sorting in fields {
            let name = canonical_name(&sorting.field);
            let props = self.options
                .field(&name)
                .ok_or_else(|| Error::bad_query(format!("Unknown sort field '{}'", sorting.field)))?;
            if !props.sortable {
                return Err(Error::bad_query(format!("Field '{}' is not sortable", name)));
            }
            keys.push(SortKey { field: name, reverse: sorting.reverse });
        }
        Ok(Sort { keys })
    }

    fn indexed_field(&self, field: &str) -> Result<(String, &'a FieldProperties)> {
        let name = canonical_name(field);
        let props = self.options
            .field(&name)
            .ok_or_else(|| Error::bad_query(format!("Unknown field '{}'", field)))?;
        if props.field_type == FieldType::Json {
            return Err(Error::bad_query(format!(
                "Field '{}' is a json root, query one of its mapped sub-fields", name
            )));
        }
        if !props.indexed {
            return Err(Error::bad_query(format!("Field '{}' is not indexed", name)));
        }
        Ok((name, props))
    }

    fn pattern_field(&self, field: &str, kind: &str) -> Result<(String, &'a FieldProperties)> {
        let (name, props) = self.indexed_field(field)?;
        if !props.field_type.supports_patterns() {
            return Err(Error::bad_query(format!(
                "{} is not supported on {} field '{}'", kind, props.field_type, name
            )));
        }
        Ok((name, props))
    }

    fn encode(&self, name: &str, props: &FieldProperties, value: &Value) -> Result<Vec<u8>> {
        if name == TS_FIELD {
            return timestamp(value).map(|ts| encode_ts(ts).to_vec());
        }
        let typed = from_json(props.field_type, value)
            .map_err(|e| Error::bad_query(format!("Field '{}': {}", name, e.context)))?;
        Ok(single_term(props, &typed))
    }

    fn bound(&self, name: &str, props: &FieldProperties, value: Option<&Value>) -> Result<Option<Vec<u8>>> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(v) => self.encode(name, props, v).map(Some),
        }
    }
}

/// A write timestamp given as a JSON number or a numeric string
fn timestamp(value: &Value) -> Result<u64> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::bad_query(format!("Field '{}' expects an unsigned timestamp, got {}", TS_FIELD, value)))
}

fn canonical_name(field: &str) -> String {
    match field.trim() {
        ID_FIELD => ID_FIELD.to_string(),
        TS_FIELD => TS_FIELD.to_string(),
        other => other.to_lowercase(),
    }
}

fn with_boost(query: Query, boost: f32) -> Query {
    match query {
        Query::Term(mut term) => {
            term.boost = boost;
            Query::Term(term)
        }
        other => other,
    }
}

/// Patterns follow the normalization of the values they are matched against
fn normalize_pattern(props: &FieldProperties, raw: &str) -> String {
    match props.field_type {
        FieldType::String | FieldType::Text => props.analyzer.normalize(raw),
        FieldType::Uuid | FieldType::TimeUuid => raw.to_lowercase(),
        _ => raw.to_string(),
    }
}

/// `*` matches any run, `?` one char; everything else is literal
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push_str("^(?:");
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push_str(")$");
    regex
}

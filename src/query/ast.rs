use crate::index::inverted::{Term, TermRange};

/// Executable query over encoded index terms
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Term(TermQuery),         // Single term, BM25 scored
    Phrase(PhraseQuery),     // Terms at fixed relative positions
    Bool(BoolQuery),         // Boolean combinations
    Range(RangeQuery),       // Encoded term range
    Prefix(PrefixQuery),
    Regex(RegexQuery),       // Wildcards compile to anchored regexes
    Fuzzy(FuzzyQuery),       // Levenshtein distance over the term dictionary
    MatchAll { boost: f32 },
    MatchNone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    pub term: Term,
    pub boost: f32,
}

/// Phrase query; `terms` holds each term with its offset from the first
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseQuery {
    pub field: String,
    pub terms: Vec<(u32, Vec<u8>)>,
    pub boost: f32,
}

/// Boolean query with must/should/must_not clauses
///
/// `should` clauses are required only when there is no `must` or `filter`
/// clause; otherwise they just add to the score.
#[derive(Debug, Clone, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub should: Vec<Query>,
    pub must_not: Vec<Query>,
    pub filter: Vec<Query>,    // Required, scored as zero
    pub boost: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub field: String,
    pub range: TermRange,
    pub boost: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrefixQuery {
    pub field: String,
    pub prefix: String,
    pub boost: f32,
}

/// Anchored pattern matched against whole terms
#[derive(Debug, Clone, PartialEq)]
pub struct RegexQuery {
    pub field: String,
    pub pattern: String,
    pub boost: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyQuery {
    pub field: String,
    pub term: String,
    pub max_edits: u8,
    pub prefix_length: usize,  // Leading chars that must match exactly
    pub transpositions: bool,
    pub boost: f32,
}

impl BoolQuery {
    pub fn new() -> Self {
        BoolQuery {
            must: Vec::new(),
            should: Vec::new(),
            must_not: Vec::new(),
            filter: Vec::new(),
            boost: 1.0,
        }
    }

    pub fn with_must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn with_should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn with_must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn with_filter(mut self, query: Query) -> Self {
        self.filter.push(query);
        self
    }

    pub fn has_required(&self) -> bool {
        !self.must.is_empty() || !self.filter.is_empty()
    }
}

impl Default for BoolQuery {
    fn default() -> Self {
        Self::new()
    }
}

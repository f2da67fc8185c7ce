use std::collections::HashSet;
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Lucene's default English stop set
const ENGLISH: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these", "they",
    "this", "to", "was", "will", "with",
];

/// Drops stop words; positions of the remaining tokens are left untouched
pub struct StopWordFilter {
    words: HashSet<String>,
}

impl StopWordFilter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StopWordFilter { words: words.into_iter().map(Into::into).collect() }
    }

    pub fn english() -> Self {
        StopWordFilter::new(ENGLISH.iter().copied())
    }
}

impl TokenFilter for StopWordFilter {
    fn apply(&self, token: Token) -> Option<Token> {
        (!self.words.contains(&token.text)).then_some(token)
    }

    fn name(&self) -> &'static str {
        "stop"
    }
}

use rust_stemmers::{Algorithm, Stemmer};
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Snowball stemming for one language
pub struct StemmerFilter {
    stemmer: Stemmer,
}

impl StemmerFilter {
    pub fn new(algorithm: Algorithm) -> Self {
        StemmerFilter { stemmer: Stemmer::create(algorithm) }
    }
}

impl TokenFilter for StemmerFilter {
    fn apply(&self, token: Token) -> Option<Token> {
        let stem = self.stemmer.stem(&token.text).into_owned();
        Some(token.with_text(stem))
    }

    fn name(&self) -> &'static str {
        "snowball"
    }
}

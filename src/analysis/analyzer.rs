use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use parking_lot::RwLock;
use rust_stemmers::Algorithm;
use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::filters::stopword::StopWordFilter;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{KeywordTokenizer, LetterTokenizer, StandardTokenizer, Tokenizer, WhitespaceTokenizer};
use crate::core::error::{Error, Result};

/// Text analysis pipeline
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(name: String, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name,
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        self.tokenizer
            .tokenize(text)
            .into_iter()
            .filter_map(|token| self.filters.iter().try_fold(token, |t, f| f.apply(t)))
            .collect()
    }

    /// Apply only the character-rewriting filters to a whole value
    pub fn normalize(&self, text: &str) -> String {
        self.filters
            .iter()
            .filter(|f| f.is_normalizer())
            .try_fold(Token::new(text, 0, 0), |t, f| f.apply(t))
            .map(|t| t.text)
            .unwrap_or_default()
    }

    /// Lowercased unicode words with English stop words removed
    pub fn standard() -> Self {
        Analyzer::new("standard".to_string(),
                      Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(StopWordFilter::english()))
    }

    /// Create standard analyzer for English
    pub fn english() -> Self {
        Analyzer::standard()
            .add_filter(Box::new(StemmerFilter::new(Algorithm::English)))
            .renamed("english")
    }

    pub fn simple() -> Self {
        Analyzer::new("simple".to_string(), Box::new(LetterTokenizer))
            .add_filter(Box::new(LowercaseFilter))
    }

    pub fn whitespace() -> Self {
        Analyzer::new("whitespace".to_string(), Box::new(WhitespaceTokenizer))
    }

    pub fn keyword() -> Self {
        Analyzer::new("keyword".to_string(), Box::new(KeywordTokenizer))
    }

    fn renamed(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let filters: Vec<&str> = self.filters.iter().map(|f| f.name()).collect();
        f.debug_struct("Analyzer")
            .field("name", &self.name)
            .field("tokenizer", &self.tokenizer.name())
            .field("filters", &filters)
            .finish()
    }
}

/// Registry for managing analyzers
pub struct AnalyzerRegistry {
    analyzers: RwLock<HashMap<String, Arc<Analyzer>>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        let registry = AnalyzerRegistry {
            analyzers: RwLock::new(HashMap::new()),
        };

        // Register default analyzers
        registry.register_defaults();
        registry
    }

    fn register_defaults(&self) {
        self.register("standard", Analyzer::standard());
        self.register("english", Analyzer::english());
        self.register("simple", Analyzer::simple());
        self.register("whitespace", Analyzer::whitespace());
        self.register("keyword", Analyzer::keyword());
    }

    pub fn register(&self, name: &str, analyzer: Analyzer) {
        let mut analyzers = self.analyzers.write();
        analyzers.insert(name.to_lowercase(), Arc::new(analyzer));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Analyzer>> {
        let analyzers = self.analyzers.read();
        analyzers.get(&Self::alias(name)).cloned()
    }

    /// Resolve an alias or a class-style name, failing with a config error
    pub fn resolve(&self, name: &str) -> Result<Arc<Analyzer>> {
        self.get(name)
            .ok_or_else(|| Error::config(format!("Analyzer '{}' not found", name)))
    }

    pub fn analyze(&self, analyzer_name: &str, text: &str) -> Result<Vec<Token>> {
        self.resolve(analyzer_name)
            .map(|analyzer| analyzer.analyze(text))
    }

    // "org.apache.lucene.analysis.core.KeywordAnalyzer" -> "keyword"
    fn alias(name: &str) -> String {
        let short = name.rsplit('.').next().unwrap_or(name);
        let short = short.strip_suffix("Analyzer").unwrap_or(short);
        short.to_lowercase()
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

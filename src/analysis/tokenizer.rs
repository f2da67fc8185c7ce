use crate::analysis::token::Token;
use unicode_segmentation::UnicodeSegmentation;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    fn name(&self) -> &'static str;
}

/// Standard Unicode tokenizer
#[derive(Clone)]
pub struct StandardTokenizer {
    pub max_token_length: usize,
}

impl Default for StandardTokenizer {
    fn default() -> Self {
        StandardTokenizer {
            max_token_length: 255,
        }
    }
}

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;

        for (offset, word) in text.unicode_word_indices() {
            if word.len() <= self.max_token_length {
                tokens.push(Token::new(word.to_string(), position, offset));
                position += 1;
            }
        }

        tokens
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}

/// Splits on whitespace only, punctuation stays attached
#[derive(Clone, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        text.split_whitespace()
            .enumerate()
            .map(|(position, word)| {
                let offset = word.as_ptr() as usize - text.as_ptr() as usize;
                Token::new(word.to_string(), position as u32, offset)
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "whitespace"
    }
}

/// Emits runs of letters, everything else separates tokens
#[derive(Clone, Default)]
pub struct LetterTokenizer;

impl Tokenizer for LetterTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut start: Option<usize> = None;

        for (idx, ch) in text.char_indices() {
            match (ch.is_alphabetic(), start) {
                (true, None) => start = Some(idx),
                (false, Some(s)) => {
                    tokens.push(Token::new(text[s..idx].to_string(), tokens.len() as u32, s));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            tokens.push(Token::new(text[s..].to_string(), tokens.len() as u32, s));
        }

        tokens
    }

    fn name(&self) -> &'static str {
        "letter"
    }
}

/// The whole input is one token
#[derive(Clone, Default)]
pub struct KeywordTokenizer;

impl Tokenizer for KeywordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        if text.is_empty() {
            return Vec::new();
        }
        vec![Token::new(text.to_string(), 0, 0)]
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

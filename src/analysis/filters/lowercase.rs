use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

pub struct LowercaseFilter;

impl TokenFilter for LowercaseFilter {
    fn apply(&self, token: Token) -> Option<Token> {
        if token.text.chars().any(char::is_uppercase) {
            let lowered = token.text.to_lowercase();
            return Some(token.with_text(lowered));
        }
        Some(token)
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }

    fn is_normalizer(&self) -> bool {
        true
    }
}

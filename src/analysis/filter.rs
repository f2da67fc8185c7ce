use crate::analysis::token::Token;

/// One per-token stage of an analyzer; `None` drops the token
pub trait TokenFilter: Send + Sync {
    fn apply(&self, token: Token) -> Option<Token>;

    fn name(&self) -> &'static str;

    /// Filters that only rewrite characters also apply to untokenized values
    fn is_normalizer(&self) -> bool {
        false
    }
}

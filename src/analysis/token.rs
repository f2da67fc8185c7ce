/// A term produced by a tokenizer, before it is encoded into the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub position: u32,  // Ordinal in the field; gaps left by dropped tokens stay
    pub start: usize,   // Byte offset in the source text
}

impl Token {
    pub fn new(text: impl Into<String>, position: u32, start: usize) -> Self {
        Token { text: text.into(), position, start }
    }

    /// Same token with rewritten text
    pub fn with_text(self, text: String) -> Self {
        Token { text, ..self }
    }
}

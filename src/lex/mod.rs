//! Token model and the cursor the parsers consume.

pub mod tokenizer;

pub use tokenizer::{Mode, tokenize};

use crate::error::{MessageCode, ParseError};

// =============================================================================
// TOKENS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Payload-carrying kinds
    Identifier,
    Integer,
    LiteralString,
    // Fixed operator kinds
    DoubleMinus,
    Equals,
    AndAnd,
    Pipe,
    DoublePipe,
    Arrow,
    Lt,
    Gt,
    OpenParen,
    CloseParen,
    Colon,
    Semicolon,
    Star,
    Dot,
}

impl TokenKind {
    pub fn has_payload(self) -> bool {
        matches!(
            self,
            TokenKind::Identifier | TokenKind::Integer | TokenKind::LiteralString
        )
    }

    /// The fixed characters of an operator kind, or a descriptive name for
    /// payload kinds (used in `NotExpectedToken` inserts).
    pub fn token_chars(self) -> &'static str {
        match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Integer => "integer",
            TokenKind::LiteralString => "literal string",
            TokenKind::DoubleMinus => "--",
            TokenKind::Equals => "=",
            TokenKind::AndAnd => "&&",
            TokenKind::Pipe => "|",
            TokenKind::DoublePipe => "||",
            TokenKind::Arrow => "->",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::OpenParen => "(",
            TokenKind::CloseParen => ")",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Star => "*",
            TokenKind::Dot => ".",
        }
    }
}

/// One token produced by the tokenizer. `data` holds the raw payload for
/// identifier/integer/literal kinds (literals keep their surrounding quotes);
/// positions are 0-based character offsets into the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub data: Option<String>,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn new(kind: TokenKind, start: usize, end: usize) -> Self {
        Token {
            kind,
            data: None,
            start,
            end,
        }
    }

    pub fn with_data(kind: TokenKind, data: String, start: usize, end: usize) -> Self {
        Token {
            kind,
            data: Some(data),
            start,
            end,
        }
    }

    pub fn is_kind(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// The token rendered back as source text.
    pub fn text(&self) -> &str {
        match &self.data {
            Some(d) => d,
            None => self.kind.token_chars(),
        }
    }
}

// =============================================================================
// TOKEN STREAM
// =============================================================================

/// The token list plus a cursor, shared by both parsers. Also records where
/// linebreaks fell in the source so the composed parser can treat a newline
/// as a sequence separator.
#[derive(Debug)]
pub struct TokenStream {
    expression: String,
    tokens: Vec<Token>,
    linebreaks: Vec<usize>,
    position: usize,
}

impl TokenStream {
    pub(crate) fn new(expression: String, tokens: Vec<Token>, linebreaks: Vec<usize>) -> Self {
        TokenStream {
            expression,
            tokens,
            linebreaks,
            position: 0,
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn decrement_position(&mut self) {
        self.position -= 1;
    }

    pub fn has_next(&self) -> bool {
        self.position < self.tokens.len()
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    /// Token at a signed distance from the cursor, or `None` off either end.
    pub fn peek_at(&self, how_far: isize) -> Option<&Token> {
        let index = self.position as isize + how_far;
        if index < 0 {
            return None;
        }
        self.tokens.get(index as usize)
    }

    pub fn peek_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    /// Consume and return the next token, or fail with `OutOfData` at the end
    /// of the expression.
    pub fn next(&mut self) -> Result<Token, ParseError> {
        match self.tokens.get(self.position) {
            Some(t) => {
                self.position += 1;
                Ok(t.clone())
            }
            None => Err(self.error(self.expression.chars().count(), MessageCode::OutOfData, vec![])),
        }
    }

    /// Consume the next token if it has the expected kind, otherwise fail with
    /// `NotExpectedToken` at the token's position.
    pub fn eat_kind(&mut self, expected: TokenKind) -> Result<Token, ParseError> {
        let t = self.next()?;
        if t.kind != expected {
            return Err(self.error(
                t.start,
                MessageCode::NotExpectedToken,
                vec![expected.token_chars().to_string(), t.text().to_string()],
            ));
        }
        Ok(t)
    }

    /// Consume the next token if it matches, reporting whether it did.
    pub fn maybe_eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind(kind) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// True when the current token starts exactly where the previous one ended.
    pub fn is_next_adjacent(&self) -> bool {
        if !self.has_next() || self.position == 0 {
            return false;
        }
        self.tokens[self.position].start == self.tokens[self.position - 1].end
    }

    /// Which line the token is on, starting from 0.
    pub fn line_of(&self, token: &Token) -> usize {
        self.linebreaks
            .iter()
            .take_while(|lb| **lb < token.start)
            .count()
    }

    pub fn error(&self, position: usize, code: MessageCode, inserts: Vec<String>) -> ParseError {
        ParseError::new(&self.expression, position, code, inserts)
    }
}

//! Lex raw definition text into a stream of position-tagged tokens.
//!
//! One tokenizer serves both grammars; a mode flag switches the small set of
//! operator rules that differ (`&&`/`->`/`<`/`>` for composed definitions,
//! `|`/`>` destinations for pipelines). Whitespace and newlines are
//! insignificant outside quoted literals; newline offsets are recorded so the
//! composed parser can detect sequence breaks.

use crate::error::{MessageCode, ParseError};

use super::{Token, TokenKind, TokenStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Flow/split/transition grammar.
    Composed,
    /// Pipe-chained step grammar with destinations.
    Pipeline,
}

/// Tokenize `src` under the given mode.
pub fn tokenize(src: &str, mode: Mode) -> Result<TokenStream, ParseError> {
    let mut t = Tokenizer::new(src, mode);
    t.process()?;
    Ok(TokenStream::new(src.to_string(), t.tokens, t.linebreaks))
}

struct Tokenizer<'a> {
    mode: Mode,
    src: &'a str,
    /// Source characters with a NUL sentinel appended.
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Token>,
    linebreaks: Vec<usize>,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str, mode: Mode) -> Self {
        let mut chars: Vec<char> = src.chars().collect();
        chars.push('\0');
        Tokenizer {
            mode,
            src,
            chars,
            pos: 0,
            tokens: Vec::new(),
            linebreaks: Vec::new(),
        }
    }

    fn process(&mut self) -> Result<(), ParseError> {
        let max = self.chars.len();
        let mut just_processed_equals = false;
        while self.pos < max {
            let ch = self.chars[self.pos];

            if just_processed_equals {
                // Following an '=' a relaxed sub-lexer consumes the argument
                // value up to the next unquoted terminator, so values do not
                // need quoting for every special character.
                if !is_whitespace(ch) && ch != '\0' && !matches!(ch, '|' | ';' | '>') {
                    self.lex_arg_value_identifier()?;
                }
                just_processed_equals = false;
                continue;
            }

            if self.is_identifier_start(ch) {
                self.lex_identifier();
                continue;
            }

            match ch {
                ' ' | '\t' | '\r' => {
                    self.pos += 1;
                }
                '\n' => {
                    self.linebreaks.push(self.pos);
                    self.pos += 1;
                }
                '\0' => {
                    // sentinel at end of data
                    self.pos += 1;
                }
                '\'' => self.lex_string_literal('\'', MessageCode::NonTerminatingQuotedString)?,
                '"' => {
                    self.lex_string_literal('"', MessageCode::NonTerminatingDoubleQuotedString)?
                }
                '=' => {
                    just_processed_equals = true;
                    self.push_char_token(TokenKind::Equals);
                }
                ':' => self.push_char_token(TokenKind::Colon),
                ';' => self.push_char_token(TokenKind::Semicolon),
                '*' => self.push_char_token(TokenKind::Star),
                '.' => self.push_char_token(TokenKind::Dot),
                '>' => self.push_char_token(TokenKind::Gt),
                '|' => {
                    if self.chars[self.pos + 1] == '|' {
                        self.push_pair_token(TokenKind::DoublePipe);
                    } else {
                        self.push_char_token(TokenKind::Pipe);
                    }
                }
                '-' => {
                    if self.chars[self.pos + 1] == '-' {
                        self.push_pair_token(TokenKind::DoubleMinus);
                    } else if self.mode == Mode::Composed && self.chars[self.pos + 1] == '>' {
                        self.push_pair_token(TokenKind::Arrow);
                    } else if self.mode == Mode::Composed {
                        return Err(self.error(self.pos, MessageCode::HyphenExpectedUseArrow, vec![]));
                    } else {
                        return Err(self.error(
                            self.pos,
                            MessageCode::MissingCharacter,
                            vec!["-".to_string()],
                        ));
                    }
                }
                '&' if self.mode == Mode::Composed => {
                    if self.chars[self.pos + 1] == '&' {
                        self.push_pair_token(TokenKind::AndAnd);
                    } else {
                        return Err(self.error(self.pos, MessageCode::DoubleAndRequired, vec![]));
                    }
                }
                '<' if self.mode == Mode::Composed => self.push_char_token(TokenKind::Lt),
                '(' if self.mode == Mode::Composed => self.push_char_token(TokenKind::OpenParen),
                ')' if self.mode == Mode::Composed => self.push_char_token(TokenKind::CloseParen),
                '\\' => {
                    return Err(self.error(self.pos, MessageCode::UnexpectedEscapeChar, vec![]));
                }
                _ => {
                    let code = match self.mode {
                        Mode::Composed => MessageCode::UnexpectedDataInDefinition,
                        Mode::Pipeline => MessageCode::UnexpectedData,
                    };
                    return Err(self.error(self.pos, code, vec![ch.to_string()]));
                }
            }
        }
        Ok(())
    }

    fn is_identifier_start(&self, ch: char) -> bool {
        match self.mode {
            Mode::Composed => ch.is_ascii_alphanumeric() || ch == '_' || ch == '$',
            Mode::Pipeline => ch.is_ascii_alphanumeric() || ch == '_',
        }
    }

    /// ID: ('a'..'z'|'A'..'Z'|'0'..'9'|'_'|'$') ('a'..'z'|'A'..'Z'|'0'..'9'|'_'|'$'|'-')*
    /// A run consisting solely of digits becomes an `Integer`.
    fn lex_identifier(&mut self) {
        let start = self.pos;
        loop {
            self.pos += 1;
            let ch = self.chars[self.pos];
            if !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' || ch == '-') {
                break;
            }
        }
        let data: String = self.chars[start..self.pos].iter().collect();
        let kind = if data.chars().all(|c| c.is_ascii_digit()) {
            TokenKind::Integer
        } else {
            TokenKind::Identifier
        };
        self.tokens.push(Token::with_data(kind, data, start, self.pos));
    }

    /// Lex a quoted literal. A doubled quote inside the literal is an escaped
    /// quote, not a terminator. The token keeps its surrounding quotes.
    fn lex_string_literal(
        &mut self,
        quote: char,
        non_termination: MessageCode,
    ) -> Result<(), ParseError> {
        let start = self.pos;
        loop {
            self.pos += 1;
            let ch = self.chars[self.pos];
            if ch == quote {
                if self.chars[self.pos + 1] == quote {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            if ch == '\0' {
                return Err(self.error(start, non_termination, vec![]));
            }
        }
        self.pos += 1;
        let data: String = self.chars[start..self.pos].iter().collect();
        self.tokens
            .push(Token::with_data(TokenKind::LiteralString, data, start, self.pos));
        Ok(())
    }

    /// Relaxed value lexing just after an '='. Handles the awkward cases where
    /// a value starts quoted but turns out to be only partially quoted, e.g.
    /// `'hi'+payload` or `'hello'+'world'`, which collapse into one identifier.
    fn lex_arg_value_identifier(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let mut quote_open = false;
        let mut quote_closed_count = 0;
        let mut quote_in_use: Option<char> = None;
        if is_quote(self.chars[self.pos]) {
            quote_open = true;
            quote_in_use = Some(self.chars[self.pos]);
            self.pos += 1;
        }
        loop {
            let ch = self.chars[self.pos];
            let is_matching_quote = match quote_in_use {
                Some(q) => ch == q,
                None => is_quote(ch),
            };
            if is_matching_quote {
                if quote_in_use == Some('\'') && ch == '\'' && self.chars[self.pos + 1] == '\'' {
                    self.pos += 1;
                } else {
                    quote_open = !quote_open;
                    if !quote_open {
                        quote_closed_count += 1;
                    }
                }
            }
            self.pos += 1;
            if is_arg_value_terminator(self.chars[self.pos], quote_open) {
                break;
            }
        }
        if quote_in_use == Some('"') && quote_closed_count == 0 {
            return Err(self.error(start, MessageCode::NonTerminatingDoubleQuotedString, vec![]));
        }
        if quote_in_use == Some('\'') && quote_closed_count == 0 {
            return Err(self.error(start, MessageCode::NonTerminatingQuotedString, vec![]));
        }
        let data: String = self.chars[start..self.pos].iter().collect();
        if quote_closed_count == 1 && self.same_quotes(start, self.pos - 1) {
            self.tokens
                .push(Token::with_data(TokenKind::LiteralString, data, start, self.pos));
        } else {
            self.tokens
                .push(Token::with_data(TokenKind::Identifier, data, start, self.pos));
        }
        Ok(())
    }

    fn same_quotes(&self, pos1: usize, pos2: usize) -> bool {
        self.chars[pos1] == self.chars[pos2] && is_quote(self.chars[pos1])
    }

    fn push_char_token(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, self.pos, self.pos + 1));
        self.pos += 1;
    }

    fn push_pair_token(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, self.pos, self.pos + 2));
        self.pos += 2;
    }

    fn error(&self, position: usize, code: MessageCode, inserts: Vec<String>) -> ParseError {
        ParseError::new(self.src, position, code, inserts)
    }
}

fn is_quote(ch: char) -> bool {
    ch == '\'' || ch == '"'
}

fn is_whitespace(ch: char) -> bool {
    ch == ' ' || ch == '\t' || ch == '\r' || ch == '\n'
}

/// The characters that end an unquoted argument value.
fn is_arg_value_terminator(ch: char, quote_open: bool) -> bool {
    if quote_open {
        return ch == '\0';
    }
    matches!(ch, '|' | ';' | '\0' | ' ' | '\t' | '>' | '\r' | '\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str, mode: Mode) -> Vec<TokenKind> {
        tokenize(src, mode)
            .unwrap()
            .tokens()
            .iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn composed_operators() {
        let ts = tokenize("< > -> ( )", Mode::Composed).unwrap();
        let toks = ts.tokens();
        assert_eq!(toks[0].kind, TokenKind::Lt);
        assert_eq!((toks[0].start, toks[0].end), (0, 1));
        assert_eq!(toks[1].kind, TokenKind::Gt);
        assert_eq!((toks[1].start, toks[1].end), (2, 3));
        assert_eq!(toks[2].kind, TokenKind::Arrow);
        assert_eq!((toks[2].start, toks[2].end), (4, 6));
        assert_eq!(toks[3].kind, TokenKind::OpenParen);
        assert_eq!(toks[4].kind, TokenKind::CloseParen);
    }

    #[test]
    fn composed_flow() {
        let ts = tokenize("App1 && App2", Mode::Composed).unwrap();
        let toks = ts.tokens();
        assert_eq!(toks[0].text(), "App1");
        assert_eq!((toks[0].start, toks[0].end), (0, 4));
        assert_eq!(toks[1].kind, TokenKind::AndAnd);
        assert_eq!((toks[1].start, toks[1].end), (5, 7));
        assert_eq!(toks[2].text(), "App2");
        assert_eq!((toks[2].start, toks[2].end), (8, 12));
    }

    #[test]
    fn transitions_lex_as_expected() {
        assert_eq!(
            kinds("App1 0->App2 1->:Bar", Mode::Composed),
            vec![
                TokenKind::Identifier,
                TokenKind::Integer,
                TokenKind::Arrow,
                TokenKind::Identifier,
                TokenKind::Integer,
                TokenKind::Arrow,
                TokenKind::Colon,
                TokenKind::Identifier,
            ]
        );
        assert_eq!(
            kinds("App1 0->App2 'abc' ->   App3", Mode::Composed),
            vec![
                TokenKind::Identifier,
                TokenKind::Integer,
                TokenKind::Arrow,
                TokenKind::Identifier,
                TokenKind::LiteralString,
                TokenKind::Arrow,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn digits_followed_by_letters_are_one_identifier() {
        let ts = tokenize("1a2b", Mode::Composed).unwrap();
        assert_eq!(ts.tokens()[0].kind, TokenKind::Identifier);
        assert_eq!(ts.tokens()[0].text(), "1a2b");
    }

    #[test]
    fn reserved_targets_are_identifiers() {
        let ts = tokenize("$END $FAIL", Mode::Composed).unwrap();
        assert_eq!(ts.tokens()[0].text(), "$END");
        assert_eq!(ts.tokens()[1].text(), "$FAIL");
    }

    #[test]
    fn single_ampersand_rejected() {
        let err = tokenize("aa & bb", Mode::Composed).unwrap_err();
        assert_eq!(err.code, MessageCode::DoubleAndRequired);
        assert_eq!(err.position, 3);
    }

    #[test]
    fn single_pipe_is_a_token_in_composed_mode() {
        // The parser rejects it in context; the tokenizer keeps lexing.
        assert_eq!(kinds("|", Mode::Composed), vec![TokenKind::Pipe]);
    }

    #[test]
    fn bare_hyphen_rejected() {
        let err = tokenize("aa - bb", Mode::Composed).unwrap_err();
        assert_eq!(err.code, MessageCode::HyphenExpectedUseArrow);
        assert_eq!(err.position, 3);
    }

    #[test]
    fn unterminated_single_quote() {
        let err = tokenize("timestamp --format='YYYY", Mode::Composed).unwrap_err();
        assert_eq!(err.code, MessageCode::NonTerminatingQuotedString);
        assert_eq!(err.position, 19);
    }

    #[test]
    fn unterminated_double_quote() {
        let err = tokenize("timestamp --format=\"YYYY", Mode::Composed).unwrap_err();
        assert_eq!(err.code, MessageCode::NonTerminatingDoubleQuotedString);
        assert_eq!(err.position, 19);
    }

    #[test]
    fn doubled_quotes_escape() {
        let ts = tokenize("'it''s'", Mode::Composed).unwrap();
        let toks = ts.tokens();
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].kind, TokenKind::LiteralString);
        assert_eq!(toks[0].text(), "'it''s'");
    }

    #[test]
    fn arg_value_consumes_quoted_run() {
        let ts = tokenize(
            "gemfire-cq --query='Select * from /Stocks where symbol=''VMW'''",
            Mode::Composed,
        )
        .unwrap();
        let toks = ts.tokens();
        let value = toks.last().unwrap();
        assert_eq!(value.kind, TokenKind::LiteralString);
        assert_eq!(value.text(), "'Select * from /Stocks where symbol=''VMW'''");
    }

    #[test]
    fn arg_value_quote_concatenation_is_identifier() {
        let ts = tokenize("foo --expression='hi'+payload", Mode::Composed).unwrap();
        let value = ts.tokens().last().unwrap().clone();
        assert_eq!(value.kind, TokenKind::Identifier);
        assert_eq!(value.text(), "'hi'+payload");
    }

    #[test]
    fn arg_value_embedded_double_dash_stays_in_value() {
        let ts = tokenize("transform --expression=--payload", Mode::Composed).unwrap();
        let value = ts.tokens().last().unwrap().clone();
        assert_eq!(value.text(), "--payload");
    }

    #[test]
    fn newlines_recorded_not_tokenized() {
        let ts = tokenize("aa &&\nbb", Mode::Composed).unwrap();
        assert_eq!(ts.tokens().len(), 3);
        let aa = &ts.tokens()[0];
        let bb = &ts.tokens()[2];
        assert_eq!(ts.line_of(aa), 0);
        assert_eq!(ts.line_of(bb), 1);
    }

    #[test]
    fn pipeline_operators() {
        assert_eq!(
            kinds(":boo > blah | file > :sink", Mode::Pipeline),
            vec![
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::Gt,
                TokenKind::Identifier,
                TokenKind::Pipe,
                TokenKind::Identifier,
                TokenKind::Gt,
                TokenKind::Colon,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn pipeline_rejects_angle_brackets() {
        let err = tokenize("<aa", Mode::Pipeline).unwrap_err();
        assert_eq!(err.code, MessageCode::UnexpectedData);
        assert_eq!(err.position, 0);
    }
}

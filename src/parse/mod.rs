//! Parse phase: DSL text → AST.
//!
//! Two recursive-descent grammars share the tokenizer and the argument
//! scanning helpers in this module: the composed grammar
//! (flow/split/transition/label) and the simple pipeline grammar
//! (pipe-chained steps with destinations).

pub mod composed;
pub mod pipeline;

pub use composed::FlowDefinitionParser;
pub use pipeline::PipelineParser;

use crate::ast::pipeline::PipelineNode;
use crate::ast::{ArgumentNode, FlowDefinition};
use crate::error::{DslError, MessageCode, ParseError, ValidationFailure};
use crate::lex::{TokenKind, TokenStream};

/// Parse a composed flow definition. With `validate` set, structural problems
/// in an otherwise well-formed AST are raised as `DslError::Validation`;
/// without it the caller gets the best-effort AST and can run
/// `FlowDefinition::validate` itself.
pub fn parse(name: &str, dsl: &str, validate: bool) -> Result<FlowDefinition, DslError> {
    let definition = FlowDefinitionParser::new(name, dsl).parse()?;
    if validate {
        let problems = definition.validate();
        if !problems.is_empty() {
            return Err(ValidationFailure { problems }.into());
        }
    }
    Ok(definition)
}

/// Parse a pipeline definition. The name may instead be embedded in the DSL
/// as `name = step | step`.
pub fn parse_pipeline(name: Option<&str>, dsl: &str) -> Result<PipelineNode, ParseError> {
    PipelineParser::new(name, dsl).parse()
}

// =============================================================================
// SHARED ARGUMENT SCANNING
// =============================================================================

/// Eat a run of `--name=value` arguments. No whitespace is allowed inside an
/// argument; each violation has its own message so the caret lands exactly on
/// the offending piece.
pub(crate) fn eat_args(tokens: &mut TokenStream) -> Result<Vec<ArgumentNode>, ParseError> {
    let mut args = Vec::new();
    if tokens.peek_kind(TokenKind::DoubleMinus) && tokens.is_next_adjacent() {
        let pos = tokens.peek().map(|t| t.start).unwrap_or(0);
        return Err(tokens.error(
            pos,
            MessageCode::ExpectedWhitespaceAfterStepBeforeArgument,
            vec![],
        ));
    }
    while tokens.peek_kind(TokenKind::DoubleMinus) {
        let dash_dash = tokens.next()?;
        if tokens.peek_kind(TokenKind::Identifier) && !tokens.is_next_adjacent() {
            let pos = tokens.peek().map(|t| t.start).unwrap_or(0);
            return Err(tokens.error(pos, MessageCode::NoWhitespaceBeforeArgName, vec![]));
        }
        let name = eat_dotted_name(tokens)?;
        if tokens.peek_kind(TokenKind::Equals) && !tokens.is_next_adjacent() {
            let pos = tokens.peek().map(|t| t.start).unwrap_or(0);
            return Err(tokens.error(pos, MessageCode::NoWhitespaceBeforeArgEquals, vec![]));
        }
        tokens.eat_kind(TokenKind::Equals)?;
        let value_is_payload = tokens
            .peek()
            .is_some_and(|t| t.kind.has_payload() && t.kind != TokenKind::LiteralString);
        if value_is_payload && !tokens.is_next_adjacent() {
            let pos = tokens.peek().map(|t| t.start).unwrap_or(0);
            return Err(tokens.error(pos, MessageCode::NoWhitespaceBeforeArgValue, vec![]));
        }
        let value_end = tokens.peek().map(|t| t.end);
        let value = eat_arg_value(tokens)?;
        args.push(ArgumentNode {
            name,
            value,
            start: dash_dash.start,
            end: value_end.unwrap_or(dash_dash.end),
        });
    }
    Ok(args)
}

/// Eat `identifier ('.' identifier)*` with no whitespace around the dots,
/// returning the joined name.
pub(crate) fn eat_dotted_name(tokens: &mut TokenStream) -> Result<String, ParseError> {
    let first = tokens.next()?;
    if !first.is_kind(TokenKind::Identifier) {
        return Err(tokens.error(
            first.start,
            MessageCode::NotExpectedToken,
            vec![
                TokenKind::Identifier.token_chars().to_string(),
                first.text().to_string(),
            ],
        ));
    }
    let mut name = first.text().to_string();
    while tokens.peek_kind(TokenKind::Dot) {
        if !tokens.is_next_adjacent() {
            let pos = tokens.peek().map(|t| t.start).unwrap_or(0);
            return Err(tokens.error(pos, MessageCode::NoWhitespaceInDottedName, vec![]));
        }
        tokens.next()?; // consume dot
        if tokens.peek_kind(TokenKind::Identifier) && !tokens.is_next_adjacent() {
            let pos = tokens.peek().map(|t| t.start).unwrap_or(0);
            return Err(tokens.error(pos, MessageCode::NoWhitespaceInDottedName, vec![]));
        }
        let part = tokens.eat_kind(TokenKind::Identifier)?;
        name.push('.');
        name.push_str(part.text());
    }
    Ok(name)
}

/// Eat an argument value: an identifier run or a quoted literal. Literals are
/// unquoted and unescaped here.
pub(crate) fn eat_arg_value(tokens: &mut TokenStream) -> Result<String, ParseError> {
    let t = tokens.next()?;
    match t.kind {
        TokenKind::Identifier | TokenKind::Integer => Ok(t.text().to_string()),
        TokenKind::LiteralString => Ok(unquote(t.text())),
        _ => Err(tokens.error(
            t.start,
            MessageCode::ExpectedArgumentValue,
            vec![t.text().to_string()],
        )),
    }
}

/// Strip the surrounding quotes from a literal token and collapse doubled
/// quotes back to one.
pub(crate) fn unquote(literal: &str) -> String {
    let quote = &literal[0..1];
    let inner = &literal[1..literal.len() - 1];
    inner.replace(&format!("{}{}", quote, quote), quote)
}

/// Valid names follow identifier rules, with `-` additionally allowed after
/// the first character.
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '-')
}

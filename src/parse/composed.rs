//! Recursive-descent parser for composed flow definitions.
//!
//! Top level: `Sequence (';' Sequence)*`, where a newline between top-level
//! nodes also separates sequences. A sequence is an optionally labelled flow;
//! a flow is `element ('&&' element)*`; an element is a split
//! `'<' flow ('||' flow)* '>'`, a parenthesized flow, or a step with optional
//! arguments and transitions.

use crate::ast::{
    FlowDefinition, FlowNode, Label, LabelledNode, SplitNode, StepNode, TransitionNode,
    TransitionTarget,
};
use crate::error::{MessageCode, ParseError};
use crate::lex::{Mode, TokenKind, TokenStream, tokenize};

use super::{eat_args, is_valid_name, unquote};

pub struct FlowDefinitionParser {
    name: String,
    dsl: String,
}

impl FlowDefinitionParser {
    pub fn new(name: &str, dsl: &str) -> Self {
        FlowDefinitionParser {
            name: name.to_string(),
            dsl: dsl.to_string(),
        }
    }

    pub fn parse(&self) -> Result<FlowDefinition, ParseError> {
        let mut tokens = tokenize(&self.dsl, Mode::Composed)?;
        let sequences = self.eat_sequences(&mut tokens)?;
        if !is_valid_name(&self.name) {
            return Err(ParseError::new(
                &self.name,
                0,
                MessageCode::IllegalDefinitionName,
                vec![self.name.clone()],
            ));
        }
        if tokens.has_next() {
            let t = tokens.next()?;
            return Err(tokens.error(
                t.start,
                MessageCode::MoreInputAfterDefinition,
                vec![t.text().to_string()],
            ));
        }
        Ok(FlowDefinition {
            name: self.name.clone(),
            dsl: self.dsl.clone(),
            sequences,
        })
    }

    /// Sequences are separated by semicolons or newlines.
    fn eat_sequences(&self, tokens: &mut TokenStream) -> Result<Vec<LabelledNode>, ParseError> {
        let mut sequences = vec![self.parse_node(tokens)?];
        while tokens.has_next()
            && (next_token_is_on_newline(tokens) || tokens.maybe_eat(TokenKind::Semicolon))
        {
            sequences.push(self.parse_node(tokens)?);
        }
        Ok(sequences)
    }

    fn parse_node(&self, tokens: &mut TokenStream) -> Result<LabelledNode, ParseError> {
        // Handle (...), which may continue as a flow: "(a && b) && c"
        if tokens.maybe_eat(TokenKind::OpenParen) {
            let node = self.parse_node(tokens)?;
            tokens.eat_kind(TokenKind::CloseParen)?;
            return self.parse_flow(tokens, node);
        }
        let label = self.maybe_eat_label(tokens)?;
        if label.is_some() {
            if tokens.peek_kind(TokenKind::OpenParen) {
                let pos = tokens.peek().map(|t| t.start).unwrap_or(0);
                return Err(tokens.error(pos, MessageCode::NoLabelsOnParens, vec![]));
            }
            if let Some(second) = self.maybe_eat_label(tokens)? {
                return Err(tokens.error(second.start, MessageCode::NoDoubleLabels, vec![]));
            }
        }
        // Handle a split < ... >, possibly part of a flow: "<..> && b"
        if tokens.peek_kind(TokenKind::Lt) {
            let mut split = self.parse_split(tokens)?;
            split.label = label;
            return self.parse_flow(tokens, LabelledNode::Split(split));
        }
        let mut step = self.eat_step(tokens, true)?;
        step.label = label;
        self.parse_flow(tokens, LabelledNode::Step(step))
    }

    /// Wrap the first element into a flow, merging any `&&`-joined
    /// continuation. Nested flows are flattened into the series.
    fn parse_flow(
        &self,
        tokens: &mut TokenStream,
        first: LabelledNode,
    ) -> Result<LabelledNode, ParseError> {
        let label = first.label().cloned();
        let start = first.start_pos();
        let mut series = match first {
            LabelledNode::Flow(f) => f.series,
            other => vec![other],
        };
        while tokens.maybe_eat(TokenKind::AndAnd) {
            let next = self.parse_node(tokens)?;
            match next {
                LabelledNode::Flow(f) => series.extend(f.series),
                other => series.push(other),
            }
        }
        let end = series.last().map(|n| n.end_pos()).unwrap_or(start);
        Ok(LabelledNode::Flow(FlowNode {
            label,
            series,
            start,
            end,
        }))
    }

    // '<' flow ('||' flow)* '>'
    fn parse_split(&self, tokens: &mut TokenStream) -> Result<SplitNode, ParseError> {
        let lt = tokens.eat_kind(TokenKind::Lt)?;
        let mut series = vec![self.parse_node(tokens)?];
        loop {
            if tokens.peek_kind(TokenKind::Pipe) {
                let pos = tokens.peek().map(|t| t.start).unwrap_or(0);
                return Err(tokens.error(pos, MessageCode::DoubleOrRequired, vec![]));
            }
            if tokens.maybe_eat(TokenKind::DoublePipe) {
                series.push(self.parse_node(tokens)?);
            } else {
                break;
            }
        }
        let gt = tokens.eat_kind(TokenKind::Gt)?;
        Ok(SplitNode {
            label: None,
            series,
            start: lt.start,
            end: gt.end,
        })
    }

    fn maybe_eat_label(&self, tokens: &mut TokenStream) -> Result<Option<Label>, ParseError> {
        if tokens.peek_kind(TokenKind::Identifier)
            && tokens.peek_at(1).is_some_and(|t| t.is_kind(TokenKind::Colon))
        {
            let label = tokens.next()?;
            tokens.eat_kind(TokenKind::Colon)?;
            return Ok(Some(Label {
                name: label.text().to_string(),
                start: label.start,
                end: label.end,
            }));
        }
        Ok(None)
    }

    // App1
    // App1 0->App2 1->App3
    // App1 --p1=v1 'foo'->Bar --p1=v2
    fn eat_step(
        &self,
        tokens: &mut TokenStream,
        transitions_allowed: bool,
    ) -> Result<StepNode, ParseError> {
        let name = tokens.next()?;
        if !name.is_kind(TokenKind::Identifier) {
            // A lone pipe here means someone wrote a split with single bars.
            if name.is_kind(TokenKind::Pipe) {
                return Err(tokens.error(name.start, MessageCode::DoubleOrRequired, vec![]));
            }
            return Err(tokens.error(
                name.start,
                MessageCode::ExpectedStepName,
                vec![name.text().to_string()],
            ));
        }
        let args = eat_args(tokens)?;
        let transitions = if transitions_allowed {
            self.maybe_eat_transitions(tokens)?
        } else {
            Vec::new()
        };
        let end = args.last().map(|a| a.end).unwrap_or(name.end);
        Ok(StepNode {
            label: None,
            name: name.text().to_string(),
            start: name.start,
            end,
            args,
            transitions,
        })
    }

    fn maybe_eat_transitions(
        &self,
        tokens: &mut TokenStream,
    ) -> Result<Vec<TransitionNode>, ParseError> {
        let mut transitions = Vec::new();
        loop {
            if tokens.peek_kind(TokenKind::Arrow) {
                let pos = tokens.peek().map(|t| t.start).unwrap_or(0);
                return Err(tokens.error(
                    pos,
                    MessageCode::TransitionArrowMustBePrecededByCheck,
                    vec![],
                ));
            }
            let arrow_next = tokens
                .peek_at(1)
                .is_some_and(|t| t.is_kind(TokenKind::Arrow));
            if !arrow_next {
                break;
            }
            let on = match tokens.peek() {
                Some(t)
                    if matches!(
                        t.kind,
                        TokenKind::Identifier
                            | TokenKind::Integer
                            | TokenKind::LiteralString
                            | TokenKind::Star
                    ) =>
                {
                    t.clone()
                }
                _ => break,
            };
            tokens.next()?; // the status
            if !tokens.maybe_eat(TokenKind::Arrow) {
                return Err(tokens.error(on.start, MessageCode::MissingTransitionArrow, vec![]));
            }
            let target = if tokens.maybe_eat(TokenKind::Colon) {
                let reference = tokens.eat_kind(TokenKind::Identifier)?;
                TransitionTarget::Label {
                    name: reference.text().to_string(),
                    start: reference.start,
                    end: reference.end,
                }
            } else {
                let label = self.maybe_eat_label(tokens)?;
                let mut step = self.eat_step(tokens, false)?;
                step.label = label;
                TransitionTarget::Step(step)
            };
            let (status, exit_code_check) = match on.kind {
                TokenKind::LiteralString => (unquote(on.text()), false),
                TokenKind::Star => ("*".to_string(), true),
                _ => (on.text().to_string(), true),
            };
            if exit_code_check && status != "*" && !status.chars().all(|c| c.is_ascii_digit()) {
                return Err(tokens.error(
                    on.start,
                    MessageCode::UnquotedTransitionCheckMustBeNumber,
                    vec![status],
                ));
            }
            let end = match &target {
                TransitionTarget::Step(s) => s.end,
                TransitionTarget::Label { end, .. } => *end,
            };
            transitions.push(TransitionNode {
                status,
                exit_code_check,
                start: on.start,
                end,
                target,
            });
        }
        Ok(transitions)
    }
}

/// True when the upcoming token sits on a later line than the last consumed
/// one, which separates top-level sequences just like a semicolon.
fn next_token_is_on_newline(tokens: &TokenStream) -> bool {
    let (Some(next), Some(last)) = (tokens.peek(), tokens.peek_at(-1)) else {
        return false;
    };
    tokens.line_of(next) > tokens.line_of(last)
}

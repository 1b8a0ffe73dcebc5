//! Recursive-descent parser for the simple pipeline grammar.
//!
//! `pipeline: (name '=')? (sourceDestination)? step ('|' step)* (sinkDestination)?`
//! with `sourceDestination: ':' dottedName '>'` and
//! `sinkDestination: '>' ':' dottedName`. When both ends are destinations with
//! nothing between (`:a > :b`) an implicit `bridge` step is synthesized so the
//! two destinations have something to hang off.

use crate::ast::Label;
use crate::ast::pipeline::{
    DestinationNode, PipelineNode, PipelineStepNode, SinkDestinationNode, SourceDestinationNode,
};
use crate::error::{MessageCode, ParseError};
use crate::lex::{Mode, TokenKind, TokenStream, tokenize};

use super::{eat_args, is_valid_name};

pub struct PipelineParser {
    name: Option<String>,
    dsl: String,
}

impl PipelineParser {
    pub fn new(name: Option<&str>, dsl: &str) -> Self {
        PipelineParser {
            name: name.map(str::to_string),
            dsl: dsl.to_string(),
        }
    }

    pub fn parse(&self) -> Result<PipelineNode, ParseError> {
        let mut tokens = tokenize(&self.dsl, Mode::Pipeline)?;
        let pipeline = self.eat_pipeline(&mut tokens)?;

        // Check the pipeline name, however it was specified
        if let Some(name) = &pipeline.name {
            if !is_valid_name(name) {
                return Err(ParseError::new(
                    name,
                    0,
                    MessageCode::IllegalPipelineName,
                    vec![name.clone()],
                ));
            }
        }

        // Each step must have a unique effective label (explicit label or
        // bare name); otherwise references into the pipeline are ambiguous.
        let mut seen: Vec<(&str, &PipelineStepNode)> = Vec::new();
        for (index, step) in pipeline.steps.iter().enumerate() {
            let key = step.label_name();
            if let Some(first_index) = seen.iter().position(|(k, _)| *k == key) {
                let previous = seen[first_index].1;
                let position = step.label.as_ref().map(|l| l.start).unwrap_or(step.start);
                return Err(ParseError::new(
                    &self.dsl,
                    position,
                    MessageCode::DuplicateLabel,
                    vec![
                        key.to_string(),
                        previous.name.clone(),
                        first_index.to_string(),
                        step.name.clone(),
                        index.to_string(),
                    ],
                ));
            }
            seen.push((key, step));
        }
        Ok(pipeline)
    }

    fn eat_pipeline(&self, tokens: &mut TokenStream) -> Result<PipelineNode, ParseError> {
        let embedded_name = self.eat_pipeline_name(tokens)?;
        let source = self.eat_source_destination(tokens)?;

        // ':foo > :bar' is a source and then a sink destination with no step
        // between; synthesize the bridge step for that case.
        let bridge =
            source.is_some() && looks_like_destination(tokens) && no_more_pipes(tokens);

        let mut steps = Vec::new();
        if bridge {
            // Rewind so the sink destination can be eaten normally.
            tokens.decrement_position();
            let at = tokens.peek().cloned();
            let (start, end) = at.map(|t| (t.start, t.end)).unwrap_or((0, 0));
            steps.push(PipelineStepNode {
                label: None,
                name: "bridge".to_string(),
                start,
                end,
                args: Vec::new(),
            });
        } else {
            steps.extend(self.eat_step_list(tokens)?);
        }
        let sink = self.eat_sink_destination(tokens)?;

        if let Some(t) = tokens.peek().cloned() {
            let previous_was_gt = tokens
                .peek_at(-1)
                .is_some_and(|p| p.is_kind(TokenKind::Gt));
            let code = if !steps.is_empty() && sink.is_none() && previous_was_gt {
                MessageCode::ExpectedDestinationPrefix
            } else {
                MessageCode::UnexpectedDataAfterPipeline
            };
            return Err(tokens.error(t.start, code, vec![t.text().to_string()]));
        }

        Ok(PipelineNode {
            name: embedded_name.or_else(|| self.name.clone()),
            dsl: self.dsl.clone(),
            source,
            steps,
            sink,
        })
    }

    /// `name =` in front of the pipeline, if present.
    fn eat_pipeline_name(&self, tokens: &mut TokenStream) -> Result<Option<String>, ParseError> {
        if tokens.peek_at(1).is_some_and(|t| t.is_kind(TokenKind::Equals)) {
            if tokens.peek_kind(TokenKind::Identifier) {
                let name = tokens.eat_kind(TokenKind::Identifier)?;
                tokens.next()?; // skip '='
                return Ok(Some(name.text().to_string()));
            }
            let (pos, text) = tokens
                .peek()
                .map(|t| (t.start, t.text().to_string()))
                .unwrap_or((0, String::new()));
            return Err(tokens.error(pos, MessageCode::IllegalPipelineName, vec![text]));
        }
        Ok(None)
    }

    /// `step ('|' step)*`. The list may be followed by a sink destination.
    fn eat_step_list(
        &self,
        tokens: &mut TokenStream,
    ) -> Result<Vec<PipelineStepNode>, ParseError> {
        let mut steps = vec![self.eat_step(tokens)?];
        while let Some(t) = tokens.peek().cloned() {
            match t.kind {
                TokenKind::Pipe => {
                    tokens.next()?;
                    steps.push(self.eat_step(tokens)?);
                }
                TokenKind::DoublePipe => {
                    return Err(tokens.error(
                        t.start,
                        MessageCode::DoublePipeNotAllowedWithPipes,
                        vec![],
                    ));
                }
                _ => break, // might be followed by a sink destination
            }
        }
        Ok(steps)
    }

    /// `step: (label ':')? identifier args*`. The label colon must abut the
    /// label and be followed by whitespace.
    fn eat_step(&self, tokens: &mut TokenStream) -> Result<PipelineStepNode, ParseError> {
        if tokens.peek_kind(TokenKind::Colon) && tokens.tokens().len() == 1 {
            let pos = tokens.peek().map(|t| t.start).unwrap_or(0);
            return Err(tokens.error(
                pos,
                MessageCode::ExpectedPipelineNameAfterLabelColon,
                vec![],
            ));
        }
        let mut name = tokens.next()?;
        if !name.is_kind(TokenKind::Identifier) {
            return Err(tokens.error(
                name.start,
                MessageCode::ExpectedStepName,
                vec![name.text().to_string()],
            ));
        }
        let mut label = None;
        if tokens.peek_kind(TokenKind::Colon) && tokens.is_next_adjacent() {
            tokens.next()?; // swallow colon
            if tokens.is_next_adjacent() {
                let pos = tokens.peek().map(|t| t.start).unwrap_or(name.end);
                return Err(tokens.error(
                    pos,
                    MessageCode::ExpectedWhitespaceAfterLabelColon,
                    vec![],
                ));
            }
            label = Some(Label {
                name: name.text().to_string(),
                start: name.start,
                end: name.end,
            });
            name = tokens.eat_kind(TokenKind::Identifier)?;
            if tokens.peek_kind(TokenKind::Colon) && tokens.is_next_adjacent() {
                return Err(tokens.error(name.start, MessageCode::NoDoubleLabels, vec![]));
            }
        }
        let args = eat_args(tokens)?;
        let start = label.as_ref().map(|l| l.start).unwrap_or(name.start);
        Ok(PipelineStepNode {
            label,
            name: name.text().to_string(),
            start,
            end: name.end,
            args,
        })
    }

    /// `':' dottedName '>'` — only present when a `>` occurs before any `|`.
    fn eat_source_destination(
        &self,
        tokens: &mut TokenStream,
    ) -> Result<Option<SourceDestinationNode>, ParseError> {
        let mut gt_before_pipe = false;
        for t in &tokens.tokens()[tokens.position()..] {
            match t.kind {
                TokenKind::Gt => {
                    gt_before_pipe = true;
                    break;
                }
                TokenKind::Pipe => break,
                _ => {}
            }
        }
        if !gt_before_pipe {
            return Ok(None);
        }
        let Some(destination) = self.eat_destination_reference(tokens)? else {
            return Ok(None);
        };
        let gt = tokens.eat_kind(TokenKind::Gt)?;
        Ok(Some(SourceDestinationNode {
            destination,
            end: gt.end,
        }))
    }

    /// `'>' ':' dottedName` after the step list.
    fn eat_sink_destination(
        &self,
        tokens: &mut TokenStream,
    ) -> Result<Option<SinkDestinationNode>, ParseError> {
        if !tokens.peek_kind(TokenKind::Gt) {
            return Ok(None);
        }
        let gt = tokens.next()?;
        let Some(destination) = self.eat_destination_reference(tokens)? else {
            return Ok(None);
        };
        Ok(Some(SinkDestinationNode {
            destination,
            start: gt.start,
        }))
    }

    /// `':' identifier ('.' identifier)*`, all components adjacent.
    fn eat_destination_reference(
        &self,
        tokens: &mut TokenStream,
    ) -> Result<Option<DestinationNode>, ParseError> {
        let first = tokens.next()?;
        if !first.is_kind(TokenKind::Colon) {
            tokens.decrement_position();
            return Ok(None);
        }
        let Some(component) = peek_destination_component(tokens) else {
            return match tokens.peek() {
                None => Err(tokens.error(first.start, MessageCode::OutOfData, vec![])),
                Some(t) => Err(tokens.error(
                    t.start,
                    MessageCode::UnexpectedDataInDestinationName,
                    vec![t.text().to_string()],
                )),
            };
        };
        let start = component.start;
        let mut end = component.end;
        let mut name = component.text().to_string();
        tokens.next()?;
        while tokens.is_next_adjacent() {
            let Some(component) = peek_destination_component(tokens) else {
                break;
            };
            name.push_str(component.text());
            end = component.end;
            tokens.next()?;
        }
        while tokens.peek_kind(TokenKind::Dot) {
            if !tokens.is_next_adjacent() {
                let pos = tokens.peek().map(|t| t.start).unwrap_or(0);
                return Err(tokens.error(
                    pos,
                    MessageCode::NoWhitespaceInDestinationDefinition,
                    vec![],
                ));
            }
            tokens.next()?; // skip dot
            name.push('.');
            match tokens.peek() {
                None => {
                    let end = tokens.expression().chars().count();
                    return Err(tokens.error(end, MessageCode::OutOfData, vec![]));
                }
                Some(t) if !tokens.is_next_adjacent() => {
                    let pos = t.start;
                    return Err(tokens.error(
                        pos,
                        MessageCode::NoWhitespaceInDestinationDefinition,
                        vec![],
                    ));
                }
                Some(_) => {}
            }
            while tokens.is_next_adjacent() {
                let Some(component) = peek_destination_component(tokens) else {
                    break;
                };
                name.push_str(component.text());
                end = component.end;
                tokens.next()?;
            }
        }
        let args = eat_args(tokens)?;
        Ok(Some(DestinationNode {
            name,
            start,
            end,
            args,
        }))
    }
}

fn peek_destination_component(tokens: &TokenStream) -> Option<crate::lex::Token> {
    tokens
        .peek()
        .filter(|t| {
            matches!(
                t.kind,
                TokenKind::Identifier | TokenKind::Integer | TokenKind::Star
            )
        })
        .cloned()
}

/// True when no `|` remains from the cursor onwards.
fn no_more_pipes(tokens: &TokenStream) -> bool {
    tokens.tokens()[tokens.position()..]
        .iter()
        .all(|t| t.kind != TokenKind::Pipe)
}

/// True when the cursor points at a destination that directly follows a `>`.
fn looks_like_destination(tokens: &TokenStream) -> bool {
    tokens.peek_kind(TokenKind::Colon)
        && tokens
            .peek_at(-1)
            .is_some_and(|t| t.is_kind(TokenKind::Gt))
}

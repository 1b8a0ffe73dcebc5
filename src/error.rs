//! Message catalogue and positioned error types used across all phases.
//!
//! Every failure the engine can report carries a numeric message code, a
//! 0-based character offset into the source text and a fixed set of insert
//! strings. Callers should treat the codes (not the rendered text) as the
//! stable contract.

use thiserror::Error;

// =============================================================================
// MESSAGE CATALOGUE
// =============================================================================

/// The closed set of messages the engine can produce. Each message has a fixed
/// code number and an English template with `{n}` insert slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCode {
    // Pipeline grammar and shared lexing
    UnexpectedDataAfterPipeline,
    NoWhitespaceBeforeArgName,
    NoWhitespaceBeforeArgEquals,
    NoWhitespaceBeforeArgValue,
    MoreInputAfterPipeline,
    ExpectedArgumentValue,
    NonTerminatingDoubleQuotedString,
    NonTerminatingQuotedString,
    MissingCharacter,
    NotExpectedToken,
    OutOfData,
    UnexpectedEscapeChar,
    UnexpectedData,
    ExpectedStepName,
    ExpectedWhitespaceAfterStepBeforeArgument,
    IllegalPipelineName,
    IllegalDefinitionName,
    ExpectedDestinationPrefix,
    NoWhitespaceInDestinationDefinition,
    DuplicateLabel,
    NoWhitespaceInDottedName,
    ExpectedWhitespaceAfterLabelColon,
    ExpectedPipelineNameAfterLabelColon,

    // Composed grammar
    DoubleAndRequired,
    DoubleOrRequired,
    HyphenExpectedUseArrow,
    MissingTransitionArrow,
    UnquotedTransitionCheckMustBeNumber,
    NoLabelsOnParens,
    NoDoubleLabels,
    TransitionArrowMustBePrecededByCheck,
    SecondarySequencesMustBeNamed,
    LabelAlreadyInUse,
    TransitionTargetLabelUndefined,
    UnexpectedDataInDefinition,
    MoreInputAfterDefinition,
    LabelClashesWithStepName,
    StepNameClashesWithLabel,
    StepNameAlreadyInUse,
    SplitWithOneFlow,
    DoublePipeNotAllowedWithPipes,
    UnexpectedDataInDestinationName,
}

impl MessageCode {
    /// The numeric code rendered in front of the message, e.g. `158` in `158E`.
    pub fn code(self) -> u16 {
        match self {
            MessageCode::UnexpectedDataAfterPipeline => 100,
            MessageCode::NoWhitespaceBeforeArgName => 101,
            MessageCode::NoWhitespaceBeforeArgEquals => 102,
            MessageCode::NoWhitespaceBeforeArgValue => 103,
            MessageCode::MoreInputAfterPipeline => 104,
            MessageCode::ExpectedArgumentValue => 105,
            MessageCode::NonTerminatingDoubleQuotedString => 106,
            MessageCode::NonTerminatingQuotedString => 107,
            MessageCode::MissingCharacter => 108,
            MessageCode::NotExpectedToken => 111,
            MessageCode::OutOfData => 112,
            MessageCode::UnexpectedEscapeChar => 114,
            MessageCode::UnexpectedData => 115,
            MessageCode::ExpectedStepName => 118,
            MessageCode::ExpectedWhitespaceAfterStepBeforeArgument => 119,
            MessageCode::IllegalPipelineName => 122,
            MessageCode::IllegalDefinitionName => 123,
            MessageCode::ExpectedDestinationPrefix => 133,
            MessageCode::NoWhitespaceInDestinationDefinition => 139,
            MessageCode::DuplicateLabel => 143,
            MessageCode::NoWhitespaceInDottedName => 145,
            MessageCode::ExpectedWhitespaceAfterLabelColon => 147,
            MessageCode::ExpectedPipelineNameAfterLabelColon => 148,
            MessageCode::DoubleAndRequired => 150,
            MessageCode::DoubleOrRequired => 151,
            MessageCode::HyphenExpectedUseArrow => 152,
            MessageCode::MissingTransitionArrow => 153,
            MessageCode::UnquotedTransitionCheckMustBeNumber => 154,
            MessageCode::NoLabelsOnParens => 155,
            MessageCode::NoDoubleLabels => 156,
            MessageCode::TransitionArrowMustBePrecededByCheck => 157,
            MessageCode::SecondarySequencesMustBeNamed => 158,
            MessageCode::LabelAlreadyInUse => 159,
            MessageCode::TransitionTargetLabelUndefined => 160,
            MessageCode::UnexpectedDataInDefinition => 162,
            MessageCode::MoreInputAfterDefinition => 163,
            MessageCode::LabelClashesWithStepName => 164,
            MessageCode::StepNameClashesWithLabel => 165,
            MessageCode::StepNameAlreadyInUse => 166,
            MessageCode::SplitWithOneFlow => 167,
            MessageCode::DoublePipeNotAllowedWithPipes => 170,
            MessageCode::UnexpectedDataInDestinationName => 171,
        }
    }

    fn template(self) -> &'static str {
        match self {
            MessageCode::UnexpectedDataAfterPipeline => {
                "Found unexpected data after pipeline definition: '{0}'"
            }
            MessageCode::NoWhitespaceBeforeArgName => {
                "No whitespace allowed between '--' and option name"
            }
            MessageCode::NoWhitespaceBeforeArgEquals => {
                "No whitespace allowed after argument name and before '='"
            }
            MessageCode::NoWhitespaceBeforeArgValue => {
                "No whitespace allowed after '=' and before option value"
            }
            MessageCode::MoreInputAfterPipeline => {
                "After parsing a valid pipeline, there is still more data: '{0}'"
            }
            MessageCode::ExpectedArgumentValue => "Expected an argument value but was '{0}'",
            MessageCode::NonTerminatingDoubleQuotedString => {
                "Cannot find terminating \" for string"
            }
            MessageCode::NonTerminatingQuotedString => "Cannot find terminating ' for string",
            MessageCode::MissingCharacter => "missing expected character '{0}'",
            MessageCode::NotExpectedToken => "Unexpected token. Expected '{0}' but was '{1}'",
            MessageCode::OutOfData => "Unexpectedly ran out of input",
            MessageCode::UnexpectedEscapeChar => "unexpected escape character",
            MessageCode::UnexpectedData => "unexpected data in pipeline definition '{0}'",
            MessageCode::ExpectedStepName => "expected step name but found '{0}'",
            MessageCode::ExpectedWhitespaceAfterStepBeforeArgument => {
                "expected whitespace after step name and before argument"
            }
            MessageCode::IllegalPipelineName => "illegal name for a pipeline '{0}'",
            MessageCode::IllegalDefinitionName => "illegal name for a flow definition '{0}'",
            MessageCode::ExpectedDestinationPrefix => "Expected destination prefix but found '{0}'",
            MessageCode::NoWhitespaceInDestinationDefinition => {
                "no whitespace allowed between components in a destination name"
            }
            MessageCode::DuplicateLabel => {
                "label '{0}' should be unique but step '{1}' (at position {2}) and step '{3}' (at position {4}) both use it"
            }
            MessageCode::NoWhitespaceInDottedName => {
                "no whitespace is allowed between dot and components of a name"
            }
            MessageCode::ExpectedWhitespaceAfterLabelColon => {
                "whitespace is expected after a step label"
            }
            MessageCode::ExpectedPipelineNameAfterLabelColon => {
                "pipeline name is expected after a step label"
            }
            MessageCode::DoubleAndRequired => {
                "flow definitions require a pair of '&', not just one"
            }
            MessageCode::DoubleOrRequired => "flow definitions require a pair of '|'",
            MessageCode::HyphenExpectedUseArrow => "expected '->' and not just the hyphen",
            MessageCode::MissingTransitionArrow => {
                "expected '->' to follow state when specifying transition"
            }
            MessageCode::UnquotedTransitionCheckMustBeNumber => {
                "transition conditions must be quoted literals, numerics or '*' but '{0}' is not"
            }
            MessageCode::NoLabelsOnParens => "labels cannot be specified on parenthesized groups",
            MessageCode::NoDoubleLabels => "multiple labels are not supported",
            MessageCode::TransitionArrowMustBePrecededByCheck => {
                "transition arrow must be preceded by the exit code that should drive the transition"
            }
            MessageCode::SecondarySequencesMustBeNamed => {
                "secondary sequences must have labels or are unreachable"
            }
            MessageCode::LabelAlreadyInUse => "this label has already been defined",
            MessageCode::TransitionTargetLabelUndefined => {
                "transition specifies an undefined label"
            }
            MessageCode::UnexpectedDataInDefinition => "unexpected data in flow definition '{0}'",
            MessageCode::MoreInputAfterDefinition => {
                "after parsing a valid flow definition, there is still more data: '{0}'"
            }
            MessageCode::LabelClashesWithStepName => {
                "the label clashes with an existing unlabeled step name"
            }
            MessageCode::StepNameClashesWithLabel => {
                "the step name clashes with an existing label"
            }
            MessageCode::StepNameAlreadyInUse => {
                "duplicate step name. Use a label to ensure uniqueness"
            }
            MessageCode::SplitWithOneFlow => {
                "unnecessary use of split construct when only one flow to execute in parallel"
            }
            MessageCode::DoublePipeNotAllowedWithPipes => {
                "do not use '||' between steps in a pipeline, use '|'"
            }
            MessageCode::UnexpectedDataInDestinationName => {
                "unexpected data in destination name '{0}'"
            }
        }
    }

    /// Render `"{code}E:(pos {pos}): {text}"` with the inserts substituted.
    pub fn format_message(self, position: usize, inserts: &[String]) -> String {
        let mut text = self.template().to_string();
        for (i, insert) in inserts.iter().enumerate() {
            text = text.replace(&format!("{{{}}}", i), insert);
        }
        format!("{}E:(pos {}): {}", self.code(), position, text)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// A grammar or lexing failure. Parsing aborts on the first one; there is no
/// partial AST and no recovery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.message())]
pub struct ParseError {
    pub code: MessageCode,
    /// 0-based character offset into the text that was being parsed.
    pub position: usize,
    pub inserts: Vec<String>,
    /// The text that was being parsed, kept for the caret rendering.
    pub dsl: String,
}

impl ParseError {
    pub fn new(dsl: &str, position: usize, code: MessageCode, inserts: Vec<String>) -> Self {
        ParseError {
            code,
            position,
            inserts,
            dsl: dsl.to_string(),
        }
    }

    /// One-line rendering, e.g. `151E:(pos 4): flow definitions require a pair of '|'`.
    pub fn message(&self) -> String {
        self.code.format_message(self.position, &self.inserts)
    }

    /// One-line rendering followed by the source line at the offset with a
    /// caret under the failing position.
    pub fn message_with_context(&self) -> String {
        with_context(&self.message(), &self.dsl, self.position)
    }
}

/// A problem found while validating a syntactically valid AST. Problems are
/// collected, not thrown, so a caller can still inspect the AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationProblem {
    pub code: MessageCode,
    pub position: usize,
    /// The definition text the problem was found in.
    pub dsl: String,
}

impl ValidationProblem {
    pub fn new(dsl: &str, position: usize, code: MessageCode) -> Self {
        ValidationProblem {
            code,
            position,
            dsl: dsl.to_string(),
        }
    }

    pub fn message(&self) -> String {
        self.code.format_message(self.position, &[])
    }

    pub fn message_with_context(&self) -> String {
        with_context(&self.message(), &self.dsl, self.position)
    }
}

impl std::fmt::Display for ValidationProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Fail-fast wrapper around one or more validation problems, raised by
/// `parse(.., validate: true)` when the AST is semantically incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.message())]
pub struct ValidationFailure {
    pub problems: Vec<ValidationProblem>,
}

impl ValidationFailure {
    pub fn message(&self) -> String {
        self.problems
            .iter()
            .map(ValidationProblem::message)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Either failure mode of the parse entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DslError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
}

/// A structural problem discovered while reconstructing DSL text from a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("graph is malformed - problems finding START and END nodes")]
    MissingTerminals,
    #[error("unable to find end of split")]
    NoSplitJoin,
}

/// Append the source line containing `position` plus a caret marker.
fn with_context(message: &str, dsl: &str, position: usize) -> String {
    let chars: Vec<char> = dsl.chars().collect();
    let mut line_start = 0;
    let mut line_end = chars.len();
    for (i, ch) in chars.iter().enumerate() {
        if *ch == '\n' {
            if i < position {
                line_start = i + 1;
            } else {
                line_end = i;
                break;
            }
        }
    }
    let line: String = chars[line_start..line_end].iter().collect();
    let caret_col = position.saturating_sub(line_start);
    format!("{}\n{}\n{}^\n", message, line, " ".repeat(caret_col))
}

//! AST node model for composed flow definitions.
//!
//! A definition is one or more `;`/newline-separated sequences; each sequence
//! is a tree of flows (`&&`-joined), splits (`||`-joined branches) and steps.
//! Nodes are immutable once parsed; visitors never mutate them.

pub mod pipeline;
pub mod visit;

use std::collections::BTreeMap;

use crate::error::ValidationProblem;
use crate::exec::{ExecutableDslRenderer, ExecutableStep, StepCollector};
use crate::graph::Graph;
use crate::graph::builder::GraphBuilder;
use crate::validate::DefinitionValidator;

use visit::Visitor;

// =============================================================================
// LEAF PIECES
// =============================================================================

/// A label attached to a step, split or sequence, e.g. `foo:` in `foo: appA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

/// A `--name=value` argument. The value is stored unquoted/unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentNode {
    pub name: String,
    pub value: String,
    pub start: usize,
    pub end: usize,
}

// =============================================================================
// NODES
// =============================================================================

/// A single named unit of work, optionally labelled, with arguments and
/// exit-status transitions. Always a leaf of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepNode {
    pub label: Option<Label>,
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub args: Vec<ArgumentNode>,
    pub transitions: Vec<TransitionNode>,
}

impl StepNode {
    pub fn label_string(&self) -> Option<&str> {
        self.label.as_ref().map(|l| l.name.as_str())
    }

    pub fn has_label(&self) -> bool {
        self.label.is_some()
    }

    pub fn has_transitions(&self) -> bool {
        !self.transitions.is_empty()
    }

    pub fn args_as_map(&self) -> BTreeMap<String, String> {
        self.args
            .iter()
            .map(|a| (a.name.clone(), a.value.clone()))
            .collect()
    }

    pub fn stringify(&self) -> String {
        self.stringify_with_positions(false)
    }

    pub fn stringify_with_positions(&self, include_positions: bool) -> String {
        let mut s = String::new();
        if let Some(label) = &self.label {
            s.push_str(&label.name);
            s.push_str(": ");
        }
        s.push_str(&self.name);
        for arg in &self.args {
            s.push_str(" --");
            s.push_str(&arg.name);
            s.push('=');
            s.push_str(&quote_if_necessary(&arg.value));
        }
        for transition in &self.transitions {
            s.push(' ');
            s.push_str(&transition.stringify());
        }
        if include_positions {
            s.push_str(&format!(":{}>{}", self.start, self.end));
        }
        s
    }
}

/// Reserved transition target meaning "terminate the whole definition
/// successfully".
pub const END_TARGET: &str = "$END";

/// Reserved transition target meaning "terminate the whole definition as
/// failed".
pub const FAIL_TARGET: &str = "$FAIL";

/// Where a transition goes: another step or a label reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionTarget {
    Step(StepNode),
    Label { name: String, start: usize, end: usize },
}

/// `STATUS->TARGET` on a step. An unquoted status refers to the step's exit
/// code (`*` meaning any); a quoted status refers to its exit status text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionNode {
    /// The status with quotes removed.
    pub status: String,
    /// True when the status was unquoted (an exit code check).
    pub exit_code_check: bool,
    pub start: usize,
    pub end: usize,
    pub target: TransitionTarget,
}

impl TransitionNode {
    /// The status as it appeared in the DSL: quoted for status checks, bare
    /// for exit-code checks.
    pub fn status_in_dsl_form(&self) -> String {
        if self.exit_code_check {
            self.status.clone()
        } else {
            format!("'{}'", self.status)
        }
    }

    pub fn is_target_step(&self) -> bool {
        matches!(self.target, TransitionTarget::Step(_))
    }

    pub fn target_step(&self) -> Option<&StepNode> {
        match &self.target {
            TransitionTarget::Step(s) => Some(s),
            TransitionTarget::Label { .. } => None,
        }
    }

    pub fn target_label(&self) -> Option<&str> {
        match &self.target {
            TransitionTarget::Label { name, .. } => Some(name),
            TransitionTarget::Step(_) => None,
        }
    }

    /// True when the target is one of the reserved terminal states.
    pub fn is_special(&self) -> bool {
        self.is_end() || self.is_fail()
    }

    pub fn is_end(&self) -> bool {
        self.target_step().is_some_and(|s| s.name == END_TARGET)
    }

    pub fn is_fail(&self) -> bool {
        self.target_step().is_some_and(|s| s.name == FAIL_TARGET)
    }

    pub fn stringify(&self) -> String {
        let target = match &self.target {
            TransitionTarget::Step(step) => step.stringify(),
            TransitionTarget::Label { name, .. } => format!(":{}", name),
        };
        format!("{}->{}", self.status_in_dsl_form(), target)
    }
}

/// An ordered sequential composition joined by `&&`. A flow's series never
/// directly contains another flow; the parser flattens nesting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowNode {
    pub label: Option<Label>,
    pub series: Vec<LabelledNode>,
    pub start: usize,
    pub end: usize,
}

/// A parallel composition of two or more flows joined by `||`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitNode {
    pub label: Option<Label>,
    pub series: Vec<LabelledNode>,
    pub start: usize,
    pub end: usize,
}

impl SplitNode {
    pub fn stringify(&self) -> String {
        let mut s = String::new();
        if let Some(label) = &self.label {
            s.push_str(&label.name);
            s.push_str(": ");
        }
        s.push('<');
        let branches: Vec<String> = self.series.iter().map(LabelledNode::stringify).collect();
        s.push_str(&branches.join(" || "));
        s.push('>');
        s
    }
}

/// Any node that can carry a label: the sum of the three node kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelledNode {
    Flow(FlowNode),
    Split(SplitNode),
    Step(StepNode),
}

impl LabelledNode {
    pub fn label(&self) -> Option<&Label> {
        match self {
            LabelledNode::Flow(f) => f.label.as_ref(),
            LabelledNode::Split(s) => s.label.as_ref(),
            LabelledNode::Step(s) => s.label.as_ref(),
        }
    }

    pub fn label_string(&self) -> Option<&str> {
        self.label().map(|l| l.name.as_str())
    }

    pub fn has_label(&self) -> bool {
        self.label().is_some()
    }

    pub fn set_label(&mut self, label: Option<Label>) {
        let slot = match self {
            LabelledNode::Flow(f) => &mut f.label,
            LabelledNode::Split(s) => &mut s.label,
            LabelledNode::Step(s) => &mut s.label,
        };
        *slot = label;
    }

    pub fn start_pos(&self) -> usize {
        match self {
            LabelledNode::Flow(f) => f.start,
            LabelledNode::Split(s) => s.start,
            LabelledNode::Step(s) => s.start,
        }
    }

    pub fn end_pos(&self) -> usize {
        match self {
            LabelledNode::Flow(f) => f.end,
            LabelledNode::Split(s) => s.end,
            LabelledNode::Step(s) => s.end,
        }
    }

    pub fn is_flow(&self) -> bool {
        matches!(self, LabelledNode::Flow(_))
    }

    pub fn is_split(&self) -> bool {
        matches!(self, LabelledNode::Split(_))
    }

    pub fn is_step(&self) -> bool {
        matches!(self, LabelledNode::Step(_))
    }

    /// The child series of a flow or split; a step has none.
    pub fn series(&self) -> &[LabelledNode] {
        match self {
            LabelledNode::Flow(f) => &f.series,
            LabelledNode::Split(s) => &s.series,
            LabelledNode::Step(_) => &[],
        }
    }

    pub fn series_element(&self, index: usize) -> &LabelledNode {
        &self.series()[index]
    }

    pub fn stringify(&self) -> String {
        match self {
            // A flow's label is mirrored onto its first element, which prints it.
            LabelledNode::Flow(f) => {
                let parts: Vec<String> = f.series.iter().map(LabelledNode::stringify).collect();
                parts.join(" && ")
            }
            LabelledNode::Split(s) => s.stringify(),
            LabelledNode::Step(s) => s.stringify(),
        }
    }
}

// =============================================================================
// DEFINITION ROOT
// =============================================================================

/// The root of a parsed composed definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowDefinition {
    pub name: String,
    pub dsl: String,
    pub sequences: Vec<LabelledNode>,
}

impl FlowDefinition {
    /// Walk the AST depth-first, sequence by sequence.
    pub fn accept<V: Visitor>(&self, visitor: &mut V) {
        visitor.start_visit(&self.name, &self.dsl);
        for (number, sequence) in self.sequences.iter().enumerate() {
            if visitor.pre_visit_sequence(sequence, number) {
                sequence.accept(visitor);
                visitor.post_visit_sequence(sequence, number);
            }
        }
        visitor.end_visit();
    }

    /// Canonical DSL text: single spaces, minimal parentheses, sequences on
    /// their own lines.
    pub fn stringify(&self) -> String {
        self.sequences
            .iter()
            .map(LabelledNode::stringify)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The definition compiled to its numbered directed graph form.
    pub fn to_graph(&self) -> Graph {
        let mut builder = GraphBuilder::new();
        self.accept(&mut builder);
        builder.graph()
    }

    /// Structural problems in the definition, empty when none.
    pub fn validate(&self) -> Vec<ValidationProblem> {
        let mut validator = DefinitionValidator::new();
        self.accept(&mut validator);
        validator.into_problems()
    }

    /// The ordered list of launchable step records (see `exec`).
    pub fn executable_steps(&self) -> Vec<ExecutableStep> {
        let mut collector = StepCollector::new();
        self.accept(&mut collector);
        collector.into_steps()
    }

    /// The definition re-rendered with every step renamed to its executable
    /// name and arguments dropped.
    pub fn to_executable_dsl(&self) -> String {
        let mut renderer = ExecutableDslRenderer::new();
        self.accept(&mut renderer);
        renderer.into_dsl()
    }

    /// The first node of the first sequence, the definition's entry point.
    pub fn start(&self) -> Option<&LabelledNode> {
        self.sequences.first()
    }

    /// The sequence carrying the given label, if any.
    pub fn sequence_with_label(&self, label: &str) -> Option<&LabelledNode> {
        self.sequences
            .iter()
            .find(|s| s.label_string() == Some(label))
    }

    /// True unless the definition is a single unlabelled, transition-free
    /// step.
    pub fn is_composed(&self) -> bool {
        let only_step = match self.sequences.as_slice() {
            [LabelledNode::Flow(f)] => match f.series.as_slice() {
                [LabelledNode::Step(s)] => Some(s),
                _ => None,
            },
            _ => None,
        };
        match only_step {
            Some(step) => step.has_transitions(),
            None => true,
        }
    }

    /// The single step of a non-composed definition.
    pub fn step(&self) -> Option<&StepNode> {
        if self.is_composed() {
            return None;
        }
        match &self.sequences[0] {
            LabelledNode::Flow(f) => match &f.series[0] {
                LabelledNode::Step(s) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Quote an argument value when rendering it back to DSL text would otherwise
/// change how it lexes.
pub(crate) fn quote_if_necessary(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| matches!(c, ' ' | '\t' | '|' | ';' | '>' | '&'))
        && !value.starts_with('\'');
    if needs_quotes {
        format!("'{}'", value)
    } else {
        value.to_string()
    }
}

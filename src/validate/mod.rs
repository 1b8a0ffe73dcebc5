//! Validation of a parsed composed definition.
//!
//! Problems are collected with positions rather than thrown, so a caller can
//! obtain a best-effort AST for an invalid definition and still show every
//! problem at once.

use std::collections::HashSet;

use crate::ast::visit::Visitor;
use crate::ast::{LabelledNode, SplitNode, StepNode, TransitionNode};
use crate::error::{MessageCode, ValidationProblem};

/// Visitor that checks label usage, step-name uniqueness, split arity and
/// sequence reachability over one definition.
pub struct DefinitionValidator {
    dsl: String,
    problems: Vec<ValidationProblem>,
    labels: HashSet<String>,
    unlabelled_names: HashSet<String>,
    /// Label references made by transitions, resolved once every label has
    /// been seen.
    label_references: Vec<(String, usize)>,
}

impl DefinitionValidator {
    pub fn new() -> Self {
        DefinitionValidator {
            dsl: String::new(),
            problems: Vec::new(),
            labels: HashSet::new(),
            unlabelled_names: HashSet::new(),
            label_references: Vec::new(),
        }
    }

    pub fn has_problems(&self) -> bool {
        !self.problems.is_empty()
    }

    pub fn into_problems(self) -> Vec<ValidationProblem> {
        self.problems
    }

    fn problem(&mut self, position: usize, code: MessageCode) {
        self.problems
            .push(ValidationProblem::new(&self.dsl, position, code));
    }

    /// Apply the label/name clash rules to a step, including steps that only
    /// appear as transition targets.
    fn check_step(&mut self, step: &StepNode) {
        match &step.label {
            Some(label) => {
                if self.labels.contains(&label.name) {
                    self.problem(label.start, MessageCode::LabelAlreadyInUse);
                } else if self.unlabelled_names.contains(&label.name) {
                    self.problem(label.start, MessageCode::LabelClashesWithStepName);
                }
                self.labels.insert(label.name.clone());
            }
            None => {
                if self.labels.contains(&step.name) {
                    self.problem(step.start, MessageCode::StepNameClashesWithLabel);
                } else if self.unlabelled_names.contains(&step.name) {
                    self.problem(step.start, MessageCode::StepNameAlreadyInUse);
                } else {
                    self.unlabelled_names.insert(step.name.clone());
                }
            }
        }
    }
}

impl Default for DefinitionValidator {
    fn default() -> Self {
        DefinitionValidator::new()
    }
}

impl Visitor for DefinitionValidator {
    fn start_visit(&mut self, _name: &str, dsl: &str) {
        self.dsl = dsl.to_string();
    }

    fn pre_visit_sequence(&mut self, node: &LabelledNode, sequence_number: usize) -> bool {
        if sequence_number > 0 && !node.has_label() {
            self.problem(
                node.start_pos(),
                MessageCode::SecondarySequencesMustBeNamed,
            );
        }
        true
    }

    fn visit_split(&mut self, split: &SplitNode) {
        if split.series.len() == 1 {
            self.problem(split.start, MessageCode::SplitWithOneFlow);
        }
        if let Some(label) = &split.label {
            if self.labels.contains(&label.name) {
                self.problem(label.start, MessageCode::LabelAlreadyInUse);
            } else {
                self.labels.insert(label.name.clone());
            }
        }
    }

    fn visit_step(&mut self, step: &StepNode) {
        self.check_step(step);
    }

    fn visit_transition(&mut self, transition: &TransitionNode) {
        if let Some(label) = transition.target_label() {
            let position = match &transition.target {
                crate::ast::TransitionTarget::Label { start, .. } => *start,
                crate::ast::TransitionTarget::Step(_) => transition.start,
            };
            self.label_references.push((label.to_string(), position));
        } else if let Some(target) = transition.target_step() {
            // Reserved terminals are not real steps and never clash.
            if !transition.is_special() {
                self.check_step(target);
            }
        }
    }

    fn end_visit(&mut self) {
        // Labels form one global namespace across all sequences, so forward
        // and cross-sequence references are only checkable now.
        let references = std::mem::take(&mut self.label_references);
        for (label, position) in references {
            if !self.labels.contains(&label) {
                self.problem(position, MessageCode::TransitionTargetLabelUndefined);
            }
        }
    }
}

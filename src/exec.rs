//! Project a validated definition into the form an external launcher consumes.
//!
//! Every step is renamed to `"{definition}-{label-or-name}"` so each becomes
//! an independently named unit of work, and the tree is flattened into an
//! ordered record list. The same renaming also renders as DSL text for
//! launchers that re-parse.

use std::collections::BTreeMap;

use crate::ast::visit::Visitor;
use crate::ast::{FlowNode, SplitNode, StepNode, TransitionNode};

/// One launchable unit of work projected from a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableStep {
    /// `{definition}-{label-or-name}`
    pub executable_name: String,
    /// The step name as written in the DSL.
    pub name: String,
    pub label: Option<String>,
    pub args: BTreeMap<String, String>,
}

fn executable_name(definition: &str, step: &StepNode) -> String {
    let suffix = step.label_string().unwrap_or(&step.name);
    format!("{}-{}", definition, suffix)
}

// =============================================================================
// RECORD COLLECTOR
// =============================================================================

/// Collects every step in visit order, including transition targets (the
/// reserved `$END`/`$FAIL` terminals are states, not steps, and are skipped).
pub struct StepCollector {
    definition_name: String,
    steps: Vec<ExecutableStep>,
}

impl StepCollector {
    pub fn new() -> Self {
        StepCollector {
            definition_name: String::new(),
            steps: Vec::new(),
        }
    }

    pub fn into_steps(self) -> Vec<ExecutableStep> {
        self.steps
    }

    fn push(&mut self, step: &StepNode) {
        self.steps.push(ExecutableStep {
            executable_name: executable_name(&self.definition_name, step),
            name: step.name.clone(),
            label: step.label_string().map(str::to_string),
            args: step.args_as_map(),
        });
    }
}

impl Default for StepCollector {
    fn default() -> Self {
        StepCollector::new()
    }
}

impl Visitor for StepCollector {
    fn start_visit(&mut self, name: &str, _dsl: &str) {
        self.definition_name = name.to_string();
    }

    fn visit_step(&mut self, step: &StepNode) {
        self.push(step);
    }

    fn visit_transition(&mut self, transition: &TransitionNode) {
        if transition.is_special() {
            return;
        }
        if let Some(target) = transition.target_step() {
            self.push(target);
        }
    }
}

// =============================================================================
// DSL RENDERER
// =============================================================================

const START_OF_FLOW: u8 = 0;
const START_OF_SPLIT: u8 = 1;
const IN_FLOW: u8 = 2;
const IN_SPLIT: u8 = 3;

/// Renders the definition with executable step names and without arguments.
pub struct ExecutableDslRenderer {
    definition_name: String,
    dsl: String,
    state: Vec<u8>,
}

impl ExecutableDslRenderer {
    pub fn new() -> Self {
        ExecutableDslRenderer {
            definition_name: String::new(),
            dsl: String::new(),
            state: Vec::new(),
        }
    }

    pub fn into_dsl(self) -> String {
        self.dsl
    }

    fn step_name(&self, step: &StepNode) -> String {
        executable_name(&self.definition_name, step)
    }
}

impl Default for ExecutableDslRenderer {
    fn default() -> Self {
        ExecutableDslRenderer::new()
    }
}

impl Visitor for ExecutableDslRenderer {
    fn start_visit(&mut self, name: &str, _dsl: &str) {
        self.definition_name = name.to_string();
    }

    fn pre_visit_flow(&mut self, _flow: &FlowNode) -> bool {
        if self.state.last() == Some(&IN_SPLIT) {
            self.dsl.push_str(" || ");
        }
        self.state.push(START_OF_FLOW);
        true
    }

    fn post_visit_flow(&mut self, _flow: &FlowNode) {
        self.state.pop();
        // Leaving the first branch moves the surrounding split along
        if self.state.last() == Some(&START_OF_SPLIT) {
            self.state.pop();
            self.state.push(IN_SPLIT);
        }
    }

    fn pre_visit_split(&mut self, _split: &SplitNode) -> bool {
        match self.state.last() {
            Some(&START_OF_FLOW) => {
                self.state.pop();
                self.state.push(IN_FLOW);
            }
            Some(&IN_FLOW) => {
                self.dsl.push_str(" && ");
            }
            _ => {}
        }
        self.state.push(START_OF_SPLIT);
        self.dsl.push('<');
        true
    }

    fn post_visit_split(&mut self, _split: &SplitNode) {
        self.dsl.push('>');
        self.state.pop();
    }

    fn visit_step(&mut self, step: &StepNode) {
        match self.state.last() {
            Some(&START_OF_FLOW) => {
                self.state.pop();
                self.state.push(IN_FLOW);
            }
            Some(&IN_FLOW) => {
                self.dsl.push_str(" && ");
            }
            _ => {}
        }
        let name = self.step_name(step);
        self.dsl.push_str(&name);
        for transition in &step.transitions {
            self.dsl.push(' ');
            self.dsl.push_str(&transition.status_in_dsl_form());
            self.dsl.push_str("->");
            match transition.target_step() {
                Some(target) => {
                    let rendered = if transition.is_special() {
                        target.name.clone()
                    } else {
                        self.step_name(target)
                    };
                    self.dsl.push_str(&rendered);
                }
                None => {
                    if let Some(label) = transition.target_label() {
                        self.dsl.push(':');
                        self.dsl.push_str(label);
                    }
                }
            }
        }
    }
}

//! AST node model for the simple pipeline grammar.
//!
//! A pipeline is a single linear chain of steps joined by `|`, optionally
//! fed from a named source destination and/or draining into a sink
//! destination. There is no branching; the composed grammar covers that.

use std::collections::BTreeMap;

use super::{ArgumentNode, Label, quote_if_necessary};

/// A step in a pipeline: `(label ':')? name (--arg=value)*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStepNode {
    pub label: Option<Label>,
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub args: Vec<ArgumentNode>,
}

impl PipelineStepNode {
    /// The step's effective label: its explicit label, or its bare name.
    /// Effective labels must be unique within a pipeline.
    pub fn label_name(&self) -> &str {
        match &self.label {
            Some(l) => &l.name,
            None => &self.name,
        }
    }

    pub fn args_as_map(&self) -> BTreeMap<String, String> {
        self.args
            .iter()
            .map(|a| (a.name.clone(), a.value.clone()))
            .collect()
    }

    pub fn stringify(&self) -> String {
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
        s
    }
}

/// A named destination reference, e.g. `:orders` or `:orders.audit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationNode {
    /// Dotted name as written, without the leading colon.
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub args: Vec<ArgumentNode>,
}

/// `':' name '>'` in front of the first step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDestinationNode {
    pub destination: DestinationNode,
    pub end: usize,
}

/// `'>' ':' name` after the last step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkDestinationNode {
    pub destination: DestinationNode,
    pub start: usize,
}

/// The root of a parsed pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineNode {
    /// Name given by the caller or embedded as `name = …`.
    pub name: Option<String>,
    pub dsl: String,
    pub source: Option<SourceDestinationNode>,
    pub steps: Vec<PipelineStepNode>,
    pub sink: Option<SinkDestinationNode>,
}

impl PipelineNode {
    pub fn step_named(&self, name: &str) -> Option<&PipelineStepNode> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn stringify(&self) -> String {
        let mut s = String::new();
        if let Some(source) = &self.source {
            s.push_str(&format!(":{} > ", source.destination.name));
        }
        let steps: Vec<String> = self.steps.iter().map(PipelineStepNode::stringify).collect();
        s.push_str(&steps.join(" | "));
        if let Some(sink) = &self.sink {
            s.push_str(&format!(" > :{}", sink.destination.name));
        }
        s
    }
}

//! Depth-first traversal contract over the composed AST.
//!
//! Implementors override only the callbacks they care about; the `pre_visit_*`
//! hooks return `false` to skip a subtree. Traversal state lives on the
//! visitor itself so a visitor instance is single-use but the AST stays
//! shareable.

use super::{FlowNode, LabelledNode, SplitNode, StepNode, TransitionNode};

#[allow(unused_variables)]
pub trait Visitor {
    fn start_visit(&mut self, name: &str, dsl: &str) {}
    fn end_visit(&mut self) {}

    /// Called before each top-level sequence; return `false` to skip it.
    fn pre_visit_sequence(&mut self, node: &LabelledNode, sequence_number: usize) -> bool {
        true
    }
    fn post_visit_sequence(&mut self, node: &LabelledNode, sequence_number: usize) {}

    fn pre_visit_flow(&mut self, flow: &FlowNode) -> bool {
        true
    }
    fn visit_flow(&mut self, flow: &FlowNode) {}
    fn post_visit_flow(&mut self, flow: &FlowNode) {}

    fn pre_visit_split(&mut self, split: &SplitNode) -> bool {
        true
    }
    fn visit_split(&mut self, split: &SplitNode) {}
    fn post_visit_split(&mut self, split: &SplitNode) {}

    fn pre_visit_step(&mut self, step: &StepNode) -> bool {
        true
    }
    fn visit_step(&mut self, step: &StepNode) {}
    fn post_visit_step(&mut self, step: &StepNode) {}

    fn pre_visit_transition(&mut self, transition: &TransitionNode) -> bool {
        true
    }
    fn visit_transition(&mut self, transition: &TransitionNode) {}
    fn post_visit_transition(&mut self, transition: &TransitionNode) {}
}

impl LabelledNode {
    /// Drive a visitor over this node and everything beneath it.
    pub fn accept<V: Visitor>(&self, visitor: &mut V) {
        match self {
            LabelledNode::Flow(flow) => {
                if visitor.pre_visit_flow(flow) {
                    visitor.visit_flow(flow);
                    for node in &flow.series {
                        node.accept(visitor);
                    }
                    visitor.post_visit_flow(flow);
                }
            }
            LabelledNode::Split(split) => {
                if visitor.pre_visit_split(split) {
                    visitor.visit_split(split);
                    for node in &split.series {
                        node.accept(visitor);
                    }
                    visitor.post_visit_split(split);
                }
            }
            LabelledNode::Step(step) => {
                if visitor.pre_visit_step(step) {
                    visitor.visit_step(step);
                    for transition in &step.transitions {
                        if visitor.pre_visit_transition(transition) {
                            visitor.visit_transition(transition);
                            visitor.post_visit_transition(transition);
                        }
                    }
                    visitor.post_visit_step(step);
                }
            }
        }
    }
}

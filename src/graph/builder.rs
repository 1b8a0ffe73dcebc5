//! Compile a composed AST into its numbered graph form.
//!
//! Most of the subtlety is label handling: a transition may point at a node
//! already visited in the same flow, at a node appearing later in the same
//! flow, or at a labelled secondary sequence, which is inlined as a fresh copy
//! reachable only through the transition links. Node reuse for transition
//! targets is scoped to the enclosing flow, so the same target named in two
//! split branches becomes two distinct nodes.

use std::collections::HashMap;

use crate::ast::visit::Visitor;
use crate::ast::{FlowNode, LabelledNode, SplitNode, StepNode, TransitionNode};

use super::{END_NODE, Graph, GraphLink, GraphNode, START_NODE, SYNC_NODE};

/// A flow is identified by its source span; spans of distinct flow nodes never
/// coincide.
type FlowKey = (usize, usize);

/// A label reference that could not be resolved at the point it was seen.
#[derive(Debug, Clone)]
struct PendingTransition {
    /// The node the transition leaves from.
    node_id: usize,
    /// The status check driving it.
    on_state: String,
    /// The label it must reach.
    label: String,
    /// Last node of the flow the transition occurred in; an inlined sequence
    /// rejoins wherever this node's output went.
    last_node_id: usize,
    /// The flow the transition occurred in.
    flow: FlowKey,
}

/// Everything accumulated for one top-level sequence during the visit.
struct SequenceAccumulator {
    label: Option<String>,
    nodes: Vec<GraphNode>,
    links: Vec<GraphLink>,
    /// Transitions made inside this sequence that are still unsatisfied.
    outstanding: Vec<PendingTransition>,
    /// Labelled node ids per flow, for cross-sequence resolution.
    labelled_nodes_in_flow: HashMap<FlowKey, HashMap<String, usize>>,
    primary_flow: Option<FlowKey>,
}

impl SequenceAccumulator {
    fn new(label: Option<String>, start_node: GraphNode) -> Self {
        SequenceAccumulator {
            label,
            nodes: vec![start_node],
            links: Vec::new(),
            outstanding: Vec::new(),
            labelled_nodes_in_flow: HashMap::new(),
            primary_flow: None,
        }
    }
}

/// Visit state for one enclosing flow or split.
struct Context {
    is_flow: bool,
    start_node_id: usize,
    /// Nodes whose outputs still need joining to whatever comes next. One for
    /// a flow, one per branch for a split.
    dangling: Vec<usize>,
    labelled_nodes: HashMap<String, usize>,
    /// Transition-created nodes that exit the flow alongside its tail.
    other_exits: Vec<usize>,
    /// Unresolved label references within this flow.
    pending: Vec<(usize, String, String)>,
    /// Transition-target reuse map: (label, name, args) → node id. Reset at
    /// each split-branch boundary because branches never share target nodes.
    extra_nodes: HashMap<String, usize>,
}

impl Context {
    fn new(is_flow: bool, start_node_id: usize) -> Self {
        Context {
            is_flow,
            start_node_id,
            dangling: Vec::new(),
            labelled_nodes: HashMap::new(),
            other_exits: Vec::new(),
            pending: Vec::new(),
            extra_nodes: HashMap::new(),
        }
    }
}

pub struct GraphBuilder {
    next_node_id: usize,
    contexts: Vec<Context>,
    sequences: Vec<SequenceAccumulator>,
    current_sequence: usize,
    /// Id of the step node most recently visited; transitions hang off it.
    current_step_id: usize,
    /// Target-reuse map used when the enclosing context is a split branch
    /// visited without a wrapping flow.
    scratch_extra: HashMap<String, usize>,
    use_flow_extra: bool,
}

impl GraphBuilder {
    pub fn new() -> Self {
        GraphBuilder {
            next_node_id: 0,
            contexts: Vec::new(),
            sequences: Vec::new(),
            current_sequence: 0,
            current_step_id: 0,
            scratch_extra: HashMap::new(),
            use_flow_extra: true,
        }
    }

    /// The finished graph: the main sequence's nodes and links, with every
    /// referenced secondary sequence inlined.
    pub fn graph(mut self) -> Graph {
        if self.sequences.is_empty() {
            return Graph::new(
                vec![GraphNode::new(0, START_NODE), GraphNode::new(1, END_NODE)],
                vec![GraphLink::new(0, 1)],
            );
        }
        let main = self.sequences.swap_remove(0);
        Graph::new(main.nodes, main.links)
    }

    fn next_id(&mut self) -> usize {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    fn add_node(&mut self, node: GraphNode) {
        self.sequences[self.current_sequence].nodes.push(node);
    }

    fn add_link(&mut self, link: GraphLink) {
        self.sequences[self.current_sequence].links.push(link);
    }

    fn find_or_make_reusable(&mut self, key: &str, make: impl FnOnce(usize) -> GraphNode) -> (usize, bool) {
        let map = if self.use_flow_extra {
            match self.contexts.last_mut() {
                Some(ctx) => &mut ctx.extra_nodes,
                None => &mut self.scratch_extra,
            }
        } else {
            &mut self.scratch_extra
        };
        if let Some(&id) = map.get(key) {
            return (id, false);
        }
        let id = self.next_node_id;
        self.next_node_id += 1;
        let node = make(id);
        let map = if self.use_flow_extra {
            match self.contexts.last_mut() {
                Some(ctx) => &mut ctx.extra_nodes,
                None => &mut self.scratch_extra,
            }
        } else {
            &mut self.scratch_extra
        };
        map.insert(key.to_string(), id);
        self.add_node(node);
        (id, true)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        GraphBuilder::new()
    }
}

impl Visitor for GraphBuilder {
    fn pre_visit_sequence(&mut self, node: &LabelledNode, sequence_number: usize) -> bool {
        let start_id = self.next_id();
        let start_node = GraphNode::new(start_id, START_NODE);
        self.current_sequence = sequence_number;
        self.sequences.push(SequenceAccumulator::new(
            node.label_string().map(str::to_string),
            start_node,
        ));
        self.contexts.push(Context::new(true, start_id));
        true
    }

    fn post_visit_sequence(&mut self, _node: &LabelledNode, _sequence_number: usize) {
        let end_id = self.next_id();
        let dangling = match self.contexts.last() {
            Some(ctx) => ctx.dangling.clone(),
            None => Vec::new(),
        };
        for open in dangling {
            self.add_link(GraphLink::new(open, end_id));
        }
        self.add_node(GraphNode::new(end_id, END_NODE));
        self.contexts.pop();
    }

    fn pre_visit_flow(&mut self, flow: &FlowNode) -> bool {
        let start = match self.contexts.last() {
            Some(ctx) => ctx.start_node_id,
            None => 0,
        };
        self.contexts.push(Context::new(true, start));
        self.sequences[self.current_sequence].primary_flow = Some((flow.start, flow.end));
        true
    }

    fn post_visit_flow(&mut self, flow: &FlowNode) {
        let Some(ctx) = self.contexts.pop() else {
            return;
        };
        let flow_key = (flow.start, flow.end);
        let last_node_id = ctx.dangling.first().copied().unwrap_or(ctx.start_node_id);
        let sequence = &mut self.sequences[self.current_sequence];
        for (node_id, on_state, label) in ctx.pending {
            sequence.outstanding.push(PendingTransition {
                node_id,
                on_state,
                label,
                last_node_id,
                flow: flow_key,
            });
        }
        sequence
            .labelled_nodes_in_flow
            .insert(flow_key, ctx.labelled_nodes);
        if let Some(parent) = self.contexts.last_mut() {
            parent.dangling.extend(ctx.dangling);
            parent.dangling.extend(ctx.other_exits);
        }
    }

    fn pre_visit_split(&mut self, _split: &SplitNode) -> bool {
        let (open, ctx_start) = match self.contexts.last() {
            Some(ctx) => (ctx.dangling.clone(), ctx.start_node_id),
            None => (Vec::new(), 0),
        };
        let mut start_id = if open.is_empty() { ctx_start } else { open[0] };
        // Multiple open nodes feeding a split need an explicit rendezvous: the
        // graph format has no barrier construct.
        if open.len() > 1 {
            let sync_id = self.next_id();
            self.add_node(GraphNode::new(sync_id, SYNC_NODE));
            for open_id in open {
                self.add_link(GraphLink::new(open_id, sync_id));
            }
            start_id = sync_id;
        }
        self.contexts.push(Context::new(false, start_id));
        true
    }

    fn post_visit_split(&mut self, _split: &SplitNode) {
        let Some(ctx) = self.contexts.pop() else {
            return;
        };
        if let Some(parent) = self.contexts.last_mut() {
            parent.dangling = ctx.dangling;
        }
    }

    fn visit_step(&mut self, step: &StepNode) {
        let id = self.next_id();
        self.current_step_id = id;
        let properties = if step.args.is_empty() {
            None
        } else {
            Some(step.args_as_map())
        };
        let mut node = GraphNode::with_properties(id, step.name.clone(), properties);
        node.label = step.label_string().map(str::to_string);
        self.add_node(node);

        let mut links = Vec::new();
        let Some(ctx) = self.contexts.last_mut() else {
            return;
        };
        if let Some(label) = step.label_string() {
            ctx.labelled_nodes.insert(label.to_string(), id);
        }
        if ctx.is_flow {
            // Connect any hanging forward references to this label first so
            // the transition links precede the fall-through link.
            if let Some(label) = step.label_string() {
                ctx.pending.retain(|(from, on_state, target_label)| {
                    if target_label == label {
                        links.push(GraphLink::transition(*from, id, on_state.clone()));
                        false
                    } else {
                        true
                    }
                });
            }
            if ctx.dangling.is_empty() {
                // First step of the flow
                links.push(GraphLink::new(ctx.start_node_id, id));
            } else {
                for open in &ctx.dangling {
                    links.push(GraphLink::new(*open, id));
                }
            }
            ctx.dangling = vec![id];
        } else {
            // A step directly inside a split, with no wrapping flow.
            links.push(GraphLink::new(ctx.start_node_id, id));
            ctx.dangling.push(id);
        }
        self.use_flow_extra = ctx.is_flow;
        if !self.use_flow_extra {
            self.scratch_extra.clear();
        }
        for link in links {
            self.add_link(link);
        }
    }

    fn visit_transition(&mut self, transition: &TransitionNode) {
        let from = self.current_step_id;
        if let Some(target) = transition.target_step() {
            if transition.is_special() {
                // One $END/$FAIL node per flow, shared by all transitions in it.
                let name = target.name.clone();
                let (id, _) = self.find_or_make_reusable(&name, |id| GraphNode::new(id, name.clone()));
                self.add_link(GraphLink::transition(from, id, transition.status.clone()));
                return;
            }
            let key = target_key(target);
            let (id, created) = self.find_or_make_reusable(&key, |id| {
                let properties = if target.args.is_empty() {
                    None
                } else {
                    Some(target.args_as_map())
                };
                let mut node = GraphNode::with_properties(id, target.name.clone(), properties);
                node.label = target.label_string().map(str::to_string);
                node
            });
            self.add_link(GraphLink::transition(from, id, transition.status.clone()));
            if created {
                if let Some(ctx) = self.contexts.last_mut() {
                    if ctx.is_flow {
                        ctx.other_exits.push(id);
                    } else {
                        ctx.dangling.push(id);
                    }
                }
            }
            return;
        }
        if let Some(label) = transition.target_label() {
            let existing = self
                .contexts
                .last()
                .and_then(|ctx| ctx.labelled_nodes.get(label).copied());
            match existing {
                Some(target_id) => {
                    // Back reference to something labelled earlier in this flow
                    self.add_link(GraphLink::transition(from, target_id, transition.status.clone()));
                }
                None => {
                    if let Some(ctx) = self.contexts.last_mut() {
                        ctx.pending
                            .push((from, transition.status.clone(), label.to_string()));
                    }
                }
            }
        }
    }

    fn end_visit(&mut self) {
        if self.sequences.is_empty() {
            return;
        }
        // Resolve references into labelled secondary sequences by inlining a
        // copy of each referenced sequence into the main one. Inlining can
        // surface further references, so iterate (bounded as a guard against
        // reference cycles between sequences that never converge).
        let mut rounds = 0;
        while !self.sequences[0].outstanding.is_empty() && rounds < 50 {
            rounds += 1;
            let batch = next_transition_batch(&self.sequences[0].outstanding);
            self.sequences[0]
                .outstanding
                .retain(|tt| !batch.iter().any(|b| same_transition(b, tt)));
            let label = &batch[0].label;
            let Some(sequence_index) = self
                .sequences
                .iter()
                .position(|s| s.label.as_deref() == Some(label.as_str()))
            else {
                // Undefined label on an unvalidated definition: drop it.
                continue;
            };
            self.inline_sequence(sequence_index, &batch);

            // Some outstanding transitions may be satisfiable now that the
            // inlined copy brought labelled nodes into the main sequence.
            let main = &mut self.sequences[0];
            let outstanding = std::mem::take(&mut main.outstanding);
            for tt in outstanding {
                let resolved = main
                    .labelled_nodes_in_flow
                    .get(&tt.flow)
                    .and_then(|candidates| candidates.get(&tt.label).copied());
                match resolved {
                    Some(target) => {
                        main.links
                            .push(GraphLink::transition(tt.node_id, target, tt.on_state));
                    }
                    None => main.outstanding.push(tt),
                }
            }
        }
    }
}

impl GraphBuilder {
    /// Copy `sequence_index`'s nodes and links into the main sequence with
    /// fresh ids, wiring the batch of transitions to the copy's head and the
    /// copy's tail to wherever the referencing flow's tail goes.
    fn inline_sequence(&mut self, sequence_index: usize, batch: &[PendingTransition]) {
        let sequence = &self.sequences[sequence_index];
        let Some(start_node) = sequence.nodes.first() else {
            return;
        };
        let Some(end_node) = sequence.nodes.last() else {
            return;
        };
        let (start_id, end_id) = (start_node.id, end_node.id);
        let inner: Vec<GraphNode> = sequence.nodes[1..sequence.nodes.len() - 1].to_vec();
        let links: Vec<GraphLink> = sequence.links.clone();
        let outstanding: Vec<PendingTransition> = sequence.outstanding.clone();
        let labelled: Vec<(FlowKey, HashMap<String, usize>)> = sequence
            .labelled_nodes_in_flow
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        let primary_flow = sequence.primary_flow;

        let mut id_map: HashMap<usize, usize> = HashMap::new();
        for node in inner {
            let new_id = self.next_id();
            id_map.insert(node.id, new_id);
            let mut copy = node.clone();
            copy.id = new_id;
            self.sequences[0].nodes.push(copy);
        }

        let mut new_links = Vec::new();
        for link in &links {
            if link.from == start_id {
                // The sequence head is entered through the batch's transitions.
                let Some(&to) = id_map.get(&link.to) else {
                    continue;
                };
                for tt in batch {
                    new_links.push(GraphLink::transition(tt.node_id, to, tt.on_state.clone()));
                }
            } else if link.to == end_id {
                // The sequence tail rejoins wherever the referencing flow's
                // last node went.
                let Some(&from) = id_map.get(&link.from) else {
                    continue;
                };
                let rejoin_source = batch[0].last_node_id;
                let rejoins: Vec<GraphLink> = self.sequences[0]
                    .links
                    .iter()
                    .filter(|l| l.from == rejoin_source)
                    .map(|l| GraphLink {
                        from,
                        to: l.to,
                        transition_name: l.transition_name.clone(),
                    })
                    .collect();
                new_links.extend(rejoins);
            } else {
                let (Some(&from), Some(&to)) = (id_map.get(&link.from), id_map.get(&link.to))
                else {
                    continue;
                };
                new_links.push(GraphLink {
                    from,
                    to,
                    transition_name: link.transition_name.clone(),
                });
            }
        }
        self.sequences[0].links.extend(new_links);

        // The copy inherits the inlined sequence's own unresolved references,
        // now anchored in the flow being inserted into.
        let rewritten: Vec<PendingTransition> = outstanding
            .iter()
            .filter_map(|loose| {
                let node_id = *id_map.get(&loose.node_id)?;
                Some(PendingTransition {
                    node_id,
                    on_state: loose.on_state.clone(),
                    label: loose.label.clone(),
                    last_node_id: batch[0].last_node_id,
                    flow: batch[0].flow,
                })
            })
            .collect();
        self.sequences[0].outstanding.extend(rewritten);

        // Labelled nodes of the copy become resolvable from the target flow.
        let target_flow = batch[0].flow;
        for (flow_key, label_map) in labelled {
            let remapped: HashMap<String, usize> = label_map
                .iter()
                .filter_map(|(label, id)| Some((label.clone(), *id_map.get(id)?)))
                .collect();
            if Some(flow_key) == primary_flow {
                self.sequences[0]
                    .labelled_nodes_in_flow
                    .entry(target_flow)
                    .or_default()
                    .extend(remapped);
            } else {
                self.sequences[0]
                    .labelled_nodes_in_flow
                    .insert(flow_key, remapped);
            }
        }
    }
}

/// Pick the first outstanding transition plus any others sharing its flow and
/// target label, so one inlined copy serves all of them.
fn next_transition_batch(outstanding: &[PendingTransition]) -> Vec<PendingTransition> {
    let first = outstanding[0].clone();
    let mut batch = vec![first.clone()];
    for tt in &outstanding[1..] {
        if tt.flow == first.flow && tt.label == first.label {
            batch.push(tt.clone());
        }
    }
    batch
}

fn same_transition(a: &PendingTransition, b: &PendingTransition) -> bool {
    a.node_id == b.node_id && a.on_state == b.on_state && a.label == b.label
}

/// Reuse key for a transition target within one flow: same label, name and
/// arguments mean the same node.
fn target_key(step: &StepNode) -> String {
    let mut key = String::new();
    if let Some(label) = step.label_string() {
        key.push_str(label);
        key.push('>');
    }
    key.push_str(&step.name);
    for (name, value) in step.args_as_map() {
        key.push(':');
        key.push_str(&name);
        key.push('=');
        key.push_str(&value);
    }
    key
}

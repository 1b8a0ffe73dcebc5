//! Reconstruct canonical DSL text from a graph, the inverse of the builder.
//!
//! The walk follows non-transition links out of START. A fan-out of more than
//! one link renders as a split; the join node of a split is discovered by
//! chasing every branch until they meet. SYNC nodes are consumed silently (a
//! SYNC is just the boundary between two adjacent splits). Reachability
//! queries run over a petgraph mirror of the links so label back-references
//! (cycles) cannot hang the walk.

use std::collections::HashMap;
use std::collections::HashSet;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::GraphError;

use super::{END_NODE, Graph, GraphLink, GraphNode, START_NODE};

impl Graph {
    /// Produce the DSL representation of the graph. The graph must carry the
    /// START and END terminals the builder always emits.
    pub fn to_dsl_text(&self) -> Result<String, GraphError> {
        Reconstructor::new(self).run()
    }
}

/// The transition status as it appears in DSL text: numeric statuses stay
/// bare, anything else is single-quoted unless already quoted.
pub(crate) fn transition_in_dsl_form(name: &str) -> String {
    if name.chars().all(|c| c.is_ascii_digit()) && !name.is_empty() {
        return name.to_string();
    }
    if name.starts_with('\'') {
        return name.to_string();
    }
    format!("'{}'", name)
}

/// Link indices keep link identity stable while lists of "links still to
/// follow" are filtered down during the walk.
type LinkRef = usize;

struct Reconstructor<'g> {
    graph: &'g Graph,
    /// petgraph mirror for reachability queries.
    mirror: DiGraph<usize, ()>,
    node_index: HashMap<usize, NodeIndex>,
}

impl<'g> Reconstructor<'g> {
    fn new(graph: &'g Graph) -> Self {
        let mut mirror = DiGraph::new();
        let mut node_index = HashMap::new();
        for node in &graph.nodes {
            node_index.insert(node.id, mirror.add_node(node.id));
        }
        for link in &graph.links {
            if let (Some(&from), Some(&to)) = (node_index.get(&link.from), node_index.get(&link.to))
            {
                mirror.add_edge(from, to, ());
            }
        }
        Reconstructor {
            graph,
            mirror,
            node_index,
        }
    }

    fn run(&self) -> Result<String, GraphError> {
        let start = self
            .graph
            .node_by_name(START_NODE)
            .ok_or(GraphError::MissingTerminals)?;
        let end = self
            .graph
            .node_by_name(END_NODE)
            .ok_or(GraphError::MissingTerminals)?;
        let mut unvisited: Vec<usize> = self
            .graph
            .nodes
            .iter()
            .map(|n| n.id)
            .filter(|id| *id != start.id && *id != end.id)
            .collect();
        if let Some(fail) = self.graph.node_by_name("FAIL") {
            unvisited.retain(|id| *id != fail.id);
        }
        let mut unfollowed: Vec<LinkRef> = (0..self.graph.links.len()).collect();

        let mut text = String::new();
        let to_follow = self.find_links_from(start.id, false);
        self.follow_links(&mut text, to_follow, None, &mut unvisited, &mut unfollowed, false)?;

        // Nodes reachable only via transition links never came up on the walk
        // from START; emit each such chain as a trailing `&& head …` clause.
        let mut loop_count = 0;
        while !unvisited.is_empty() && loop_count < 10_000 {
            let head = self.find_a_head(&unvisited, &unfollowed);
            unvisited.retain(|id| *id != head);
            let to_follow = self.find_links_from(head, false);
            // A head with no outgoing links is already fully described by the
            // transitions referring to it.
            if !to_follow.is_empty() {
                text.push_str(" && ");
                self.print_node(&mut text, head, &mut unvisited);
                self.follow_links(&mut text, to_follow, None, &mut unvisited, &mut unfollowed, false)?;
            }
            loop_count += 1;
        }

        Ok(text)
    }

    // -------------------------------------------------------------------------
    // walking
    // -------------------------------------------------------------------------

    /// Chase down links, appending DSL text as the walk proceeds.
    fn follow_links(
        &self,
        text: &mut String,
        mut to_follow: Vec<LinkRef>,
        terminate_at: Option<usize>,
        unvisited: &mut Vec<usize>,
        unfollowed: &mut Vec<LinkRef>,
        in_nested_split: bool,
    ) -> Result<(), GraphError> {
        while !to_follow.is_empty() {
            if to_follow.len() == 1 {
                // FLOW
                let link = to_follow[0];
                let target = self.link(link).to;
                if Some(target) != terminate_at {
                    if !text.is_empty() {
                        text.push_str(" && ");
                    }
                    self.follow_link(text, link, terminate_at, unvisited, unfollowed)?;
                }
                break;
            }

            // SPLIT
            if !in_nested_split && !text.is_empty() {
                text.push_str(" && ");
            }
            text.push('<');
            let end_of_split = self.find_end_of_split(&to_follow)?;
            if to_follow.len() > 2 {
                // More than two links can hide nested splits that join before
                // the outer join point; render those innermost-first.
                let nested = self.find_nested_splits(&to_follow, end_of_split)?;
                let count = nested.len();
                for (i, (nested_end, nested_links)) in nested.iter().enumerate() {
                    self.follow_links(text, nested_links.clone(), Some(*nested_end), unvisited, unfollowed, true)?;
                    to_follow.retain(|l| !nested_links.contains(l));
                    text.push_str(" && ");
                    self.follow_node(text, *nested_end, end_of_split, unvisited, unfollowed)?;
                    if i + 1 < count {
                        text.push_str(" || ");
                    }
                }
                if !to_follow.is_empty() && count > 0 {
                    text.push_str(" || ");
                }
            }
            for (i, link) in to_follow.iter().enumerate() {
                if i > 0 {
                    text.push_str(" || ");
                }
                self.follow_link(text, *link, end_of_split, unvisited, unfollowed)?;
            }
            text.push('>');

            let Some(join) = end_of_split else {
                break;
            };
            if self.node(join).is_end() {
                break;
            }
            if Some(join) == terminate_at {
                break;
            }
            unvisited.retain(|id| *id != join);
            if !self.node(join).is_sync() {
                // A real step joining two splits is printed; a SYNC node is
                // only the boundary between them.
                text.push_str(" && ");
                self.print_node(text, join, unvisited);
                let mut transitional = self.find_links_from(join, false);
                self.print_transitions(text, unvisited, unfollowed, &mut transitional, None);
            }
            to_follow = self.find_links_from_without_transitions(join, false);
        }
        Ok(())
    }

    fn follow_link(
        &self,
        text: &mut String,
        link: LinkRef,
        terminate_at: Option<usize>,
        unvisited: &mut Vec<usize>,
        unfollowed: &mut Vec<LinkRef>,
    ) -> Result<(), GraphError> {
        unfollowed.retain(|l| *l != link);
        self.follow_node(text, self.link(link).to, terminate_at, unvisited, unfollowed)
    }

    fn follow_node(
        &self,
        text: &mut String,
        node_id: usize,
        terminate_at: Option<usize>,
        unvisited: &mut Vec<usize>,
        unfollowed: &mut Vec<LinkRef>,
    ) -> Result<(), GraphError> {
        let mut to_follow = self.find_links_from(node_id, false);

        // A node whose outputs are all transitions except one continuation
        // needs a wrapping split when the branches rejoin before END;
        // otherwise the rendering would lose where the branches converge.
        let mut single_split_necessary = false;
        let mut common_target = None;
        if to_follow.len() > 1 && self.all_transitions_but_one(&to_follow) {
            if let Ok(found) = self.find_end_of_split(&self.sort_transition_links_first(&to_follow))
            {
                common_target = found;
                single_split_necessary = match common_target {
                    Some(c) => !self.node(c).is_end() && terminate_at != Some(c),
                    None => false,
                };
            }
        }

        if single_split_necessary {
            text.push('<');
            self.print_node(text, node_id, unvisited);
            self.print_transitions(text, unvisited, unfollowed, &mut to_follow, common_target);
            text.push('>');
        } else {
            self.print_node(text, node_id, unvisited);
            self.print_transitions(text, unvisited, unfollowed, &mut to_follow, terminate_at);
        }
        self.follow_links(text, to_follow, terminate_at, unvisited, unfollowed, false)
    }

    // -------------------------------------------------------------------------
    // printing
    // -------------------------------------------------------------------------

    fn print_node(&self, text: &mut String, node_id: usize, unvisited: &mut Vec<usize>) {
        unvisited.retain(|id| *id != node_id);
        let node = self.node(node_id);
        if let Some(label) = &node.label {
            text.push_str(label);
            text.push_str(": ");
        }
        text.push_str(&node.name);
        print_node_properties(text, node);
    }

    /// Render and consume the transition links in `to_follow`.
    fn print_transitions(
        &self,
        text: &mut String,
        unvisited: &mut Vec<usize>,
        unfollowed: &mut Vec<LinkRef>,
        to_follow: &mut Vec<LinkRef>,
        terminate_at: Option<usize>,
    ) {
        let links: Vec<LinkRef> = to_follow.clone();
        for link_ref in links {
            let link = self.link(link_ref);
            let Some(name) = &link.transition_name else {
                continue;
            };
            let target = self.node(link.to);
            let target_name = match target.name.as_str() {
                "FAIL" => "$FAIL".to_string(),
                "END" => "$END".to_string(),
                _ => match &target.label {
                    Some(label) => format!("{}: {}", label, target.name),
                    None => target.name.clone(),
                },
            };
            text.push(' ');
            text.push_str(&transition_in_dsl_form(name));
            text.push_str("->");
            text.push_str(&target_name);
            print_node_properties(text, target);
            unfollowed.retain(|l| *l != link_ref);
            // The target only counts as visited if nothing further hangs off
            // it that the walk still needs to describe.
            let onward = self.find_links_from(target.id, false);
            if onward.is_empty() || self.all_links_target(&onward, terminate_at) {
                unvisited.retain(|id| *id != target.id);
            }
            to_follow.retain(|l| *l != link_ref);
        }
    }

    // -------------------------------------------------------------------------
    // structure discovery
    // -------------------------------------------------------------------------

    /// Find the node where all the supplied links converge again.
    fn find_end_of_split(&self, to_follow: &[LinkRef]) -> Result<Option<usize>, GraphError> {
        if to_follow.is_empty() {
            return Ok(None);
        }
        if to_follow.len() == 1 {
            return Ok(Some(self.link(to_follow[0]).to));
        }
        let mut seen = HashSet::new();
        let mut next_candidate = Some(self.link(to_follow[0]).to);
        while let Some(candidate) = next_candidate {
            if !seen.insert(candidate) {
                break;
            }
            let all_links_lead_there = to_follow[1..]
                .iter()
                .all(|l| self.found_in_chain(*l, candidate));
            if all_links_lead_there {
                return Ok(Some(candidate));
            }
            next_candidate = self.next_in_chain(candidate)?;
        }
        Err(GraphError::NoSplitJoin)
    }

    /// Advance one position along a branch chain, stepping over inner splits.
    fn next_in_chain(&self, from: usize) -> Result<Option<usize>, GraphError> {
        let mut links = self.find_links_from(from, true);
        if links.is_empty() {
            return Ok(None);
        }
        if links.len() == 1 || self.count_links_without_transitions(&links) <= 1 {
            // With at most one non-transition link the branches reconverge at
            // the same place whichever link is chosen.
            return Ok(Some(self.link(links[0]).to));
        }
        let mut candidate = None;
        let mut guard = 0;
        while self.count_links_without_transitions(&links) > 1 {
            if guard > self.graph.nodes.len() {
                return Err(GraphError::NoSplitJoin);
            }
            guard += 1;
            candidate = self.find_end_of_split(&links)?;
            let Some(c) = candidate else {
                break;
            };
            links = self.find_links_from(c, true);
        }
        Ok(candidate)
    }

    /// Discover splits nested inside a wider fan-out: subsets of links that
    /// join at a common node before the outer join. Returned innermost-first.
    fn find_nested_splits(
        &self,
        to_follow: &[LinkRef],
        end_of_split: Option<usize>,
    ) -> Result<Vec<(usize, Vec<LinkRef>)>, GraphError> {
        let mut nested: Vec<(usize, Vec<LinkRef>)> = Vec::new();
        for &link in to_follow {
            let mut seen = HashSet::new();
            let mut successor = Some(self.link(link).to);
            while let Some(s) = successor {
                if end_of_split == Some(s) || !seen.insert(s) {
                    break;
                }
                if let Some(common_links) = self.subset_of_links_reaching(to_follow, link, s) {
                    // If a split over the same links is already known, keep
                    // whichever candidate join comes first.
                    let mut insert_this_one = true;
                    let mut replace = None;
                    for (i, (known_end, known_links)) in nested.iter().enumerate() {
                        if equal_link_sets(known_links, &common_links) {
                            if self.is_successor(*known_end, s) {
                                insert_this_one = false;
                            } else {
                                replace = Some(i);
                            }
                        }
                    }
                    if insert_this_one {
                        if let Some(i) = replace {
                            nested.remove(i);
                        }
                        nested.push((s, common_links));
                    }
                }
                successor = self.next_in_chain(s)?;
            }
        }
        // Earlier join nodes first, so inner splits render before outer ones.
        let mut ordered = nested;
        ordered.sort_by(|a, b| {
            if a.0 == b.0 {
                std::cmp::Ordering::Equal
            } else if self.is_successor(a.0, b.0) {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            }
        });
        Ok(ordered)
    }

    /// The links among `links` (other than `link_to_ignore`) whose chains
    /// reach `node`, with the ignored link appended when any do.
    fn subset_of_links_reaching(
        &self,
        links: &[LinkRef],
        link_to_ignore: LinkRef,
        node: usize,
    ) -> Option<Vec<LinkRef>> {
        let mut result: Vec<LinkRef> = links
            .iter()
            .copied()
            .filter(|l| *l != link_to_ignore && self.found_in_chain(*l, node))
            .collect();
        if result.is_empty() {
            return None;
        }
        result.push(link_to_ignore);
        Some(result)
    }

    // -------------------------------------------------------------------------
    // queries
    // -------------------------------------------------------------------------

    fn node(&self, id: usize) -> &GraphNode {
        // Link endpoints always name real nodes in a graph the builder made.
        self.graph
            .node_by_id(id)
            .unwrap_or(&self.graph.nodes[0])
    }

    fn link(&self, link: LinkRef) -> &GraphLink {
        &self.graph.links[link]
    }

    /// True when following `link` can ever arrive at `node`.
    fn found_in_chain(&self, link: LinkRef, node: usize) -> bool {
        let (Some(&from), Some(&to)) = (
            self.node_index.get(&self.link(link).to),
            self.node_index.get(&node),
        ) else {
            return false;
        };
        has_path_connecting(&self.mirror, from, to, None)
    }

    /// True when `b` is reachable from `a` through at least one link.
    fn is_successor(&self, a: usize, b: usize) -> bool {
        let Some(&target) = self.node_index.get(&b) else {
            return false;
        };
        let Some(&source) = self.node_index.get(&a) else {
            return false;
        };
        self.mirror
            .neighbors(source)
            .any(|n| has_path_connecting(&self.mirror, n, target, None))
    }

    /// Outgoing links; links straight to END are noise for the walk unless
    /// explicitly requested.
    fn find_links_from(&self, node_id: usize, include_end: bool) -> Vec<LinkRef> {
        self.graph
            .links
            .iter()
            .enumerate()
            .filter(|(_, l)| l.from == node_id)
            .filter(|(_, l)| include_end || !self.node(l.to).is_end())
            .map(|(i, _)| i)
            .collect()
    }

    /// Outgoing fall-through links. A `*` transition maps the whole exit
    /// space, so it acts as the fall-through too.
    fn find_links_from_without_transitions(&self, node_id: usize, include_end: bool) -> Vec<LinkRef> {
        self.graph
            .links
            .iter()
            .enumerate()
            .filter(|(_, l)| l.from == node_id)
            .filter(|(_, l)| match &l.transition_name {
                None => include_end || !self.node(l.to).is_end(),
                Some(name) => name == "*" || name == "'*'",
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn count_links_without_transitions(&self, links: &[LinkRef]) -> usize {
        links
            .iter()
            .filter(|l| !self.link(**l).has_transition())
            .count()
    }

    fn all_transitions_but_one(&self, links: &[LinkRef]) -> bool {
        links.len() - self.transition_count(links) == 1
    }

    fn transition_count(&self, links: &[LinkRef]) -> usize {
        links
            .iter()
            .filter(|l| self.link(**l).has_transition())
            .count()
    }

    fn sort_transition_links_first(&self, links: &[LinkRef]) -> Vec<LinkRef> {
        let mut result = Vec::with_capacity(links.len());
        for &l in links {
            if self.link(l).has_transition() {
                result.insert(0, l);
            } else {
                result.push(l);
            }
        }
        result
    }

    fn all_links_target(&self, links: &[LinkRef], node: Option<usize>) -> bool {
        let Some(node) = node else {
            return false;
        };
        links.iter().all(|l| self.link(*l).to == node)
    }

    /// Walk backwards from an arbitrary unvisited node to the head of its
    /// chain, so a trailing clause starts at the right place.
    fn find_a_head(&self, unvisited: &[usize], unfollowed: &[LinkRef]) -> usize {
        let mut candidate = unvisited[0];
        let mut changed = true;
        let mut guard = 0;
        while changed && guard <= self.graph.links.len() + 1 {
            changed = false;
            guard += 1;
            for &l in unfollowed {
                if self.link(l).to == candidate {
                    candidate = self.link(l).from;
                    changed = true;
                }
            }
        }
        candidate
    }
}

fn print_node_properties(text: &mut String, node: &GraphNode) {
    if let Some(properties) = &node.properties {
        for (key, value) in properties {
            let rendered = if value.contains(' ') && !value.starts_with('\'') {
                format!("'{}'", value)
            } else {
                value.clone()
            };
            text.push_str(" --");
            text.push_str(key);
            text.push('=');
            text.push_str(&rendered);
        }
    }
}

fn equal_link_sets(a: &[LinkRef], b: &[LinkRef]) -> bool {
    a.len() == b.len() && a.iter().all(|l| b.contains(l)) && b.iter().all(|l| a.contains(l))
}

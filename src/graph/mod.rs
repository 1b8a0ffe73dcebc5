//! The numbered directed graph exchanged with the graph-editing UI.
//!
//! Node 0 is always START and the highest id of the main sequence is END.
//! Transition links carry the unquoted status that triggers them; plain links
//! are fall-through. The JSON shape (camelCase, optional fields omitted) is
//! the contract with the editor frontend.

pub mod builder;
pub mod text;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const START_NODE: &str = "START";
pub const END_NODE: &str = "END";
pub const SYNC_NODE: &str = "SYNC";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Step arguments, keyed by argument name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
}

impl GraphNode {
    pub fn new(id: usize, name: impl Into<String>) -> Self {
        GraphNode {
            id,
            name: name.into(),
            label: None,
            properties: None,
        }
    }

    pub fn with_properties(
        id: usize,
        name: impl Into<String>,
        properties: Option<BTreeMap<String, String>>,
    ) -> Self {
        GraphNode {
            id,
            name: name.into(),
            label: None,
            properties,
        }
    }

    pub fn is_start(&self) -> bool {
        self.name == START_NODE
    }

    pub fn is_end(&self) -> bool {
        self.name == END_NODE
    }

    pub fn is_sync(&self) -> bool {
        self.name == SYNC_NODE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLink {
    pub from: usize,
    pub to: usize,
    /// The unquoted exit status/code driving this link; `None` for the plain
    /// fall-through link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition_name: Option<String>,
}

impl GraphLink {
    pub fn new(from: usize, to: usize) -> Self {
        GraphLink {
            from,
            to,
            transition_name: None,
        }
    }

    pub fn transition(from: usize, to: usize, name: impl Into<String>) -> Self {
        GraphLink {
            from,
            to,
            transition_name: Some(name.into()),
        }
    }

    pub fn has_transition(&self) -> bool {
        self.transition_name.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl Graph {
    pub fn new(nodes: Vec<GraphNode>, links: Vec<GraphLink>) -> Self {
        Graph { nodes, links }
    }

    pub fn node_by_id(&self, id: usize) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Stable fixture rendering: `[id:name]` per node (with `:key=value` for
    /// each property) then `[from-to]` per link, transition links as
    /// `[status:from-to]` with the status in its DSL form.
    pub fn to_verbose_string(&self) -> String {
        let mut s = String::new();
        for node in &self.nodes {
            s.push('[');
            s.push_str(&node.id.to_string());
            s.push(':');
            s.push_str(&node.name);
            if let Some(properties) = &node.properties {
                for (key, value) in properties {
                    s.push(':');
                    s.push_str(key);
                    s.push('=');
                    s.push_str(value);
                }
            }
            s.push(']');
        }
        for link in &self.links {
            s.push('[');
            if let Some(name) = &link.transition_name {
                s.push_str(&text::transition_in_dsl_form(name));
                s.push(':');
            }
            s.push_str(&format!("{}-{}", link.from, link.to));
            s.push(']');
        }
        s
    }

    /// JSON for the editor boundary.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Graph, serde_json::Error> {
        serde_json::from_str(json)
    }
}

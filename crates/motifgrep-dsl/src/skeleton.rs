use std::fmt;

use indexmap::IndexMap;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;

/// How a motif edge acts on its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Action {
    Default,
    Positive,
    Negative,
    Custom(String),
}

impl Action {
    /// The type-marker token for this action, as written after the existence
    /// marker in motif source.
    pub fn marker(&self) -> String {
        match self {
            Action::Default => ">".to_string(),
            Action::Positive => "+".to_string(),
            Action::Negative => "|".to_string(),
            Action::Custom(name) => format!("[{name}]"),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.marker())
    }
}

/// Structural payload of one motif edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeSpec {
    /// `false` marks a must-not-exist edge.
    pub exists: bool,
    pub action: Action,
}

impl EdgeSpec {
    /// The relation token for this edge (`->`, `!|`, `-[tickles]`, ...).
    pub fn relation(&self) -> String {
        let existence = if self.exists { "-" } else { "!" };
        format!("{existence}{}", self.action.marker())
    }
}

/// The motif's structural multigraph.
///
/// Nodes are motif-local string names. Parallel edges between the same
/// ordered pair are allowed when their actions differ. The string↔index
/// table makes every constraint table keyable by plain names while petgraph
/// holds the adjacency.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    graph: DiGraph<String, EdgeSpec>,
    index: IndexMap<String, NodeIndex>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node if it is not already present, returning its index.
    pub fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node names in insertion order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Add a structural edge. Both endpoints are created as needed.
    pub fn add_edge(&mut self, u: &str, v: &str, spec: EdgeSpec) {
        let u = self.ensure_node(u);
        let v = self.ensure_node(v);
        self.graph.add_edge(u, v, spec);
    }

    /// All parallel edges from `u` to `v`.
    pub fn edges_between<'a>(&'a self, u: &str, v: &str) -> Vec<&'a EdgeSpec> {
        let (Some(&u), Some(&v)) = (self.index.get(u), self.index.get(v)) else {
            return Vec::new();
        };
        self.graph.edges_connecting(u, v).map(|e| e.weight()).collect()
    }

    pub fn has_edge(&self, u: &str, v: &str) -> bool {
        !self.edges_between(u, v).is_empty()
    }

    /// Every edge as `(u, v, spec)`, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &EdgeSpec)> {
        self.graph.edge_indices().map(|e| {
            let (u, v) = self.graph.edge_endpoints(e).expect("edge endpoints");
            (
                self.graph[u].as_str(),
                self.graph[v].as_str(),
                &self.graph[e],
            )
        })
    }

    /// Distinct successor names of `name`.
    pub fn out_neighbors<'a>(&'a self, name: &str) -> Vec<&'a str> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Distinct predecessor names of `name`.
    pub fn in_neighbors<'a>(&'a self, name: &str) -> Vec<&'a str> {
        self.neighbors(name, Direction::Incoming)
    }

    fn neighbors<'a>(&'a self, name: &str, dir: Direction) -> Vec<&'a str> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        let mut seen = Vec::new();
        for n in self.graph.neighbors_directed(idx, dir) {
            let n = self.graph[n].as_str();
            if !seen.contains(&n) {
                seen.push(n);
            }
        }
        seen
    }
}

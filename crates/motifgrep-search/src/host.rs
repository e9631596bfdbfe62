use indexmap::IndexMap;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use motifgrep_dsl::Value;

/// Keyed attributes of one host node or edge.
pub type AttrMap = IndexMap<String, Value>;

/// The capabilities the engine needs from a host graph.
///
/// Any directed graph with string node identifiers can implement this; the
/// engine never mutates the host and holds it behind `&self` for the whole
/// search, so one host can serve many concurrent searches.
pub trait HostGraph {
    /// All node identifiers.
    fn nodes(&self) -> Vec<&str>;

    /// Distinct successors of `node`.
    fn out_neighbors(&self, node: &str) -> Vec<&str>;

    /// Distinct predecessors of `node`.
    fn in_neighbors(&self, node: &str) -> Vec<&str>;

    /// Whether at least one edge `u -> v` exists.
    fn has_edge(&self, u: &str, v: &str) -> bool;

    /// Attributes of `node`, or `None` for an unknown node.
    fn node_attrs(&self, node: &str) -> Option<&AttrMap>;

    /// Attribute maps of every parallel edge `u -> v` (empty when none).
    fn edge_attrs(&self, u: &str, v: &str) -> Vec<&AttrMap>;
}

/// An attributed directed multigraph held in memory.
///
/// Node identity is by string id; parallel edges are kept as petgraph keeps
/// them. Adding an edge creates missing endpoints, attribute-less.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    graph: DiGraph<AttrMap, AttrMap>,
    index: IndexMap<String, NodeIndex>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(AttrMap::new());
        self.index.insert(name.to_string(), idx);
        idx
    }

    /// Insert a node (a no-op when it already exists).
    pub fn add_node(&mut self, name: &str) {
        self.ensure_node(name);
    }

    /// Insert a node and set its attributes, merging over any existing ones.
    pub fn add_node_with<K, V>(&mut self, name: &str, attrs: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let idx = self.ensure_node(name);
        for (key, value) in attrs {
            self.graph[idx].insert(key.into(), value.into());
        }
    }

    /// Insert an attribute-less edge. Parallel edges accumulate.
    pub fn add_edge(&mut self, u: &str, v: &str) {
        let u = self.ensure_node(u);
        let v = self.ensure_node(v);
        self.graph.add_edge(u, v, AttrMap::new());
    }

    /// Insert an edge carrying attributes. Parallel edges accumulate.
    pub fn add_edge_with<K, V>(&mut self, u: &str, v: &str, attrs: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let u = self.ensure_node(u);
        let v = self.ensure_node(v);
        let mut map = AttrMap::new();
        for (key, value) in attrs {
            map.insert(key.into(), value.into());
        }
        self.graph.add_edge(u, v, map);
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn neighbors<'a>(&'a self, node: &str, dir: Direction) -> Vec<&'a str> {
        let Some(&idx) = self.index.get(node) else {
            return Vec::new();
        };
        let mut seen: Vec<&str> = Vec::new();
        for n in self.graph.neighbors_directed(idx, dir) {
            // NodeIndex values are assigned in the same order names enter
            // the id table, so the positions line up.
            let (name, _) = self.index.get_index(n.index()).expect("node in index");
            if !seen.contains(&name.as_str()) {
                seen.push(name);
            }
        }
        seen
    }
}

impl HostGraph for MemoryHost {
    fn nodes(&self) -> Vec<&str> {
        self.index.keys().map(String::as_str).collect()
    }

    fn out_neighbors(&self, node: &str) -> Vec<&str> {
        self.neighbors(node, Direction::Outgoing)
    }

    fn in_neighbors(&self, node: &str) -> Vec<&str> {
        self.neighbors(node, Direction::Incoming)
    }

    fn has_edge(&self, u: &str, v: &str) -> bool {
        match (self.index.get(u), self.index.get(v)) {
            (Some(&u), Some(&v)) => self.graph.find_edge(u, v).is_some(),
            _ => false,
        }
    }

    fn node_attrs(&self, node: &str) -> Option<&AttrMap> {
        self.index.get(node).map(|&idx| &self.graph[idx])
    }

    fn edge_attrs(&self, u: &str, v: &str) -> Vec<&AttrMap> {
        let (Some(&u), Some(&v)) = (self.index.get(u), self.index.get(v)) else {
            return Vec::new();
        };
        self.graph.edges_connecting(u, v).map(|e| e.weight()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motifgrep_dsl::Value;

    #[test]
    fn empty_host() {
        let host = MemoryHost::new();
        assert!(host.nodes().is_empty());
        assert!(!host.has_edge("a", "b"));
        assert!(host.edge_attrs("a", "b").is_empty());
        assert_eq!(host.node_attrs("a"), None);
    }

    #[test]
    fn add_edge_creates_endpoints() {
        let mut host = MemoryHost::new();
        host.add_edge("a", "b");
        assert_eq!(host.nodes(), vec!["a", "b"]);
        assert!(host.has_edge("a", "b"));
        assert!(!host.has_edge("b", "a"));
    }

    #[test]
    fn node_attrs_round_trip() {
        let mut host = MemoryHost::new();
        host.add_node_with("a", [("radius", 25i64)]);
        host.add_node_with("a", [("kind", Value::from("soma"))]);
        let attrs = host.node_attrs("a").unwrap();
        assert_eq!(attrs["radius"], Value::Int(25));
        assert_eq!(attrs["kind"], Value::from("soma"));
    }

    #[test]
    fn parallel_edges_keep_separate_attrs() {
        let mut host = MemoryHost::new();
        host.add_edge_with("a", "b", [("size", 10i64)]);
        host.add_edge_with("a", "b", [("size", 20i64)]);
        let maps = host.edge_attrs("a", "b");
        assert_eq!(maps.len(), 2);
        let mut sizes: Vec<&Value> = maps.iter().map(|m| &m["size"]).collect();
        sizes.sort_by(|a, b| a.compare(b).unwrap());
        assert_eq!(sizes, vec![&Value::Int(10), &Value::Int(20)]);
    }

    #[test]
    fn neighbors_are_distinct() {
        let mut host = MemoryHost::new();
        host.add_edge("a", "b");
        host.add_edge("a", "b");
        host.add_edge("a", "c");
        host.add_edge("d", "a");
        let mut out = host.out_neighbors("a");
        out.sort();
        assert_eq!(out, vec!["b", "c"]);
        assert_eq!(host.in_neighbors("a"), vec!["d"]);
    }
}

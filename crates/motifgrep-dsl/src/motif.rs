use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::skeleton::{EdgeSpec, Skeleton};
use crate::value::{Op, Value};

/// `attr -> op -> values` for one node or edge.
pub type ConstraintTable = IndexMap<String, IndexMap<Op, Vec<Value>>>;

/// `attr -> op -> [(other_node, other_attr)]` for one node.
pub type DynNodeTable = IndexMap<String, IndexMap<Op, Vec<(String, String)>>>;

/// `attr -> op -> [(other_u, other_v, other_attr)]` for one edge.
pub type DynEdgeTable = IndexMap<String, IndexMap<Op, Vec<(String, String, String)>>>;

/// How edge-attribute clauses quantify over parallel host edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum EdgeMatch {
    /// At least one parallel edge satisfies every clause.
    #[default]
    Any,
    /// Every parallel edge satisfies every clause.
    All,
}

impl fmt::Display for EdgeMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EdgeMatch::Any => "any",
            EdgeMatch::All => "all",
        })
    }
}

/// Compile- and search-time options carried on the motif.
#[derive(Debug, Clone, Default)]
pub struct MotifOptions {
    /// Treat all motif edges as undirected when matching.
    pub ignore_direction: bool,
    /// Carried for IR consumers that lower to backends where node aliasing
    /// is possible; the in-memory engine is injective unconditionally.
    pub enforce_inequality: bool,
    /// Emit only the lexicographically-smallest representative of each
    /// automorphism orbit.
    pub exclude_automorphisms: bool,
    pub edge_match: EdgeMatch,
    /// Cap on the number of emitted mappings.
    pub limit: Option<usize>,
}

/// The compiled, immutable form of a motif.
///
/// Built by the DSL transformer and validated before use; treat as
/// read-only for the lifetime of any search over it.
#[derive(Debug, Clone, Default)]
pub struct Motif {
    pub(crate) skeleton: Skeleton,
    /// Edge name -> endpoints. Names are unique; redeclaring replaces.
    pub(crate) named_edges: IndexMap<String, (String, String)>,
    pub(crate) node_constraints: IndexMap<String, ConstraintTable>,
    pub(crate) edge_constraints: IndexMap<(String, String), ConstraintTable>,
    pub(crate) dynamic_node_constraints: IndexMap<String, DynNodeTable>,
    pub(crate) dynamic_edge_constraints: IndexMap<(String, String), DynEdgeTable>,
    /// Declared (`===`) automorphism pairs, each stored sorted.
    pub(crate) automorphisms: Vec<(String, String)>,
    pub(crate) options: MotifOptions,
}

impl Motif {
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn named_edges(&self) -> &IndexMap<String, (String, String)> {
        &self.named_edges
    }

    pub fn node_constraints(&self) -> &IndexMap<String, ConstraintTable> {
        &self.node_constraints
    }

    pub fn edge_constraints(&self) -> &IndexMap<(String, String), ConstraintTable> {
        &self.edge_constraints
    }

    pub fn dynamic_node_constraints(&self) -> &IndexMap<String, DynNodeTable> {
        &self.dynamic_node_constraints
    }

    pub fn dynamic_edge_constraints(&self) -> &IndexMap<(String, String), DynEdgeTable> {
        &self.dynamic_edge_constraints
    }

    /// Explicitly declared automorphism pairs, sorted within each pair.
    pub fn automorphisms(&self) -> &[(String, String)] {
        &self.automorphisms
    }

    pub fn options(&self) -> &MotifOptions {
        &self.options
    }

    /// The constraint-free shadow of this motif: same nodes, every
    /// structural edge present and positive, default options.
    ///
    /// Structural symmetry discovery matches this shadow against itself,
    /// so negative edges count as structure but constraints never do.
    pub fn structural(&self) -> Motif {
        let mut skeleton = Skeleton::new();
        for name in self.skeleton.node_names() {
            skeleton.ensure_node(name);
        }
        for (u, v, spec) in self.skeleton.edges() {
            skeleton.add_edge(
                u,
                v,
                EdgeSpec {
                    exists: true,
                    action: spec.action.clone(),
                },
            );
        }
        Motif {
            skeleton,
            ..Default::default()
        }
    }

    /// Union the constraints of each declared automorphism pair onto both
    /// nodes, so symmetric nodes carry identical constraint tables.
    ///
    /// Only declared (`===`) pairs propagate; structural symmetries found at
    /// search time never feed back into the constraint tables.
    pub(crate) fn propagate_automorphic_constraints(&mut self) {
        for (a, b) in self.automorphisms.clone() {
            let mut merged = self.node_constraints.get(&a).cloned().unwrap_or_default();
            if let Some(other) = self.node_constraints.get(&b) {
                merge_constraint_tables(&mut merged, other);
            }
            self.node_constraints.insert(a, merged.clone());
            self.node_constraints.insert(b, merged);
        }
    }

    /// Render the motif back to DSL source.
    ///
    /// The output is the fully macro-expanded form; recompiling it yields an
    /// equivalent motif (same skeleton and constraint tables, modulo value
    /// order within an operator bucket).
    pub fn to_source(&self) -> String {
        // First declared name wins for each pair; dynamic edge constraints
        // over anonymous pairs get a synthesized name.
        let mut pair_names: IndexMap<(String, String), String> = IndexMap::new();
        for (name, pair) in &self.named_edges {
            pair_names.entry(pair.clone()).or_insert_with(|| name.clone());
        }
        let mut fresh = 0usize;
        let mut pairs_needing_names: Vec<(String, String)> = Vec::new();
        for (pair, table) in &self.dynamic_edge_constraints {
            pairs_needing_names.push(pair.clone());
            for ops in table.values() {
                for targets in ops.values() {
                    for (tu, tv, _) in targets {
                        pairs_needing_names.push((tu.clone(), tv.clone()));
                    }
                }
            }
        }
        for pair in pairs_needing_names {
            if !pair_names.contains_key(&pair) {
                let name = loop {
                    let candidate = format!("__edge_{fresh}");
                    fresh += 1;
                    if !self.named_edges.contains_key(&candidate) {
                        break candidate;
                    }
                };
                pair_names.insert(pair, name);
            }
        }

        let mut out = String::new();
        let mut pairs_done: Vec<(String, String)> = Vec::new();
        for (u, v, spec) in self.skeleton.edges() {
            let pair = (u.to_string(), v.to_string());
            let first_for_pair = !pairs_done.contains(&pair);
            out.push_str(&format!("{u} {} {v}", spec.relation()));
            if first_for_pair {
                if let Some(table) = self.edge_constraints.get(&pair) {
                    let clauses = render_table_clauses(table);
                    if !clauses.is_empty() {
                        out.push_str(&format!(" [{clauses}]"));
                    }
                }
                if let Some(name) = pair_names.get(&pair) {
                    out.push_str(&format!(" as {name}"));
                }
                pairs_done.push(pair);
            }
            out.push('\n');
        }
        // Extra names on already-emitted pairs re-declare the edge; the
        // structural dedup merges them on re-parse.
        for (name, pair) in &self.named_edges {
            if pair_names.get(pair) != Some(name) {
                if let Some(spec) = self.skeleton.edges_between(&pair.0, &pair.1).first() {
                    out.push_str(&format!("{} {} {} as {name}\n", pair.0, spec.relation(), pair.1));
                }
            }
        }

        for (node, table) in &self.node_constraints {
            for (attr, ops) in table {
                for (op, values) in ops {
                    for value in values {
                        out.push_str(&format!("{} {op} {value}\n", render_lhs(node, attr)));
                    }
                }
            }
        }
        for (node, table) in &self.dynamic_node_constraints {
            for (attr, ops) in table {
                for (op, targets) in ops {
                    for (other, other_attr) in targets {
                        out.push_str(&format!(
                            "{} {op} {}\n",
                            render_lhs(node, attr),
                            render_lhs(other, other_attr)
                        ));
                    }
                }
            }
        }
        for (pair, table) in &self.dynamic_edge_constraints {
            let name = &pair_names[pair];
            for (attr, ops) in table {
                for (op, targets) in ops {
                    for (tu, tv, tattr) in targets {
                        let other = &pair_names[&(tu.clone(), tv.clone())];
                        out.push_str(&format!(
                            "{} {op} {}\n",
                            render_lhs(name, attr),
                            render_lhs(other, tattr)
                        ));
                    }
                }
            }
        }
        for (a, b) in &self.automorphisms {
            out.push_str(&format!("{a} === {b}\n"));
        }
        out
    }
}

fn is_bare_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn render_lhs(entity: &str, attr: &str) -> String {
    if is_bare_key(attr) {
        format!("{entity}.{attr}")
    } else {
        format!("{entity}[\"{attr}\"]")
    }
}

fn render_table_clauses(table: &ConstraintTable) -> String {
    let mut clauses = Vec::new();
    for (attr, ops) in table {
        let key = if is_bare_key(attr) {
            attr.clone()
        } else {
            format!("\"{attr}\"")
        };
        for (op, values) in ops {
            for value in values {
                clauses.push(format!("{key} {op} {value}"));
            }
        }
    }
    clauses.join(", ")
}

/// Deep-merge `other` into `table`: union per attribute and operator,
/// keeping set semantics (no duplicate values within a bucket).
pub(crate) fn merge_constraint_tables(table: &mut ConstraintTable, other: &ConstraintTable) {
    for (attr, ops) in other {
        let bucket = table.entry(attr.clone()).or_default();
        for (op, values) in ops {
            let existing = bucket.entry(*op).or_default();
            for value in values {
                if !existing.contains(value) {
                    existing.push(value.clone());
                }
            }
        }
    }
}

use motifgrep_dsl::{Motif, Skeleton};

use crate::engine::Search;
use crate::host::{AttrMap, HostGraph};

/// A motif skeleton exposed as a host graph, for matching a motif against
/// its own structure. Nodes carry no attributes; edges carry none either.
struct SkeletonHost<'a> {
    skeleton: &'a Skeleton,
}

impl HostGraph for SkeletonHost<'_> {
    fn nodes(&self) -> Vec<&str> {
        self.skeleton.node_names().collect()
    }

    fn out_neighbors(&self, node: &str) -> Vec<&str> {
        self.skeleton.out_neighbors(node)
    }

    fn in_neighbors(&self, node: &str) -> Vec<&str> {
        self.skeleton.in_neighbors(node)
    }

    fn has_edge(&self, u: &str, v: &str) -> bool {
        self.skeleton.has_edge(u, v)
    }

    fn node_attrs(&self, _node: &str) -> Option<&AttrMap> {
        None
    }

    fn edge_attrs(&self, _u: &str, _v: &str) -> Vec<&AttrMap> {
        Vec::new()
    }
}

/// The automorphism pairs a mapping is deduplicated against: the declared
/// `===` pairs unioned with structural symmetries.
///
/// Structural symmetries are found by running the engine itself with the
/// motif's constraint-free shadow as both needle and haystack; every
/// self-mapping that moves a node contributes its (sorted) swapped pairs.
/// Constraints are deliberately ignored here, and negative edges count as
/// structure.
pub(crate) fn orbit_pairs(motif: &Motif) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = motif.automorphisms().to_vec();

    let shadow = motif.structural();
    let host = SkeletonHost {
        skeleton: shadow.skeleton(),
    };
    // The shadow carries default options, so this inner search never
    // recurses into orbit discovery and has no cancellation to fail on.
    for mapping in Search::new(&host, &shadow).flatten() {
        for (motif_node, host_node) in &mapping {
            if motif_node != host_node {
                let pair = if motif_node < host_node {
                    (motif_node.clone(), host_node.clone())
                } else {
                    (host_node.clone(), motif_node.clone())
                };
                if !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
        }
    }
    pairs.sort();
    pairs
}

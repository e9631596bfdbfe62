use motifgrep_dsl::{Motif, Op};

use crate::filters;
use crate::host::HostGraph;

/// One dynamic node constraint, resolved to node positions.
pub(crate) struct DynNodeEntry {
    pub lhs: usize,
    pub lhs_attr: String,
    pub op: Op,
    pub rhs: usize,
    pub rhs_attr: String,
}

/// Everything the engine precomputes before the first candidate is tried.
///
/// Motif nodes are referred to by *position* (index into `nodes`, skeleton
/// insertion order); host nodes by index into `host_nodes`. Slots are search
/// depths: `order[slot]` is the motif node assigned at that depth.
pub(crate) struct Plan {
    pub nodes: Vec<String>,
    pub host_nodes: Vec<String>,
    /// slot -> motif node position.
    pub order: Vec<usize>,
    /// motif node position -> slot.
    pub slot_of: Vec<usize>,
    /// Deduped must-exist pairs, as declared (direction preserved).
    pub positive: Vec<(usize, usize)>,
    /// Deduped must-not-exist pairs.
    pub negative: Vec<(usize, usize)>,
    /// Per slot: positive edges between its node and earlier slots, as
    /// `(earlier_slot, this_node_is_source)`.
    pub required: Vec<Vec<(usize, bool)>>,
    /// Per motif node position: whether a positive self-loop is required.
    pub self_loop: Vec<bool>,
    /// Per motif node position: host candidates passing the static node
    /// constraints, computed once by sweeping every host node.
    pub candidates: Vec<Vec<usize>>,
    pub dyn_node: Vec<DynNodeEntry>,
    /// Per slot: indices into `dyn_node` that become fully resolvable once
    /// this slot is assigned.
    pub dyn_ready: Vec<Vec<usize>>,
}

impl Plan {
    pub fn new<H: HostGraph>(host: &H, motif: &Motif) -> Plan {
        let nodes: Vec<String> = motif.skeleton().node_names().map(str::to_string).collect();
        let pos_of = |name: &str| -> usize {
            nodes
                .iter()
                .position(|n| n == name)
                .expect("constraint entity is a skeleton node")
        };
        let host_nodes: Vec<String> = host.nodes().into_iter().map(str::to_string).collect();

        // Split the skeleton into must-exist and must-not-exist pairs.
        // Parallel declarations collapse; structure checks are per-pair.
        let mut positive: Vec<(usize, usize)> = Vec::new();
        let mut negative: Vec<(usize, usize)> = Vec::new();
        for (u, v, spec) in motif.skeleton().edges() {
            let pair = (pos_of(u), pos_of(v));
            let bucket = if spec.exists { &mut positive } else { &mut negative };
            if !bucket.contains(&pair) {
                bucket.push(pair);
            }
        }

        // Candidate sets: every host node surviving the static constraints.
        let candidates: Vec<Vec<usize>> = nodes
            .iter()
            .map(|name| {
                let table = motif.node_constraints().get(name);
                host_nodes
                    .iter()
                    .enumerate()
                    .filter(|(_, h)| match table {
                        Some(table) => filters::table_satisfied(host.node_attrs(h.as_str()), table),
                        None => true,
                    })
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();

        let order = pick_order(nodes.len(), &positive, &candidates);
        let mut slot_of = vec![0usize; nodes.len()];
        for (slot, &pos) in order.iter().enumerate() {
            slot_of[pos] = slot;
        }

        let required: Vec<Vec<(usize, bool)>> = order
            .iter()
            .enumerate()
            .map(|(slot, &pos)| {
                let mut edges = Vec::new();
                for &(u, v) in &positive {
                    if u == pos && slot_of[v] < slot {
                        edges.push((slot_of[v], true));
                    } else if v == pos && slot_of[u] < slot {
                        edges.push((slot_of[u], false));
                    }
                }
                edges
            })
            .collect();
        let self_loop: Vec<bool> = (0..nodes.len())
            .map(|pos| positive.contains(&(pos, pos)))
            .collect();

        let mut dyn_node = Vec::new();
        for (node, table) in motif.dynamic_node_constraints() {
            for (attr, ops) in table {
                for (op, targets) in ops {
                    for (other, other_attr) in targets {
                        dyn_node.push(DynNodeEntry {
                            lhs: pos_of(node),
                            lhs_attr: attr.clone(),
                            op: *op,
                            rhs: pos_of(other),
                            rhs_attr: other_attr.clone(),
                        });
                    }
                }
            }
        }
        let mut dyn_ready: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        for (i, entry) in dyn_node.iter().enumerate() {
            let ready_at = slot_of[entry.lhs].max(slot_of[entry.rhs]);
            dyn_ready[ready_at].push(i);
        }

        tracing::debug!(
            motif_nodes = nodes.len(),
            host_nodes = host_nodes.len(),
            positive = positive.len(),
            negative = negative.len(),
            candidate_sizes = ?candidates.iter().map(Vec::len).collect::<Vec<_>>(),
            "prepared search plan"
        );

        Plan {
            nodes,
            host_nodes,
            order,
            slot_of,
            positive,
            negative,
            required,
            self_loop,
            candidates,
            dyn_node,
            dyn_ready,
        }
    }
}

/// VF2-style node ordering: start at the node with the fewest candidates,
/// then repeatedly take the unordered node adjacent (over positive edges,
/// ignoring direction) to the ordered prefix with the fewest candidates.
/// Disconnected components resume with a fresh fewest-candidates pick.
fn pick_order(n: usize, positive: &[(usize, usize)], candidates: &[Vec<usize>]) -> Vec<usize> {
    let mut order: Vec<usize> = Vec::with_capacity(n);
    let mut placed = vec![false; n];

    let adjacent = |pos: usize, placed: &[bool]| -> bool {
        positive
            .iter()
            .any(|&(u, v)| (u == pos && placed[v]) || (v == pos && placed[u]))
    };

    while order.len() < n {
        let next = (0..n)
            .filter(|&p| !placed[p])
            .min_by_key(|&p| {
                // Prefer prefix-adjacent nodes, then smaller candidate sets,
                // then declaration order (stable for tests).
                let connected = if order.is_empty() || adjacent(p, &placed) {
                    0
                } else {
                    1
                };
                (connected, candidates[p].len(), p)
            })
            .expect("some node is unplaced");
        placed[next] = true;
        order.push(next);
    }
    order
}

#[cfg(test)]
mod tests {
    use motifgrep_dsl::compile;

    use super::*;
    use crate::host::MemoryHost;

    fn host_ab() -> MemoryHost {
        let mut host = MemoryHost::new();
        host.add_edge("x", "y");
        host.add_edge("x", "z");
        host
    }

    #[test]
    fn positive_and_negative_split() {
        let motif = compile("A -> B\nA -> C\nB !> C\n").unwrap();
        let plan = Plan::new(&host_ab(), &motif);
        assert_eq!(plan.positive.len(), 2);
        assert_eq!(plan.negative.len(), 1);
    }

    #[test]
    fn parallel_declarations_collapse_per_pair() {
        let motif = compile("A -> B\nA -+ B\n").unwrap();
        let plan = Plan::new(&host_ab(), &motif);
        assert_eq!(plan.positive, vec![(0, 1)]);
    }

    #[test]
    fn candidates_respect_node_constraints() {
        let mut host = MemoryHost::new();
        host.add_node_with("big", [("radius", 20i64)]);
        host.add_node_with("small", [("radius", 2i64)]);
        host.add_edge("big", "small");
        let motif = compile("A -> B\nA.radius > 10\n").unwrap();
        let plan = Plan::new(&host, &motif);
        // A admits only "big"; B has no constraints.
        assert_eq!(plan.candidates[0], vec![0]);
        assert_eq!(plan.candidates[1], vec![0, 1]);
    }

    #[test]
    fn order_starts_at_most_constrained_node() {
        let mut host = MemoryHost::new();
        host.add_node_with("big", [("radius", 20i64)]);
        host.add_node_with("small", [("radius", 2i64)]);
        host.add_edge("small", "big");
        let motif = compile("A -> B\nB.radius > 10\n").unwrap();
        let plan = Plan::new(&host, &motif);
        // B has the single-candidate set, so it is slotted first.
        assert_eq!(plan.order[0], 1);
        assert_eq!(plan.slot_of[1], 0);
    }

    #[test]
    fn order_walks_the_connected_prefix() {
        let motif = compile("A -> B\nB -> C\nC -> D\n").unwrap();
        let plan = Plan::new(&host_ab(), &motif);
        // Whatever the start, each later slot is adjacent to the prefix.
        for (slot, &pos) in plan.order.iter().enumerate().skip(1) {
            let adjacent = plan
                .positive
                .iter()
                .any(|&(u, v)| {
                    (u == pos && plan.slot_of[v] < slot) || (v == pos && plan.slot_of[u] < slot)
                });
            assert!(adjacent, "slot {slot} (node {pos}) is disconnected from prefix");
        }
    }

    #[test]
    fn required_edges_point_into_the_prefix() {
        let motif = compile("A -> B\nB -> C\nC -> A\n").unwrap();
        let plan = Plan::new(&host_ab(), &motif);
        assert!(plan.required[0].is_empty());
        // The triangle closes at the last slot with two required edges.
        assert_eq!(plan.required[2].len(), 2);
    }

    #[test]
    fn dynamic_entries_become_ready_at_their_later_slot() {
        let motif = compile("A -> B\nA.radius > B.radius\n").unwrap();
        let plan = Plan::new(&host_ab(), &motif);
        assert_eq!(plan.dyn_node.len(), 1);
        assert!(plan.dyn_ready[0].is_empty());
        assert_eq!(plan.dyn_ready[1], vec![0]);
    }
}

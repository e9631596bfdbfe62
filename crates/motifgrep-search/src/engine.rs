use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;

use motifgrep_dsl::Motif;

use crate::error::SearchError;
use crate::filters;
use crate::host::HostGraph;
use crate::orbit;
use crate::plan::Plan;

/// A mapping from motif node names to host node names, in skeleton
/// insertion order.
pub type Mapping = IndexMap<String, String>;

/// Cooperative cancellation handle.
///
/// Clone it, hand one clone to the search, and flip it from anywhere; the
/// engine polls at every candidate step and surfaces
/// [`SearchError::Cancelled`] once before fusing the iterator.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Start a lazy search for `motif` in `host`.
///
/// The result cap comes from the motif's options and can be overridden with
/// [`Search::with_limit`].
pub fn search<'a, H: HostGraph>(host: &'a H, motif: &'a Motif) -> Search<'a, H> {
    Search::new(host, motif)
}

/// Count every mapping of `motif` in `host`.
pub fn count<H: HostGraph>(host: &H, motif: &Motif) -> Result<usize, SearchError> {
    let mut total = 0;
    for result in search(host, motif) {
        result?;
        total += 1;
    }
    Ok(total)
}

/// A lazy, non-restartable stream of motif mappings.
///
/// Backtracking runs on an explicit per-slot cursor stack rather than
/// recursion, so the frame size is independent of motif depth and the
/// cancellation poll sits naturally in the loop. The search owns its state;
/// the motif and host are shared read-only.
pub struct Search<'a, H: HostGraph> {
    host: &'a H,
    motif: &'a Motif,
    plan: Plan,
    /// slot -> host node index; `None` above the current depth.
    assignment: Vec<Option<usize>>,
    /// Inverse occupancy, for injectivity.
    used: Vec<bool>,
    /// Per slot: next candidate position to try.
    cursors: Vec<usize>,
    depth: usize,
    /// Automorphism orbit pairs as motif node positions, each sorted.
    orbit: Vec<(usize, usize)>,
    emitted: usize,
    limit: Option<usize>,
    cancel: CancelToken,
    done: bool,
}

impl<'a, H: HostGraph> Search<'a, H> {
    pub fn new(host: &'a H, motif: &'a Motif) -> Self {
        let plan = Plan::new(host, motif);
        let orbit = if motif.options().exclude_automorphisms {
            orbit::orbit_pairs(motif)
                .into_iter()
                .filter_map(|(a, b)| {
                    let a = plan.nodes.iter().position(|n| *n == a)?;
                    let b = plan.nodes.iter().position(|n| *n == b)?;
                    Some((a, b))
                })
                .collect()
        } else {
            Vec::new()
        };
        let slots = plan.order.len();
        let host_size = plan.host_nodes.len();
        Search {
            host,
            motif,
            plan,
            assignment: vec![None; slots],
            used: vec![false; host_size],
            cursors: vec![0; slots],
            depth: 0,
            orbit,
            emitted: 0,
            limit: motif.options().limit,
            cancel: CancelToken::new(),
            done: false,
        }
    }

    /// Override the result cap from the motif options.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn host_name(&self, slot: usize) -> &str {
        let idx = self.assignment[slot].expect("slot is assigned");
        &self.plan.host_nodes[idx]
    }

    /// Host name currently standing for the motif node at `pos`, taking the
    /// candidate `h` for the slot being tried.
    fn host_name_with(&self, pos: usize, trying_slot: usize, h: usize) -> &str {
        let slot = self.plan.slot_of[pos];
        if slot == trying_slot {
            &self.plan.host_nodes[h]
        } else {
            self.host_name(slot)
        }
    }

    fn edge_present(&self, x: &str, y: &str) -> bool {
        self.host.has_edge(x, y)
            || (self.motif.options().ignore_direction && self.host.has_edge(y, x))
    }

    /// Extension checks for candidate `h` at `slot`: injectivity, required
    /// positive edges into the mapped prefix, and every dynamic node
    /// constraint that becomes resolvable here.
    fn feasible(&self, slot: usize, h: usize) -> bool {
        if self.used[h] {
            return false;
        }
        let name = &self.plan.host_nodes[h];
        if self.plan.self_loop[self.plan.order[slot]] && !self.edge_present(name, name) {
            return false;
        }
        for &(earlier_slot, outgoing) in &self.plan.required[slot] {
            let other = self.host_name(earlier_slot);
            let present = if outgoing {
                self.edge_present(name, other)
            } else {
                self.edge_present(other, name)
            };
            if !present {
                return false;
            }
        }
        for &entry_idx in &self.plan.dyn_ready[slot] {
            let entry = &self.plan.dyn_node[entry_idx];
            let lhs_host = self.host_name_with(entry.lhs, slot, h);
            let rhs_host = self.host_name_with(entry.rhs, slot, h);
            let lhs = self.host.node_attrs(lhs_host).and_then(|a| a.get(&entry.lhs_attr));
            let rhs = self.host.node_attrs(rhs_host).and_then(|a| a.get(&entry.rhs_attr));
            if !motifgrep_dsl::value::eval_dynamic(entry.op, lhs, rhs) {
                return false;
            }
        }
        true
    }

    /// Post-filters over a complete assignment, in fixed order: negative
    /// edges, static edge constraints under the multigraph quantifier,
    /// dynamic edge constraints, then the automorphism representative check.
    /// (Dynamic node constraints were all resolved during extension.)
    fn accept(&self) -> bool {
        let options = self.motif.options();

        for &(u, v) in &self.plan.negative {
            let x = self.host_name(self.plan.slot_of[u]);
            let y = self.host_name(self.plan.slot_of[v]);
            if self.edge_present(x, y) {
                return false;
            }
        }

        for ((u, v), table) in self.motif.edge_constraints() {
            // Clauses bind to must-exist edges; a constraint table on a
            // purely negative pair has nothing to check against.
            let is_positive = self
                .motif
                .skeleton()
                .edges_between(u, v)
                .iter()
                .any(|spec| spec.exists);
            if !is_positive {
                continue;
            }
            let x = self.mapped_name(u);
            let y = self.mapped_name(v);
            if !filters::edge_table_holds(
                self.host,
                x,
                y,
                table,
                options.edge_match,
                options.ignore_direction,
            ) {
                return false;
            }
        }

        for ((u, v), table) in self.motif.dynamic_edge_constraints() {
            let this = (self.mapped_name(u), self.mapped_name(v));
            for (attr, ops) in table {
                for (op, targets) in ops {
                    for (tu, tv, that_attr) in targets {
                        let that = (self.mapped_name(tu), self.mapped_name(tv));
                        if !filters::dynamic_edge_entry_holds(
                            self.host,
                            this,
                            attr,
                            *op,
                            that,
                            that_attr,
                            options.edge_match,
                            options.ignore_direction,
                        ) {
                            return false;
                        }
                    }
                }
            }
        }

        for &(a, b) in &self.orbit {
            let a = self.host_name(self.plan.slot_of[a]);
            let b = self.host_name(self.plan.slot_of[b]);
            if a > b {
                return false;
            }
        }
        true
    }

    fn mapped_name(&self, motif_node: &str) -> &str {
        let pos = self
            .plan
            .nodes
            .iter()
            .position(|n| n == motif_node)
            .expect("constraint entity is a skeleton node");
        self.host_name(self.plan.slot_of[pos])
    }

    fn mapping(&self) -> Mapping {
        (0..self.plan.nodes.len())
            .map(|pos| {
                (
                    self.plan.nodes[pos].clone(),
                    self.host_name(self.plan.slot_of[pos]).to_string(),
                )
            })
            .collect()
    }

    fn unassign(&mut self, slot: usize) {
        if let Some(h) = self.assignment[slot].take() {
            self.used[h] = false;
        }
    }
}

impl<H: HostGraph> Iterator for Search<'_, H> {
    type Item = Result<Mapping, SearchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let slots = self.plan.order.len();
        if slots == 0 {
            // An empty motif matches nothing: there is no slot to fill.
            self.done = true;
            return None;
        }

        loop {
            if self.cancel.is_cancelled() {
                self.done = true;
                return Some(Err(SearchError::Cancelled));
            }

            let node_pos = self.plan.order[self.depth];
            let candidates = &self.plan.candidates[node_pos];
            let cursor = self.cursors[self.depth];
            if cursor >= candidates.len() {
                // Exhausted this slot: backtrack or finish.
                if self.depth == 0 {
                    self.done = true;
                    return None;
                }
                self.depth -= 1;
                self.unassign(self.depth);
                continue;
            }
            self.cursors[self.depth] += 1;
            let h = candidates[cursor];
            if !self.feasible(self.depth, h) {
                continue;
            }

            self.assignment[self.depth] = Some(h);
            self.used[h] = true;
            if self.depth + 1 < slots {
                self.depth += 1;
                self.cursors[self.depth] = 0;
                continue;
            }

            // Complete mapping: run the post-filters, then release the last
            // slot either way so the cursor resumes the enumeration.
            let accepted = self.accept();
            if accepted {
                let mapping = self.mapping();
                self.unassign(self.depth);
                self.emitted += 1;
                if self.limit.is_some_and(|limit| self.emitted >= limit) {
                    self.done = true;
                }
                return Some(Ok(mapping));
            }
            self.unassign(self.depth);
        }
    }
}

#[cfg(test)]
mod tests {
    use motifgrep_dsl::compile;

    use super::*;
    use crate::host::MemoryHost;

    #[test]
    fn single_edge_motif_counts_host_edges() {
        let motif = compile("A -> B\n").unwrap();
        let mut host = MemoryHost::new();
        host.add_edge("x", "y");
        assert_eq!(count(&host, &motif).unwrap(), 1);
        // A parallel duplicate does not create a second mapping.
        host.add_edge("x", "y");
        assert_eq!(count(&host, &motif).unwrap(), 1);
        host.add_edge("x", "z");
        assert_eq!(count(&host, &motif).unwrap(), 2);
    }

    #[test]
    fn mappings_are_keyed_by_motif_node_in_order() {
        let motif = compile("A -> B\n").unwrap();
        let mut host = MemoryHost::new();
        host.add_edge("x", "y");
        let mappings: Vec<Mapping> = search(&host, &motif).flatten().collect();
        assert_eq!(mappings.len(), 1);
        let keys: Vec<&String> = mappings[0].keys().collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(mappings[0]["A"], "x");
        assert_eq!(mappings[0]["B"], "y");
    }

    #[test]
    fn self_loop_motif_requires_a_host_self_loop() {
        let motif = compile("A -> A\n").unwrap();
        let mut host = MemoryHost::new();
        host.add_edge("x", "x");
        host.add_edge("x", "y");
        let found: Vec<Mapping> = search(&host, &motif).flatten().collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["A"], "x");
    }

    #[test]
    fn empty_motif_yields_no_mappings() {
        let motif = compile("").unwrap();
        let mut host = MemoryHost::new();
        host.add_edge("x", "y");
        assert_eq!(count(&host, &motif).unwrap(), 0);
    }

    #[test]
    fn empty_host_yields_no_mappings() {
        let motif = compile("A -> B\n").unwrap();
        let host = MemoryHost::new();
        assert_eq!(count(&host, &motif).unwrap(), 0);
    }

    #[test]
    fn mappings_are_injective() {
        // A bidirectional pair in the host could tempt A and B onto the
        // same host node; injectivity forbids it.
        let motif = compile("A -> B\nB -> A\n").unwrap();
        let mut host = MemoryHost::new();
        host.add_edge("x", "x");
        host.add_edge("x", "y");
        host.add_edge("y", "x");
        let mappings: Vec<Mapping> = search(&host, &motif).flatten().collect();
        for mapping in &mappings {
            assert_ne!(mapping["A"], mapping["B"]);
        }
        assert_eq!(mappings.len(), 2);
    }

    #[test]
    fn limit_halts_enumeration() {
        let motif = compile("A -> B\n").unwrap();
        let mut host = MemoryHost::new();
        host.add_edge("x", "y");
        host.add_edge("x", "z");
        host.add_edge("y", "z");
        let capped: Vec<Mapping> = search(&host, &motif)
            .with_limit(Some(2))
            .flatten()
            .collect();
        assert_eq!(capped.len(), 2);
        let all: Vec<Mapping> = search(&host, &motif).flatten().collect();
        assert_eq!(all.len(), 3);
        // The capped stream is a prefix of the uncapped one.
        assert_eq!(capped[..], all[..2]);
    }

    #[test]
    fn cancellation_surfaces_once_then_fuses() {
        let motif = compile("A -> B\n").unwrap();
        let mut host = MemoryHost::new();
        host.add_edge("x", "y");
        let token = CancelToken::new();
        token.cancel();
        let mut results = search(&host, &motif).with_cancel(token);
        assert_eq!(results.next(), Some(Err(SearchError::Cancelled)));
        assert!(results.next().is_none());
    }

    #[test]
    fn cancellation_after_some_results() {
        let motif = compile("A -> B\n").unwrap();
        let mut host = MemoryHost::new();
        host.add_edge("x", "y");
        host.add_edge("x", "z");
        let token = CancelToken::new();
        let mut results = search(&host, &motif).with_cancel(token.clone());
        let first = results.next().unwrap();
        assert!(first.is_ok());
        token.cancel();
        assert_eq!(results.next(), Some(Err(SearchError::Cancelled)));
        assert!(results.next().is_none());
    }
}

use indexmap::IndexMap;

use crate::error::CompileError;
use crate::motif::{Motif, MotifOptions, merge_constraint_tables};
use crate::parse::grammar::{Clause, ConstraintStmt, EdgeStmt, MacroCall, MacroDef, Rhs, Stmt};
use crate::validate::Validator;

/// Lower parsed statements into a motif IR.
///
/// Macro expansion is eager; constraint statements are pooled and
/// disambiguated (node vs. named edge) only after every statement has been
/// lowered, so entities may be introduced in any order.
pub(crate) fn run(
    stmts: Vec<Stmt>,
    options: MotifOptions,
    validators: &[Box<dyn Validator>],
) -> Result<Motif, CompileError> {
    let mut transformer = Transformer {
        motif: Motif {
            options,
            ..Default::default()
        },
        macros: IndexMap::new(),
        pool: Vec::new(),
        edge_instances: 0,
        validators,
    };

    for stmt in stmts {
        transformer.statement(stmt, &mut Vec::new())?;
    }
    transformer.resolve_pool()?;
    transformer.motif.propagate_automorphic_constraints();

    for validator in validators {
        validator.on_motif(&transformer.motif)?;
    }

    tracing::debug!(
        nodes = transformer.motif.skeleton().node_count(),
        edges = transformer.motif.skeleton().edge_count(),
        named_edges = transformer.motif.named_edges().len(),
        "compiled motif"
    );
    Ok(transformer.motif)
}

/// A deferred `entity.attr OP rhs` waiting for entity disambiguation.
struct PoolEntry {
    entity: String,
    attr: String,
    op: crate::value::Op,
    rhs: Rhs,
}

struct Transformer<'v> {
    motif: Motif,
    macros: IndexMap<String, MacroDef>,
    pool: Vec<PoolEntry>,
    /// Monotone counter giving named edges from macro bodies a fresh
    /// identity per invocation.
    edge_instances: usize,
    validators: &'v [Box<dyn Validator>],
}

impl Transformer<'_> {
    /// Lower one statement. `expansion` is the stack of macro names
    /// currently being expanded, for recursion detection.
    fn statement(&mut self, stmt: Stmt, expansion: &mut Vec<String>) -> Result<(), CompileError> {
        match stmt {
            Stmt::MacroDef(def) => {
                // Definitions emit nothing; redefinition replaces.
                self.macros.insert(def.name.clone(), def);
                Ok(())
            }
            Stmt::Edge(edge) => self.edge(edge),
            Stmt::Constraint(c) => {
                self.pool.push(PoolEntry {
                    entity: c.entity,
                    attr: c.attr,
                    op: c.op,
                    rhs: c.rhs,
                });
                Ok(())
            }
            Stmt::Automorphism(a, b) => {
                let pair = if a <= b { (a, b) } else { (b, a) };
                if !self.motif.automorphisms.contains(&pair) {
                    self.motif.automorphisms.push(pair);
                }
                Ok(())
            }
            Stmt::MacroCall(call) => self.expand(call, expansion),
        }
    }

    fn edge(&mut self, edge: EdgeStmt) -> Result<(), CompileError> {
        for validator in self.validators {
            validator.on_edge(
                &self.motif.skeleton,
                &edge.u,
                &edge.v,
                &edge.rel.action,
                edge.rel.exists,
            )?;
        }

        // Identical (exists, action) declarations merge into one structural
        // edge; a different action makes a parallel edge.
        let duplicate = self
            .motif
            .skeleton
            .edges_between(&edge.u, &edge.v)
            .iter()
            .any(|spec| **spec == edge.rel);
        if !duplicate {
            self.motif.skeleton.add_edge(&edge.u, &edge.v, edge.rel);
        }

        if !edge.clauses.is_empty() {
            let table = clause_table(&edge.clauses);
            let bucket = self
                .motif
                .edge_constraints
                .entry((edge.u.clone(), edge.v.clone()))
                .or_default();
            merge_constraint_tables(bucket, &table);
        }

        if let Some(name) = edge.name {
            self.motif.named_edges.insert(name, (edge.u, edge.v));
        }
        Ok(())
    }

    // -- macro expansion --

    fn expand(&mut self, call: MacroCall, expansion: &mut Vec<String>) -> Result<(), CompileError> {
        if expansion.contains(&call.name) {
            let mut cycle = expansion.clone();
            cycle.push(call.name.clone());
            return Err(CompileError::MacroRecursion {
                cycle: cycle.join(" -> "),
            });
        }
        let def = self
            .macros
            .get(&call.name)
            .ok_or_else(|| CompileError::UndefinedMacro(call.name.clone()))?
            .clone();
        if def.formals.len() != call.args.len() {
            return Err(CompileError::MacroArity {
                name: call.name.clone(),
                expected: def.formals.len(),
                got: call.args.len(),
            });
        }

        let substitution: IndexMap<&str, &str> = def
            .formals
            .iter()
            .map(String::as_str)
            .zip(call.args.iter().map(String::as_str))
            .collect();

        // Every named edge in this body gets an invocation-unique identity,
        // so constraints from this same expansion bind to this instance.
        let mut edge_renames: IndexMap<String, String> = IndexMap::new();
        for stmt in &def.body {
            if let Stmt::Edge(EdgeStmt {
                name: Some(name), ..
            }) = stmt
            {
                let fresh = format!("{name}__{}", self.edge_instances);
                self.edge_instances += 1;
                edge_renames.insert(name.clone(), fresh);
            }
        }

        let substitute = |id: &str| -> String {
            // Formals map to actuals; macro-local edge names map to their
            // fresh instance; anything else passes through, which lets a
            // body reference a fixed motif node.
            if let Some(renamed) = edge_renames.get(id) {
                renamed.clone()
            } else if let Some(actual) = substitution.get(id) {
                actual.to_string()
            } else {
                id.to_string()
            }
        };

        expansion.push(call.name.clone());
        for stmt in &def.body {
            let rewritten = match stmt {
                Stmt::Edge(edge) => Stmt::Edge(EdgeStmt {
                    u: substitute(&edge.u),
                    rel: edge.rel.clone(),
                    v: substitute(&edge.v),
                    clauses: edge.clauses.clone(),
                    name: edge.name.as_deref().map(&substitute),
                }),
                Stmt::Constraint(c) => Stmt::Constraint(ConstraintStmt {
                    entity: substitute(&c.entity),
                    attr: c.attr.clone(),
                    op: c.op,
                    rhs: match &c.rhs {
                        Rhs::Literal(value) => Rhs::Literal(value.clone()),
                        Rhs::Attr { entity, attr } => Rhs::Attr {
                            entity: substitute(entity),
                            attr: attr.clone(),
                        },
                    },
                }),
                Stmt::MacroCall(inner) => Stmt::MacroCall(MacroCall {
                    name: inner.name.clone(),
                    args: inner.args.iter().map(|a| substitute(a)).collect(),
                }),
                // The grammar rejects these inside macro bodies.
                Stmt::MacroDef(_) | Stmt::Automorphism(..) => unreachable!(),
            };
            self.statement(rewritten, expansion)?;
        }
        expansion.pop();
        tracing::debug!(name = %call.name, "expanded macro");
        Ok(())
    }

    // -- deferred constraint resolution --

    /// Sort the pooled constraints into node vs. named-edge tables. Deferred
    /// to the very end because entities may be introduced in any order.
    fn resolve_pool(&mut self) -> Result<(), CompileError> {
        for entry in std::mem::take(&mut self.pool) {
            if self.motif.skeleton.contains_node(&entry.entity) {
                match entry.rhs {
                    Rhs::Literal(value) => {
                        self.motif
                            .node_constraints
                            .entry(entry.entity)
                            .or_default()
                            .entry(entry.attr)
                            .or_default()
                            .entry(entry.op)
                            .or_default()
                            .push(value);
                    }
                    Rhs::Attr { entity, attr } => {
                        // The comparison target must itself be a node.
                        if !self.motif.skeleton.contains_node(&entity) {
                            return Err(CompileError::UnresolvedIdentifier(entity));
                        }
                        self.motif
                            .dynamic_node_constraints
                            .entry(entry.entity)
                            .or_default()
                            .entry(entry.attr)
                            .or_default()
                            .entry(entry.op)
                            .or_default()
                            .push((entity, attr));
                    }
                }
            } else if let Some(pair) = self.motif.named_edges.get(&entry.entity).cloned() {
                match entry.rhs {
                    Rhs::Literal(value) => {
                        self.motif
                            .edge_constraints
                            .entry(pair)
                            .or_default()
                            .entry(entry.attr)
                            .or_default()
                            .entry(entry.op)
                            .or_default()
                            .push(value);
                    }
                    Rhs::Attr { entity, attr } => {
                        // A dynamic edge constraint's target must itself be
                        // a named edge.
                        let (tu, tv) = self
                            .motif
                            .named_edges
                            .get(&entity)
                            .cloned()
                            .ok_or_else(|| CompileError::UnresolvedIdentifier(entity.clone()))?;
                        self.motif
                            .dynamic_edge_constraints
                            .entry(pair)
                            .or_default()
                            .entry(entry.attr)
                            .or_default()
                            .entry(entry.op)
                            .or_default()
                            .push((tu, tv, attr));
                    }
                }
            } else {
                return Err(CompileError::UnresolvedIdentifier(entry.entity));
            }
        }
        Ok(())
    }
}

fn clause_table(clauses: &[Clause]) -> crate::motif::ConstraintTable {
    let mut table = crate::motif::ConstraintTable::new();
    for clause in clauses {
        table
            .entry(clause.attr.clone())
            .or_default()
            .entry(clause.op)
            .or_default()
            .push(clause.value.clone());
    }
    table
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::error::CompileError;
    use crate::skeleton::Action;
    use crate::value::{Op, Value};
    use crate::{compile, compile_with};

    const THREE_CYCLE: &str = "A -> B\nB -> C\nC -> A\n";
    const THREE_CYCLE_NEG: &str = "A !> B\nB !> C\nC !> A\n";
    const THREE_CYCLE_INH: &str = "A -| B\nB -| C\nC -| A\n";
    const SEMICOLON_TRIANGLE: &str = "A->B;B->C;C->A";

    #[test]
    fn triangle() {
        let motif = compile(THREE_CYCLE).unwrap();
        assert_eq!(motif.skeleton().edge_count(), 3);
        assert_eq!(motif.skeleton().node_count(), 3);
    }

    #[test]
    fn semicolon_separators() {
        let motif = compile(SEMICOLON_TRIANGLE).unwrap();
        assert_eq!(motif.skeleton().edge_count(), 3);
        assert_eq!(motif.skeleton().node_count(), 3);
    }

    #[test]
    fn actions_carry_through() {
        let motif = compile(THREE_CYCLE).unwrap();
        assert!(
            motif
                .skeleton()
                .edges()
                .all(|(_, _, spec)| spec.action == Action::Default)
        );
        let motif = compile(THREE_CYCLE_INH).unwrap();
        assert!(
            motif
                .skeleton()
                .edges()
                .all(|(_, _, spec)| spec.action == Action::Negative)
        );
    }

    #[test]
    fn existence_carries_through() {
        let motif = compile(THREE_CYCLE).unwrap();
        assert!(motif.skeleton().edges().all(|(_, _, spec)| spec.exists));
        let motif = compile(THREE_CYCLE_NEG).unwrap();
        assert!(motif.skeleton().edges().all(|(_, _, spec)| !spec.exists));
    }

    #[test]
    fn duplicate_declarations_merge() {
        let motif = compile("A -> B\nA -> B\n").unwrap();
        assert_eq!(motif.skeleton().edge_count(), 1);
    }

    #[test]
    fn different_actions_make_parallel_edges() {
        let motif = compile("A -> B\nA -+ B\n").unwrap();
        assert_eq!(motif.skeleton().edge_count(), 2);
    }

    #[test]
    fn statement_order_does_not_matter() {
        let motif = compile("A.radius = 5\nA -> B\n").unwrap();
        assert_eq!(
            motif.node_constraints()["A"]["radius"][&Op::Eq],
            vec![Value::Int(5)]
        );
    }

    // -- edge clauses --

    #[test]
    fn edge_clause_lowering() {
        let motif = compile("Aa -> Ba [type == 1]\n").unwrap();
        let table = &motif.edge_constraints()[&("Aa".to_string(), "Ba".to_string())];
        assert_eq!(table["type"][&Op::Eq], vec![Value::Int(1)]);
    }

    #[test]
    fn repeated_clause_keys_accumulate() {
        let motif = compile("Aa -> Ba [type != 1, type != 12]\n").unwrap();
        let table = &motif.edge_constraints()[&("Aa".to_string(), "Ba".to_string())];
        assert_eq!(table["type"][&Op::Ne], vec![Value::Int(1), Value::Int(12)]);
    }

    #[test]
    fn clauses_merge_across_declarations() {
        let motif = compile("A -> B [w > 1]\nA -> B [w < 9]\n").unwrap();
        let table = &motif.edge_constraints()[&("A".to_string(), "B".to_string())];
        assert_eq!(table["w"][&Op::Gt], vec![Value::Int(1)]);
        assert_eq!(table["w"][&Op::Lt], vec![Value::Int(9)]);
    }

    // -- node constraints --

    #[test]
    fn node_constraints_sort_into_place() {
        let motif = compile("Aa -> Ba\nAa.type = \"excitatory\"\nAa.size = 4.5\n").unwrap();
        let constraints = motif.node_constraints();
        assert_eq!(constraints.len(), 1);
        assert_eq!(
            constraints["Aa"]["type"][&Op::Eq],
            vec![Value::Str("excitatory".into())]
        );
        assert_eq!(constraints["Aa"]["size"][&Op::Eq], vec![Value::Float(4.5)]);
    }

    #[test]
    fn bracket_keyed_node_constraint() {
        let motif = compile("Aa -> Ba\nAa['type'] = \"excitatory\"\n").unwrap();
        assert!(motif.node_constraints()["Aa"].contains_key("type"));
    }

    #[test]
    fn dynamic_node_constraint() {
        let motif = compile("A -> B\nA.radius < B.radius\n").unwrap();
        assert_eq!(motif.dynamic_node_constraints().len(), 1);
        assert_eq!(
            motif.dynamic_node_constraints()["A"]["radius"][&Op::Lt],
            vec![("B".to_string(), "radius".to_string())]
        );
    }

    #[test]
    fn dynamic_target_must_be_a_node() {
        let err = compile("A -> B\nA.radius > Zed.radius\n").unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedIdentifier(name) if name == "Zed"));
    }

    #[test]
    fn unknown_constraint_entity_is_an_error() {
        let err = compile("A -> B\nC.radius < B.radius\n").unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedIdentifier(name) if name == "C"));
    }

    // -- named edges --

    #[test]
    fn named_edge_registration() {
        let motif = compile("A -> B as ab\n").unwrap();
        assert_eq!(
            motif.named_edges()["ab"],
            ("A".to_string(), "B".to_string())
        );
    }

    #[test]
    fn named_edge_constraint_promotes_to_edge_table() {
        let motif = compile("A -> B [type != 1] as ab_2\nab_2.flavor = \"excitatory\"\n").unwrap();
        let table = &motif.edge_constraints()[&("A".to_string(), "B".to_string())];
        assert_eq!(
            table["flavor"][&Op::Eq],
            vec![Value::Str("excitatory".into())]
        );
    }

    #[test]
    fn named_edge_dynamic_constraint() {
        let motif = compile("A -> B as ab\nB -> A as ba\nab['flavor'] = ba['flavor']\n").unwrap();
        let table = &motif.dynamic_edge_constraints()[&("A".to_string(), "B".to_string())];
        assert_eq!(
            table["flavor"][&Op::Eq],
            vec![("B".to_string(), "A".to_string(), "flavor".to_string())]
        );
    }

    #[test]
    fn unknown_named_edge_is_an_error() {
        let err = compile("A -> B as ab\nacb.radius = 3\n").unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedIdentifier(name) if name == "acb"));
    }

    #[test]
    fn dynamic_target_must_be_a_named_edge() {
        let err = compile("A -> B as ab\nB -> A\nab.w = ba.w\n").unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedIdentifier(name) if name == "ba"));
    }

    // -- automorphisms --

    #[test]
    fn automorphism_pairs_are_sorted_and_deduped() {
        let motif = compile("A -> B\nB === A\nA === B\n").unwrap();
        assert_eq!(motif.automorphisms(), &[("A".to_string(), "B".to_string())]);
    }

    // -- macros --

    #[test]
    fn definition_alone_emits_nothing() {
        let motif = compile("edge(A, B) {\n  A -> B\n}\n").unwrap();
        assert_eq!(motif.skeleton().edge_count(), 0);
    }

    #[test]
    fn simple_expansion() {
        let motif = compile("edge(A, B) {\n  A -> B\n}\nedge(C, D)\n").unwrap();
        assert_eq!(motif.skeleton().edge_count(), 1);
        assert!(motif.skeleton().has_edge("C", "D"));
    }

    #[test]
    fn multiline_macro() {
        let motif = compile("dualedge(A, B) {\n  A -> B\n  B -> A\n}\ndualedge(C, D)\n").unwrap();
        assert_eq!(motif.skeleton().edge_count(), 2);
        assert!(motif.skeleton().has_edge("C", "D"));
        assert!(motif.skeleton().has_edge("D", "C"));
    }

    #[test]
    fn macro_reuse() {
        let motif = compile(
            "tri(A, B, C) {\n  A -> B\n  B -> C\n  C -> A\n}\ntri(C, D, E)\ntri(F, G, H)\n",
        )
        .unwrap();
        assert_eq!(motif.skeleton().edge_count(), 6);
    }

    #[test]
    fn undefined_macro() {
        let err = compile("edge(A, B) {\n  A -> B\n}\nfoo(C, D)\n").unwrap_err();
        assert!(matches!(err, CompileError::UndefinedMacro(name) if name == "foo"));
    }

    #[test]
    fn wrong_arity() {
        let err = compile("edge(A, B) {\n  A -> B\n}\nedge(C, D, E)\n").unwrap_err();
        assert!(matches!(
            err,
            CompileError::MacroArity {
                expected: 2,
                got: 3,
                ..
            }
        ));
    }

    #[test]
    fn nested_macros() {
        let motif = compile(
            "dualedge(A, B) {\n  A -> B\n  B -> A\n}\n\
             dualtri(A, B, C) {\n  dualedge(A, B)\n  dualedge(B, C)\n  dualedge(C, A)\n}\n\
             dualtri(foo, bar, baz)\n",
        )
        .unwrap();
        assert_eq!(motif.skeleton().edge_count(), 6);
    }

    #[test]
    fn deeply_nested_macros() {
        let motif = compile(
            "edge(A, B) {\n  A -> B\n}\n\
             dualedge(A, B) {\n  edge(A, B)\n  edge(B, A)\n}\n\
             dualtri(A, B, C) {\n  dualedge(A, B)\n  dualedge(B, C)\n  dualedge(C, A)\n}\n\
             dualtri(foo, bar, baz)\n",
        )
        .unwrap();
        assert_eq!(motif.skeleton().edge_count(), 6);
    }

    #[test]
    fn overlapping_expansions_dedup() {
        let motif = compile(
            "edge(A, B) {\n  A -> B\n}\n\
             dualedge(A, B) {\n  edge(A, B)\n  edge(B, A)\n}\n\
             dualtri(A, B, C) {\n  dualedge(A, B)\n  dualedge(B, C)\n  dualedge(C, A)\n}\n\
             dualtri(foo, bar, baz)\ndualtri(foo, bar, baf)\n",
        )
        .unwrap();
        assert_eq!(motif.skeleton().edge_count(), 10);
    }

    #[test]
    fn direct_recursion_is_detected() {
        let err = compile("loop(A, B) {\n  loop(B, A)\n}\nloop(X, Y)\n").unwrap_err();
        assert!(matches!(err, CompileError::MacroRecursion { .. }));
    }

    #[test]
    fn mutual_recursion_is_detected() {
        // `pong` is defined after `ping` but before any call, so the cycle
        // only exists at expansion time.
        let err = compile(
            "ping(A) {\n  pong(A)\n}\npong(A) {\n  ping(A)\n}\nping(X)\n",
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::MacroRecursion { .. }));
    }

    #[test]
    fn macro_edge_clauses() {
        let motif =
            compile("m(Aa, Ba) {\n  Aa -> Ba [type != 1, type != 12]\n}\nm(X, Y)\n").unwrap();
        let table = &motif.edge_constraints()[&("X".to_string(), "Y".to_string())];
        assert_eq!(table["type"][&Op::Ne], vec![Value::Int(1), Value::Int(12)]);
    }

    #[test]
    fn macro_node_constraints() {
        let motif = compile(
            "m(A) {\n  A.type = \"excitatory\"\n  A.size >= 4.0\n}\nAaa -> Ba\nm(Aaa)\n",
        )
        .unwrap();
        assert_eq!(motif.node_constraints().len(), 1);
        assert!(motif.node_constraints().contains_key("Aaa"));
    }

    #[test]
    fn macro_dynamic_node_constraints() {
        let motif = compile("m(A, B) {\n  A.radius > B.radius\n}\nm(A, B)\nA -> B\n").unwrap();
        assert_eq!(motif.dynamic_node_constraints().len(), 1);
    }

    #[test]
    fn macro_named_edge_constraint() {
        let motif = compile("m(A, B) {\n  A -> B as ab\n  ab.radius > 1\n}\nm(A, B)\n").unwrap();
        assert_eq!(motif.edge_constraints().len(), 1);
        let table = &motif.edge_constraints()[&("A".to_string(), "B".to_string())];
        assert_eq!(table["radius"][&Op::Gt], vec![Value::Int(1)]);
    }

    #[test]
    fn macro_dynamic_edge_constraint() {
        let motif = compile(
            "m(A, B) {\n  A -> B as ab\n  B -> A as ba\n  ab.weight > ba.weight\n}\nm(A, B)\n",
        )
        .unwrap();
        assert_eq!(motif.dynamic_edge_constraints().len(), 1);
    }

    #[test]
    fn macro_named_edges_are_per_invocation() {
        let motif = compile(
            "desc(a, b, c) {\n  a -> b as E1\n  b -> c as E2\n  E1.foo > E2.foo\n}\n\
             desc(a, b, c)\ndesc(b, c, d)\n",
        )
        .unwrap();
        // Each invocation binds its own E1/E2 instances.
        let de = motif.dynamic_edge_constraints();
        assert_eq!(de.len(), 2);
        assert_eq!(
            de[&("a".to_string(), "b".to_string())]["foo"][&Op::Gt],
            vec![("b".to_string(), "c".to_string(), "foo".to_string())]
        );
        assert_eq!(
            de[&("b".to_string(), "c".to_string())]["foo"][&Op::Gt],
            vec![("c".to_string(), "d".to_string(), "foo".to_string())]
        );
    }

    #[test]
    fn named_edges_pass_through_nested_macros() {
        let motif = compile(
            "a(a1, b1) {\n  b1 -> a1\n  a1 -> b1 as ab\n  ab.length > ab.weight\n}\n\
             b(a2, b2) {\n  a(a2, b2)\n}\n\
             c(a3, b3) {\n  b(a3, b3)\n}\n\
             c(A, B)\n",
        )
        .unwrap();
        assert!(motif.skeleton().has_edge("A", "B"));
        assert!(motif.skeleton().has_edge("B", "A"));
        let table = &motif.dynamic_edge_constraints()[&("A".to_string(), "B".to_string())];
        assert_eq!(
            table["length"][&Op::Gt],
            vec![("A".to_string(), "B".to_string(), "weight".to_string())]
        );
    }

    #[test]
    fn conflicting_edges_from_macros_fail() {
        let err = compile(
            "tri(A, B, C) {\n  A -> B\n  B -> C\n  C -> A\n}\n\
             nontri(A, B, C) {\n  A !> B\n  B !> C\n  C !> A\n}\n\
             tri(C, D, E)\nnontri(D, E, F)\n",
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::EdgeDisagreement { .. }));
    }

    #[test]
    fn validators_can_be_disabled() {
        let motif = compile_with(
            "A -> B\nA !> B\n",
            crate::MotifOptions::default(),
            &[],
        )
        .unwrap();
        // Without the existence validator the contradictory declaration
        // just becomes a parallel edge.
        assert_eq!(motif.skeleton().edge_count(), 2);
    }
}

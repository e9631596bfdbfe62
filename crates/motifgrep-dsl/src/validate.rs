use std::cmp::Ordering;

use crate::error::CompileError;
use crate::motif::{ConstraintTable, Motif};
use crate::skeleton::{Action, Skeleton};
use crate::value::{Op, Value};

/// A pluggable motif check.
///
/// `on_edge` runs while structural edges are being lowered; `on_motif` runs
/// once over the finished IR (after automorphism propagation). Both hooks
/// default to accepting everything.
pub trait Validator {
    fn on_edge(
        &self,
        skeleton: &Skeleton,
        u: &str,
        v: &str,
        action: &Action,
        exists: bool,
    ) -> Result<(), CompileError> {
        let _ = (skeleton, u, v, action, exists);
        Ok(())
    }

    fn on_motif(&self, motif: &Motif) -> Result<(), CompileError> {
        let _ = motif;
        Ok(())
    }
}

/// The validators `compile` installs when the caller does not supply a list.
pub fn default_validators() -> Vec<Box<dyn Validator>> {
    vec![
        Box::new(EdgeExistence),
        Box::new(ConstraintSatisfiability),
    ]
}

/// Rejects a structural edge whose `exists` flag contradicts an earlier
/// declaration of the same ordered pair.
pub struct EdgeExistence;

impl Validator for EdgeExistence {
    fn on_edge(
        &self,
        skeleton: &Skeleton,
        u: &str,
        v: &str,
        _action: &Action,
        exists: bool,
    ) -> Result<(), CompileError> {
        if skeleton
            .edges_between(u, v)
            .iter()
            .any(|spec| spec.exists != exists)
        {
            return Err(CompileError::EdgeDisagreement {
                u: u.to_string(),
                v: v.to_string(),
            });
        }
        Ok(())
    }
}

/// Rejects motifs whose static constraint tables cannot be satisfied by any
/// host value, and a limited class of impossible dynamic ranges.
pub struct ConstraintSatisfiability;

impl Validator for ConstraintSatisfiability {
    fn on_motif(&self, motif: &Motif) -> Result<(), CompileError> {
        for (node, table) in motif.node_constraints() {
            check_table(node, table)?;
        }
        for ((u, v), table) in motif.edge_constraints() {
            check_table(&format!("{u} -> {v}"), table)?;
        }
        // Opposing dynamic bounds against the same target can only be
        // satisfied by the non-strict sandwich `>=` with `<=`.
        for (node, table) in motif.dynamic_node_constraints() {
            for (attr, ops) in table {
                let mut lowers = Vec::new();
                let mut uppers = Vec::new();
                for (op, targets) in ops {
                    match op {
                        Op::Gt | Op::Ge => lowers.extend(targets.iter().map(|t| (t, *op))),
                        Op::Lt | Op::Le => uppers.extend(targets.iter().map(|t| (t, *op))),
                        _ => {}
                    }
                }
                for (lower_target, lower_op) in &lowers {
                    for (upper_target, upper_op) in &uppers {
                        if lower_target == upper_target
                            && !(*lower_op == Op::Ge && *upper_op == Op::Le)
                        {
                            return Err(CompileError::ConstraintCollision {
                                entity: node.clone(),
                                attr: attr.clone(),
                                detail: format!(
                                    "{lower_op} and {upper_op} against {}.{} cannot both hold",
                                    lower_target.0, lower_target.1
                                ),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn collision(entity: &str, attr: &str, detail: String) -> CompileError {
    CompileError::ConstraintCollision {
        entity: entity.to_string(),
        attr: attr.to_string(),
        detail,
    }
}

/// Splice membership-operator values: a list contributes its elements, a
/// scalar contributes itself.
fn flatten<'a>(values: &'a [Value]) -> Vec<&'a Value> {
    let mut flat = Vec::new();
    for value in values {
        match value.as_list() {
            Some(items) => flat.extend(items),
            None => flat.push(value),
        }
    }
    flat
}

fn check_table(entity: &str, table: &ConstraintTable) -> Result<(), CompileError> {
    for (attr, ops) in table {
        let empty = Vec::new();
        let eq_values = ops.get(&Op::Eq).unwrap_or(&empty);
        let ne_values = ops.get(&Op::Ne).unwrap_or(&empty);

        // (a) two disagreeing equalities
        if let Some(first) = eq_values.first() {
            if let Some(conflict) = eq_values.iter().find(|v| *v != first) {
                return Err(collision(
                    entity,
                    attr,
                    format!("cannot equal both {first} and {conflict}"),
                ));
            }
            // equality vs. inequality of the same value
            if let Some(conflict) = ne_values.iter().find(|v| *v == first) {
                return Err(collision(
                    entity,
                    attr,
                    format!("== {first} conflicts with != {conflict}"),
                ));
            }
        }

        // (b)/(c) range consistency, strictness-aware
        let mut lower: Option<(&Value, bool)> = None;
        for (values, strict) in [(ops.get(&Op::Gt), true), (ops.get(&Op::Ge), false)] {
            for value in values.into_iter().flatten() {
                lower = Some(match lower {
                    None => (value, strict),
                    Some(best) => match value.compare(best.0) {
                        Some(Ordering::Greater) => (value, strict),
                        Some(Ordering::Equal) => (best.0, best.1 || strict),
                        _ => best,
                    },
                });
            }
        }
        let mut upper: Option<(&Value, bool)> = None;
        for (values, strict) in [(ops.get(&Op::Lt), true), (ops.get(&Op::Le), false)] {
            for value in values.into_iter().flatten() {
                upper = Some(match upper {
                    None => (value, strict),
                    Some(best) => match value.compare(best.0) {
                        Some(Ordering::Less) => (value, strict),
                        Some(Ordering::Equal) => (best.0, best.1 || strict),
                        _ => best,
                    },
                });
            }
        }

        if let Some(eq) = eq_values.first() {
            if let Some((bound, strict)) = lower {
                match eq.compare(bound) {
                    Some(Ordering::Less) => {
                        return Err(collision(
                            entity,
                            attr,
                            format!("== {eq} violates lower bound {bound}"),
                        ));
                    }
                    Some(Ordering::Equal) if strict => {
                        return Err(collision(
                            entity,
                            attr,
                            format!("== {eq} violates strict lower bound > {bound}"),
                        ));
                    }
                    _ => {}
                }
            }
            if let Some((bound, strict)) = upper {
                match eq.compare(bound) {
                    Some(Ordering::Greater) => {
                        return Err(collision(
                            entity,
                            attr,
                            format!("== {eq} violates upper bound {bound}"),
                        ));
                    }
                    Some(Ordering::Equal) if strict => {
                        return Err(collision(
                            entity,
                            attr,
                            format!("== {eq} violates strict upper bound < {bound}"),
                        ));
                    }
                    _ => {}
                }
            }
        } else if let (Some((lo, lo_strict)), Some((hi, hi_strict))) = (lower, upper) {
            let empty_interval = match lo.compare(hi) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => lo_strict || hi_strict,
                _ => false,
            };
            if empty_interval {
                return Err(collision(
                    entity,
                    attr,
                    format!("bounds leave no value between {lo} and {hi}"),
                ));
            }
        }

        // (d) in / !in value sets must not intersect
        let in_values = flatten(ops.get(&Op::In).unwrap_or(&empty));
        let not_in_values = flatten(ops.get(&Op::NotIn).unwrap_or(&empty));
        if let Some(both) = in_values.iter().find(|v| not_in_values.contains(v)) {
            return Err(collision(
                entity,
                attr,
                format!("{both} appears in both 'in' and '!in' sets"),
            ));
        }

        // (e) contains / !contains value sets must not intersect
        let contains_values = flatten(ops.get(&Op::Contains).unwrap_or(&empty));
        let not_contains_values = flatten(ops.get(&Op::NotContains).unwrap_or(&empty));
        if let Some(both) = contains_values
            .iter()
            .find(|v| not_contains_values.contains(v))
        {
            return Err(collision(
                entity,
                attr,
                format!("{both} appears in both 'contains' and '!contains' sets"),
            ));
        }
    }
    Ok(())
}

use itertools::Itertools;

use motifgrep_dsl::value::{eval, eval_dynamic};
use motifgrep_dsl::{ConstraintTable, EdgeMatch, Op};

use crate::host::{AttrMap, HostGraph};

/// Do the attributes satisfy every clause in the table?
///
/// Fails fast on the first violated clause; missing attributes follow the
/// absent-value semantics of the operators.
pub(crate) fn table_satisfied(attrs: Option<&AttrMap>, table: &ConstraintTable) -> bool {
    for (attr, ops) in table {
        let lhs = attrs.and_then(|map| map.get(attr));
        for (op, values) in ops {
            for value in values {
                if !eval(*op, lhs, value) {
                    return false;
                }
            }
        }
    }
    true
}

/// The attribute maps against which an edge constraint on `x -> y` is
/// checked: every parallel edge, both directions when direction is ignored.
pub(crate) fn edge_attr_maps<'a, H: HostGraph>(
    host: &'a H,
    x: &str,
    y: &str,
    ignore_direction: bool,
) -> Vec<&'a AttrMap> {
    let mut maps = host.edge_attrs(x, y);
    if ignore_direction && x != y {
        maps.extend(host.edge_attrs(y, x));
    }
    maps
}

/// Check one static edge-constraint table under the multigraph quantifier.
///
/// ANY needs a single parallel edge satisfying every clause simultaneously;
/// ALL needs every parallel edge to. On a simple host the two coincide.
pub(crate) fn edge_table_holds<H: HostGraph>(
    host: &H,
    x: &str,
    y: &str,
    table: &ConstraintTable,
    edge_match: EdgeMatch,
    ignore_direction: bool,
) -> bool {
    let maps = edge_attr_maps(host, x, y, ignore_direction);
    match edge_match {
        EdgeMatch::Any => maps.iter().any(|attrs| table_satisfied(Some(*attrs), table)),
        EdgeMatch::All => maps.iter().all(|attrs| table_satisfied(Some(*attrs), table)),
    }
}

/// Check one dynamic edge-constraint entry, quantifying over the cartesian
/// pairing of the two pairs' parallel edges.
#[allow(clippy::too_many_arguments)]
pub(crate) fn dynamic_edge_entry_holds<H: HostGraph>(
    host: &H,
    this: (&str, &str),
    this_attr: &str,
    op: Op,
    that: (&str, &str),
    that_attr: &str,
    edge_match: EdgeMatch,
    ignore_direction: bool,
) -> bool {
    let this_maps = edge_attr_maps(host, this.0, this.1, ignore_direction);
    let that_maps = edge_attr_maps(host, that.0, that.1, ignore_direction);
    let holds =
        |(a, b): (&&AttrMap, &&AttrMap)| eval_dynamic(op, a.get(this_attr), b.get(that_attr));
    let mut pairs = this_maps.iter().cartesian_product(that_maps.iter());
    match edge_match {
        EdgeMatch::Any => pairs.any(holds),
        EdgeMatch::All => pairs.all(holds),
    }
}

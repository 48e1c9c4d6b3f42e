//! Path/depth splitting.
//!
//! Filter engines evaluate one nested document at a time, so a predicate
//! must be cut into pieces that each reference a single nesting level. A
//! conjunction splits cleanly; anything else that mixes levels is rejected.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    ast::{Expr, Op},
    error::{JxError, JxResult},
    schema::{ROOT_PATH, Schema},
};

/// Nested path and depth a variable lives at. The deepest column wins.
fn locate(schema: &dyn Schema, name: &str) -> (String, usize) {
    schema
        .leaves(name)
        .into_iter()
        .max_by_key(|c| c.depth())
        .map(|c| (c.path().to_string(), c.depth()))
        .unwrap_or_else(|| (ROOT_PATH.to_string(), 0))
}

/// Collect `(path, depth, conjunct)` triples.
fn split_into(
    expr: &Expr,
    schema: &dyn Schema,
    out: &mut Vec<(String, usize, Expr)>,
) -> JxResult<()> {
    let mut places: BTreeMap<String, usize> = BTreeMap::new();
    for name in expr.vars() {
        let (path, depth) = locate(schema, &name);
        places.insert(path, depth);
    }

    if places.len() <= 1 {
        let (path, depth) = places
            .into_iter()
            .next()
            .unwrap_or_else(|| (ROOT_PATH.to_string(), 0));
        out.push((path, depth, expr.clone()));
        return Ok(());
    }

    match expr.as_call() {
        Some(call) if call.op == Op::And => {
            for term in &call.terms {
                split_into(term, schema, out)?;
            }
            Ok(())
        }
        _ => {
            let paths: Vec<&str> = places.keys().map(String::as_str).collect();
            Err(JxError::TooComplex(format!(
                "`{}` references nested paths {:?} and is not a conjunction",
                expr.op().map(|op| op.name()).unwrap_or("expression"),
                paths
            )))
        }
    }
}

/// Partition a predicate into one list of conjuncts per nesting depth.
///
/// The result is indexed by depth; depths with no conjuncts are empty.
pub fn split_expression_by_depth(expr: &Expr, schema: &dyn Schema) -> JxResult<Vec<Vec<Expr>>> {
    let mut parts = Vec::new();
    split_into(expr, schema, &mut parts)?;
    let max_depth = parts.iter().map(|(_, d, _)| *d).max().unwrap_or(0);
    let mut out = vec![Vec::new(); max_depth + 1];
    for (_, depth, e) in parts {
        out[depth].push(e);
    }
    debug!(depths = out.len(), "split expression by depth");
    Ok(out)
}

/// Partition a predicate into conjuncts keyed by nested path (`"."` for the
/// top level).
pub fn split_expression_by_path(
    expr: &Expr,
    schema: &dyn Schema,
) -> JxResult<BTreeMap<String, Vec<Expr>>> {
    let mut parts = Vec::new();
    split_into(expr, schema, &mut parts)?;
    let mut out: BTreeMap<String, Vec<Expr>> = BTreeMap::new();
    for (path, _, e) in parts {
        out.entry(path).or_default().push(e);
    }
    debug!(paths = out.len(), "split expression by path");
    Ok(out)
}

//! Partial evaluation.
//!
//! Reduces an expression as far as is possible without a document:
//! constant folding, boolean-algebra rewriting, negation push-in and
//! missing-value propagation. The result is semantically equivalent to the
//! input under [`Evaluator`] and is flagged as simplified, so simplifying
//! it again returns it unchanged.

use tracing::{debug, trace};

use crate::{
    ast::{Call, Expr, JxType, Op, Params},
    error::{JxError, JxResult},
    evaluator::Evaluator,
    value::Value,
};

/// Upper bound on whole-tree passes; each pass is a full bottom-up rewrite.
const MAX_PASSES: usize = 8;

const NULL_EXPR: &Expr = &Expr::Null;

impl Expr {
    /// Simplify to a normal form. Idempotent.
    pub fn partial_eval(&self) -> JxResult<Expr> {
        if let Expr::Call(call) = self
            && call.is_simplified()
        {
            return Ok(self.clone());
        }

        let mut current = simplify(self)?;
        let mut passes = 1;
        while passes < MAX_PASSES {
            let next = simplify(&current)?;
            if next == current {
                break;
            }
            current = next;
            passes += 1;
        }
        debug!(passes, "partial evaluation finished");
        Ok(mark(current))
    }
}

fn mark(expr: Expr) -> Expr {
    match expr {
        Expr::Call(mut call) => {
            call.terms = call.terms.into_iter().map(mark).collect();
            call.params.default = call.params.default.map(|d| Box::new(mark(*d)));
            call.params.start = call.params.start.map(|s| Box::new(mark(*s)));
            Expr::Call(call.mark_simplified())
        }
        other => other,
    }
}

fn simplify(expr: &Expr) -> JxResult<Expr> {
    match expr {
        Expr::Literal(v) => Ok(Expr::literal(v.clone())),
        Expr::Call(call) => simplify_call(call),
        other => Ok(other.clone()),
    }
}

fn first_term(call: &Call) -> &Expr {
    call.terms.first().unwrap_or(NULL_EXPR)
}

fn simplify_call(call: &Call) -> JxResult<Expr> {
    match call.op {
        Op::Not => {
            let inner = simplify(first_term(call))?;
            invert(&inner)
        }
        Op::Missing => {
            let inner = simplify(first_term(call))?;
            simplify_missing(&inner)
        }
        Op::Exists => {
            let inner = simplify(first_term(call))?;
            let missing = simplify_missing(&inner)?;
            invert(&missing)
        }
        Op::And => simplify_and(simplify_all(&call.terms)?),
        Op::Or => simplify_or(simplify_all(&call.terms)?),
        Op::Coalesce => simplify_coalesce(simplify_all(&call.terms)?),
        Op::When => {
            let (cond, then, els) = call.when_parts();
            simplify_when(simplify(cond)?, simplify(then)?, simplify(els)?)
        }
        Op::Case => simplify_case(call),
        op => {
            let terms = simplify_all(&call.terms)?;
            let params = Params {
                default: simplify_boxed(call.default())?,
                separator: call.params.separator.clone(),
                start: simplify_boxed(call.start())?,
            };
            simplify_strict(op, terms, params)
        }
    }
}

fn simplify_all(terms: &[Expr]) -> JxResult<Vec<Expr>> {
    terms.iter().map(simplify).collect()
}

fn simplify_boxed(e: Option<&Expr>) -> JxResult<Option<Box<Expr>>> {
    e.map(|e| simplify(e).map(Box::new)).transpose()
}

/// Boolean with no possibility of being missing.
fn is_total_boolean(e: &Expr) -> bool {
    e.jx_type() == JxType::Boolean && e.missing() == Expr::False
}

fn is_many(e: &Expr) -> bool {
    e.as_variable().is_some_and(|v| v.many)
}

// ----------------------------------------------------------------------
// missing / not
// ----------------------------------------------------------------------

fn simplify_missing(inner: &Expr) -> JxResult<Expr> {
    match inner {
        Expr::Variable(_) => Ok(Expr::is_missing(inner.clone())),
        Expr::Call(_) => {
            let derived = inner.missing();
            let generic = Expr::is_missing(inner.clone());
            if derived == generic {
                Ok(generic)
            } else {
                simplify(&derived)
            }
        }
        literal => Ok(literal.missing()),
    }
}

/// Push a negation into an already simplified expression.
fn invert(e: &Expr) -> JxResult<Expr> {
    let call = match e {
        Expr::Null | Expr::False => return Ok(Expr::True),
        Expr::True => return Ok(Expr::False),
        Expr::Literal(v) => return Ok(Expr::from(!v.is_truthy())),
        Expr::Variable(_) => return Ok(Expr::not(e.clone())),
        Expr::Call(call) => call,
    };

    match call.op {
        Op::Not => {
            let inner = first_term(call);
            if is_total_boolean(inner) {
                Ok(inner.clone())
            } else {
                Ok(Expr::not(e.clone()))
            }
        }
        Op::And => simplify_or(call.terms.iter().map(invert).collect::<JxResult<_>>()?),
        Op::Or => simplify_and(call.terms.iter().map(invert).collect::<JxResult<_>>()?),
        Op::Eq | Op::Ne => {
            let op = if call.op == Op::Eq { Op::Ne } else { Op::Eq };
            simplify_strict(op, call.terms.clone(), Params::default())
        }
        Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
            if call.terms.iter().any(is_many) {
                return Ok(Expr::not(e.clone()));
            }
            let (lhs, rhs) = (first_term(call), call.terms.get(1).unwrap_or(NULL_EXPR));
            let inverse = call.op.inverse().unwrap_or(call.op);
            simplify_or(vec![
                simplify_missing(lhs)?,
                simplify_missing(rhs)?,
                simplify_strict(inverse, call.terms.clone(), Params::default())?,
            ])
        }
        Op::Missing => Ok(Expr::is_present(first_term(call).clone())),
        Op::Exists => Ok(Expr::is_missing(first_term(call).clone())),
        Op::When => {
            let (cond, then, els) = call.when_parts();
            simplify_when(cond.clone(), invert(then)?, invert(els)?)
        }
        Op::Case => {
            let (whens, default) = call.case_parts();
            let mut terms = Vec::with_capacity(call.terms.len());
            for w in whens {
                match w.as_call() {
                    Some(branch) => {
                        let (cond, then, _) = branch.when_parts();
                        terms.push(Expr::when(cond.clone(), invert(then)?, Expr::Null));
                    }
                    None => terms.push(w.clone()),
                }
            }
            terms.push(invert(default)?);
            simplify_case(&Call::new(Op::Case, terms, Params::default()))
        }
        _ => Ok(Expr::not(e.clone())),
    }
}

/// Cheap syntactic inverse used to spot `x` and `not x` side by side.
fn atomic_inverse(e: &Expr) -> Option<Expr> {
    match e {
        Expr::Variable(_) => Some(Expr::not(e.clone())),
        Expr::Call(call) => match call.op {
            Op::Not => Some(first_term(call).clone()),
            Op::Eq | Op::Ne | Op::Exists | Op::Missing => {
                let op = call.op.inverse()?;
                Some(Expr::call(op, call.terms.clone()))
            }
            _ => Some(Expr::not(e.clone())),
        },
        _ => None,
    }
}

fn contains_inverse_pair(terms: &[Expr]) -> bool {
    terms
        .iter()
        .filter_map(atomic_inverse)
        .any(|inv| terms.contains(&inv))
}

// ----------------------------------------------------------------------
// and / or
// ----------------------------------------------------------------------

fn dedup(terms: Vec<Expr>) -> Vec<Expr> {
    let mut out: Vec<Expr> = Vec::with_capacity(terms.len());
    for t in terms {
        if !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

fn conjuncts(e: &Expr) -> Vec<&Expr> {
    match e.as_call() {
        Some(call) if call.op == Op::And => call.terms.iter().collect(),
        _ => vec![e],
    }
}

fn disjuncts(e: &Expr) -> Vec<&Expr> {
    match e.as_call() {
        Some(call) if call.op == Op::Or => call.terms.iter().collect(),
        _ => vec![e],
    }
}

fn is_subset(small: &[&Expr], big: &[&Expr]) -> bool {
    small.iter().all(|s| big.contains(s))
}

fn simplify_and(terms: Vec<Expr>) -> JxResult<Expr> {
    let mut flat = Vec::with_capacity(terms.len());
    for t in terms {
        match t {
            Expr::True => {}
            Expr::False | Expr::Null => return Ok(Expr::False),
            Expr::Literal(ref v) => {
                if !v.is_truthy() {
                    return Ok(Expr::False);
                }
            }
            Expr::Call(call) if call.op == Op::And => flat.extend(call.terms),
            other => flat.push(other),
        }
    }
    let flat = dedup(flat);

    if contains_inverse_pair(&flat) {
        trace!("conjunction contains a term and its inverse");
        return Ok(Expr::False);
    }

    // a and (a or b) == a
    let absorbed: Vec<bool> = flat
        .iter()
        .enumerate()
        .map(|(i, t)| {
            t.is_op(Op::Or)
                && disjuncts(t)
                    .iter()
                    .any(|d| flat.iter().enumerate().any(|(j, o)| j != i && o == *d))
        })
        .collect();
    let flat: Vec<Expr> = flat
        .into_iter()
        .zip(absorbed)
        .filter_map(|(t, gone)| (!gone).then_some(t))
        .collect();

    Ok(collapse(Op::And, flat, Expr::True))
}

fn simplify_or(terms: Vec<Expr>) -> JxResult<Expr> {
    let mut flat = Vec::with_capacity(terms.len());
    for t in terms {
        match t {
            Expr::False | Expr::Null => {}
            Expr::True => return Ok(Expr::True),
            Expr::Literal(ref v) => {
                if v.is_truthy() {
                    return Ok(Expr::True);
                }
            }
            Expr::Call(call) if call.op == Op::Or => flat.extend(call.terms),
            other => flat.push(other),
        }
    }
    let flat = dedup(flat);

    if contains_inverse_pair(&flat) {
        trace!("disjunction contains a term and its inverse");
        return Ok(Expr::True);
    }

    // a or (a and b) == a: drop any term implied by another kept term
    let mut keep = vec![true; flat.len()];
    for i in 0..flat.len() {
        let ci = conjuncts(&flat[i]);
        for j in 0..flat.len() {
            if i == j || !keep[j] {
                continue;
            }
            let cj = conjuncts(&flat[j]);
            let strictly_smaller = cj.len() < ci.len();
            if is_subset(&cj, &ci) && (strictly_smaller || j < i) {
                keep[i] = false;
                break;
            }
        }
    }
    let flat: Vec<Expr> = flat
        .into_iter()
        .zip(keep)
        .filter_map(|(t, k)| k.then_some(t))
        .collect();

    if flat.len() >= 2
        && let Some(factored) = factor_common_terms(&flat)?
    {
        return Ok(factored);
    }

    Ok(collapse(Op::Or, flat, Expr::False))
}

/// `(a and b) or (a and c)` becomes `a and (b or c)`.
fn factor_common_terms(disjunction: &[Expr]) -> JxResult<Option<Expr>> {
    let sets: Vec<Vec<&Expr>> = disjunction.iter().map(conjuncts).collect();
    let common: Vec<Expr> = sets[0]
        .iter()
        .filter(|t| sets[1..].iter().all(|s| s.contains(t)))
        .map(|t| (*t).clone())
        .collect();
    if common.is_empty() {
        return Ok(None);
    }
    trace!(common = common.len(), "factoring common conjuncts out of disjunction");

    let mut remainders = Vec::with_capacity(sets.len());
    for set in &sets {
        let rest: Vec<Expr> = set
            .iter()
            .filter(|t| !common.contains(t))
            .map(|t| (*t).clone())
            .collect();
        remainders.push(simplify_and(rest)?);
    }
    let mut terms = common;
    terms.push(simplify_or(remainders)?);
    simplify_and(terms).map(Some)
}

/// Unwrap a single term only when doing so cannot change the value.
fn collapse(op: Op, mut terms: Vec<Expr>, empty: Expr) -> Expr {
    match terms.len() {
        0 => empty,
        1 if is_total_boolean(&terms[0]) => terms.remove(0),
        _ => Expr::call(op, terms),
    }
}

// ----------------------------------------------------------------------
// coalesce / when / case
// ----------------------------------------------------------------------

fn simplify_coalesce(terms: Vec<Expr>) -> JxResult<Expr> {
    let mut kept = Vec::with_capacity(terms.len());
    let mut flat = Vec::with_capacity(terms.len());
    for t in terms {
        match t {
            Expr::Call(call) if call.op == Op::Coalesce => flat.extend(call.terms),
            other => flat.push(other),
        }
    }
    for t in flat {
        match simplify_missing(&t)? {
            Expr::True => continue,
            Expr::False => {
                kept.push(t);
                break;
            }
            _ => kept.push(t),
        }
    }
    Ok(match kept.len() {
        0 => Expr::Null,
        1 => kept.remove(0),
        _ => Expr::coalesce(kept),
    })
}

fn check_condition(cond: &Expr) -> JxResult<Option<bool>> {
    match cond {
        Expr::True => Ok(Some(true)),
        Expr::False | Expr::Null => Ok(Some(false)),
        Expr::Literal(v) => Err(JxError::Type(format!(
            "conditional expects a boolean condition, found the {} literal {}",
            v.jx_type(),
            v.to_json()
        ))),
        _ => Ok(None),
    }
}

fn simplify_when(cond: Expr, then: Expr, els: Expr) -> JxResult<Expr> {
    match check_condition(&cond)? {
        Some(true) => return Ok(then),
        Some(false) => return Ok(els),
        None => {}
    }
    if then == els {
        return Ok(then);
    }
    if is_total_boolean(&cond) {
        match (&then, &els) {
            (Expr::True, Expr::False) => return Ok(cond),
            (Expr::False, Expr::True) => return invert(&cond),
            (Expr::True, e) if is_total_boolean(e) => return simplify_or(vec![cond, els]),
            (t, Expr::False) if is_total_boolean(t) => return simplify_and(vec![cond, then]),
            _ => {}
        }
    }
    Ok(Expr::when(cond, then, els))
}

fn simplify_case(call: &Call) -> JxResult<Expr> {
    let (whens, default) = call.case_parts();
    let mut branches: Vec<(Expr, Expr)> = Vec::with_capacity(whens.len());
    let mut default = default.clone();
    let mut cut = false;
    for w in whens {
        let (cond, then) = match w.as_call() {
            Some(branch) if branch.op == Op::When => {
                let (c, t, _) = branch.when_parts();
                (simplify(c)?, simplify(t)?)
            }
            _ => {
                return Err(JxError::Malformed(
                    "`case` branches must be `when` clauses".to_string(),
                ));
            }
        };
        match check_condition(&cond)? {
            Some(false) => continue,
            Some(true) => {
                default = then;
                cut = true;
                break;
            }
            None => branches.push((cond, then)),
        }
    }
    let default = if cut { default } else { simplify(&default)? };

    match branches.len() {
        0 => Ok(default),
        1 => {
            let (cond, then) = branches.remove(0);
            simplify_when(cond, then, default)
        }
        _ => {
            let default = lift_when_default(&mut branches, default);
            let mut terms: Vec<Expr> = branches
                .into_iter()
                .map(|(c, t)| Expr::when(c, t, Expr::Null))
                .collect();
            terms.push(default);
            Ok(Expr::call(Op::Case, terms))
        }
    }
}

/// A `when` default is indistinguishable from a trailing branch in the JSON
/// form, so it becomes one: `case[.., when(c, t, e)]` is `case[.., when(c, t), e]`.
fn lift_when_default(branches: &mut Vec<(Expr, Expr)>, mut default: Expr) -> Expr {
    while let Some(w) = default.as_call().filter(|c| c.op == Op::When) {
        let (cond, then, els) = w.when_parts();
        branches.push((cond.clone(), then.clone()));
        let next = els.clone();
        default = next;
    }
    default
}

// ----------------------------------------------------------------------
// strict operators
// ----------------------------------------------------------------------

fn can_fold(op: Op, terms: &[Expr], params: &Params) -> bool {
    op != Op::Script
        && terms.iter().all(Expr::is_literal)
        && params.default.as_deref().is_none_or(Expr::is_literal)
        && params.start.as_deref().is_none_or(Expr::is_literal)
}

fn fold(op: Op, terms: Vec<Expr>, params: Params) -> JxResult<Expr> {
    let node = Expr::call_with(op, terms, params);
    let value = Evaluator::new().eval_constant(&node)?;
    trace!(op = %op, "folded constant");
    Ok(Expr::literal(value))
}

fn simplify_strict(op: Op, mut terms: Vec<Expr>, params: Params) -> JxResult<Expr> {
    if can_fold(op, &terms, &params) {
        return fold(op, terms, params);
    }

    let expected = match op {
        Op::Eq | Op::Ne | Op::Gt | Op::Gte | Op::Lt | Op::Lte | Op::In => Some(2),
        Op::First | Op::String | Op::Number | Op::Integer | Op::Boolean => Some(1),
        _ => None,
    };
    if expected.is_some_and(|n| n != terms.len()) {
        return Ok(Expr::call_with(op, terms, params));
    }

    match op {
        Op::Eq | Op::Ne => {
            let (lhs, rhs) = (terms[0].clone(), terms[1].clone());
            if rhs == Expr::Null || lhs == Expr::Null {
                let other = if lhs == Expr::Null { &rhs } else { &lhs };
                let missing = simplify_missing(other)?;
                return if op == Op::Eq { Ok(missing) } else { invert(&missing) };
            }
            if lhs == rhs {
                return Ok(Expr::from(op == Op::Eq));
            }
            if lhs.is_literal() {
                terms.swap(0, 1);
            }
        }
        Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
            if terms.iter().any(|t| *t == Expr::Null) {
                return Ok(Expr::False);
            }
            if terms[0].is_literal() {
                terms.swap(0, 1);
                return Ok(Expr::call(op.mirror(), terms));
            }
        }
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Exp => {
            if terms.iter().any(|t| *t == Expr::Null) {
                return Ok(params.default.map(|d| *d).unwrap_or(Expr::Null));
            }
        }
        Op::Concat => {
            terms.retain(|t| *t != Expr::Null);
            if terms.is_empty() {
                return Ok(params.default.map(|d| *d).unwrap_or(Expr::Null));
            }
            if can_fold(op, &terms, &params) {
                return fold(op, terms, params);
            }
        }
        Op::In => {
            if terms[0] == Expr::Null {
                return Ok(Expr::False);
            }
            if let Expr::Literal(Value::Array(items)) = &terms[1] {
                // a null item never matches
                let present: Vec<&Value> = items.iter().filter(|v| !v.is_null()).collect();
                match present.as_slice() {
                    [] => return Ok(Expr::False),
                    [single] if !is_many(&terms[0]) => {
                        let rhs = Expr::literal((*single).clone());
                        return simplify_strict(Op::Eq, vec![terms[0].clone(), rhs], Params::default());
                    }
                    _ => {}
                }
            }
        }
        Op::Prefix | Op::Suffix | Op::Regexp => {
            if terms.iter().any(|t| *t == Expr::Null) {
                return Ok(Expr::False);
            }
        }
        Op::First => {
            let inner = &terms[0];
            if inner.is_op(Op::First) || (inner.as_variable().is_some_and(|v| !v.many) && inner.jx_type() != JxType::Object) {
                return Ok(terms.remove(0));
            }
        }
        Op::String | Op::Number | Op::Integer | Op::Boolean => {
            let inner = &terms[0];
            let already = match op {
                Op::String => inner.jx_type() == JxType::String,
                Op::Number => inner.jx_type() == JxType::Number,
                Op::Integer => inner.jx_type() == JxType::Integer,
                _ => inner.jx_type() == JxType::Boolean,
            };
            if already && !is_many(inner) && !inner.is_op(Op::Tuple) {
                return Ok(terms.remove(0));
            }
        }
        _ => {}
    }
    Ok(Expr::call_with(op, terms, params))
}

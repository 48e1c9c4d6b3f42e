//! Three-valued absence.
//!
//! [`Expr::missing`] builds a *new* boolean expression answering "is this
//! node's value absent?". Compound nodes derive it from their operands.
//! Boolean operators never produce a missing value.

use crate::ast::{Call, Expr, JxType, Op};

impl Expr {
    /// Expression that is true exactly when `self` evaluates to null.
    pub fn missing(&self) -> Expr {
        match self {
            Expr::Null => Expr::True,
            Expr::True | Expr::False | Expr::Literal(_) => Expr::False,
            Expr::Variable(_) => Expr::is_missing(self.clone()),
            Expr::Call(call) => call_missing(self, call),
        }
    }
}

fn call_missing(expr: &Expr, call: &Call) -> Expr {
    let terms = &call.terms;
    match call.op {
        op if op.is_predicate() => Expr::False,
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Exp => {
            let mut parts: Vec<Expr> = terms.iter().map(Expr::missing).collect();
            if matches!(call.op, Op::Div | Op::Mod)
                && let Some(rhs) = terms.get(1)
            {
                parts.push(Expr::eq(rhs.clone(), Expr::int(0)));
            }
            with_default(any_of(parts), call.default())
        }
        Op::Coalesce => all_of(terms.iter().map(Expr::missing).collect()),
        Op::Concat => with_default(
            all_of(terms.iter().map(Expr::missing).collect()),
            call.default(),
        ),
        Op::When => {
            let (cond, then, els) = call.when_parts();
            when_missing(cond, then, els)
        }
        Op::Case => {
            let (whens, default) = call.case_parts();
            case_missing(whens, default)
        }
        Op::First | Op::String | Op::Length => terms.first().map(Expr::missing).unwrap_or(Expr::True),
        Op::Left | Op::Right | Op::Substring => any_of(terms.iter().map(Expr::missing).collect()),
        Op::Number | Op::Integer => match terms.first() {
            Some(t) if t.jx_type().is_numeric() => t.missing(),
            _ => Expr::is_missing(expr.clone()),
        },
        Op::Boolean => match terms.first() {
            Some(t) if t.jx_type() == JxType::Boolean => t.missing(),
            _ => Expr::is_missing(expr.clone()),
        },
        Op::Find => match call.default().map(Expr::missing) {
            Some(Expr::False) => Expr::False,
            _ => Expr::is_missing(expr.clone()),
        },
        Op::Tuple => Expr::False,
        _ => Expr::is_missing(expr.clone()),
    }
}

/// A present default short-circuits absence.
fn with_default(base: Expr, default: Option<&Expr>) -> Expr {
    match default {
        Some(d) => all_of(vec![base, d.missing()]),
        None => base,
    }
}

fn when_missing(cond: &Expr, then: &Expr, els: &Expr) -> Expr {
    let then_missing = then.missing();
    let else_missing = els.missing();
    if then_missing == else_missing {
        return then_missing;
    }
    any_of(vec![
        all_of(vec![cond.clone(), then_missing]),
        all_of(vec![Expr::not(cond.clone()), else_missing]),
    ])
}

fn case_missing(whens: &[Expr], default: &Expr) -> Expr {
    match whens.split_first() {
        None => default.missing(),
        Some((first, rest)) => match first.as_call() {
            Some(w) if w.op == Op::When => {
                let (cond, then, _) = w.when_parts();
                let rest_missing = case_missing(rest, default);
                let then_missing = then.missing();
                if then_missing == rest_missing {
                    return then_missing;
                }
                any_of(vec![
                    all_of(vec![cond.clone(), then_missing]),
                    all_of(vec![Expr::not(cond.clone()), rest_missing]),
                ])
            }
            _ => first.missing(),
        },
    }
}

/// Conjunction with constant short-cuts.
pub(crate) fn all_of(terms: Vec<Expr>) -> Expr {
    let mut kept = Vec::new();
    for t in terms {
        match t {
            Expr::True => {}
            Expr::False | Expr::Null => return Expr::False,
            other => kept.push(other),
        }
    }
    match kept.len() {
        0 => Expr::True,
        1 => kept.remove(0),
        _ => Expr::and(kept),
    }
}

/// Disjunction with constant short-cuts.
pub(crate) fn any_of(terms: Vec<Expr>) -> Expr {
    let mut kept = Vec::new();
    for t in terms {
        match t {
            Expr::False | Expr::Null => {}
            Expr::True => return Expr::True,
            other => kept.push(other),
        }
    }
    match kept.len() {
        0 => Expr::False,
        1 => kept.remove(0),
        _ => Expr::or(kept),
    }
}

use std::collections::{BTreeSet, HashMap};

use crate::{
    ast::{JxType, Op, Variable},
    value::Value,
};

/// Expression node.
///
/// Nodes are immutable; every rewrite builds a new tree. `null`, `true`
/// and `false` are zero-payload variants, so "is this the canonical true"
/// is a plain variant check. [`Expr::literal`] folds the matching values
/// into them; `Literal` never holds a null or boolean.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Canonical null (also "missing")
    Null,
    /// Canonical true
    True,
    /// Canonical false
    False,

    /// Any other constant
    ///
    /// # Example
    /// ```text
    /// {"literal": "abc"}
    /// 42
    /// ```
    Literal(Value),

    /// Path into the document
    ///
    /// # Example
    /// ```text
    /// {"var": "a.b"}
    /// "a.b"
    /// ```
    Variable(Variable),

    /// Operator applied to ordered operands
    Call(Call),
}

const NULL_EXPR: &Expr = &Expr::Null;

/// Uniform operator node: tag, ordered operands and decorations.
#[derive(Debug, Clone)]
pub struct Call {
    pub op: Op,
    pub terms: Vec<Expr>,
    pub params: Params,
    /// Set once the node has been through the partial evaluator
    simplified: bool,
}

/// Decoration keys accepted by some operators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    /// Value used when the result would otherwise be missing
    pub default: Option<Box<Expr>>,
    /// `concat` separator; always a constant
    pub separator: Option<String>,
    /// `find` start offset
    pub start: Option<Box<Expr>>,
}

impl Params {
    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.separator.is_none() && self.start.is_none()
    }

    pub fn with_default(default: Expr) -> Self {
        Params {
            default: Some(Box::new(default)),
            ..Default::default()
        }
    }
}

impl PartialEq for Call {
    // The simplified flag is bookkeeping, not structure.
    fn eq(&self, other: &Self) -> bool {
        self.op == other.op && self.terms == other.terms && self.params == other.params
    }
}

impl Call {
    pub fn new(op: Op, terms: Vec<Expr>, params: Params) -> Self {
        Call {
            op,
            terms,
            params,
            simplified: false,
        }
    }

    pub fn is_simplified(&self) -> bool {
        self.simplified
    }

    pub fn default(&self) -> Option<&Expr> {
        self.params.default.as_deref()
    }

    pub fn start(&self) -> Option<&Expr> {
        self.params.start.as_deref()
    }

    pub fn separator(&self) -> &str {
        self.params.separator.as_deref().unwrap_or("")
    }

    pub(crate) fn mark_simplified(mut self) -> Self {
        self.simplified = true;
        self
    }

    /// `when` operands as (condition, then, else).
    pub fn when_parts(&self) -> (&Expr, &Expr, &Expr) {
        (
            self.terms.first().unwrap_or(NULL_EXPR),
            self.terms.get(1).unwrap_or(NULL_EXPR),
            self.terms.get(2).unwrap_or(NULL_EXPR),
        )
    }

    /// `case` operands as (when branches, default).
    pub fn case_parts(&self) -> (&[Expr], &Expr) {
        match self.terms.split_last() {
            Some((default, whens)) => (whens, default),
            None => (&[], NULL_EXPR),
        }
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        if b { Expr::True } else { Expr::False }
    }
}

impl Expr {
    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    /// Wrap a constant, canonicalizing null and booleans to the singletons.
    pub fn literal(value: Value) -> Expr {
        match value {
            Value::Null => Expr::Null,
            Value::Boolean(b) => Expr::from(b),
            other => Expr::Literal(other),
        }
    }

    pub fn int(n: i64) -> Expr {
        Expr::Literal(Value::Integer(n))
    }

    pub fn float(n: f64) -> Expr {
        Expr::Literal(Value::Float(n))
    }

    pub fn string(s: impl Into<String>) -> Expr {
        Expr::Literal(Value::String(s.into()))
    }

    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Variable(Variable::new(name))
    }

    pub fn call(op: Op, terms: Vec<Expr>) -> Expr {
        Expr::Call(Call::new(op, terms, Params::default()))
    }

    pub fn call_with(op: Op, terms: Vec<Expr>, params: Params) -> Expr {
        Expr::Call(Call::new(op, terms, params))
    }

    pub fn and(terms: Vec<Expr>) -> Expr {
        Expr::call(Op::And, terms)
    }

    pub fn or(terms: Vec<Expr>) -> Expr {
        Expr::call(Op::Or, terms)
    }

    pub fn not(term: Expr) -> Expr {
        Expr::call(Op::Not, vec![term])
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
        Expr::call(Op::Eq, vec![lhs, rhs])
    }

    pub fn binary(op: Op, lhs: Expr, rhs: Expr) -> Expr {
        Expr::call(op, vec![lhs, rhs])
    }

    pub fn is_missing(term: Expr) -> Expr {
        Expr::call(Op::Missing, vec![term])
    }

    pub fn is_present(term: Expr) -> Expr {
        Expr::call(Op::Exists, vec![term])
    }

    pub fn coalesce(terms: Vec<Expr>) -> Expr {
        Expr::call(Op::Coalesce, terms)
    }

    pub fn when(cond: Expr, then: Expr, els: Expr) -> Expr {
        Expr::call(Op::When, vec![cond, then, els])
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn as_call(&self) -> Option<&Call> {
        match self {
            Expr::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Expr::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn op(&self) -> Option<Op> {
        self.as_call().map(|c| c.op)
    }

    pub fn is_op(&self, op: Op) -> bool {
        self.op() == Some(op)
    }

    /// True for `Null`, `True`, `False` and `Literal`.
    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Null | Expr::True | Expr::False | Expr::Literal(_))
    }

    /// Constant value of a literal node.
    pub fn literal_value(&self) -> Option<Value> {
        match self {
            Expr::Null => Some(Value::Null),
            Expr::True => Some(Value::Boolean(true)),
            Expr::False => Some(Value::Boolean(false)),
            Expr::Literal(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Whether partial evaluation has already normalized this node.
    pub fn is_simplified(&self) -> bool {
        match self {
            Expr::Call(call) => call.is_simplified(),
            _ => true,
        }
    }

    /// Statically determined result type.
    pub fn jx_type(&self) -> JxType {
        match self {
            Expr::Null => JxType::Null,
            Expr::True | Expr::False => JxType::Boolean,
            Expr::Literal(v) => v.jx_type(),
            Expr::Variable(v) => v.declared,
            Expr::Call(call) => call_type(call),
        }
    }

    /// Names of every variable reachable from this node.
    pub fn vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Variable(v) => {
                out.insert(v.name.clone());
            }
            Expr::Call(call) => {
                for term in &call.terms {
                    term.collect_vars(out);
                }
                if let Some(d) = call.default() {
                    d.collect_vars(out);
                }
                if let Some(s) = call.start() {
                    s.collect_vars(out);
                }
            }
            _ => {}
        }
    }

    /// Same tree with variable names substituted.
    pub fn map(&self, renames: &HashMap<String, String>) -> Expr {
        self.map_variables(&mut |v| Expr::Variable(v.renamed(renames)))
    }

    /// Rebuild the tree, replacing every variable with `f(variable)`.
    pub fn map_variables(&self, f: &mut dyn FnMut(&Variable) -> Expr) -> Expr {
        match self {
            Expr::Variable(v) => f(v),
            Expr::Call(call) => {
                let terms = call.terms.iter().map(|t| t.map_variables(f)).collect();
                let params = Params {
                    default: call.default().map(|d| Box::new(d.map_variables(f))),
                    separator: call.params.separator.clone(),
                    start: call.start().map(|s| Box::new(s.map_variables(f))),
                };
                Expr::call_with(call.op, terms, params)
            }
            other => other.clone(),
        }
    }

    /// `exists` as the negation of [`Expr::missing`].
    pub fn exists(&self) -> Expr {
        match self.missing() {
            Expr::True => Expr::False,
            Expr::False => Expr::True,
            m => Expr::not(m),
        }
    }
}

fn call_type(call: &Call) -> JxType {
    let terms = &call.terms;
    match call.op {
        op if op.is_predicate() => JxType::Boolean,
        Op::Add | Op::Sub | Op::Mul | Op::Mod => {
            let ints = terms.iter().all(|t| t.jx_type() == JxType::Integer)
                && call
                    .default()
                    .is_none_or(|d| matches!(d.jx_type(), JxType::Integer | JxType::Null));
            if ints { JxType::Integer } else { JxType::Number }
        }
        Op::Div | Op::Exp | Op::Number => JxType::Number,
        Op::Length | Op::Find | Op::Integer => JxType::Integer,
        Op::Concat | Op::Left | Op::Right | Op::Substring | Op::String => JxType::String,
        Op::Boolean => JxType::Boolean,
        Op::Coalesce => JxType::merge_all(terms.iter().map(Expr::jx_type)),
        Op::When => {
            let (_, then, els) = call.when_parts();
            then.jx_type().merge(els.jx_type())
        }
        Op::Case => {
            let (whens, default) = call.case_parts();
            whens
                .iter()
                .map(Expr::jx_type)
                .fold(default.jx_type(), JxType::merge)
        }
        Op::First => terms.first().map(Expr::jx_type).unwrap_or(JxType::Null),
        Op::Tuple | Op::Script => JxType::Object,
        _ => JxType::Object,
    }
}

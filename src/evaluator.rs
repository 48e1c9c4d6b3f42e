use std::{cmp::Ordering, collections::HashMap};

use regex::Regex;
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};

use crate::{
    ast::{Call, Expr, Op, Variable},
    error::{JxError, JxResult},
    value::{Value, float_text, type_name},
};

const NULL_VALUE: &Value = &Value::Null;

/// Evaluation context: the document variables are resolved against.
#[derive(Debug, Clone)]
pub struct EvalContext {
    /// The document (what `.` refers to)
    pub root: Value,
}

impl EvalContext {
    pub fn new(root: Value) -> Self {
        EvalContext { root }
    }
}

/// Reference evaluator.
///
/// Evaluates an expression against a single document with the same
/// three-valued semantics the simplifier assumes: null is missing, boolean
/// operators are never missing, arithmetic on a missing operand is missing.
/// The partial evaluator folds constants through this, so the two always
/// agree.
#[derive(Default)]
pub struct Evaluator {
    /// Compiled `regexp` patterns, keyed by source
    patterns: std::cell::RefCell<HashMap<String, Regex>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates an expression against a JSON document.
    ///
    /// # Examples
    ///
    /// ```
    /// use jx_lang::{Evaluator, Value, builder::build};
    /// use serde_json::json;
    ///
    /// let expr = build(&json!({"add": ["a", 1]})).unwrap();
    /// let doc = Value::from_json(&json!({"a": 41}));
    /// let result = Evaluator::new().eval_expression(&expr, doc).unwrap();
    /// assert_eq!(result, Value::Integer(42));
    /// ```
    pub fn eval_expression(&self, expr: &Expr, document: Value) -> JxResult<Value> {
        let context = EvalContext::new(document);
        self.eval_expr(expr, &context)
    }

    /// Evaluate a node that references no variables.
    pub fn eval_constant(&self, expr: &Expr) -> JxResult<Value> {
        self.eval_expr(expr, &EvalContext::new(Value::Null))
    }

    pub fn eval_expr(&self, expr: &Expr, context: &EvalContext) -> JxResult<Value> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::True => Ok(Value::Boolean(true)),
            Expr::False => Ok(Value::Boolean(false)),
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Variable(v) => Ok(lookup(&context.root, v)),
            Expr::Call(call) => self.eval_call(call, context),
        }
    }

    fn eval_call(&self, call: &Call, ctx: &EvalContext) -> JxResult<Value> {
        let op = call.op;
        match op {
            Op::And => {
                for term in &call.terms {
                    if !self.eval_expr(term, ctx)?.is_truthy() {
                        return Ok(Value::Boolean(false));
                    }
                }
                Ok(Value::Boolean(true))
            }
            Op::Or => {
                for term in &call.terms {
                    if self.eval_expr(term, ctx)?.is_truthy() {
                        return Ok(Value::Boolean(true));
                    }
                }
                Ok(Value::Boolean(false))
            }
            Op::Not => {
                let v = self.eval_term(call, 0, ctx)?;
                Ok(Value::Boolean(!v.is_truthy()))
            }
            Op::Coalesce => {
                for term in &call.terms {
                    let v = self.eval_expr(term, ctx)?;
                    if !v.is_null() {
                        return Ok(v);
                    }
                }
                Ok(Value::Null)
            }
            Op::When => {
                let (cond, then, els) = call.when_parts();
                if self.eval_expr(cond, ctx)?.is_truthy() {
                    self.eval_expr(then, ctx)
                } else {
                    self.eval_expr(els, ctx)
                }
            }
            Op::Case => {
                let (whens, default) = call.case_parts();
                for w in whens {
                    if let Expr::Call(branch) = w {
                        let (cond, then, _) = branch.when_parts();
                        if self.eval_expr(cond, ctx)?.is_truthy() {
                            return self.eval_expr(then, ctx);
                        }
                    }
                }
                self.eval_expr(default, ctx)
            }
            Op::Exists => Ok(Value::Boolean(!self.eval_term(call, 0, ctx)?.is_null())),
            Op::Missing => Ok(Value::Boolean(self.eval_term(call, 0, ctx)?.is_null())),
            Op::Script => Err(JxError::Unsupported {
                op: "script",
                backend: "evaluator",
            }),
            _ => {
                let values = call
                    .terms
                    .iter()
                    .map(|t| self.eval_expr(t, ctx))
                    .collect::<JxResult<Vec<_>>>()?;
                let result = self.apply(call, &values, ctx)?;
                match (result, call.default()) {
                    (Value::Null, Some(default)) => self.eval_expr(default, ctx),
                    (result, _) => Ok(result),
                }
            }
        }
    }

    fn eval_term(&self, call: &Call, index: usize, ctx: &EvalContext) -> JxResult<Value> {
        match call.terms.get(index) {
            Some(term) => self.eval_expr(term, ctx),
            None => Ok(Value::Null),
        }
    }

    /// Strict operators: operands already evaluated, `default` applied by the caller.
    fn apply(&self, call: &Call, values: &[Value], ctx: &EvalContext) -> JxResult<Value> {
        let arg = |i: usize| values.get(i).unwrap_or(NULL_VALUE);
        let result = match call.op {
            Op::Eq => Value::Boolean(values_eq(arg(0), arg(1))),
            Op::Ne => Value::Boolean(!values_eq(arg(0), arg(1))),
            Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
                Value::Boolean(any_ordered(call.op, arg(0), arg(1)))
            }
            Op::Add | Op::Mul => {
                let mut acc = arg(0).clone();
                for v in values.iter().skip(1) {
                    acc = arithmetic(call.op, &acc, v);
                }
                if values.len() == 1 && acc.as_float().is_none() {
                    Value::Null
                } else {
                    acc
                }
            }
            Op::Sub | Op::Div | Op::Mod | Op::Exp => arithmetic(call.op, arg(0), arg(1)),
            Op::Prefix => Value::Boolean(any_string(arg(0), arg(1), |s, p| s.starts_with(p))),
            Op::Suffix => Value::Boolean(any_string(arg(0), arg(1), |s, p| s.ends_with(p))),
            Op::Regexp => {
                let pattern = match arg(1) {
                    Value::String(p) => p,
                    Value::Null => return Ok(Value::Boolean(false)),
                    other => {
                        return Err(JxError::Eval(format!(
                            "regexp pattern must be a string, got {}",
                            type_name(other)
                        )));
                    }
                };
                let re = self.compile(pattern)?;
                Value::Boolean(scalars(arg(0)).any(|v| matches!(v, Value::String(s) if re.is_match(s))))
            }
            Op::In => match arg(1) {
                Value::Array(items) => Value::Boolean(
                    !arg(0).is_null() && scalars(arg(0)).any(|v| items.iter().any(|i| values_eq(v, i))),
                ),
                Value::Null => Value::Boolean(false),
                single => Value::Boolean(values_eq(arg(0), single)),
            },
            Op::Concat => {
                let parts: Vec<String> = values
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(|v| first_value(v).to_text())
                    .collect();
                if parts.is_empty() {
                    Value::Null
                } else {
                    Value::String(parts.join(call.separator()))
                }
            }
            Op::Length => match first_value(arg(0)) {
                Value::Null => Value::Null,
                v => Value::Integer(v.to_text().chars().count() as i64),
            },
            Op::Left | Op::Right => match (text(arg(0)), arg(1).as_int()) {
                (Some(s), Some(n)) => {
                    let len = s.chars().count() as i64;
                    let n = n.clamp(0, len) as usize;
                    let out: String = if call.op == Op::Left {
                        s.chars().take(n).collect()
                    } else {
                        s.chars().skip(len as usize - n).collect()
                    };
                    Value::String(out)
                }
                _ => Value::Null,
            },
            Op::Substring => match (text(arg(0)), arg(1).as_int()) {
                (Some(s), Some(start)) => {
                    let len = s.chars().count() as i64;
                    let end = match values.get(2) {
                        Some(Value::Null) | None => len,
                        Some(v) => match v.as_int() {
                            Some(e) => e,
                            None => return Ok(Value::Null),
                        },
                    };
                    let start = start.clamp(0, len) as usize;
                    let end = end.clamp(start as i64, len) as usize;
                    Value::String(s.chars().skip(start).take(end - start).collect())
                }
                _ => Value::Null,
            },
            Op::Find => {
                let start = match call.start() {
                    Some(s) => self.eval_expr(s, ctx)?.as_int().unwrap_or(0).max(0) as usize,
                    None => 0,
                };
                match (text(arg(0)), text(arg(1))) {
                    (Some(s), Some(needle)) => find_chars(&s, &needle, start)
                        .map(|i| Value::Integer(i as i64))
                        .unwrap_or(Value::Null),
                    _ => Value::Null,
                }
            }
            Op::First => first_value(arg(0)).clone(),
            Op::String => match first_value(arg(0)) {
                Value::Null => Value::Null,
                v => Value::String(v.to_text()),
            },
            Op::Number => to_number(first_value(arg(0))),
            Op::Integer => match to_number(first_value(arg(0))) {
                Value::Float(f) if f.is_finite() => Value::Integer(f.trunc() as i64),
                _ => Value::Null,
            },
            Op::Boolean => match first_value(arg(0)) {
                Value::Boolean(b) => Value::Boolean(*b),
                Value::Integer(n) => Value::Boolean(*n != 0),
                Value::Float(n) => Value::Boolean(*n != 0.0),
                Value::String(s) => Value::Boolean(s.eq_ignore_ascii_case("true")),
                _ => Value::Null,
            },
            Op::Tuple => Value::Array(values.to_vec()),
            other => {
                return Err(JxError::Eval(format!(
                    "operator `{}` cannot be applied strictly",
                    other
                )));
            }
        };
        Ok(result)
    }

    fn compile(&self, pattern: &str) -> JxResult<Regex> {
        if let Some(re) = self.patterns.borrow().get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| JxError::Eval(format!("invalid regexp `{}`: {}", pattern, e)))?;
        self.patterns
            .borrow_mut()
            .insert(pattern.to_string(), re.clone());
        Ok(re)
    }
}

/// Resolve a dotted path. Arrays along the way fan out; an empty result is
/// missing and a single result is unwrapped.
pub fn lookup(root: &Value, var: &Variable) -> Value {
    let mut frontier = vec![root];
    for segment in var.segments() {
        let mut next = Vec::new();
        for value in frontier {
            collect_field(value, segment, &mut next);
        }
        frontier = next;
    }
    let mut found: Vec<Value> = Vec::new();
    for value in frontier {
        match value {
            Value::Null => {}
            Value::Array(items) => found.extend(items.iter().filter(|v| !v.is_null()).cloned()),
            other => found.push(other.clone()),
        }
    }
    match found.len() {
        0 => Value::Null,
        1 => found.remove(0),
        _ => Value::Array(found),
    }
}

fn collect_field<'a>(value: &'a Value, segment: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(segment) {
                out.push(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_field(item, segment, out);
            }
        }
        _ => {}
    }
}

fn scalars(v: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match v {
        Value::Array(items) => Box::new(items.iter()),
        Value::Null => Box::new(std::iter::empty()),
        other => Box::new(std::iter::once(other)),
    }
}

fn first_value(v: &Value) -> &Value {
    match v {
        Value::Array(items) => items.first().unwrap_or(NULL_VALUE),
        other => other,
    }
}

fn text(v: &Value) -> Option<String> {
    match first_value(v) {
        Value::Null => None,
        other => Some(other.to_text()),
    }
}

fn to_number(v: &Value) -> Value {
    match v {
        Value::Integer(n) => Value::Float(*n as f64),
        Value::Float(n) => Value::Float(*n),
        Value::Boolean(b) => Value::Float(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Float)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Total equality: two missing values are equal, and a multi-valued side
/// matches when any element does.
pub fn values_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| values_eq(p, q))
        }
        (Value::Array(items), other) | (other, Value::Array(items)) => {
            items.iter().any(|item| values_eq(item, other))
        }
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    }
}

fn any_ordered(op: Op, a: &Value, b: &Value) -> bool {
    scalars(a).any(|x| {
        scalars(b).any(|y| match compare(x, y) {
            Some(ord) => match op {
                Op::Gt => ord == Ordering::Greater,
                Op::Gte => ord != Ordering::Less,
                Op::Lt => ord == Ordering::Less,
                Op::Lte => ord != Ordering::Greater,
                _ => false,
            },
            None => false,
        })
    })
}

fn any_string(a: &Value, b: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
    match b {
        Value::String(p) => scalars(a).any(|v| matches!(v, Value::String(s) if test(s, p))),
        _ => false,
    }
}

fn find_chars(haystack: &str, needle: &str, start: usize) -> Option<usize> {
    let offset = match haystack.char_indices().nth(start) {
        Some((byte, _)) => byte,
        None if start == haystack.chars().count() => haystack.len(),
        None => return None,
    };
    haystack[offset..]
        .find(needle)
        .map(|byte| start + haystack[offset..offset + byte].chars().count())
}

/// Binary arithmetic. Integer pairs stay integers (except division and
/// exponent); anything involving a float is computed in decimal so that
/// `0.1 + 0.2` is `0.3`. Missing or non-numeric operands give null.
pub fn arithmetic(op: Op, left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => {
            let (a, b) = (*a, *b);
            let exact = match op {
                Op::Add => a.checked_add(b),
                Op::Sub => a.checked_sub(b),
                Op::Mul => a.checked_mul(b),
                Op::Mod if b == 0 => return Value::Null,
                Op::Mod => a.checked_rem(b),
                _ => None,
            };
            match exact {
                Some(n) => Value::Integer(n),
                None => float_arithmetic(op, a as f64, b as f64),
            }
        }
        _ => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => decimal_arithmetic(op, a, b),
            _ => Value::Null,
        },
    }
}

fn decimal_arithmetic(op: Op, a: f64, b: f64) -> Value {
    if let Some(ad) = Decimal::from_f64(a)
        && let Some(bd) = Decimal::from_f64(b)
    {
        let rd = match op {
            Op::Add => ad.checked_add(bd),
            Op::Sub => ad.checked_sub(bd),
            Op::Mul => ad.checked_mul(bd),
            Op::Div if bd.is_zero() => return Value::Null,
            Op::Div => ad.checked_div(bd),
            Op::Mod if bd.is_zero() => return Value::Null,
            Op::Mod => ad.checked_rem(bd),
            _ => None,
        };
        if let Some(r) = rd.and_then(|r| r.to_f64()) {
            return Value::Float(r);
        }
    }
    float_arithmetic(op, a, b)
}

fn float_arithmetic(op: Op, a: f64, b: f64) -> Value {
    let r = match op {
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a * b,
        Op::Div if b == 0.0 => return Value::Null,
        Op::Div => a / b,
        Op::Mod if b == 0.0 => return Value::Null,
        Op::Mod => a % b,
        Op::Exp => a.powf(b),
        _ => return Value::Null,
    };
    if r.is_finite() { Value::Float(r) } else { Value::Null }
}

/// Text of a numeric literal as the backends print it.
pub fn number_text(v: &Value) -> Option<String> {
    match v {
        Value::Integer(n) => Some(n.to_string()),
        Value::Float(f) => Some(float_text(*f)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic_stays_integer() {
        assert_eq!(
            arithmetic(Op::Add, &Value::Integer(2), &Value::Integer(3)),
            Value::Integer(5)
        );
        assert_eq!(
            arithmetic(Op::Div, &Value::Integer(6), &Value::Integer(3)),
            Value::Float(2.0)
        );
        assert_eq!(
            arithmetic(Op::Mod, &Value::Integer(7), &Value::Integer(0)),
            Value::Null
        );
    }

    #[test]
    fn test_decimal_precision() {
        assert_eq!(
            arithmetic(Op::Add, &Value::Float(0.1), &Value::Float(0.2)),
            Value::Float(0.3)
        );
    }

    #[test]
    fn test_find_chars() {
        assert_eq!(find_chars("héllo", "l", 0), Some(2));
        assert_eq!(find_chars("héllo", "l", 3), Some(3));
        assert_eq!(find_chars("héllo", "z", 0), None);
        assert_eq!(find_chars("abc", "", 3), Some(3));
    }

    #[test]
    fn test_values_eq() {
        assert!(values_eq(&Value::Integer(1), &Value::Float(1.0)));
        assert!(values_eq(&Value::Null, &Value::Null));
        assert!(values_eq(
            &Value::Array(vec![Value::Integer(1), Value::Integer(2)]),
            &Value::Integer(2)
        ));
        assert!(!values_eq(&Value::String("1".into()), &Value::Integer(1)));
    }
}

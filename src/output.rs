//! AST → JSON.
//!
//! The inverse of [`crate::builder`]: the output is the canonical full form
//! (operand lists, never the simple form), so building it again yields an
//! equal tree.
//!
//! # Examples
//!
//! ```
//! use jx_lang::builder::build;
//! use jx_lang::output::{expr_to_json, to_json};
//! use serde_json::json;
//!
//! let expr = build(&json!({"eq": {"a": "x"}})).unwrap();
//! assert_eq!(expr_to_json(&expr), json!({"eq": ["a", {"literal": "x"}]}));
//! assert_eq!(to_json(&expr), r#"{"eq":["a",{"literal":"x"}]}"#);
//! ```

use serde_json::{Map, Value as Json, json};

use crate::{
    ast::{Call, Expr, Op},
    value::Value,
};

/// Canonical JSON for an expression.
pub fn expr_to_json(expr: &Expr) -> Json {
    match expr {
        Expr::Null => Json::Null,
        Expr::True => Json::Bool(true),
        Expr::False => Json::Bool(false),
        Expr::Literal(v) => literal_to_json(v),
        Expr::Variable(v) => Json::String(v.name.clone()),
        Expr::Call(call) => call_to_json(call),
    }
}

fn literal_to_json(v: &Value) -> Json {
    match v {
        Value::Integer(_) | Value::Float(_) => v.to_json(),
        other => json!({"literal": other.to_json()}),
    }
}

fn call_to_json(call: &Call) -> Json {
    let mut obj = Map::new();
    let key = call.op.name().to_string();
    match call.op {
        Op::When => {
            let (cond, then, els) = call.when_parts();
            obj.insert(key, expr_to_json(cond));
            if *then != Expr::Null {
                obj.insert("then".to_string(), expr_to_json(then));
            }
            if *els != Expr::Null {
                obj.insert("else".to_string(), expr_to_json(els));
            }
        }
        Op::Script => {
            let source = match call.terms.first().and_then(Expr::literal_value) {
                Some(Value::String(s)) => Json::String(s),
                _ => Json::Null,
            };
            obj.insert(key, source);
        }
        _ => {
            obj.insert(key, Json::Array(call.terms.iter().map(expr_to_json).collect()));
        }
    }
    if let Some(default) = call.default() {
        obj.insert("default".to_string(), expr_to_json(default));
    }
    if let Some(separator) = &call.params.separator {
        obj.insert("separator".to_string(), Json::String(separator.clone()));
    }
    if let Some(start) = call.start() {
        obj.insert("start".to_string(), expr_to_json(start));
    }
    Json::Object(obj)
}

/// Compact JSON text.
pub fn to_json(expr: &Expr) -> String {
    expr_to_json(expr).to_string()
}

/// Pretty-printed JSON text (2-space indentation).
pub fn to_json_pretty(expr: &Expr) -> String {
    let json = expr_to_json(expr);
    serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Params;

    #[test]
    fn test_singletons() {
        assert_eq!(expr_to_json(&Expr::Null), Json::Null);
        assert_eq!(expr_to_json(&Expr::True), json!(true));
    }

    #[test]
    fn test_when_omits_null_branches() {
        let e = Expr::when(Expr::var("c"), Expr::int(1), Expr::Null);
        assert_eq!(expr_to_json(&e), json!({"when": "c", "then": 1}));
    }

    #[test]
    fn test_decorations() {
        let e = Expr::call_with(
            Op::Concat,
            vec![Expr::var("a"), Expr::var("b")],
            Params {
                separator: Some("-".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(expr_to_json(&e), json!({"concat": ["a", "b"], "separator": "-"}));
    }
}

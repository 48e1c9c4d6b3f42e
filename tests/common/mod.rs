#![allow(dead_code)]

use jx_lang::{Column, Evaluator, Expr, JxType, MemorySchema, Value, build};
use serde_json::Value as Json;

pub fn expr(json: Json) -> Expr {
    build(&json).unwrap_or_else(|e| panic!("failed to build {}: {}", json, e))
}

pub fn simplified(json: Json) -> Expr {
    expr(json).partial_eval().unwrap()
}

pub fn eval(expr: &Expr, doc: &Json) -> Result<Json, String> {
    Evaluator::new()
        .eval_expression(expr, Value::from_json(doc))
        .map(|v| v.to_json())
        .map_err(|e| format!("{:?}", e))
}

pub fn eval_json(clause: Json, doc: Json) -> Json {
    eval(&expr(clause), &doc).unwrap()
}

/// Top-level scalars, one multi-valued field and one nested document.
pub fn schema() -> MemorySchema {
    MemorySchema::new(vec![
        Column::new("a", JxType::Integer),
        Column::new("b", JxType::Integer),
        Column::new("n", JxType::Number),
        Column::new("s", JxType::String),
        Column::new("t", JxType::String),
        Column::new("flag", JxType::Boolean),
        Column::new("tags", JxType::String).with_multi(3),
        Column::new("items.x", JxType::Integer).nested(&["items"]),
        Column::new("items.y", JxType::String).nested(&["items"]),
    ])
}

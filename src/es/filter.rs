use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};
use tracing::debug;

use crate::{
    ast::{Call, Expr, JxType, Op, Variable},
    error::JxResult,
    es::normalize::normalize_filter,
    painless::Painless,
    schema::{Column, ROOT_PATH, Schema},
    split::split_expression_by_path,
    value::Value,
};

/// Boolean composition convention of the target engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `and` / `or` / `not` filters
    Legacy,
    /// `bool.filter` / `bool.must_not`
    #[default]
    Bool,
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(Dialect::Legacy),
            "bool" => Ok(Dialect::Bool),
            other => Err(format!("unknown dialect `{}` (expected legacy or bool)", other)),
        }
    }
}

/// Resolve, simplify, render and normalize.
///
/// ```
/// use jx_lang::{ast::JxType, builder::build, es::{Dialect, to_es_filter}};
/// use jx_lang::schema::{Column, MemorySchema};
/// use serde_json::json;
///
/// let schema = MemorySchema::new(vec![Column::new("a", JxType::Integer)]);
/// let expr = build(&json!({"eq": {"a": 1}})).unwrap();
/// let filter = to_es_filter(&expr, &schema, Dialect::Bool).unwrap();
/// assert_eq!(filter, json!({"term": {"a": 1}}));
/// ```
pub fn to_es_filter(expr: &Expr, schema: &dyn Schema, dialect: Dialect) -> JxResult<Json> {
    let expr = expr.resolve(schema).partial_eval()?;
    let filter = EsFilter::new(schema, dialect).filter(&expr)?;
    Ok(normalize_filter(&filter))
}

/// Lucene regular-expression escaping.
pub fn escape_regexp(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if ".?+*|{}[]()\"\\#@&<>~".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn scalar_type_fits(column: JxType, value: &Value) -> bool {
    match column {
        JxType::Object => true,
        JxType::Integer | JxType::Number => value.jx_type().is_numeric(),
        other => value.jx_type() == other,
    }
}

/// Renderer bound to a schema and dialect. Expects resolved, simplified input.
pub struct EsFilter<'a> {
    schema: &'a dyn Schema,
    dialect: Dialect,
}

impl<'a> EsFilter<'a> {
    pub fn new(schema: &'a dyn Schema, dialect: Dialect) -> Self {
        EsFilter { schema, dialect }
    }

    /// Render, wrapping each nested-path group of a conjunction in a
    /// `nested` query.
    pub fn filter(&self, expr: &Expr) -> JxResult<Json> {
        let groups = split_expression_by_path(expr, self.schema)?;
        if groups.keys().all(|p| p == ROOT_PATH) {
            return self.render(expr);
        }
        let mut parts = Vec::with_capacity(groups.len());
        for (path, conjuncts) in groups {
            let rendered = conjuncts
                .iter()
                .map(|c| self.render(c))
                .collect::<JxResult<Vec<_>>>()?;
            let inner = self.and(rendered);
            if path == ROOT_PATH {
                parts.push(inner);
            } else {
                debug!(path = %path, "wrapping nested filter");
                parts.push(self.nested(&path, inner));
            }
        }
        Ok(self.and(parts))
    }

    fn match_all(&self) -> Json {
        json!({"match_all": {}})
    }

    fn match_none(&self) -> Json {
        self.not(self.match_all())
    }

    fn and(&self, parts: Vec<Json>) -> Json {
        match self.dialect {
            Dialect::Legacy => json!({"and": parts}),
            Dialect::Bool => json!({"bool": {"filter": parts}}),
        }
    }

    /// The bool dialect has no early-exit OR, so it is written as
    /// `not(and(not a, not b))`.
    fn or(&self, parts: Vec<Json>) -> Json {
        match self.dialect {
            Dialect::Legacy => json!({"or": parts}),
            Dialect::Bool => {
                let negated: Vec<Json> = parts.into_iter().map(|p| self.not(p)).collect();
                self.not(self.and(negated))
            }
        }
    }

    fn not(&self, inner: Json) -> Json {
        match self.dialect {
            Dialect::Legacy => json!({"not": inner}),
            Dialect::Bool => json!({"bool": {"must_not": [inner]}}),
        }
    }

    fn nested(&self, path: &str, inner: Json) -> Json {
        match self.dialect {
            Dialect::Legacy => json!({"nested": {"path": path, "filter": inner}}),
            Dialect::Bool => json!({"nested": {"path": path, "query": inner}}),
        }
    }

    fn script(&self, expr: &Expr) -> JxResult<Json> {
        let source = Painless::new(self.schema).script(expr)?.truthy();
        debug!(op = ?expr.op(), "no native filter; using script");
        Ok(match self.dialect {
            Dialect::Legacy => json!({"script": {"script": source}}),
            Dialect::Bool => json!({"script": {"script": {"source": source, "lang": "painless"}}}),
        })
    }

    fn columns(&self, var: &Variable) -> Vec<Column> {
        self.schema.leaves(&var.name)
    }

    /// One clause per matching column, OR-ed together.
    fn per_column(
        &self,
        var: &Variable,
        fits: impl Fn(&Column) -> bool,
        clause: impl Fn(&str) -> Json,
    ) -> Json {
        let mut parts: Vec<Json> = self
            .columns(var)
            .iter()
            .filter(|c| fits(c))
            .map(|c| clause(c.physical_name()))
            .collect();
        match parts.len() {
            0 => self.match_none(),
            1 => parts.remove(0),
            _ => self.or(parts),
        }
    }

    fn render(&self, expr: &Expr) -> JxResult<Json> {
        match expr {
            Expr::True => Ok(self.match_all()),
            Expr::False | Expr::Null => Ok(self.match_none()),
            Expr::Literal(v) => Ok(if v.is_truthy() {
                self.match_all()
            } else {
                self.match_none()
            }),
            Expr::Variable(v) if v.declared == JxType::Boolean && !v.many => Ok(self.per_column(
                v,
                |c| c.jx_type == JxType::Boolean,
                |f| json!({"term": {f: true}}),
            )),
            Expr::Variable(_) => self.script(expr),
            Expr::Call(call) => self.render_call(expr, call),
        }
    }

    fn render_all(&self, terms: &[Expr]) -> JxResult<Vec<Json>> {
        terms.iter().map(|t| self.render(t)).collect()
    }

    fn render_call(&self, expr: &Expr, call: &Call) -> JxResult<Json> {
        let var = call.terms.first().and_then(Expr::as_variable);
        let rhs = call.terms.get(1).and_then(Expr::literal_value);

        match (call.op, var, rhs) {
            (Op::And, _, _) => Ok(self.and(self.render_all(&call.terms)?)),
            (Op::Or, _, _) => Ok(self.or(self.render_all(&call.terms)?)),
            (Op::Not, _, _) => match call.terms.first() {
                Some(inner) => Ok(self.not(self.render(inner)?)),
                None => Ok(self.match_none()),
            },
            (Op::Exists | Op::Missing, Some(v), _) => {
                let exists = self.per_column(v, |_| true, |f| json!({"exists": {"field": f}}));
                Ok(if call.op == Op::Exists { exists } else { self.not(exists) })
            }
            (Op::Eq | Op::Ne, Some(v), Some(value)) if !matches!(value, Value::Array(_) | Value::Object(_)) => {
                let literal = value.to_json();
                let term = self.per_column(
                    v,
                    |c| scalar_type_fits(c.jx_type, &value),
                    |f| json!({"term": {f: literal.clone()}}),
                );
                Ok(if call.op == Op::Eq { term } else { self.not(term) })
            }
            (Op::Gt | Op::Gte | Op::Lt | Op::Lte, Some(v), Some(value))
                if matches!(value, Value::Integer(_) | Value::Float(_) | Value::String(_)) =>
            {
                let bound = call.op.name();
                let literal = value.to_json();
                Ok(self.per_column(
                    v,
                    |c| scalar_type_fits(c.jx_type, &value),
                    |f| json!({"range": {f: {bound: literal.clone()}}}),
                ))
            }
            (Op::In, Some(v), Some(Value::Array(items))) => {
                let values: Vec<Json> = items.iter().map(Value::to_json).collect();
                Ok(self.per_column(
                    v,
                    |c| items.iter().any(|i| scalar_type_fits(c.jx_type, i)),
                    |f| json!({"terms": {f: values.clone()}}),
                ))
            }
            (Op::Prefix, Some(v), Some(Value::String(p))) => Ok(self.per_column(
                v,
                |c| matches!(c.jx_type, JxType::String | JxType::Object),
                |f| json!({"prefix": {f: p.clone()}}),
            )),
            (Op::Suffix, Some(v), Some(Value::String(s))) => {
                let pattern = format!(".*{}", escape_regexp(&s));
                Ok(self.per_column(
                    v,
                    |c| matches!(c.jx_type, JxType::String | JxType::Object),
                    |f| json!({"regexp": {f: pattern.clone()}}),
                ))
            }
            (Op::Regexp, Some(v), Some(Value::String(p))) => Ok(self.per_column(
                v,
                |c| matches!(c.jx_type, JxType::String | JxType::Object),
                |f| json!({"regexp": {f: p.clone()}}),
            )),
            (Op::When, _, _) => {
                let (cond, then, els) = call.when_parts();
                let expanded = Expr::or(vec![
                    Expr::and(vec![cond.clone(), then.clone()]),
                    Expr::and(vec![Expr::not(cond.clone()), els.clone()]),
                ])
                .partial_eval()?;
                self.render(&expanded)
            }
            (Op::Case, _, _) => {
                let (whens, default) = call.case_parts();
                let mut acc = default.clone();
                for w in whens.iter().rev() {
                    if let Some(branch) = w.as_call() {
                        let (cond, then, _) = branch.when_parts();
                        acc = Expr::when(cond.clone(), then.clone(), acc);
                    }
                }
                self.render(&acc.partial_eval()?)
            }
            _ => self.script(expr),
        }
    }
}

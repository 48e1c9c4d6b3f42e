//! JSON → AST.
//!
//! A clause is a recursive JSON structure. Scalars become literals, strings
//! that look like paths become variables, and objects carry exactly one
//! operator key plus whatever decoration keys that operator recognizes.

use serde::Deserialize;
use serde_json::{Map, Value as Json};
use tracing::trace;

use crate::{
    ast::{Expr, Op, Params, is_variable_name},
    error::{JxError, JxResult},
    value::Value,
};

/// Options controlling what the builder accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Accept the `script` operator. Off by default: it injects raw source
    /// into the generated query.
    pub allow_scripts: bool,
}

pub struct Builder {
    options: BuildOptions,
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new(BuildOptions::default())
    }
}

impl Builder {
    pub fn new(options: BuildOptions) -> Self {
        Builder { options }
    }

    /// Parse JSON text and build it.
    pub fn parse(&self, text: &str) -> JxResult<Expr> {
        let json: Json = serde_json::from_str(text)?;
        self.build(&json)
    }

    /// Build an expression from a JSON clause.
    pub fn build(&self, json: &Json) -> JxResult<Expr> {
        match json {
            Json::Null => Ok(Expr::Null),
            Json::Bool(b) => Ok(Expr::from(*b)),
            Json::Number(_) => Ok(Expr::literal(Value::from_json(json))),
            Json::String(s) => {
                if is_variable_name(s) {
                    Ok(Expr::var(s.as_str()))
                } else {
                    Err(JxError::Malformed(format!(
                        "`{}` is not a variable name; wrap constants as {{\"literal\": ...}}",
                        s
                    )))
                }
            }
            Json::Array(items) => self.build_list(items),
            Json::Object(obj) => self.build_object(obj),
        }
    }

    /// A bare list is a literal when every element is constant, otherwise a tuple.
    fn build_list(&self, items: &[Json]) -> JxResult<Expr> {
        let terms = items
            .iter()
            .map(|item| self.build(item))
            .collect::<JxResult<Vec<_>>>()?;
        if terms.iter().all(Expr::is_literal) {
            let values = terms.iter().filter_map(Expr::literal_value).collect();
            return Ok(Expr::literal(Value::Array(values)));
        }
        Ok(Expr::call(Op::Tuple, terms))
    }

    fn build_object(&self, obj: &Map<String, Json>) -> JxResult<Expr> {
        if obj.is_empty() {
            return Ok(Expr::True);
        }

        if let Some(value) = obj.get("literal") {
            only_key(obj, "literal")?;
            return Ok(Expr::literal(Value::from_json(value)));
        }

        if let Some(value) = obj.get("var") {
            only_key(obj, "var")?;
            return match value {
                Json::String(name) if is_variable_name(name) => Ok(Expr::var(name.as_str())),
                other => Err(JxError::Malformed(format!(
                    "`var` expects a variable name, got {}",
                    other
                ))),
            };
        }

        let mut found: Option<(&str, Op)> = None;
        for key in obj.keys() {
            if let Some(op) = Op::lookup(key) {
                if let Some((prev, _)) = found {
                    return Err(JxError::Malformed(format!(
                        "more than one operator in clause: `{}` and `{}`",
                        prev, key
                    )));
                }
                found = Some((key.as_str(), op));
            }
        }

        let (key, op) = match found {
            Some(found) => found,
            None => {
                let first = obj.keys().next().cloned().unwrap_or_default();
                return Err(JxError::UnknownOperator(first));
            }
        };

        for other in obj.keys() {
            if other != key && !op.decorations().contains(&other.as_str()) {
                return Err(JxError::Malformed(format!(
                    "`{}` does not accept the `{}` key",
                    op, other
                )));
            }
        }

        if op.is_unsafe() && !self.options.allow_scripts {
            return Err(JxError::ScriptsDisabled);
        }

        let operand = &obj[key];
        let expr = match op {
            Op::When => self.build_when(operand, obj)?,
            Op::Case => self.build_case(operand)?,
            Op::Script => self.build_script(operand)?,
            _ => {
                let params = self.build_params(op, obj)?;
                match operand {
                    Json::Object(pairs) if op.has_simple_form() => {
                        self.build_simple_form(op, pairs, params)?
                    }
                    _ => {
                        let terms = self.build_operands(operand)?;
                        check_arity(op, terms.len())?;
                        Expr::call_with(op, terms, params)
                    }
                }
            }
        };
        trace!(op = %op, "built operator clause");
        Ok(expr)
    }

    fn build_operands(&self, operand: &Json) -> JxResult<Vec<Expr>> {
        match operand {
            Json::Array(items) => items.iter().map(|item| self.build(item)).collect(),
            single => Ok(vec![self.build(single)?]),
        }
    }

    /// `{op: {field: value, ...}}` becomes `op(var field, literal value)`,
    /// and the conjunction of those when there are several keys.
    fn build_simple_form(
        &self,
        op: Op,
        pairs: &Map<String, Json>,
        params: Params,
    ) -> JxResult<Expr> {
        let mut terms = Vec::with_capacity(pairs.len());
        for (name, value) in pairs {
            if !is_variable_name(name) {
                return Err(JxError::Malformed(format!(
                    "`{}` is not a variable name in the simple form of `{}`",
                    name, op
                )));
            }
            terms.push(Expr::call_with(
                op,
                vec![Expr::var(name.as_str()), Expr::literal(Value::from_json(value))],
                params.clone(),
            ));
        }
        match terms.len() {
            0 => Ok(Expr::True),
            1 => Ok(terms.remove(0)),
            _ if op.is_predicate() => Ok(Expr::and(terms)),
            n => Err(JxError::Arity {
                op: op.name(),
                expected: "1 field in its simple form, not",
                got: n,
            }),
        }
    }

    fn build_params(&self, op: Op, obj: &Map<String, Json>) -> JxResult<Params> {
        let mut params = Params::default();
        if let Some(default) = obj.get("default") {
            params.default = Some(Box::new(self.build(default)?));
        }
        if let Some(start) = obj.get("start") {
            params.start = Some(Box::new(self.build(start)?));
        }
        if let Some(separator) = obj.get("separator") {
            match separator {
                Json::String(s) => params.separator = Some(s.clone()),
                _ => {
                    return Err(JxError::LiteralRequired {
                        op: op.name(),
                        key: "separator",
                    });
                }
            }
        }
        Ok(params)
    }

    fn build_when(&self, operand: &Json, obj: &Map<String, Json>) -> JxResult<Expr> {
        // list form: [cond, then] or [cond, then, else]
        if let Json::Array(items) = operand {
            check_arity(Op::When, items.len())?;
            if obj.contains_key("then") || obj.contains_key("else") {
                return Err(JxError::Malformed(
                    "`when` takes either a list or `then`/`else` keys, not both".to_string(),
                ));
            }
            let mut parts = items
                .iter()
                .map(|item| self.build(item))
                .collect::<JxResult<Vec<_>>>()?
                .into_iter();
            let cond = parts.next().unwrap_or(Expr::Null);
            let then = parts.next().unwrap_or(Expr::Null);
            let els = parts.next().unwrap_or(Expr::Null);
            return Ok(Expr::when(cond, then, els));
        }
        let cond = self.build(operand)?;
        let then = match obj.get("then") {
            Some(t) => self.build(t)?,
            None => Expr::Null,
        };
        let els = match obj.get("else") {
            Some(e) => self.build(e)?,
            None => Expr::Null,
        };
        Ok(Expr::when(cond, then, els))
    }

    fn build_case(&self, operand: &Json) -> JxResult<Expr> {
        let items = match operand {
            Json::Array(items) => items,
            _ => {
                return Err(JxError::Malformed(
                    "`case` expects a list of `when` clauses".to_string(),
                ));
            }
        };
        check_arity(Op::Case, items.len())?;

        let mut terms = items
            .iter()
            .map(|item| self.build(item))
            .collect::<JxResult<Vec<_>>>()?;
        let ends_with_when = terms.last().is_some_and(|t| t.is_op(Op::When));
        if ends_with_when {
            terms.push(Expr::Null);
        }
        let whens = terms.split_last().map(|(_, whens)| whens).unwrap_or(&[]);
        if let Some(bad) = whens.iter().find(|t| !t.is_op(Op::When)) {
            return Err(JxError::Malformed(format!(
                "`case` branches must be `when` clauses, got {:?}",
                bad
            )));
        }
        Ok(Expr::call(Op::Case, terms))
    }

    fn build_script(&self, operand: &Json) -> JxResult<Expr> {
        match operand {
            Json::String(source) => Ok(Expr::call(Op::Script, vec![Expr::string(source.as_str())])),
            _ => Err(JxError::LiteralRequired {
                op: "script",
                key: "script",
            }),
        }
    }
}

fn only_key(obj: &Map<String, Json>, key: &str) -> JxResult<()> {
    match obj.keys().find(|k| k.as_str() != key) {
        Some(extra) => Err(JxError::Malformed(format!(
            "`{}` does not accept the `{}` key",
            key, extra
        ))),
        None => Ok(()),
    }
}

fn check_arity(op: Op, got: usize) -> JxResult<()> {
    if op.arity().accepts(got) {
        Ok(())
    } else {
        Err(JxError::Arity {
            op: op.name(),
            expected: op.arity().describe(),
            got,
        })
    }
}

/// Build with default options (scripts disabled).
pub fn build(json: &Json) -> JxResult<Expr> {
    Builder::default().build(json)
}

/// Parse JSON text and build it with default options.
pub fn parse(text: &str) -> JxResult<Expr> {
    Builder::default().parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(build(&json!(null)).unwrap(), Expr::Null);
        assert_eq!(build(&json!(true)).unwrap(), Expr::True);
        assert_eq!(build(&json!(3)).unwrap(), Expr::int(3));
        assert_eq!(build(&json!("a.b")).unwrap(), Expr::var("a.b"));
    }

    #[test]
    fn test_empty_object_matches_everything() {
        assert_eq!(build(&json!({})).unwrap(), Expr::True);
    }

    #[test]
    fn test_bare_list_of_constants_is_literal() {
        assert_eq!(
            build(&json!([1, 2])).unwrap(),
            Expr::literal(Value::Array(vec![Value::Integer(1), Value::Integer(2)]))
        );
        assert!(build(&json!(["a", 2])).unwrap().is_op(Op::Tuple));
    }
}

//! Script backend.
//!
//! Renders an expression as Painless source. The interpreter has no notion
//! of "missing", so every sub-expression carries its own missing-check and
//! callers guard on it explicitly. Sub-expressions are composed as
//! [`ScriptExpr`] values; only the outermost one is boxed and guarded.

use tracing::debug;

use crate::{
    ast::{Call, Expr, JxType, Op},
    error::{JxError, JxResult},
    schema::{Column, ROOT_PATH, Schema},
    value::Value,
};

const TRUE: &str = "true";
const FALSE: &str = "false";

/// Strings `Double.parseDouble` accepts without throwing.
const NUMERIC_PATTERN: &str = r"/[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?/";

/// A rendered sub-expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptExpr {
    /// Painless source producing the value; only meaningful when not missing
    pub source: String,
    /// Painless boolean source, true when the value is missing
    pub miss: String,
    pub ty: JxType,
    /// `source` is a list
    pub many: bool,
}

impl ScriptExpr {
    fn new(source: impl Into<String>, miss: impl Into<String>, ty: JxType) -> Self {
        ScriptExpr {
            source: source.into(),
            miss: miss.into(),
            ty,
            many: false,
        }
    }

    fn boolean(source: impl Into<String>) -> Self {
        ScriptExpr::new(source, FALSE, JxType::Boolean)
    }

    fn absent() -> Self {
        ScriptExpr::new("null", TRUE, JxType::Null)
    }

    fn many(mut self, many: bool) -> Self {
        self.many = many;
        self
    }

    pub fn is_never_missing(&self) -> bool {
        self.miss == FALSE
    }

    pub fn is_always_missing(&self) -> bool {
        self.miss == TRUE
    }

    /// Source with primitives boxed, so it can share a slot with other types.
    fn boxed(&self) -> String {
        if self.many {
            return self.source.clone();
        }
        match self.ty {
            JxType::Integer => format!("Long.valueOf({})", self.source),
            JxType::Number => format!("Double.valueOf({})", self.source),
            JxType::Boolean => format!("Boolean.valueOf({})", self.source),
            _ => self.source.clone(),
        }
    }

    /// Final form: boxed, yielding `null` when missing.
    pub fn script(&self) -> String {
        if self.is_always_missing() {
            return "null".to_string();
        }
        ternary(&self.miss, "null", &self.boxed())
    }

    /// Truthiness as a never-missing boolean.
    pub fn truthy(&self) -> String {
        let test = if self.many {
            match self.ty {
                JxType::Boolean => format!("{}.contains(true)", self.source),
                _ => format!("!{}.isEmpty()", self.source),
            }
        } else {
            match self.ty {
                JxType::Boolean => self.source.clone(),
                JxType::Integer | JxType::Number => format!("{} != 0", self.source),
                JxType::String => format!("!{}.isEmpty()", self.source),
                JxType::Null => FALSE.to_string(),
                JxType::Object => format!("{} != null", self.source),
            }
        };
        and_all(&[negate(&self.miss), test])
    }
}

// ----------------------------------------------------------------------
// source composition with constant folding on "true"/"false"
// ----------------------------------------------------------------------

fn negate(s: &str) -> String {
    match s {
        TRUE => FALSE.to_string(),
        FALSE => TRUE.to_string(),
        _ => format!("!({})", s),
    }
}

fn and_all(parts: &[String]) -> String {
    let mut kept = Vec::new();
    for p in parts {
        match p.as_str() {
            TRUE => {}
            FALSE => return FALSE.to_string(),
            _ => kept.push(format!("({})", p)),
        }
    }
    match kept.len() {
        0 => TRUE.to_string(),
        1 => kept.remove(0),
        _ => kept.join(" && "),
    }
}

fn or_all(parts: &[String]) -> String {
    let mut kept = Vec::new();
    for p in parts {
        match p.as_str() {
            FALSE => {}
            TRUE => return TRUE.to_string(),
            _ => kept.push(format!("({})", p)),
        }
    }
    match kept.len() {
        0 => FALSE.to_string(),
        1 => kept.remove(0),
        _ => kept.join(" || "),
    }
}

fn ternary(cond: &str, then: &str, els: &str) -> String {
    match cond {
        TRUE => then.to_string(),
        FALSE => els.to_string(),
        _ if then == els => then.to_string(),
        _ if then == TRUE && els == FALSE => cond.to_string(),
        _ => format!("(({}) ? {} : {})", cond, then, els),
    }
}

/// Java string literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn doc_field(column: &Column) -> String {
    format!("doc['{}']", column.physical_name().replace('\'', "\\'"))
}

fn compatible(a: JxType, b: JxType) -> bool {
    a == b
        || (a.is_numeric() && b.is_numeric())
        || matches!(a, JxType::Object | JxType::Null)
        || matches!(b, JxType::Object | JxType::Null)
}

fn comparison_symbol(op: Op) -> &'static str {
    match op {
        Op::Gt => ">",
        Op::Gte => ">=",
        Op::Lt => "<",
        _ => "<=",
    }
}

/// Render with the schema's columns, after resolving and simplifying.
pub fn to_painless(expr: &Expr, schema: &dyn Schema) -> JxResult<ScriptExpr> {
    let expr = expr.resolve(schema).partial_eval()?;
    Painless::new(schema).script(&expr)
}

/// Render as a boolean filter script.
pub fn to_painless_filter(expr: &Expr, schema: &dyn Schema) -> JxResult<String> {
    Ok(to_painless(expr, schema)?.truthy())
}

/// Translator bound to a schema. Expects resolved, simplified input.
pub struct Painless<'a> {
    schema: &'a dyn Schema,
}

impl<'a> Painless<'a> {
    pub fn new(schema: &'a dyn Schema) -> Self {
        Painless { schema }
    }

    pub fn script(&self, expr: &Expr) -> JxResult<ScriptExpr> {
        match expr {
            Expr::Null => Ok(ScriptExpr::absent()),
            Expr::True => Ok(ScriptExpr::boolean(TRUE)),
            Expr::False => Ok(ScriptExpr::boolean(FALSE)),
            Expr::Literal(v) => literal(v),
            Expr::Variable(v) => self.variable(&v.name, v.many),
            Expr::Call(call) => self.call(call),
        }
    }

    fn variable(&self, name: &str, many: bool) -> JxResult<ScriptExpr> {
        if name == ROOT_PATH {
            return Err(JxError::Unsupported {
                op: "var",
                backend: "painless",
            });
        }
        let columns = self.schema.leaves(name);
        let mut parts: Vec<ScriptExpr> = columns
            .iter()
            .map(|c| {
                let field = doc_field(c);
                let is_many = many || c.is_many();
                let source = if is_many {
                    field.clone()
                } else {
                    format!("{}.value", field)
                };
                ScriptExpr::new(source, format!("{}.size() == 0", field), c.jx_type).many(is_many)
            })
            .collect();
        match parts.len() {
            0 => Ok(ScriptExpr::absent()),
            1 => Ok(parts.remove(0)),
            _ => Ok(coalesce(parts)),
        }
    }

    fn terms(&self, call: &Call) -> JxResult<Vec<ScriptExpr>> {
        call.terms.iter().map(|t| self.script(t)).collect()
    }

    fn term(&self, call: &Call, index: usize) -> JxResult<ScriptExpr> {
        match call.terms.get(index) {
            Some(t) => self.script(t),
            None => Ok(ScriptExpr::absent()),
        }
    }

    fn with_default(&self, se: ScriptExpr, call: &Call) -> JxResult<ScriptExpr> {
        match call.default() {
            Some(default) => {
                let d = self.script(default)?;
                Ok(coalesce(vec![se, d]))
            }
            None => Ok(se),
        }
    }

    fn call(&self, call: &Call) -> JxResult<ScriptExpr> {
        let op = call.op;
        let se = match op {
            Op::And | Op::Or => {
                let parts: Vec<String> = self.terms(call)?.iter().map(ScriptExpr::truthy).collect();
                if op == Op::And {
                    ScriptExpr::boolean(and_all(&parts))
                } else {
                    ScriptExpr::boolean(or_all(&parts))
                }
            }
            Op::Not => ScriptExpr::boolean(negate(&self.term(call, 0)?.truthy())),
            Op::Exists => ScriptExpr::boolean(negate(&self.term(call, 0)?.miss)),
            Op::Missing => ScriptExpr::boolean(self.term(call, 0)?.miss),
            Op::Eq | Op::Ne => {
                let eq = equality(&self.term(call, 0)?, &self.term(call, 1)?);
                ScriptExpr::boolean(if op == Op::Eq { eq } else { negate(&eq) })
            }
            Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
                ScriptExpr::boolean(ordering(op, &self.term(call, 0)?, &self.term(call, 1)?))
            }
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Exp => {
                let ty = Expr::Call(call.clone()).jx_type();
                let value = arithmetic(op, self.terms(call)?, ty);
                self.with_default(value, call)?
            }
            Op::Coalesce => coalesce(self.terms(call)?),
            Op::When => {
                let (cond, then, els) = call.when_parts();
                conditional(
                    &self.script(cond)?.truthy(),
                    self.script(then)?,
                    self.script(els)?,
                )
            }
            Op::Case => {
                let (whens, default) = call.case_parts();
                let mut acc = self.script(default)?;
                for w in whens.iter().rev() {
                    let branch = w.as_call().ok_or_else(|| {
                        JxError::Malformed("`case` branches must be `when` clauses".to_string())
                    })?;
                    let (cond, then, _) = branch.when_parts();
                    acc = conditional(&self.script(cond)?.truthy(), self.script(then)?, acc);
                }
                acc
            }
            Op::Prefix | Op::Suffix => {
                let method = if op == Op::Prefix { "startsWith" } else { "endsWith" };
                let (a, b) = (self.term(call, 0)?, scalar(self.term(call, 1)?));
                string_test(&a, &b, |x| format!("{}.{}({})", x, method, b.source))
            }
            Op::Regexp => {
                let pattern = match call.terms.get(1).and_then(Expr::literal_value) {
                    Some(Value::String(p)) => p,
                    _ => {
                        return Err(JxError::Unsupported {
                            op: "regexp with a computed pattern",
                            backend: "painless",
                        });
                    }
                };
                let a = self.term(call, 0)?;
                let regex = format!("/{}/", pattern.replace('/', "\\/"));
                let b = ScriptExpr::new(quote(&pattern), FALSE, JxType::String);
                string_test(&a, &b, |x| format!("{}.matcher({}).matches()", regex, x))
            }
            Op::In => {
                let (a, b) = (self.term(call, 0)?, self.term(call, 1)?);
                let list = if b.many { b.source.clone() } else { format!("[{}]", b.boxed()) };
                let core = if a.many {
                    format!(
                        "{}.stream().anyMatch(y -> {}.stream().anyMatch(x -> x == y))",
                        a.source, list
                    )
                } else {
                    format!("{}.stream().anyMatch(x -> x == {})", list, a.source)
                };
                ScriptExpr::boolean(and_all(&[negate(&a.miss), negate(&b.miss), core]))
            }
            Op::Concat => {
                let value = concat(self.terms(call)?, call.separator());
                self.with_default(value, call)?
            }
            Op::Length => {
                let s = text(&self.term(call, 0)?);
                ScriptExpr::new(format!("{}.length()", s.source), s.miss, JxType::Integer)
            }
            Op::Left | Op::Right => {
                let s = text(&self.term(call, 0)?);
                let n = scalar(self.term(call, 1)?);
                let len = format!("{}.length()", s.source);
                let count = format!("(int)Math.min(Math.max({}, 0), {})", n.source, len);
                let source = if op == Op::Left {
                    format!("{}.substring(0, {})", s.source, count)
                } else {
                    format!("{}.substring({} - {})", s.source, len, count)
                };
                ScriptExpr::new(source, or_all(&[s.miss, n.miss]), JxType::String)
            }
            Op::Substring => {
                let s = text(&self.term(call, 0)?);
                let start = scalar(self.term(call, 1)?);
                let len = format!("{}.length()", s.source);
                let from = format!("(int)Math.min(Math.max({}, 0), {})", start.source, len);
                let (to, end_miss) = match call.terms.get(2) {
                    Some(end) => {
                        let end = scalar(self.script(end)?);
                        (
                            format!("(int)Math.min(Math.max({}, {}), {})", end.source, from, len),
                            end.miss,
                        )
                    }
                    None => (len.clone(), FALSE.to_string()),
                };
                ScriptExpr::new(
                    format!("{}.substring({}, {})", s.source, from, to),
                    or_all(&[s.miss, start.miss, end_miss]),
                    JxType::String,
                )
            }
            Op::Find => {
                let s = text(&self.term(call, 0)?);
                let needle = text(&self.term(call, 1)?);
                let start = match call.start() {
                    Some(start) => scalar(self.script(start)?),
                    None => ScriptExpr::new("0", FALSE, JxType::Integer),
                };
                let index = format!(
                    "{}.indexOf({}, (int)Math.max({}, 0))",
                    s.source, needle.source, start.source
                );
                let miss = or_all(&[s.miss, needle.miss, start.miss, format!("{} == -1", index)]);
                self.with_default(ScriptExpr::new(index, miss, JxType::Integer), call)?
            }
            Op::First => scalar(self.term(call, 0)?),
            Op::String => text(&self.term(call, 0)?),
            Op::Number => number(&scalar(self.term(call, 0)?)),
            Op::Integer => {
                let inner = scalar(self.term(call, 0)?);
                if inner.ty == JxType::Integer {
                    inner
                } else {
                    let n = number(&inner);
                    ScriptExpr::new(format!("(long)({})", n.source), n.miss, JxType::Integer)
                }
            }
            Op::Boolean => {
                let inner = scalar(self.term(call, 0)?);
                let source = match inner.ty {
                    JxType::Boolean => inner.source.clone(),
                    JxType::String => format!("{}.equalsIgnoreCase(\"true\")", inner.source),
                    JxType::Integer | JxType::Number => format!("({} != 0)", inner.source),
                    _ => format!("Boolean.parseBoolean(String.valueOf({}))", inner.source),
                };
                ScriptExpr::new(source, inner.miss, JxType::Boolean)
            }
            Op::Tuple => {
                let items: Vec<String> = self.terms(call)?.iter().map(ScriptExpr::script).collect();
                ScriptExpr::new(format!("[{}]", items.join(", ")), FALSE, JxType::Object).many(true)
            }
            Op::Script => match call.terms.first().and_then(Expr::literal_value) {
                // inline scripts are written as filter conditions
                Some(Value::String(source)) => ScriptExpr::new(source, FALSE, JxType::Boolean),
                _ => {
                    return Err(JxError::LiteralRequired {
                        op: "script",
                        key: "script",
                    });
                }
            },
        };
        debug!(op = %op, "rendered painless");
        Ok(se)
    }
}

fn literal(v: &Value) -> JxResult<ScriptExpr> {
    Ok(match v {
        Value::Null => ScriptExpr::absent(),
        Value::Boolean(b) => ScriptExpr::boolean(b.to_string()),
        Value::Integer(n) => ScriptExpr::new(format!("{}L", n), FALSE, JxType::Integer),
        Value::Float(f) => ScriptExpr::new(format!("{:?}d", f), FALSE, JxType::Number),
        Value::String(s) => ScriptExpr::new(quote(s), FALSE, JxType::String),
        Value::Array(items) => {
            let rendered = items.iter().map(literal).collect::<JxResult<Vec<_>>>()?;
            let ty = JxType::merge_all(rendered.iter().map(|r| r.ty));
            let body: Vec<String> = rendered.iter().map(ScriptExpr::boxed).collect();
            ScriptExpr::new(format!("[{}]", body.join(", ")), FALSE, ty).many(true)
        }
        Value::Object(_) => {
            return Err(JxError::Unsupported {
                op: "object literal",
                backend: "painless",
            });
        }
    })
}

/// First element of a list, or the value itself.
fn scalar(se: ScriptExpr) -> ScriptExpr {
    if !se.many {
        return se;
    }
    let miss = or_all(&[se.miss.clone(), format!("{}.isEmpty()", se.source)]);
    let source = if se.source.starts_with("doc[") {
        format!("{}.value", se.source)
    } else {
        format!("{}.get(0)", se.source)
    };
    ScriptExpr::new(source, miss, se.ty)
}

/// String form; integral floats lose their `.0`.
fn text(se: &ScriptExpr) -> ScriptExpr {
    let se = scalar(se.clone());
    let s = &se.source;
    let source = match se.ty {
        JxType::String => s.clone(),
        JxType::Number => format!(
            "(({s} == Math.floor({s}) && !Double.isInfinite({s})) ? String.valueOf((long)({s})) : String.valueOf({s}))"
        ),
        _ => format!("String.valueOf({})", s),
    };
    ScriptExpr::new(source, se.miss, JxType::String)
}

fn number(se: &ScriptExpr) -> ScriptExpr {
    let s = &se.source;
    let source = match se.ty {
        JxType::Number => s.clone(),
        JxType::Integer => format!("(double)({})", s),
        JxType::String => {
            let trimmed = format!("{}.trim()", s);
            let matches = format!("{}.matcher({}).matches()", NUMERIC_PATTERN, trimmed);
            let unparsable = negate(&matches);
            return ScriptExpr::new(
                format!("Double.parseDouble({})", trimmed),
                or_all(&[se.miss.clone(), unparsable]),
                JxType::Number,
            );
        }
        JxType::Boolean => format!("(({}) ? 1.0 : 0.0)", s),
        _ => format!("((Number){}).doubleValue()", s),
    };
    ScriptExpr::new(source, se.miss.clone(), JxType::Number)
}

fn equality(a: &ScriptExpr, b: &ScriptExpr) -> String {
    let core = if !compatible(a.ty, b.ty) {
        FALSE.to_string()
    } else if a.many && b.many {
        format!("{}.equals({})", a.source, b.source)
    } else if a.many {
        format!("{}.stream().anyMatch(x -> x == {})", a.source, b.source)
    } else if b.many {
        format!("{}.stream().anyMatch(x -> x == {})", b.source, a.source)
    } else {
        format!("{} == {}", a.source, b.source)
    };
    ternary(&a.miss, &b.miss, &and_all(&[negate(&b.miss), core]))
}

fn ordering(op: Op, a: &ScriptExpr, b: &ScriptExpr) -> String {
    let sym = comparison_symbol(op);
    let strings = a.ty == JxType::String || b.ty == JxType::String;
    let cmp = |x: &str, y: &str| {
        if strings {
            format!("{}.compareTo({}) {} 0", x, y, sym)
        } else {
            format!("{} {} {}", x, sym, y)
        }
    };
    let core = if !compatible(a.ty, b.ty) {
        FALSE.to_string()
    } else if a.many {
        format!("{}.stream().anyMatch(x -> {})", a.source, cmp("x", &scalar(b.clone()).source))
    } else if b.many {
        format!("{}.stream().anyMatch(x -> {})", b.source, cmp(&a.source, "x"))
    } else {
        cmp(&a.source, &b.source)
    };
    and_all(&[negate(&a.miss), negate(&b.miss), core])
}

fn arithmetic(op: Op, terms: Vec<ScriptExpr>, ty: JxType) -> ScriptExpr {
    let terms: Vec<ScriptExpr> = terms.into_iter().map(scalar).collect();
    let binary = matches!(op, Op::Div | Op::Mod | Op::Exp);
    if (binary && terms.len() != 2)
        || terms.is_empty()
        || terms
            .iter()
            .any(|t| matches!(t.ty, JxType::String | JxType::Boolean | JxType::Null))
    {
        return ScriptExpr::absent();
    }
    let sources: Vec<&str> = terms.iter().map(|t| t.source.as_str()).collect();
    let mut misses: Vec<String> = terms.iter().map(|t| t.miss.clone()).collect();
    let source = match op {
        Op::Add => format!("({})", sources.join(" + ")),
        Op::Sub => format!("({})", sources.join(" - ")),
        Op::Mul => format!("({})", sources.join(" * ")),
        Op::Div => format!("((double){} / {})", sources[0], sources[1]),
        Op::Mod => format!("({} % {})", sources[0], sources[1]),
        _ => format!("Math.pow({}, {})", sources[0], sources[1]),
    };
    if matches!(op, Op::Div | Op::Mod) {
        misses.push(format!("{} == 0", sources[1]));
    }
    ScriptExpr::new(source, or_all(&misses), ty)
}

/// Left-to-right fallback. Each earlier term is guarded by its own
/// missing-check; the last term is taken as is.
fn coalesce(terms: Vec<ScriptExpr>) -> ScriptExpr {
    let mut kept: Vec<ScriptExpr> = Vec::with_capacity(terms.len());
    for t in terms {
        if t.is_always_missing() {
            continue;
        }
        let stop = t.is_never_missing();
        kept.push(t);
        if stop {
            break;
        }
    }
    match kept.len() {
        0 => return ScriptExpr::absent(),
        1 => return kept.remove(0),
        _ => {}
    }

    let uniform = kept.iter().all(|t| t.ty == kept[0].ty && t.many == kept[0].many);
    let render = |t: &ScriptExpr| if uniform { t.source.clone() } else { t.boxed() };
    let ty = JxType::merge_all(kept.iter().map(|t| t.ty));
    let many = kept.iter().any(|t| t.many);
    let miss = and_all(&kept.iter().map(|t| t.miss.clone()).collect::<Vec<_>>());

    let mut iter = kept.iter().rev();
    let mut source = iter.next().map(render).unwrap_or_default();
    for t in iter {
        source = ternary(&t.miss, &source, &render(t));
    }
    ScriptExpr::new(source, miss, ty).many(many)
}

fn conditional(cond: &str, then: ScriptExpr, els: ScriptExpr) -> ScriptExpr {
    let uniform = then.ty == els.ty && then.many == els.many;
    let (t, e) = if uniform {
        (then.source.clone(), els.source.clone())
    } else {
        (then.script(), els.script())
    };
    let miss = ternary(cond, &then.miss, &els.miss);
    ScriptExpr::new(ternary(cond, &t, &e), miss, then.ty.merge(els.ty)).many(then.many || els.many)
}

fn string_test(a: &ScriptExpr, b: &ScriptExpr, test: impl Fn(&str) -> String) -> ScriptExpr {
    let core = if !compatible(a.ty, JxType::String) {
        FALSE.to_string()
    } else if a.many {
        format!("{}.stream().anyMatch(x -> {})", a.source, test("x"))
    } else {
        test(&a.source)
    };
    ScriptExpr::boolean(and_all(&[negate(&a.miss), negate(&b.miss), core]))
}

fn concat(terms: Vec<ScriptExpr>, separator: &str) -> ScriptExpr {
    let parts: Vec<ScriptExpr> = terms
        .iter()
        .filter(|t| !t.is_always_missing())
        .map(text)
        .collect();
    if parts.is_empty() {
        return ScriptExpr::absent();
    }
    let miss = and_all(&parts.iter().map(|p| p.miss.clone()).collect::<Vec<_>>());
    let source = if parts.iter().all(ScriptExpr::is_never_missing) {
        let joined: Vec<&str> = parts.iter().map(|p| p.source.as_str()).collect();
        if separator.is_empty() {
            format!("({})", joined.join(" + "))
        } else {
            format!("({})", joined.join(&format!(" + {} + ", quote(separator))))
        }
    } else {
        let items: Vec<String> = parts.iter().map(|p| ternary(&p.miss, "null", &p.source)).collect();
        format!(
            "[{}].stream().filter(x -> x != null).collect(Collectors.joining({}))",
            items.join(", "),
            quote(separator)
        )
    };
    ScriptExpr::new(source, miss, JxType::String)
}

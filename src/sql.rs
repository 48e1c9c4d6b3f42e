//! SQL backend.
//!
//! Tables keep one column per JSON type per logical field, and at most one
//! of them is populated per row. Every sub-expression therefore renders to a
//! set of fragments keyed by storage type ([`SqlTyped`]); each fragment is
//! NULL on rows where the value is missing or has another type. Predicates
//! render to a single never-NULL `b` fragment holding 0 or 1.

use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::{
    ast::{Call, Expr, Op, StorageType},
    error::{JxError, JxResult},
    schema::{ROOT_PATH, Schema},
    value::{Value, float_text},
};

use crate::ast::StorageType::{Boolean as B, Json as J, Number as N, String as S};

const SQL_TRUE: &str = "1";
const SQL_FALSE: &str = "0";

/// Typed fragments, at most one per storage type. Empty means "always
/// missing".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlTyped {
    fragments: BTreeMap<StorageType, String>,
    /// A single never-NULL 0/1 `b` fragment.
    predicate: bool,
}

impl SqlTyped {
    pub fn missing() -> Self {
        SqlTyped::default()
    }

    pub fn of(ty: StorageType, fragment: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(ty, fragment.into());
        SqlTyped {
            fragments: map,
            predicate: false,
        }
    }

    fn predicate(fragment: impl Into<String>) -> Self {
        SqlTyped {
            predicate: true,
            ..SqlTyped::of(B, fragment)
        }
    }

    pub fn get(&self, ty: StorageType) -> Option<&str> {
        self.fragments.get(&ty).map(String::as_str)
    }

    /// Fragment for a storage-type letter (`b`, `s`, `n`, `j`).
    pub fn get_letter(&self, letter: char) -> Option<&str> {
        StorageType::from_letter(letter).and_then(|ty| self.get(ty))
    }

    pub fn types(&self) -> impl Iterator<Item = StorageType> + '_ {
        self.fragments.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    fn insert(&mut self, ty: StorageType, fragment: String) {
        self.fragments.insert(ty, fragment);
    }

    /// `{"b": ..., "n": ...}`
    pub fn to_json(&self) -> Json {
        let map: Map<String, Json> = self
            .fragments
            .iter()
            .map(|(ty, frag)| (ty.letter().to_string(), Json::String(frag.clone())))
            .collect();
        Json::Object(map)
    }

    /// SQL that is 1 when every fragment is NULL.
    fn miss(&self) -> String {
        if self.fragments.is_empty() {
            return SQL_TRUE.to_string();
        }
        let parts: Vec<String> = self.fragments.values().map(|f| format!("{} IS NULL", f)).collect();
        if parts.len() == 1 {
            parts.into_iter().collect()
        } else {
            format!("({})", parts.join(" AND "))
        }
    }
}

/// Double-quoted identifier.
pub fn quote_column(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quoted string literal.
pub fn quote_value(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn sql_not(s: &str) -> String {
    match s {
        SQL_TRUE => SQL_FALSE.to_string(),
        SQL_FALSE => SQL_TRUE.to_string(),
        _ => format!("NOT ({})", s),
    }
}

fn sql_and(parts: &[String]) -> String {
    if parts.iter().any(|p| p == SQL_FALSE) {
        return SQL_FALSE.to_string();
    }
    join_kept(parts, SQL_TRUE, " AND ")
}

fn sql_or(parts: &[String]) -> String {
    if parts.iter().any(|p| p == SQL_TRUE) {
        return SQL_TRUE.to_string();
    }
    join_kept(parts, SQL_FALSE, " OR ")
}

/// Join the parts that are not the operator's identity. A lone part is
/// returned as is.
fn join_kept(parts: &[String], identity: &str, sep: &str) -> String {
    let kept: Vec<&String> = parts.iter().filter(|p| p.as_str() != identity).collect();
    match kept.as_slice() {
        [] => identity.to_string(),
        [one] => (*one).clone(),
        _ => kept.iter().map(|p| format!("({})", p)).collect::<Vec<_>>().join(sep),
    }
}

/// NULL-safe comparison result as 0/1.
fn never_null(test: String) -> String {
    format!("COALESCE({}, 0)", test)
}

/// Resolve, simplify and render to typed fragments.
pub fn to_sql(expr: &Expr, schema: &dyn Schema) -> JxResult<SqlTyped> {
    let expr = expr.resolve(schema).partial_eval()?;
    Sql::new(schema).typed(&expr)
}

/// Render as a `WHERE` condition.
pub fn to_sql_where(expr: &Expr, schema: &dyn Schema) -> JxResult<String> {
    let expr = expr.resolve(schema).partial_eval()?;
    Sql::new(schema).predicate(&expr)
}

/// Translator bound to a schema. Expects resolved, simplified input.
pub struct Sql<'a> {
    schema: &'a dyn Schema,
}

impl<'a> Sql<'a> {
    pub fn new(schema: &'a dyn Schema) -> Self {
        Sql { schema }
    }

    /// Truthiness as a never-NULL 0/1 condition.
    pub fn predicate(&self, expr: &Expr) -> JxResult<String> {
        Ok(truthy(&self.typed(expr)?))
    }

    pub fn typed(&self, expr: &Expr) -> JxResult<SqlTyped> {
        match expr {
            Expr::Null => Ok(SqlTyped::missing()),
            Expr::True => Ok(SqlTyped::predicate(SQL_TRUE)),
            Expr::False => Ok(SqlTyped::predicate(SQL_FALSE)),
            Expr::Literal(v) => Ok(literal(v)),
            Expr::Variable(v) => self.variable(&v.name),
            Expr::Call(call) => self.call(call),
        }
    }

    fn variable(&self, name: &str) -> JxResult<SqlTyped> {
        if name == ROOT_PATH {
            return Err(JxError::Unsupported {
                op: "var",
                backend: "sql",
            });
        }
        let mut grouped: BTreeMap<StorageType, Vec<String>> = BTreeMap::new();
        for column in self.schema.leaves(name) {
            grouped
                .entry(column.storage_type())
                .or_default()
                .push(quote_column(column.physical_name()));
        }
        let mut out = SqlTyped::missing();
        for (ty, columns) in grouped {
            let fragment = if columns.len() == 1 {
                columns.into_iter().collect()
            } else {
                format!("COALESCE({})", columns.join(", "))
            };
            out.insert(ty, fragment);
        }
        Ok(out)
    }

    fn term(&self, call: &Call, index: usize) -> JxResult<SqlTyped> {
        match call.terms.get(index) {
            Some(t) => self.typed(t),
            None => Ok(SqlTyped::missing()),
        }
    }

    fn terms(&self, call: &Call) -> JxResult<Vec<SqlTyped>> {
        call.terms.iter().map(|t| self.typed(t)).collect()
    }

    fn with_default(&self, value: SqlTyped, call: &Call) -> JxResult<SqlTyped> {
        match call.default() {
            Some(d) => Ok(coalesce(vec![value, self.typed(d)?])),
            None => Ok(value),
        }
    }

    fn call(&self, call: &Call) -> JxResult<SqlTyped> {
        let op = call.op;
        let out = match op {
            Op::And | Op::Or => {
                let parts: Vec<String> = self.terms(call)?.iter().map(truthy).collect();
                SqlTyped::predicate(if op == Op::And {
                    sql_and(&parts)
                } else {
                    sql_or(&parts)
                })
            }
            Op::Not => SqlTyped::predicate(sql_not(&truthy(&self.term(call, 0)?))),
            Op::Exists => SqlTyped::predicate(sql_not(&self.term(call, 0)?.miss())),
            Op::Missing => SqlTyped::predicate(self.term(call, 0)?.miss()),
            Op::Eq | Op::Ne => {
                let eq = equality(&self.term(call, 0)?, &self.term(call, 1)?);
                SqlTyped::predicate(if op == Op::Eq { eq } else { sql_not(&eq) })
            }
            Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
                let sym = match op {
                    Op::Gt => ">",
                    Op::Gte => ">=",
                    Op::Lt => "<",
                    _ => "<=",
                };
                let (a, b) = (self.term(call, 0)?, self.term(call, 1)?);
                let parts: Vec<String> = [N, S]
                    .iter()
                    .filter_map(|ty| {
                        Some(never_null(format!("{} {} {}", a.get(*ty)?, sym, b.get(*ty)?)))
                    })
                    .collect();
                SqlTyped::predicate(sql_or(&parts))
            }
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Exp => {
                let value = arithmetic(op, &self.terms(call)?);
                self.with_default(value, call)?
            }
            Op::Coalesce => coalesce(self.terms(call)?),
            Op::When => {
                let (cond, then, els) = call.when_parts();
                let cond = self.predicate(cond)?;
                conditional(&[(cond, self.typed(then)?)], &self.typed(els)?)
            }
            Op::Case => {
                let (whens, default) = call.case_parts();
                let mut branches = Vec::with_capacity(whens.len());
                for w in whens {
                    let branch = w.as_call().ok_or_else(|| {
                        JxError::Malformed("`case` branches must be `when` clauses".to_string())
                    })?;
                    let (cond, then, _) = branch.when_parts();
                    branches.push((self.predicate(cond)?, self.typed(then)?));
                }
                conditional(&branches, &self.typed(default)?)
            }
            Op::Prefix | Op::Suffix => {
                let (s, p) = (self.text(call, 0)?, self.text(call, 1)?);
                let test = match (s, p) {
                    (Some(s), Some(p)) if op == Op::Prefix => {
                        never_null(format!("SUBSTR({}, 1, LENGTH({})) = {}", s, p, p))
                    }
                    (Some(s), Some(p)) => never_null(format!(
                        "(LENGTH({p}) = 0 OR SUBSTR({s}, -LENGTH({p})) = {p})"
                    )),
                    _ => SQL_FALSE.to_string(),
                };
                SqlTyped::predicate(test)
            }
            Op::Regexp => {
                let test = match (self.text(call, 0)?, self.text(call, 1)?) {
                    (Some(s), Some(p)) => {
                        never_null(format!("{} REGEXP ('^(?:' || {} || ')$')", s, p))
                    }
                    _ => SQL_FALSE.to_string(),
                };
                SqlTyped::predicate(test)
            }
            Op::In => {
                let a = self.term(call, 0)?;
                let items = match call.terms.get(1).and_then(Expr::literal_value) {
                    Some(Value::Array(items)) => items,
                    Some(single) => vec![single],
                    None => {
                        return Err(JxError::Unsupported {
                            op: "in with a computed list",
                            backend: "sql",
                        });
                    }
                };
                let mut by_type: BTreeMap<StorageType, Vec<String>> = BTreeMap::new();
                for item in &items {
                    let lit = literal(item);
                    for ty in lit.types() {
                        if let Some(frag) = lit.get(ty) {
                            by_type.entry(ty).or_default().push(frag.to_string());
                        }
                    }
                }
                let parts: Vec<String> = by_type
                    .iter()
                    .filter_map(|(ty, values)| {
                        Some(never_null(format!("{} IN ({})", a.get(*ty)?, values.join(", "))))
                    })
                    .collect();
                SqlTyped::predicate(sql_or(&parts))
            }
            Op::Concat => {
                let value = self.concat(call)?;
                self.with_default(value, call)?
            }
            Op::Length => match self.text(call, 0)? {
                Some(s) => SqlTyped::of(N, format!("LENGTH({})", s)),
                None => SqlTyped::missing(),
            },
            Op::Left | Op::Right => {
                let n = self.term(call, 1)?;
                match (self.text(call, 0)?, n.get(N)) {
                    (Some(s), Some(n)) if op == Op::Left => {
                        SqlTyped::of(S, format!("SUBSTR({}, 1, MAX({}, 0))", s, n))
                    }
                    (Some(s), Some(n)) => SqlTyped::of(
                        S,
                        format!(
                            "CASE WHEN {n} <= 0 THEN '' ELSE SUBSTR({s}, -MIN({n}, LENGTH({s}))) END"
                        ),
                    ),
                    _ => SqlTyped::missing(),
                }
            }
            Op::Substring => {
                let start = self.term(call, 1)?;
                let s = self.text(call, 0)?;
                match (s, start.get(N)) {
                    (Some(s), Some(start)) => {
                        let from = format!("MAX({}, 0)", start);
                        let fragment = match call.terms.get(2) {
                            Some(end) => match self.typed(end)?.get(N) {
                                Some(end) => format!(
                                    "SUBSTR({s}, {from} + 1, MAX(MIN({end}, LENGTH({s})) - {from}, 0))"
                                ),
                                None => return Ok(SqlTyped::missing()),
                            },
                            None => format!("SUBSTR({}, {} + 1)", s, from),
                        };
                        SqlTyped::of(S, fragment)
                    }
                    _ => SqlTyped::missing(),
                }
            }
            Op::Find => {
                let start = match call.start() {
                    Some(s) => self.typed(s)?.get(N).map(str::to_string),
                    None => Some("0".to_string()),
                };
                let value = match (self.text(call, 0)?, self.text(call, 1)?, start) {
                    (Some(s), Some(needle), Some(start)) => SqlTyped::of(
                        N,
                        format!(
                            "(NULLIF(INSTR(SUBSTR({s}, MAX({start}, 0) + 1), {needle}), 0) - 1 + MAX({start}, 0))"
                        ),
                    ),
                    _ => SqlTyped::missing(),
                };
                self.with_default(value, call)?
            }
            Op::First => self.term(call, 0)?,
            Op::String => match string_of(&self.term(call, 0)?) {
                Some(s) => SqlTyped::of(S, s),
                None => SqlTyped::missing(),
            },
            Op::Number => match number_of(&self.term(call, 0)?) {
                Some(n) => SqlTyped::of(N, n),
                None => SqlTyped::missing(),
            },
            Op::Integer => match number_of(&self.term(call, 0)?) {
                Some(n) => SqlTyped::of(N, format!("CAST({} AS INTEGER)", n)),
                None => SqlTyped::missing(),
            },
            Op::Boolean => {
                let inner = self.term(call, 0)?;
                let mut parts = Vec::new();
                if let Some(b) = inner.get(B) {
                    parts.push(b.to_string());
                }
                if let Some(n) = inner.get(N) {
                    parts.push(format!("({} <> 0)", n));
                }
                if let Some(s) = inner.get(S) {
                    parts.push(format!("(LOWER({}) = 'true')", s));
                }
                match parts.len() {
                    0 => SqlTyped::missing(),
                    1 => SqlTyped::of(B, parts.remove(0)),
                    _ => SqlTyped::of(B, format!("COALESCE({})", parts.join(", "))),
                }
            }
            Op::Tuple | Op::Script => {
                return Err(JxError::Unsupported {
                    op: op.name(),
                    backend: "sql",
                });
            }
        };
        debug!(op = %op, types = out.fragments.len(), "rendered sql");
        Ok(out)
    }

    /// String form of a term, or `None` when it can never be present.
    fn text(&self, call: &Call, index: usize) -> JxResult<Option<String>> {
        Ok(string_of(&self.term(call, index)?))
    }

    fn concat(&self, call: &Call) -> JxResult<SqlTyped> {
        let parts: Vec<String> = self
            .terms(call)?
            .iter()
            .filter_map(string_of)
            .collect();
        if parts.is_empty() {
            return Ok(SqlTyped::missing());
        }
        let separator = call.separator();
        let all_missing = sql_and(
            &parts
                .iter()
                .map(|p| format!("{} IS NULL", p))
                .collect::<Vec<_>>(),
        );
        let fragment = if separator.is_empty() {
            let joined: Vec<String> = parts.iter().map(|p| format!("COALESCE({}, '')", p)).collect();
            joined.join(" || ")
        } else {
            let sep = quote_value(separator);
            let joined: Vec<String> = parts
                .iter()
                .map(|p| format!("COALESCE({} || {}, '')", sep, p))
                .collect();
            format!("SUBSTR({}, LENGTH({}) + 1)", joined.join(" || "), sep)
        };
        Ok(SqlTyped::of(
            S,
            format!("CASE WHEN {} THEN NULL ELSE {} END", all_missing, fragment),
        ))
    }
}

fn literal(v: &Value) -> SqlTyped {
    match v {
        Value::Null => SqlTyped::missing(),
        Value::Boolean(b) => SqlTyped::predicate(if *b { SQL_TRUE } else { SQL_FALSE }),
        Value::Integer(n) => SqlTyped::of(N, n.to_string()),
        Value::Float(f) => SqlTyped::of(N, float_text(*f)),
        Value::String(s) => SqlTyped::of(S, quote_value(s)),
        Value::Array(_) | Value::Object(_) => {
            SqlTyped::of(J, quote_value(&v.to_json().to_string()))
        }
    }
}

/// Truthiness of typed fragments as a never-NULL 0/1 condition.
fn truthy(typed: &SqlTyped) -> String {
    if typed.predicate
        && let Some(test) = typed.get(B)
    {
        return test.to_string();
    }
    let parts: Vec<String> = typed
        .fragments
        .iter()
        .map(|(ty, frag)| match (ty, frag.as_str()) {
            (B, SQL_TRUE | SQL_FALSE) => frag.clone(),
            (B, _) => never_null(format!("{} = 1", frag)),
            (N, _) => never_null(format!("{} <> 0", frag)),
            (S, _) => never_null(format!("LENGTH({}) > 0", frag)),
            (J, _) => format!("{} IS NOT NULL", frag),
        })
        .collect();
    sql_or(&parts)
}

/// Total equality: both missing, or equal on some shared storage type.
fn equality(a: &SqlTyped, b: &SqlTyped) -> String {
    let mut parts = vec![sql_and(&[a.miss(), b.miss()])];
    for ty in StorageType::ALL {
        if let (Some(x), Some(y)) = (a.get(ty), b.get(ty)) {
            parts.push(never_null(format!("{} = {}", x, y)));
        }
    }
    sql_or(&parts)
}

fn arithmetic(op: Op, terms: &[SqlTyped]) -> SqlTyped {
    let numbers: Option<Vec<&str>> = terms.iter().map(|t| t.get(N)).collect();
    let Some(numbers) = numbers.filter(|n| !n.is_empty()) else {
        return SqlTyped::missing();
    };
    let binary = matches!(op, Op::Div | Op::Mod | Op::Exp);
    if binary && numbers.len() != 2 {
        return SqlTyped::missing();
    }
    let fragment = match op {
        Op::Add => format!("({})", numbers.join(" + ")),
        Op::Sub => format!("({})", numbers.join(" - ")),
        Op::Mul => format!("({})", numbers.join(" * ")),
        Op::Div => format!("(CAST({} AS REAL) / NULLIF({}, 0))", numbers[0], numbers[1]),
        Op::Mod => format!("({} % NULLIF({}, 0))", numbers[0], numbers[1]),
        _ => format!("POWER({}, {})", numbers[0], numbers[1]),
    };
    SqlTyped::of(N, fragment)
}

/// Per type column: the first term that is present wins. Each term's
/// fragments are guarded by "every earlier term is missing", so a row never
/// has more than one populated type.
fn coalesce(terms: Vec<SqlTyped>) -> SqlTyped {
    let terms: Vec<SqlTyped> = terms.into_iter().filter(|t| !t.is_empty()).collect();
    if terms.len() == 1 {
        return terms.into_iter().next().unwrap_or_default();
    }
    let mut columns: BTreeMap<StorageType, Vec<String>> = BTreeMap::new();
    let mut earlier_missing: Vec<String> = Vec::new();
    for term in &terms {
        let guard = sql_and(&earlier_missing);
        for (ty, frag) in &term.fragments {
            let guarded = if guard == SQL_TRUE {
                frag.clone()
            } else {
                format!("CASE WHEN {} THEN {} END", guard, frag)
            };
            columns.entry(*ty).or_default().push(guarded);
        }
        earlier_missing.push(term.miss());
    }
    let mut out = SqlTyped::missing();
    for (ty, frags) in columns {
        let fragment = if frags.len() == 1 {
            frags.into_iter().collect()
        } else {
            format!("COALESCE({})", frags.join(", "))
        };
        out.insert(ty, fragment);
    }
    out
}

fn conditional(branches: &[(String, SqlTyped)], default: &SqlTyped) -> SqlTyped {
    let mut types: Vec<StorageType> = branches.iter().flat_map(|(_, t)| t.types()).collect();
    types.extend(default.types());
    types.sort();
    types.dedup();

    let mut out = SqlTyped::missing();
    for ty in types {
        let mut fragment = String::from("CASE");
        for (cond, then) in branches {
            fragment.push_str(&format!(" WHEN {} THEN {}", cond, then.get(ty).unwrap_or("NULL")));
        }
        if let Some(d) = default.get(ty) {
            fragment.push_str(&format!(" ELSE {}", d));
        }
        fragment.push_str(" END");
        out.insert(ty, fragment);
    }
    out
}

/// Coalesce across type columns in the order `s`, `n`, `b`, `j`, using each
/// type's own string form. Integral numbers print without `.0`.
fn string_of(typed: &SqlTyped) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(s) = typed.get(S) {
        parts.push(s.to_string());
    }
    if let Some(n) = typed.get(N) {
        parts.push(format!(
            "CASE WHEN {n} = CAST({n} AS INTEGER) THEN CAST(CAST({n} AS INTEGER) AS TEXT) ELSE CAST({n} AS TEXT) END"
        ));
    }
    if let Some(b) = typed.get(B) {
        parts.push(format!("CASE {} WHEN 1 THEN 'true' WHEN 0 THEN 'false' END", b));
    }
    if let Some(j) = typed.get(J) {
        parts.push(j.to_string());
    }
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(format!("COALESCE({})", parts.join(", "))),
    }
}

fn number_of(typed: &SqlTyped) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(n) = typed.get(N) {
        parts.push(n.to_string());
    }
    if let Some(s) = typed.get(S) {
        parts.push(format!("CAST({} AS REAL)", s));
    }
    if let Some(b) = typed.get(B) {
        parts.push(b.to_string());
    }
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(format!("COALESCE({})", parts.join(", "))),
    }
}

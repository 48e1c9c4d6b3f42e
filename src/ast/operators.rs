use std::{collections::HashMap, sync::LazyLock};

/// Operator tags.
///
/// The vocabulary is closed: the builder only produces these, and every
/// backend matches on them exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Op {
    // Comparison
    /// Equal (`eq`); true when both sides are missing or both are equal
    Eq,
    /// Not equal (`ne`)
    Ne,
    /// Greater than (`gt`)
    Gt,
    /// Greater than or equal (`gte`)
    Gte,
    /// Less than (`lt`)
    Lt,
    /// Less than or equal (`lte`)
    Lte,

    // Logical
    And,
    Or,
    Not,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,

    Coalesce,

    // Conditionals
    /// `{"when": c, "then": t, "else": e}`
    When,
    /// `{"case": [when, ..., default]}`
    Case,

    // Existence
    Exists,
    Missing,

    // Strings
    Prefix,
    Suffix,
    Concat,
    Length,
    Left,
    Right,
    Substring,
    Find,
    Regexp,

    /// Membership in a literal list
    In,

    // Coercions
    First,
    String,
    Number,
    Integer,
    Boolean,

    /// Ordered list of expressions
    Tuple,
    /// Raw inline script; gated behind `allow_scripts`
    Script,
}

/// How many operands an operator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exactly(k) => n == k,
            Arity::Range(lo, hi) => (lo..=hi).contains(&n),
            Arity::AtLeast(k) => n >= k,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Arity::Exactly(1) => "1",
            Arity::Exactly(2) => "2",
            Arity::Exactly(_) => "a fixed number of",
            Arity::Range(2, 3) => "2 or 3",
            Arity::Range(_, _) => "a bounded number of",
            Arity::AtLeast(0) => "any number of",
            Arity::AtLeast(1) => "at least 1",
            Arity::AtLeast(_) => "several",
        }
    }
}

/// Operator families, used for documentation grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpFamily {
    Comparison,
    Logical,
    Arithmetic,
    Conditional,
    Existence,
    Strings,
    Coercion,
    Other,
}

pub const ALL_OPS: [Op; 37] = [
    Op::Eq,
    Op::Ne,
    Op::Gt,
    Op::Gte,
    Op::Lt,
    Op::Lte,
    Op::And,
    Op::Or,
    Op::Not,
    Op::Add,
    Op::Sub,
    Op::Mul,
    Op::Div,
    Op::Mod,
    Op::Exp,
    Op::Coalesce,
    Op::When,
    Op::Case,
    Op::Exists,
    Op::Missing,
    Op::Prefix,
    Op::Suffix,
    Op::Concat,
    Op::Length,
    Op::Left,
    Op::Right,
    Op::Substring,
    Op::Find,
    Op::Regexp,
    Op::In,
    Op::First,
    Op::String,
    Op::Number,
    Op::Integer,
    Op::Boolean,
    Op::Tuple,
    Op::Script,
];

/// Operator lookup table, keyed by every accepted spelling.
///
/// Built once on first use and never mutated afterwards.
static OPERATORS: LazyLock<HashMap<&'static str, Op>> = LazyLock::new(|| {
    let mut table = HashMap::new();
    for op in ALL_OPS {
        table.insert(op.name(), op);
        for alias in op.aliases() {
            table.insert(*alias, op);
        }
    }
    table
});

impl Op {
    /// Look up an operator by name or alias.
    pub fn lookup(name: &str) -> Option<Op> {
        OPERATORS.get(name).copied()
    }

    /// Canonical name, as written by the serializer.
    pub fn name(self) -> &'static str {
        match self {
            Op::Eq => "eq",
            Op::Ne => "ne",
            Op::Gt => "gt",
            Op::Gte => "gte",
            Op::Lt => "lt",
            Op::Lte => "lte",
            Op::And => "and",
            Op::Or => "or",
            Op::Not => "not",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Mod => "mod",
            Op::Exp => "exp",
            Op::Coalesce => "coalesce",
            Op::When => "when",
            Op::Case => "case",
            Op::Exists => "exists",
            Op::Missing => "missing",
            Op::Prefix => "prefix",
            Op::Suffix => "suffix",
            Op::Concat => "concat",
            Op::Length => "length",
            Op::Left => "left",
            Op::Right => "right",
            Op::Substring => "substring",
            Op::Find => "find",
            Op::Regexp => "regexp",
            Op::In => "in",
            Op::First => "first",
            Op::String => "string",
            Op::Number => "number",
            Op::Integer => "integer",
            Op::Boolean => "boolean",
            Op::Tuple => "tuple",
            Op::Script => "script",
        }
    }

    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Op::Eq => &["term"],
            Op::Ne => &["neq"],
            Op::Sub => &["subtract", "minus"],
            Op::Mul => &["mult", "multiply"],
            Op::Add => &["sum"],
            Op::Mod => &["modulo"],
            Op::Div => &["divide"],
            Op::Regexp => &["regex"],
            Op::In => &["terms"],
            Op::Find => &["instr"],
            _ => &[],
        }
    }

    /// Whether `{op: {field: value}}` shorthand is accepted.
    pub fn has_simple_form(self) -> bool {
        matches!(
            self,
            Op::Eq
                | Op::Ne
                | Op::Gt
                | Op::Gte
                | Op::Lt
                | Op::Lte
                | Op::Prefix
                | Op::Suffix
                | Op::Regexp
                | Op::In
                | Op::Find
                | Op::Left
                | Op::Right
        )
    }

    pub fn arity(self) -> Arity {
        match self {
            Op::Eq | Op::Ne | Op::Gt | Op::Gte | Op::Lt | Op::Lte => Arity::Exactly(2),
            Op::And | Op::Or | Op::Concat | Op::Tuple => Arity::AtLeast(0),
            Op::Not | Op::Exists | Op::Missing | Op::Length => Arity::Exactly(1),
            Op::First | Op::String | Op::Number | Op::Integer | Op::Boolean => Arity::Exactly(1),
            Op::Add | Op::Mul | Op::Coalesce => Arity::AtLeast(1),
            Op::Sub | Op::Div | Op::Mod | Op::Exp => Arity::Exactly(2),
            Op::When => Arity::Range(2, 3),
            Op::Case => Arity::AtLeast(1),
            Op::Prefix | Op::Suffix | Op::Regexp | Op::In | Op::Find => Arity::Exactly(2),
            Op::Left | Op::Right => Arity::Exactly(2),
            Op::Substring => Arity::Range(2, 3),
            Op::Script => Arity::Exactly(1),
        }
    }

    /// Keys besides the operator key that this operator recognizes.
    pub fn decorations(self) -> &'static [&'static str] {
        match self {
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Exp => &["default"],
            Op::Concat => &["separator", "default"],
            Op::Find => &["start", "default"],
            Op::When => &["then", "else"],
            _ => &[],
        }
    }

    /// Arbitrary inline source; refused unless explicitly enabled.
    pub fn is_unsafe(self) -> bool {
        matches!(self, Op::Script)
    }

    pub fn family(self) -> OpFamily {
        match self {
            Op::Eq | Op::Ne | Op::Gt | Op::Gte | Op::Lt | Op::Lte | Op::In => OpFamily::Comparison,
            Op::And | Op::Or | Op::Not => OpFamily::Logical,
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Exp => OpFamily::Arithmetic,
            Op::Coalesce | Op::When | Op::Case => OpFamily::Conditional,
            Op::Exists | Op::Missing => OpFamily::Existence,
            Op::Prefix
            | Op::Suffix
            | Op::Concat
            | Op::Length
            | Op::Left
            | Op::Right
            | Op::Substring
            | Op::Find
            | Op::Regexp => OpFamily::Strings,
            Op::First | Op::String | Op::Number | Op::Integer | Op::Boolean => OpFamily::Coercion,
            Op::Tuple | Op::Script => OpFamily::Other,
        }
    }

    /// Operators whose value is always a non-missing boolean.
    pub fn is_predicate(self) -> bool {
        matches!(
            self,
            Op::Eq
                | Op::Ne
                | Op::Gt
                | Op::Gte
                | Op::Lt
                | Op::Lte
                | Op::And
                | Op::Or
                | Op::Not
                | Op::Exists
                | Op::Missing
                | Op::Prefix
                | Op::Suffix
                | Op::Regexp
                | Op::In
        )
    }

    /// `gt(a, b)` is `lt(b, a)`.
    pub fn mirror(self) -> Op {
        match self {
            Op::Gt => Op::Lt,
            Op::Gte => Op::Lte,
            Op::Lt => Op::Gt,
            Op::Lte => Op::Gte,
            other => other,
        }
    }

    /// Logical inverse of a comparison over two present operands.
    pub fn inverse(self) -> Option<Op> {
        match self {
            Op::Eq => Some(Op::Ne),
            Op::Ne => Some(Op::Eq),
            Op::Gt => Some(Op::Lte),
            Op::Gte => Some(Op::Lt),
            Op::Lt => Some(Op::Gte),
            Op::Lte => Some(Op::Gt),
            Op::Exists => Some(Op::Missing),
            Op::Missing => Some(Op::Exists),
            _ => None,
        }
    }

    /// One-line description for `jx docs`.
    pub fn summary(self) -> &'static str {
        match self {
            Op::Eq => "true when both sides are equal, or both are missing",
            Op::Ne => "negation of eq",
            Op::Gt | Op::Gte | Op::Lt | Op::Lte => "ordering test; false when either side is missing",
            Op::And => "all terms are true",
            Op::Or => "any term is true",
            Op::Not => "true unless the term is true",
            Op::Add | Op::Mul => "n-ary arithmetic; missing if any term is missing (see `default`)",
            Op::Sub | Op::Mod | Op::Exp => "binary arithmetic; missing if any term is missing (see `default`)",
            Op::Div => "division; missing when dividing by zero (see `default`)",
            Op::Coalesce => "first term that is not missing",
            Op::When => "`then` when the condition is true, otherwise `else`",
            Op::Case => "first `when` whose condition is true, else the trailing default",
            Op::Exists => "the term is present",
            Op::Missing => "the term is absent",
            Op::Prefix => "string starts with the given prefix",
            Op::Suffix => "string ends with the given suffix",
            Op::Concat => "join present terms with `separator`",
            Op::Length => "number of characters in a string",
            Op::Left => "first n characters",
            Op::Right => "last n characters",
            Op::Substring => "characters from start (inclusive) to end (exclusive)",
            Op::Find => "index of a substring at or after `start`, else `default`",
            Op::Regexp => "whole string matches the pattern",
            Op::In => "value is a member of the literal list",
            Op::First => "first value of a multi-valued term",
            Op::String => "coerce to string; integral floats lose their trailing .0",
            Op::Number => "coerce to number",
            Op::Integer => "coerce to integer, truncating",
            Op::Boolean => "coerce to boolean",
            Op::Tuple => "ordered list of expressions",
            Op::Script => "raw inline script (requires allow_scripts)",
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_op_round_trips_through_the_table() {
        for op in ALL_OPS {
            assert_eq!(Op::lookup(op.name()), Some(op));
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!(Op::lookup("neq"), Some(Op::Ne));
        assert_eq!(Op::lookup("term"), Some(Op::Eq));
        assert_eq!(Op::lookup("terms"), Some(Op::In));
        assert_eq!(Op::lookup("nope"), None);
    }

    #[test]
    fn test_inverse_is_an_involution() {
        for op in ALL_OPS {
            if let Some(inv) = op.inverse() {
                assert_eq!(inv.inverse(), Some(op));
            }
        }
    }
}

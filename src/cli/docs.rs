//! Documentation content for the jx CLI
//!
//! Operator pages are generated from the operator table, so they cannot
//! drift from what the builder accepts.

use std::fmt::Write;

use super::CliError;
use crate::ast::{ALL_OPS, Op, OpFamily};

/// Available documentation categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocCategory {
    Syntax,
    Family(OpFamily),
}

const FAMILIES: [(OpFamily, &str, &str); 8] = [
    (OpFamily::Comparison, "comparison", "Equality, ordering and membership"),
    (OpFamily::Logical, "logical", "Boolean composition"),
    (OpFamily::Arithmetic, "arithmetic", "Numeric operators"),
    (OpFamily::Conditional, "conditional", "Fallbacks and branching"),
    (OpFamily::Existence, "existence", "Presence tests"),
    (OpFamily::Strings, "strings", "Text operators"),
    (OpFamily::Coercion, "coercion", "Type conversion"),
    (OpFamily::Other, "other", "Tuples and inline scripts"),
];

impl DocCategory {
    /// Parse category name from string
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.to_lowercase();
        if matches!(s.as_str(), "syntax" | "forms") {
            return Some(DocCategory::Syntax);
        }
        FAMILIES
            .iter()
            .find(|(_, name, _)| *name == s || name.trim_end_matches('s') == s)
            .map(|(family, _, _)| DocCategory::Family(*family))
    }
}

const SYNTAX_DOC: &str = r#"EXPRESSION SYNTAX

An expression is JSON.

  null, true, false, 42      literals
  "a.b.c"                    variable (dot-delimited path); "." is the document
  {"literal": "text"}        any constant, including strings and lists
  {"var": "a.b"}             explicit variable
  [1, 2, 3]                  list literal (a list with variables is a tuple)
  {}                         matches everything

OPERATOR CLAUSES

  {"<op>": [term, ...]}      full form
  {"<op>": term}             single operand
  {"<op>": {"field": value}} simple form: (variable, literal) pairs; several
                             keys build the conjunction

Decoration keys sit next to the operator key:

  {"add": ["a", 1], "default": 0}
  {"concat": ["a", "b"], "separator": "-"}
  {"find": ["a", "x"], "start": 2, "default": -1}
  {"when": {"gt": {"a": 1}}, "then": "big", "else": "small"}

Null and missing are the same thing. Predicates are never missing.
"#;

/// Get the docs overview (category listing)
pub fn get_docs_overview() -> String {
    let mut out = String::from(
        "JX DOCUMENTATION\n\n\
         JX is a JSON expression language compiled to search filters, scripts and SQL.\n\n\
         DOCUMENTATION CATEGORIES\n\n  syntax            Literals, variables and clause shapes\n",
    );
    for (family, name, blurb) in FAMILIES {
        let ops: Vec<&str> = ALL_OPS
            .iter()
            .filter(|op| op.family() == family)
            .map(|op| op.name())
            .collect();
        let _ = writeln!(out, "  {:<17} {} ({})", name, blurb, ops.join(", "));
    }
    out.push_str("\nRun 'jx doc <category>' for detailed documentation.\n");
    out
}

fn operator_entry(out: &mut String, op: Op) {
    let _ = writeln!(out, "  {}", op.name());
    let _ = writeln!(out, "      {}", op.summary());
    let _ = writeln!(out, "      operands: {}", op.arity().describe());
    if op.has_simple_form() {
        let _ = writeln!(out, "      simple form: {{\"{}\": {{\"field\": value}}}}", op.name());
    }
    if !op.decorations().is_empty() {
        let _ = writeln!(out, "      keys: {}", op.decorations().join(", "));
    }
    if !op.aliases().is_empty() {
        let _ = writeln!(out, "      aliases: {}", op.aliases().join(", "));
    }
}

/// Get documentation for a specific category
pub fn get_doc_category(name: &str) -> Result<String, CliError> {
    match DocCategory::parse(name) {
        Some(DocCategory::Syntax) => Ok(SYNTAX_DOC.to_string()),
        Some(DocCategory::Family(family)) => {
            let mut out = String::new();
            if let Some((_, title, blurb)) = FAMILIES.iter().find(|(f, _, _)| *f == family) {
                let _ = writeln!(out, "{} OPERATORS\n\n{}\n", title.to_uppercase(), blurb);
            }
            for op in ALL_OPS.iter().filter(|op| op.family() == family) {
                operator_entry(&mut out, *op);
            }
            Ok(out)
        }
        None => Err(CliError::UnknownCategory(name.to_string())),
    }
}

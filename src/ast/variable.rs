use std::sync::LazyLock;

use regex::Regex;

use crate::ast::JxType;

static VARIABLE_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\.|\.?[A-Za-z_$][\w$\-]*(\.[A-Za-z_$\d][\w$\-]*)*)$").ok());

/// Whether `name` is acceptable as a dot-delimited variable path.
///
/// `.` alone names the whole document.
pub fn is_variable_name(name: &str) -> bool {
    VARIABLE_NAME
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

/// A dot-delimited path into a document.
///
/// `declared` and `many` start as `object`/`false` and are filled in by
/// [`Expr::resolve`](crate::ast::Expr::resolve) from a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    pub name: String,
    pub declared: JxType,
    /// The field may hold more than one value per document
    pub many: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Variable {
            name: name.into(),
            declared: JxType::Object,
            many: false,
        }
    }

    pub fn typed(name: impl Into<String>, declared: JxType, many: bool) -> Self {
        Variable {
            name: name.into(),
            declared,
            many,
        }
    }

    /// Path segments; `.` yields no segments.
    pub fn segments(&self) -> Vec<&str> {
        self.name
            .trim_start_matches('.')
            .split('.')
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Apply a renaming: an exact match is replaced, and a match on a
    /// leading path prefix replaces just that prefix.
    pub fn renamed(&self, renames: &std::collections::HashMap<String, String>) -> Variable {
        if let Some(new_name) = renames.get(&self.name) {
            return Variable {
                name: new_name.clone(),
                ..self.clone()
            };
        }
        let mut best: Option<(&String, &String)> = None;
        for (from, to) in renames {
            if self.name.len() > from.len()
                && self.name.starts_with(from.as_str())
                && self.name.as_bytes()[from.len()] == b'.'
                && best.is_none_or(|(b, _)| from.len() > b.len())
            {
                best = Some((from, to));
            }
        }
        match best {
            Some((from, to)) => Variable {
                name: format!("{}{}", to, &self.name[from.len()..]),
                ..self.clone()
            },
            None => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_variable_names() {
        assert!(is_variable_name("a"));
        assert!(is_variable_name("a.b.c"));
        assert!(is_variable_name("_id"));
        assert!(is_variable_name("."));
        assert!(is_variable_name("build.date-time"));
        assert!(is_variable_name("a.0"));
        assert!(!is_variable_name(""));
        assert!(!is_variable_name("a b"));
        assert!(!is_variable_name("3x"));
        assert!(!is_variable_name("a..b"));
    }

    #[test]
    fn test_rename_prefix() {
        let renames: HashMap<String, String> =
            [("a".to_string(), "x.y".to_string())].into_iter().collect();
        assert_eq!(Variable::new("a").renamed(&renames).name, "x.y");
        assert_eq!(Variable::new("a.b").renamed(&renames).name, "x.y.b");
        assert_eq!(Variable::new("ab").renamed(&renames).name, "ab");
    }
}

//! Schema lookup.
//!
//! The backends never guess where a variable lives. They ask a [`Schema`]
//! for the physical columns behind a name: storage name, JSON type and the
//! nested path the column sits under.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::trace;

use crate::{
    ast::{Expr, JxType, StorageType, Variable},
    error::{JxError, JxResult},
};

/// Nested path of top-level columns.
pub const ROOT_PATH: &str = ".";

fn root_path() -> Vec<String> {
    vec![ROOT_PATH.to_string()]
}

fn single() -> usize {
    1
}

/// A physical column.
///
/// `nested_path` lists the enclosing nested documents from the innermost
/// outwards and always ends with `"."`; a top-level column has just `["."]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Logical (dotted) field name
    pub name: String,
    /// Storage name when it differs from `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub es_column: Option<String>,
    #[serde(rename = "type")]
    pub jx_type: JxType,
    #[serde(default = "root_path")]
    pub nested_path: Vec<String>,
    /// Maximum number of values per document
    #[serde(default = "single")]
    pub multi: usize,
}

impl Column {
    pub fn new(name: impl Into<String>, jx_type: JxType) -> Self {
        Column {
            name: name.into(),
            es_column: None,
            jx_type,
            nested_path: root_path(),
            multi: 1,
        }
    }

    pub fn with_es_column(mut self, es_column: impl Into<String>) -> Self {
        self.es_column = Some(es_column.into());
        self
    }

    /// Place the column under nested documents, innermost first.
    pub fn nested(mut self, path: &[&str]) -> Self {
        self.nested_path = path.iter().map(|p| p.to_string()).collect();
        if self.nested_path.last().map(String::as_str) != Some(ROOT_PATH) {
            self.nested_path.push(ROOT_PATH.to_string());
        }
        self
    }

    pub fn with_multi(mut self, multi: usize) -> Self {
        self.multi = multi;
        self
    }

    /// Name used in generated queries.
    pub fn physical_name(&self) -> &str {
        self.es_column.as_deref().unwrap_or(&self.name)
    }

    /// Number of nested documents between the root and this column.
    pub fn depth(&self) -> usize {
        self.nested_path.len().saturating_sub(1)
    }

    /// Innermost nested path.
    pub fn path(&self) -> &str {
        self.nested_path.first().map(String::as_str).unwrap_or(ROOT_PATH)
    }

    pub fn storage_type(&self) -> StorageType {
        self.jx_type.storage().unwrap_or(StorageType::Json)
    }

    pub fn is_many(&self) -> bool {
        self.multi > 1 || self.depth() > 0
    }
}

/// Resolves variable names to physical columns.
///
/// Implementations are shared across compilations and must be safe for
/// concurrent reads.
pub trait Schema: Send + Sync {
    /// Every leaf column at or below `name`.
    fn leaves(&self, name: &str) -> Vec<Column>;

    /// Columns named exactly `name`.
    fn values(&self, name: &str) -> Vec<Column>;
}

/// A fixed list of columns held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySchema {
    columns: Vec<Column>,
}

impl MemorySchema {
    pub fn new(columns: Vec<Column>) -> Self {
        MemorySchema { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Load from JSON: either a list of column objects, or an object mapping
    /// field names to a type name or a column object without `name`.
    ///
    /// ```
    /// use jx_lang::schema::{MemorySchema, Schema};
    /// use serde_json::json;
    ///
    /// let schema = MemorySchema::from_json(&json!({"a": "integer", "b.c": "string"})).unwrap();
    /// assert_eq!(schema.leaves("b").len(), 1);
    /// ```
    pub fn from_json(json: &Json) -> JxResult<Self> {
        match json {
            Json::Array(_) => {
                let columns: Vec<Column> = serde_json::from_value(json.clone())?;
                Ok(MemorySchema::new(columns))
            }
            Json::Object(fields) => {
                let mut columns = Vec::with_capacity(fields.len());
                for (name, spec) in fields {
                    let column = match spec {
                        Json::String(ty) => {
                            let jx_type: JxType = serde_json::from_value(Json::String(ty.clone()))
                                .map_err(|_| {
                                    JxError::Config(format!("unknown type `{}` for `{}`", ty, name))
                                })?;
                            Column::new(name.as_str(), jx_type)
                        }
                        Json::Object(obj) => {
                            let mut obj = obj.clone();
                            obj.insert("name".to_string(), Json::String(name.clone()));
                            serde_json::from_value(Json::Object(obj))?
                        }
                        other => {
                            return Err(JxError::Config(format!(
                                "column `{}` must be a type name or an object, got {}",
                                name, other
                            )));
                        }
                    };
                    columns.push(column);
                }
                Ok(MemorySchema::new(columns))
            }
            other => Err(JxError::Config(format!(
                "schema must be a list or an object, got {}",
                other
            ))),
        }
    }
}

fn is_under(column: &str, name: &str) -> bool {
    column.len() > name.len()
        && column.starts_with(name)
        && column.as_bytes()[name.len()] == b'.'
}

impl Schema for MemorySchema {
    fn leaves(&self, name: &str) -> Vec<Column> {
        let name = name.trim_start_matches('.');
        self.columns
            .iter()
            .filter(|c| name.is_empty() || c.name == name || is_under(&c.name, name))
            .cloned()
            .collect()
    }

    fn values(&self, name: &str) -> Vec<Column> {
        let name = name.trim_start_matches('.');
        self.columns.iter().filter(|c| c.name == name).cloned().collect()
    }
}

/// Schema that knows nothing: every name is a single, untyped, top-level
/// column of the same name. Used when compiling without a schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSchema;

impl Schema for OpenSchema {
    fn leaves(&self, name: &str) -> Vec<Column> {
        self.values(name)
    }

    fn values(&self, name: &str) -> Vec<Column> {
        vec![Column::new(name.trim_start_matches('.'), JxType::Object)]
    }
}

impl Expr {
    /// Annotate every variable with its type and multiplicity from `schema`.
    ///
    /// A variable with no columns is statically absent and becomes `null`,
    /// which the partial evaluator then propagates.
    pub fn resolve(&self, schema: &dyn Schema) -> Expr {
        self.map_variables(&mut |v| {
            if v.name == ROOT_PATH {
                return Expr::Variable(v.clone());
            }
            let columns = schema.leaves(&v.name);
            if columns.is_empty() {
                trace!(var = %v.name, "no columns; treating as missing");
                return Expr::Null;
            }
            let declared = JxType::merge_all(columns.iter().map(|c| c.jx_type));
            let many = columns.iter().any(Column::is_many);
            Expr::Variable(Variable::typed(v.name.as_str(), declared, many))
        })
    }
}

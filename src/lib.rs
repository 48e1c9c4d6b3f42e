pub mod ast;
pub mod builder;
pub mod cli;
pub mod config;
pub mod error;
pub mod es;
pub mod evaluator;
pub mod output;
pub mod painless;
pub mod partial_eval;
pub mod schema;
pub mod split;
pub mod sql;
pub mod value;

pub use ast::{Call, Expr, JxType, Op, Params, StorageType, Variable};
pub use builder::{BuildOptions, Builder, build, parse};
pub use config::{Config, Target};
pub use error::{JxError, JxResult};
pub use es::{Dialect, normalize_filter, to_es_filter};
pub use evaluator::{EvalContext, Evaluator};
pub use output::{expr_to_json, to_json, to_json_pretty};
pub use painless::{ScriptExpr, to_painless, to_painless_filter};
pub use schema::{Column, MemorySchema, OpenSchema, Schema};
pub use split::{split_expression_by_depth, split_expression_by_path};
pub use sql::{SqlTyped, to_sql, to_sql_where};
pub use value::Value;

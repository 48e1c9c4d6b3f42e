//! # JX Expressions - Abstract Syntax Tree
//!
//! This module defines the typed AST for JX, a JSON-native expression
//! language. Clauses arrive as JSON, are built into [`Expr`] trees, simplified
//! by the partial evaluator, and rendered by one of the backends.
//!
//! ## Architecture Overview
//!
//! - **[types]** - Static type tags ([`JxType`]) and storage column families
//! - **[operators]** - The closed operator vocabulary and its lookup table
//! - **[variable]** - Dot-delimited document paths
//! - **[expressions]** - Expression nodes, constructors, `vars()` and `map()`
//! - **[missing]** - Compositional `missing()` derivation
//!
//! ## Quick Start
//!
//! ```text
//! {"and": [{"eq": {"status": "active"}}, {"gt": {"age": 18}}]}
//! ```
//!
//! builds to
//!
//! ```text
//! and(eq(var status, "active"), gt(var age, 18))
//! ```
//!
//! ## Core Concepts
//!
//! ### Node Shapes
//!
//! Every node is one of:
//!
//! - **Singletons** `null`, `true`, `false`, compared by variant
//! - **Literal** - any other constant JSON value
//! - **Variable** - a path into the document, optionally typed from a schema
//! - **Call** - `(operator, ordered operands)` plus decorations such as
//!   `default`, `separator` and `start`
//!
//! ### Missing Values
//!
//! Null and absent are the same thing. `missing()` returns an expression,
//! not a boolean, so absence can be reasoned about symbolically:
//!
//! ```text
//! missing(add(a, 1))                  -> missing(a)
//! missing(add(a, 1, default: 0))      -> false
//! missing(coalesce(a, b))             -> and(missing(a), missing(b))
//! ```
//!
//! ### Immutability
//!
//! Trees are never mutated after construction; rewrites return new nodes. A
//! tree may be shared read-only across threads.
pub mod expressions;
pub mod missing;
pub mod operators;
pub mod types;
pub mod variable;

pub use expressions::{Call, Expr, Params};
pub use operators::{ALL_OPS, Arity, Op, OpFamily};
pub use types::{JxType, StorageType};
pub use variable::{Variable, is_variable_name};

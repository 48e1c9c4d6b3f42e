//! CLI support for jx-lang
//!
//! Provides programmatic access to the `jx` commands so they can be embedded
//! in other tools; `main.rs` only parses arguments and prints.

mod compile;
mod docs;

pub use compile::{CompileOptions, EvalOptions, execute_compile, execute_eval};
pub use docs::{DocCategory, get_doc_category, get_docs_overview};

use std::io;

use thiserror::Error;

use crate::error::JxError;

/// Errors that can occur during CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Building, simplifying or rendering failed
    #[error(transparent)]
    Jx(#[from] JxError),

    /// JSON parsing error
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// No input provided
    #[error("No input provided. Use --input or pipe JSON to stdin.")]
    NoInput,

    /// Unknown documentation category
    #[error("Unknown category: '{0}'\nRun 'jx docs' to see available categories.")]
    UnknownCategory(String),
}

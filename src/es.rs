//! Filter-DSL backend.
//!
//! [`filter`] renders a simplified expression as a search-engine filter in
//! one of two dialects; [`normalize`] is an idempotent clean-up pass over
//! the rendered JSON. Expressions with no native filter form fall back to a
//! script filter built by [`crate::painless`].

pub mod filter;
pub mod normalize;

pub use filter::{Dialect, EsFilter, to_es_filter};
pub use normalize::normalize_filter;

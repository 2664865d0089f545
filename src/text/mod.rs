//! Text processing for piperline
//!
//! Sanitization of raw request text and parsing of in-text directives.

pub mod directives;
mod sanitize;

pub use directives::{parse_directives, resolve_length_scale, Directives};
pub use sanitize::{collapse_whitespace, sanitize, truncate_chars};

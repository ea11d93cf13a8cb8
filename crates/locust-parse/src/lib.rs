//! Definition extraction and hunk correlation.
//!
//! Walks a Python syntax tree (via tree-sitter) to produce a flat, ordered
//! list of [`locust_core::RawDefinition`]s with qualified names and parent
//! links, then decides which of them an edit's inserted lines touched.
//!
//! Pipeline: [`language::Language`] detection → [`module_path::ModulePath`]
//! for import resolution → [`extractor::extract_definitions`] →
//! [`correlate::correlate`].

pub mod correlate;
pub mod extractor;
pub mod language;
pub mod module_path;
mod scope;

pub use correlate::{correlate, correlate_all};
pub use extractor::{extract_definitions, ExtractOptions};
pub use language::Language;
pub use module_path::ModulePath;

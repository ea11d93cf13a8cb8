//! Analysis orchestration: per-file extraction, plugins, and nesting.
//!
//! [`pipeline::analyze`] turns a [`locust_core::DiffResult`] into a flat
//! [`locust_core::ParseResult`]; [`nest::build_forest`] rebuilds the
//! per-file hierarchy handed to rendering.

pub mod nest;
pub mod pipeline;
pub mod plugin;

pub use nest::{build_forest, sort_forest, Forest};
pub use pipeline::{analyze, analyze_patch, Analysis, AnalysisStats};

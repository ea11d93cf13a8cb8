//! Summaries of changed definitions for people and machines.
//!
//! A [`Summary`] is built from a per-file change forest, optionally enriched
//! with the diff's refs, free-form metadata, and links into a GitHub
//! repository, and then rendered as a text tree, JSON, or pull-request
//! Markdown.

pub mod output;
pub mod summary;

pub use output::{format_json, format_markdown, format_text, render};
pub use summary::{ChangeSummary, FileSummary, Refs, Summary};

//! Core types, configuration, and error handling for Locust.
//!
//! This crate provides the shared foundation used by all other Locust crates:
//! - [`LocustError`]: unified error type using `thiserror`
//! - [`LocustConfig`]: configuration loaded from `.locust.toml`
//! - The diff model: [`DiffResult`], [`PatchInfo`], [`HunkInfo`], [`LineInfo`],
//!   [`HunkBoundary`]
//! - Definitions and changes: [`RawDefinition`], [`LocustChange`], [`ChangeKey`],
//!   [`NestedChange`], [`ParseResult`]

mod change;
mod config;
mod diff;
mod error;
mod types;

pub use change::{
    ChangeKey, DefinitionKind, LocustChange, NestedChange, Parent, ParseResult, RawDefinition,
};
pub use config::{LocustConfig, ParseConfig, PluginConfig, RenderConfig};
pub use diff::{DiffResult, HunkBoundary, HunkInfo, LineInfo, LineType, PatchInfo, NULL_REVISION};
pub use error::LocustError;
pub use types::OutputFormat;

/// A convenience `Result` type for Locust operations.
pub type Result<T> = std::result::Result<T, LocustError>;

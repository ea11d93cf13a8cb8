//! Unified-diff reading and patch filtering.
//!
//! Turns `git diff` text into the [`locust_core::PatchInfo`] model, fills in
//! file contents from a working tree, and decides which patches are handed to
//! the native definition extractor.

pub mod filter;
pub mod parser;

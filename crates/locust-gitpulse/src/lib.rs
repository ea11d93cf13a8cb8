//! Diff acquisition from git repositories.
//!
//! Computes the zero-context diff between two revisions (or a revision and
//! the working copy) with git2 and materializes it as a [`DiffResult`],
//! including the file text on both sides of every patch.
//!
//! [`DiffResult`]: locust_core::DiffResult

pub mod repository;

pub use repository::collect_diff;

//! Shared utilities.
//!
//! Content hashing, script lexing state and path helpers used across the pipeline.

pub mod hash;
pub mod lex;
pub mod paths;

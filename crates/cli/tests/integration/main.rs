//! CLI integration tests for sitepack.

mod common;
mod prune_tests;
mod status_tests;

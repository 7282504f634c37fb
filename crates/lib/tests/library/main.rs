//! Integration tests for the sitepack build pipeline.

mod pipeline_tests;
mod prune_tests;
mod sync_tests;

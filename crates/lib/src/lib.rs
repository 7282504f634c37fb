//! sitepack-lib: asset build pipeline for static sites
//!
//! This crate provides every stage of a sitepack build:
//! - `graph`: loads the module dependency graph from an entry script
//! - `bundle`: rewrites module directives into a self-contained runtime loader
//! - `styles`: inlines stylesheet `@import`s into one sheet
//! - `artifact` / `manifest`: content-addressed output and the build record
//! - `sync`: points consumer HTML documents at the current artifacts
//! - `prune`: retention policy for superseded artifacts
//! - `build`: the pipeline tying the stages together

pub mod artifact;
pub mod build;
pub mod bundle;
pub mod config;
pub mod consts;
pub mod graph;
pub mod manifest;
pub mod prune;
pub mod styles;
pub mod sync;
pub mod util;

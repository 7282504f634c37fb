mod build;
mod prune;
mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use sitepack_lib::config::BuildConfig;

pub use build::cmd_build;
pub use prune::cmd_prune;
pub use status::cmd_status;

/// Resolve the project configuration from the current directory.
fn load_config() -> Result<BuildConfig> {
  let root: PathBuf = std::env::current_dir().context("Failed to determine current directory")?;
  let config = BuildConfig::load(&root).context("Failed to load configuration")?;
  debug!(root = %config.root.display(), out_dir = %config.out_dir.display(), "configuration loaded");
  Ok(config)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}

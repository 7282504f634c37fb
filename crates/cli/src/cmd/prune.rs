use std::time::Instant;

use anyhow::{Context, Result};

use sitepack_lib::prune::prune_output;

use crate::output::{OutputFormat, format_bytes, format_duration, print_info, print_json, print_stat, print_success};

pub fn cmd_prune(dry_run: bool, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let config = super::load_config()?;

  let rt = super::runtime()?;
  let result = rt
    .block_on(prune_output(&config, dry_run))
    .context("Pruning failed")?;

  if output.is_json() {
    print_json(&result)?;
  } else {
    if dry_run {
      print_info("Dry run - no changes made");
      for path in &result.deleted_paths {
        print_info(&format!("would remove {}", path.display()));
      }
    } else {
      print_success("Pruning complete!");
    }
    print_stat("Retention", &result.retention.to_string());
    print_stat("Kept", &result.stats.kept.to_string());
    print_stat("Removed", &result.stats.deleted.to_string());
    if result.stats.failed > 0 {
      print_stat("Failed", &result.stats.failed.to_string());
    }
    print_stat("Space freed", &format_bytes(result.stats.bytes_freed));
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  Ok(())
}

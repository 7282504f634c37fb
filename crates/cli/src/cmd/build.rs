//! Implementation of the `sitepack dev` and `sitepack prod` commands.
//!
//! Runs the build pipeline for the project in the current directory and
//! prints one marker line per pipeline step.

use std::time::Instant;

use anyhow::{Context, Result};

use sitepack_lib::build::{BuildReport, StepOutcome, StepReport, run_build};
use sitepack_lib::config::BuildMode;

use crate::output::{
  OutputFormat, format_bytes, format_duration, print_error, print_info, print_json, print_skipped, print_stat,
  print_success, print_warning,
};

pub fn cmd_build(mode: BuildMode, verbose: bool, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let config = super::load_config()?;

  let rt = super::runtime()?;
  let report = rt.block_on(run_build(&config, mode)).context("Build failed")?;

  if output.is_json() {
    return print_json(&report);
  }

  for step in &report.steps {
    print_step(step);
  }
  if verbose {
    print_details(&report);
  }

  println!();
  print_success(&format!("{} build complete", mode));
  print_stat("Version", &report.version);
  print_stat("Build ID", &report.build_id);
  for artifact in &report.artifacts {
    print_stat(
      artifact.kind.as_str(),
      &format!("{} ({})", artifact.filename, format_bytes(artifact.size)),
    );
  }
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}

fn print_step(step: &StepReport) {
  match &step.outcome {
    StepOutcome::Ok(detail) => print_success(&format!("{}: {}", step.step, detail)),
    StepOutcome::Warn(detail) => print_warning(&format!("{}: {}", step.step, detail)),
    StepOutcome::Skipped(reason) => print_skipped(&format!("{}: skipped ({})", step.step, reason)),
    StepOutcome::Failed(reason) => print_error(&format!("{}: {}", step.step, reason)),
  }
}

fn print_details(report: &BuildReport) {
  for external in &report.externals {
    print_info(&format!(
      "external '{}' in {} ({})",
      external.specifier,
      external.module.display(),
      external.reason.as_str()
    ));
  }
  for path in &report.sync.updated {
    print_info(&format!("updated {}", path.display()));
  }
  for path in &report.sync.missing {
    print_info(&format!("missing {}", path.display()));
  }
  if let Some(prune) = &report.prune {
    for path in &prune.deleted_paths {
      print_info(&format!("removed {}", path.display()));
    }
  }
}

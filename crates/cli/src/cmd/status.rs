//! Status command implementation.
//!
//! Displays the manifest of the most recent build.

use anyhow::{Context, Result};

use sitepack_lib::artifact::ArtifactKind;
use sitepack_lib::manifest::{AssetState, check_asset, load_manifest, manifest_path};

use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success, print_warning};

pub fn cmd_status(verbose: bool, output: OutputFormat) -> Result<()> {
  let config = super::load_config()?;

  let Some(manifest) = load_manifest(&config.out_dir).context("Failed to load manifest")? else {
    if output.is_json() {
      return print_json(&serde_json::Value::Null);
    }
    print_info("No build found. Run 'sitepack dev' or 'sitepack prod' to create one.");
    return Ok(());
  };

  if output.is_json() {
    return print_json(&manifest);
  }

  print_success(&format!("Current build: {}", manifest.version));
  print_stat("Build ID", &manifest.build_id);
  print_stat("Built", &manifest.timestamp.to_rfc3339());
  print_stat("Environment", &manifest.environment);
  println!();

  for kind in ArtifactKind::ALL {
    match manifest.asset(kind) {
      Some(entry) => {
        print_stat(kind.as_str(), &entry.filename);
        match check_asset(&config.out_dir, entry) {
          AssetState::Present => {}
          AssetState::Missing => {
            print_warning(&format!("{} is listed in the manifest but missing on disk", entry.filename))
          }
          AssetState::Modified => print_warning(&format!("{} was modified after the build", entry.filename)),
          AssetState::Unreadable => print_warning(&format!("{} could not be read", entry.filename)),
        }
      }
      None => print_stat(kind.as_str(), "none"),
    }
  }

  if verbose {
    println!();
    print_stat("Manifest", &manifest_path(&config.out_dir).display().to_string());
    print_stat("Retention", &config.retention.to_string());
    for document in &config.documents {
      print_stat("Document", &format!("{} (prefix '{}')", document.path.display(), document.prefix));
    }
  }

  Ok(())
}

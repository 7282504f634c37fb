use std::fs::File;
use std::time::{Duration, SystemTime};

use sitepack_lib::build::run_build;
use sitepack_lib::config::{BuildMode, ProjectFile};
use sitepack_lib::prune::prune_output;

use super::common::Site;

fn age(path: &std::path::Path, hours: u64) {
  let mtime = SystemTime::now() - Duration::from_secs(3600 * hours);
  File::options().write(true).open(path).unwrap().set_modified(mtime).unwrap();
}

#[tokio::test]
async fn standalone_prune_protects_manifest_artifacts() {
  let site = Site::standard();
  let config = site.config_with(ProjectFile {
    retention: Some(1),
    ..Default::default()
  });

  let report = run_build(&config, BuildMode::Development).await.unwrap();
  let current = report.artifacts.iter().map(|a| a.path.clone()).collect::<Vec<_>>();
  for path in &current {
    age(path, 48);
  }

  // Newer artifacts from a build whose manifest was never written.
  site.write("dist/bundle.aaaaaaaaaa.js", "newer");
  site.write("dist/styles.bbbbbbbbbb.css", "newer");

  let result = prune_output(&config, false).await.unwrap();

  assert_eq!(result.stats.deleted, 2);
  for path in &current {
    assert!(path.exists(), "{} was pruned", path.display());
  }
  assert!(!site.path("dist/bundle.aaaaaaaaaa.js").exists());
  assert!(!site.path("dist/styles.bbbbbbbbbb.css").exists());
}

#[tokio::test]
async fn standalone_prune_without_manifest_keeps_newest() {
  let site = Site::empty();
  for (name, hours) in [
    ("bundle.0000000001.js", 1),
    ("bundle.0000000002.js", 2),
    ("bundle.0000000003.js", 3),
  ] {
    site.write(&format!("dist/{}", name), name);
    age(&site.path(&format!("dist/{}", name)), hours);
  }
  let config = site.config_with(ProjectFile {
    retention: Some(2),
    ..Default::default()
  });

  let dry = prune_output(&config, true).await.unwrap();
  assert_eq!(dry.stats.deleted, 1);
  assert_eq!(super::common::list_files(&site.out_dir()).len(), 3);

  let result = prune_output(&config, false).await.unwrap();
  assert_eq!(result.deleted_paths, vec![site.path("dist/bundle.0000000003.js")]);
  assert_eq!(
    super::common::list_files(&site.out_dir()),
    ["bundle.0000000001.js", "bundle.0000000002.js"]
  );
}

//! Tests for `sitepack prune`.

use predicates::prelude::*;

use super::common::{TestEnv, age_file};

/// Build once, then leave older and newer stray artifacts around it.
fn built_site_with_strays() -> TestEnv {
  let env = TestEnv::site();
  env.sitepack_cmd().arg("dev").assert().success();

  let manifest = env.manifest();
  let current = manifest["assets"]["script"]["filename"].as_str().unwrap().to_string();
  age_file(&env.out_dir().join(&current), 10);

  for (hash, hours) in [("aaaaaaaaaa", 1), ("bbbbbbbbbb", 20), ("cccccccccc", 30)] {
    let name = format!("bundle.{}.js", hash);
    env.write_file(&format!("dist/{}", name), hash);
    age_file(&env.out_dir().join(name), hours);
  }
  env
}

#[test]
fn dry_run_reports_without_deleting() {
  let env = built_site_with_strays();
  let before = env.output_files();

  env
    .sitepack_cmd()
    .args(["prune", "--dry-run"])
    .env("SITEPACK_RETENTION", "2")
    .assert()
    .success()
    .stdout(predicate::str::contains("Dry run - no changes made"))
    .stdout(predicate::str::contains("would remove"))
    .stdout(predicate::str::contains("bundle.cccccccccc.js"));

  assert_eq!(env.output_files(), before);
}

#[test]
fn prune_keeps_current_and_newest() {
  let env = built_site_with_strays();
  let current = env.manifest()["assets"]["script"]["filename"].as_str().unwrap().to_string();

  env
    .sitepack_cmd()
    .arg("prune")
    .env("SITEPACK_RETENTION", "2")
    .assert()
    .success()
    .stdout(predicate::str::contains("Pruning complete!"));

  let mut expected = vec![current, "bundle.aaaaaaaaaa.js".to_string()];
  expected.sort();
  let bundles: Vec<String> = env
    .output_files()
    .into_iter()
    .filter(|f| f.ends_with(".js"))
    .collect();
  assert_eq!(bundles, expected);
}

#[test]
fn prune_json_output() {
  let env = built_site_with_strays();

  let assert = env
    .sitepack_cmd()
    .args(["prune", "-o", "json"])
    .env("SITEPACK_RETENTION", "1")
    .assert()
    .success();
  let result: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();

  assert_eq!(result["retention"], 1);
  assert_eq!(result["dry_run"], false);
  assert_eq!(result["stats"]["deleted"], 3);
}

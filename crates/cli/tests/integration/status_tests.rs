//! Tests for `sitepack status`.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn status_shows_current_build() {
  let env = TestEnv::site();
  env.sitepack_cmd().arg("prod").assert().success();
  let manifest = env.manifest();

  env
    .sitepack_cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains(format!(
      "Current build: {}",
      manifest["version"].as_str().unwrap()
    )))
    .stdout(predicate::str::contains("production"))
    .stdout(predicate::str::contains(manifest["assets"]["style"]["filename"].as_str().unwrap()));
}

#[test]
fn status_json_is_the_manifest() {
  let env = TestEnv::site();
  env.sitepack_cmd().arg("dev").assert().success();

  let assert = env.sitepack_cmd().args(["status", "-o", "json"]).assert().success();
  let printed: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
  assert_eq!(printed, env.manifest());
}

#[test]
fn status_warns_about_missing_artifact() {
  let env = TestEnv::site();
  env.sitepack_cmd().arg("dev").assert().success();
  let script = env.manifest()["assets"]["script"]["filename"].as_str().unwrap().to_string();
  std::fs::remove_file(env.out_dir().join(&script)).unwrap();

  env
    .sitepack_cmd()
    .arg("status")
    .assert()
    .success()
    .stderr(predicate::str::contains("missing on disk"));
}

#[test]
fn verbose_status_lists_documents() {
  let env = TestEnv::site();
  env.sitepack_cmd().arg("dev").assert().success();

  env
    .sitepack_cmd()
    .args(["status", "--verbose"])
    .assert()
    .success()
    .stdout(predicate::str::contains("prefix 'dist/'"));
}

#[test]
fn status_detects_modified_artifact() {
  let env = TestEnv::site();
  env.sitepack_cmd().arg("dev").assert().success();
  let style = env.manifest()["assets"]["style"]["filename"].as_str().unwrap().to_string();
  env.write_file(&format!("dist/{}", style), "tampered {}");

  env
    .sitepack_cmd()
    .arg("status")
    .assert()
    .success()
    .stderr(predicate::str::contains("was modified after the build"));
}

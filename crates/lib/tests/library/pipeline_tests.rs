use std::fs::File;
use std::process::Command;
use std::time::{Duration, SystemTime};

use sitepack_lib::artifact::ArtifactKind;
use sitepack_lib::build::{BuildError, Step, StepOutcome, run_build};
use sitepack_lib::config::{BuildMode, ProjectFile};
use sitepack_lib::consts::MANIFEST_FILENAME;
use sitepack_lib::graph::{ExternalReason, GraphError};

use super::common::Site;

fn outcome(report: &sitepack_lib::build::BuildReport, step: Step) -> &StepOutcome {
  &report.steps.iter().find(|s| s.step == step).unwrap().outcome
}

#[tokio::test]
async fn missing_relative_import_stays_external() {
  let site = Site::standard();

  let report = run_build(&site.config(), BuildMode::Development).await.unwrap();

  assert_eq!(report.modules, 2);
  assert_eq!(report.externals.len(), 1);
  assert_eq!(report.externals[0].specifier, "./analyticsTracker.js");
  assert_eq!(report.externals[0].reason, ExternalReason::Missing);
  assert!(matches!(outcome(&report, Step::Graph), StepOutcome::Warn(_)));

  let bundle = std::fs::read_to_string(&report.artifact(ArtifactKind::Script).unwrap().path).unwrap();
  assert!(bundle.contains("__sitepack_modules[0] = function"));
  assert!(bundle.contains("__sitepack_modules[1] = function"));
  assert!(!bundle.contains("__sitepack_modules[2]"));
  assert!(bundle.contains("/* sitepack: external './analyticsTracker.js' (missing) */"));
  assert!(bundle.contains("trackPageView();"));
  assert!(site.manifest().is_some());
}

#[tokio::test]
async fn rebuilding_unchanged_sources_keeps_filenames() {
  let site = Site::standard();
  let config = site.config();

  let first = run_build(&config, BuildMode::Development).await.unwrap();
  let files_after_first = site.output_files();
  let second = run_build(&config, BuildMode::Development).await.unwrap();

  assert_ne!(first.build_id, second.build_id);
  assert_eq!(first.version, second.version);
  for kind in ArtifactKind::ALL {
    assert_eq!(
      first.artifact(kind).unwrap().filename,
      second.artifact(kind).unwrap().filename
    );
  }
  assert_eq!(site.output_files(), files_after_first);
  assert_eq!(files_after_first.len(), 3);
}

#[tokio::test]
async fn changed_source_changes_only_that_artifact() {
  let site = Site::standard();
  let config = site.config();

  let first = run_build(&config, BuildMode::Development).await.unwrap();
  site.write("src/css/base.css", "body { margin: 1rem; }\n");
  let second = run_build(&config, BuildMode::Development).await.unwrap();

  assert_eq!(
    first.artifact(ArtifactKind::Script).unwrap().filename,
    second.artifact(ArtifactKind::Script).unwrap().filename
  );
  assert_ne!(
    first.artifact(ArtifactKind::Style).unwrap().filename,
    second.artifact(ArtifactKind::Style).unwrap().filename
  );
  assert_ne!(first.version, second.version);
}

#[tokio::test]
async fn documents_reference_manifest_filenames() {
  let site = Site::standard();

  run_build(&site.config(), BuildMode::Development).await.unwrap();
  let manifest = site.manifest().unwrap();
  let script = &manifest.assets.script.as_ref().unwrap().filename;
  let style = &manifest.assets.style.as_ref().unwrap().filename;

  for doc in ["index.html", "404.html"] {
    let html = site.read(doc);
    assert!(html.contains(&format!("src=\"dist/{}\"", script)), "{doc}: {html}");
    assert!(html.contains(&format!("href=\"dist/{}\"", style)), "{doc}: {html}");
    assert!(html.contains(&format!(
      "<meta name=\"build-version\" content=\"{}\">",
      manifest.version
    )));
  }

  let index = site.read("index.html");
  assert!(index.contains("<meta charset=\"utf-8\">\n    <meta name=\"build-version\""));
  let not_found = site.read("404.html");
  assert!(not_found.contains("<head>\n  <meta name=\"build-version\""));
}

#[tokio::test]
async fn second_sync_leaves_documents_untouched() {
  let site = Site::standard();
  let config = site.config();

  run_build(&config, BuildMode::Development).await.unwrap();
  let index = site.read("index.html");
  let not_found = site.read("404.html");

  let report = run_build(&config, BuildMode::Development).await.unwrap();
  assert!(report.sync.updated.is_empty());
  assert_eq!(report.sync.unchanged.len(), 2);
  assert_eq!(site.read("index.html"), index);
  assert_eq!(site.read("404.html"), not_found);
}

#[tokio::test]
async fn missing_document_is_skipped() {
  let site = Site::standard();
  std::fs::remove_file(site.path("404.html")).unwrap();

  let report = run_build(&site.config(), BuildMode::Development).await.unwrap();
  assert_eq!(report.sync.missing, vec![site.path("404.html")]);
  assert!(matches!(outcome(&report, Step::Sync), StepOutcome::Warn(_)));
}

#[tokio::test]
async fn missing_entry_is_fatal_and_writes_no_manifest() {
  let site = Site::empty();
  site.write("index.html", super::common::INDEX_HTML);

  let err = run_build(&site.config(), BuildMode::Production).await.unwrap_err();
  assert!(matches!(err, BuildError::Graph(GraphError::EntryNotFound { .. })));
  assert!(!site.out_dir().join(MANIFEST_FILENAME).exists());
  assert_eq!(site.read("index.html"), super::common::INDEX_HTML);
}

#[tokio::test]
async fn unwritable_output_dir_is_fatal() {
  let site = Site::standard();
  site.write("dist", "a file where the output directory should be");

  let err = run_build(&site.config(), BuildMode::Development).await.unwrap_err();
  assert!(matches!(err, BuildError::OutputDir { .. }));
}

#[tokio::test]
async fn missing_styles_omit_the_style_artifact() {
  let site = Site::standard();
  std::fs::remove_dir_all(site.path("src/css")).unwrap();

  let report = run_build(&site.config(), BuildMode::Development).await.unwrap();
  assert!(report.artifact(ArtifactKind::Style).is_none());
  assert!(matches!(outcome(&report, Step::Style), StepOutcome::Skipped(_)));
  assert!(site.manifest().unwrap().assets.style.is_none());
  // No style artifact, so the stylesheet reference is left alone.
  assert!(site.read("index.html").contains("href=\"dist/styles.css\""));
}

#[tokio::test]
async fn legacy_stylesheet_is_used_without_modular_root() {
  let site = Site::standard();
  std::fs::remove_dir_all(site.path("src/css")).unwrap();
  site.write("styles.css", "html { color: black; }\n");

  let report = run_build(&site.config(), BuildMode::Development).await.unwrap();
  let style = report.artifact(ArtifactKind::Style).unwrap();
  assert_eq!(std::fs::read_to_string(&style.path).unwrap(), "html { color: black; }\n");
}

#[tokio::test]
async fn production_output_is_stripped() {
  let site = Site::standard();

  let dev = run_build(&site.config(), BuildMode::Development).await.unwrap();
  let dev_js = std::fs::read_to_string(&dev.artifact(ArtifactKind::Script).unwrap().path).unwrap();
  assert!(dev_js.contains("// boot sequence"));

  let prod = run_build(&site.config(), BuildMode::Production).await.unwrap();
  let js = std::fs::read_to_string(&prod.artifact(ArtifactKind::Script).unwrap().path).unwrap();
  let css = std::fs::read_to_string(&prod.artifact(ArtifactKind::Style).unwrap().path).unwrap();

  assert!(!js.contains("// boot sequence"));
  assert!(js.contains("initTheme(document.body);"));
  assert!(!css.contains("/* layout */"));
  assert!(css.contains("main { display: grid; }"));
  assert_eq!(site.manifest().unwrap().environment, "production");
}

/// Stale `bundle.<hash>.js` files with mtimes in the past.
fn seed_stale_bundles(site: &Site, count: u64) {
  std::fs::create_dir_all(site.out_dir()).unwrap();
  for i in 0..count {
    let path = site.out_dir().join(format!("bundle.{:010x}.js", i));
    std::fs::write(&path, format!("// stale {}", i)).unwrap();
    let mtime = SystemTime::now() - Duration::from_secs(3600 * (i + 1));
    File::options().write(true).open(&path).unwrap().set_modified(mtime).unwrap();
  }
}

#[tokio::test]
async fn production_build_prunes_to_retention() {
  let site = Site::standard();
  seed_stale_bundles(&site, 4);
  let config = site.config_with(ProjectFile {
    retention: Some(2),
    ..Default::default()
  });

  let report = run_build(&config, BuildMode::Production).await.unwrap();

  let current = report.artifact(ArtifactKind::Script).unwrap().filename.clone();
  let bundles: Vec<String> = site
    .output_files()
    .into_iter()
    .filter(|f| f.starts_with("bundle.") && f.ends_with(".js"))
    .collect();
  let mut expected = vec![current, "bundle.0000000000.js".to_string()];
  expected.sort();
  assert_eq!(bundles, expected);
  assert_eq!(report.prune.as_ref().unwrap().stats.deleted, 3);
}

#[tokio::test]
async fn development_build_never_prunes() {
  let site = Site::standard();
  seed_stale_bundles(&site, 4);
  let config = site.config_with(ProjectFile {
    retention: Some(1),
    ..Default::default()
  });

  let report = run_build(&config, BuildMode::Development).await.unwrap();
  assert!(report.prune.is_none());
  assert!(matches!(outcome(&report, Step::Prune), StepOutcome::Skipped(_)));
  assert_eq!(
    site.output_files().iter().filter(|f| f.starts_with("bundle.")).count(),
    5
  );
}

fn node_available() -> bool {
  Command::new("node").arg("--version").output().is_ok_and(|o| o.status.success())
}

async fn run_with_node(site: &Site, mode: BuildMode) -> Option<String> {
  if !node_available() {
    eprintln!("node not found on PATH; skipping bundle execution");
    return None;
  }
  let report = run_build(&site.config(), mode).await.unwrap();
  let output = Command::new("node")
    .arg(&report.artifact(ArtifactKind::Script).unwrap().path)
    .output()
    .unwrap();
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
  Some(String::from_utf8(output.stdout).unwrap().trim().to_string())
}

#[tokio::test]
async fn shared_module_initializes_once() {
  let site = Site::empty();
  site.write(
    "src/js/counter.js",
    "globalThis.loads = (globalThis.loads || 0) + 1;\nexport const count = () => globalThis.loads;\n",
  );
  site.write("src/js/a.js", "import { count } from './counter.js';\nexport const a = count();\n");
  site.write("src/js/b.js", "import { count } from './counter.js';\nexport const b = count();\n");
  site.write(
    "src/js/main.js",
    "import { a } from './a.js';\nimport { b } from './b.js';\nimport * as counter from './counter.js';\nconsole.log(JSON.stringify({ loads: globalThis.loads, a, b, now: counter.count() }));\n",
  );

  if let Some(stdout) = run_with_node(&site, BuildMode::Development).await {
    assert_eq!(stdout, r#"{"loads":1,"a":1,"b":1,"now":1}"#);
  }
}

#[tokio::test]
async fn circular_imports_see_partial_exports() {
  let site = Site::empty();
  site.write("src/js/x.js", "import { y } from './y.js';\nexport const x = 'x' + y;\n");
  site.write(
    "src/js/y.js",
    "import * as xm from './x.js';\nexport const y = 'y';\nexport function late() {\n  return xm.x;\n}\n",
  );
  site.write(
    "src/js/main.js",
    "import { x } from './x.js';\nimport { late } from './y.js';\nconsole.log(x, late());\n",
  );

  if let Some(stdout) = run_with_node(&site, BuildMode::Development).await {
    assert_eq!(stdout, "xy xy");
  }
}

#[tokio::test]
async fn every_declarator_in_an_export_is_exported() {
  let site = Site::empty();
  site.write(
    "src/js/consts.js",
    "export const a = 1, b = 2;\nexport let c = 3,\n  d = [4, 5];\n",
  );
  site.write(
    "src/js/main.js",
    "import { a, b, c, d } from './consts.js';\nconsole.log(JSON.stringify({ a, b, c, d }));\n",
  );

  if let Some(stdout) = run_with_node(&site, BuildMode::Development).await {
    assert_eq!(stdout, r#"{"a":1,"b":2,"c":3,"d":[4,5]}"#);
  }
}

#[tokio::test]
async fn repeated_import_binding_takes_the_later_value() {
  let site = Site::empty();
  site.write("src/js/x.js", "export const v = 'x';\n");
  site.write("src/js/y.js", "export const v = 'y';\n");
  site.write(
    "src/js/main.js",
    "import { v } from './x.js';\nimport { v } from './y.js';\nconsole.log(v);\n",
  );

  if let Some(stdout) = run_with_node(&site, BuildMode::Development).await {
    assert_eq!(stdout, "y");
  }
}

#[tokio::test]
async fn backtick_in_regex_does_not_hide_later_exports() {
  let site = Site::empty();
  site.write(
    "src/js/q.js",
    "const re = /`/;\n// gone\nexport const q = re.test('a`b') ? 1 : 0;\n",
  );
  site.write("src/js/main.js", "import { q } from './q.js';\nconsole.log(q);\n");

  let report = run_build(&site.config(), BuildMode::Production).await.unwrap();
  let bundle = std::fs::read_to_string(&report.artifact(ArtifactKind::Script).unwrap().path).unwrap();
  assert!(!bundle.contains("export const q"));
  assert!(!bundle.contains("// gone"));

  if let Some(stdout) = run_with_node(&site, BuildMode::Production).await {
    assert_eq!(stdout, "1");
  }
}

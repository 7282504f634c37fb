//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <link rel="stylesheet" href="dist/styles.css">
  </head>
  <body>
    <script src="dist/bundle.js"></script>
  </body>
</html>
"#;

pub const MAIN_JS: &str = r#"import { initTheme } from './themeManager.js';
import { trackPageView } from './analyticsTracker.js';

// boot
initTheme();
trackPageView();
"#;

pub const THEME_JS: &str = r#"export function initTheme() {
  document.documentElement.dataset.theme = 'dark';
}
"#;

pub const MAIN_CSS: &str = "@import './base.css';\n/* page */\nmain { padding: 1rem; }\n";

pub const BASE_CSS: &str = "body { margin: 0; }\n";

/// Isolated test project.
///
/// Each test gets its own temporary project directory; commands run with it
/// as the working directory and without inherited sitepack environment.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Create an empty project.
  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Create a project with scripts, styles and an index document.
  pub fn site() -> Self {
    let env = Self::empty();
    env.write_file("index.html", INDEX_HTML);
    env.write_file("src/js/main.js", MAIN_JS);
    env.write_file("src/js/themeManager.js", THEME_JS);
    env.write_file("src/css/main.css", MAIN_CSS);
    env.write_file("src/css/base.css", BASE_CSS);
    env
  }

  /// Write a file relative to the project root.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn read_file(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.temp.path().join(relative_path)).unwrap()
  }

  pub fn out_dir(&self) -> PathBuf {
    self.temp.path().join("dist")
  }

  /// Sorted file names in the output directory.
  pub fn output_files(&self) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(self.out_dir())
      .map(|entries| {
        entries
          .flatten()
          .map(|e| e.file_name().to_string_lossy().into_owned())
          .collect()
      })
      .unwrap_or_default();
    names.sort();
    names
  }

  /// Parsed `dist/build-manifest.json`.
  pub fn manifest(&self) -> serde_json::Value {
    serde_json::from_str(&self.read_file("dist/build-manifest.json")).unwrap()
  }

  /// Get a pre-configured Command for the sitepack binary.
  pub fn sitepack_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("sitepack");
    cmd.current_dir(self.temp.path());
    cmd.env_remove("SITEPACK_RETENTION");
    cmd.env_remove("RUST_LOG");
    cmd
  }
}

/// Set a file's modification time `hours` into the past.
pub fn age_file(path: &Path, hours: u64) {
  let mtime = std::time::SystemTime::now() - std::time::Duration::from_secs(3600 * hours);
  std::fs::File::options()
    .write(true)
    .open(path)
    .unwrap()
    .set_modified(mtime)
    .unwrap();
}

//! Stylesheet aggregation.
//!
//! Inlines `@import` directives from a root stylesheet, recursively and
//! textually, annotating each inlined file with a provenance comment. When the
//! modular root is absent the legacy single-file stylesheet is used as-is.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::util::paths::{diff_paths, normalize, to_slash};

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(?m)^[ \t]*@import\s+(?:url\(\s*)?["']([^"']+)["']\s*\)?\s*;"#).expect("valid @import pattern")
});

#[derive(Debug, Error)]
pub enum StyleError {
  #[error("failed to read stylesheet {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleOrigin {
  /// Aggregated from the modular root stylesheet.
  Modular(PathBuf),
  /// Copied from the legacy single-file stylesheet.
  Legacy(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Stylesheet {
  pub css: String,
  pub origin: StyleOrigin,
  /// Files inlined into the root, in inclusion order.
  pub included: Vec<PathBuf>,
}

/// Build the stylesheet from `root`, falling back to `legacy`.
///
/// Returns `Ok(None)` when neither exists. Missing or cyclic includes are
/// logged and replaced with a comment; only an unreadable root is an error.
pub fn aggregate_styles(root: &Path, legacy: &Path) -> Result<Option<Stylesheet>, StyleError> {
  if root.is_file() {
    let css = read(root)?;
    let base = root.parent().unwrap_or(Path::new(""));
    let mut inliner = Inliner {
      base,
      stack: vec![normalize(root)],
      included: Vec::new(),
    };
    let css = inliner.inline(root, &css);
    info!(root = %root.display(), included = inliner.included.len(), "stylesheet aggregated");
    return Ok(Some(Stylesheet {
      css,
      origin: StyleOrigin::Modular(root.to_path_buf()),
      included: inliner.included,
    }));
  }

  if legacy.is_file() {
    info!(path = %legacy.display(), "modular stylesheet not found; using legacy stylesheet");
    return Ok(Some(Stylesheet {
      css: read(legacy)?,
      origin: StyleOrigin::Legacy(legacy.to_path_buf()),
      included: Vec::new(),
    }));
  }

  warn!(
    root = %root.display(),
    legacy = %legacy.display(),
    "no stylesheet sources found; skipping style output"
  );
  Ok(None)
}

fn read(path: &Path) -> Result<String, StyleError> {
  fs::read_to_string(path).map_err(|source| StyleError::Read {
    path: path.to_path_buf(),
    source,
  })
}

fn is_remote(spec: &str) -> bool {
  spec.starts_with("http://") || spec.starts_with("https://") || spec.starts_with("//")
}

struct Inliner<'a> {
  base: &'a Path,
  /// Files currently being inlined, for cycle detection.
  stack: Vec<PathBuf>,
  included: Vec<PathBuf>,
}

impl Inliner<'_> {
  fn label(&self, path: &Path) -> String {
    to_slash(&diff_paths(path, self.base))
  }

  fn inline(&mut self, file: &Path, css: &str) -> String {
    let dir = file.parent().unwrap_or(Path::new("")).to_path_buf();

    IMPORT_RE
      .replace_all(css, |caps: &Captures| {
        let spec = &caps[1];
        if is_remote(spec) {
          debug!(specifier = spec, "remote @import left in place");
          return caps[0].to_string();
        }

        let target = normalize(&dir.join(spec));
        let label = self.label(&target);

        if self.stack.contains(&target) {
          warn!(file = %file.display(), specifier = spec, "circular @import skipped");
          return format!("/* sitepack: circular import '{}' skipped */", label);
        }

        let content = match fs::read_to_string(&target) {
          Ok(content) => content,
          Err(e) => {
            warn!(file = %file.display(), specifier = spec, error = %e, "stylesheet include not readable; skipping");
            return format!("/* sitepack: missing '{}' */", label);
          }
        };

        self.stack.push(target.clone());
        let inlined = self.inline(&target, &content);
        self.stack.pop();
        self.included.push(target);

        let mut replacement = format!("/* sitepack: {} */\n", label);
        replacement.push_str(inlined.trim_end());
        replacement
      })
      .into_owned()
  }
}

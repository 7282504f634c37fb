//! Build configuration.
//!
//! A [`BuildConfig`] is resolved from a project root in three layers:
//! built-in defaults, an optional `sitepack.json` in the root, and the
//! `SITEPACK_RETENTION` environment variable.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::{CONFIG_FILENAME, DEFAULT_RETENTION, RETENTION_ENV};
use crate::util::paths::{normalize, relative_to, to_slash};

const DEFAULT_ENTRY: &str = "src/js/main.js";
const DEFAULT_STYLE_ROOT: &str = "src/css/main.css";
const DEFAULT_LEGACY_STYLE: &str = "styles.css";
const DEFAULT_OUT_DIR: &str = "dist";
const DEFAULT_BUNDLE_STEM: &str = "bundle";
const DEFAULT_STYLE_STEM: &str = "styles";
const DEFAULT_DOCUMENTS: &[&str] = &["index.html", "404.html"];
const DEFAULT_VERSION_META: &str = "build-version";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("project root {path} is not accessible: {source}")]
  Root {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid {field} '{value}': must be a non-empty file stem without path separators or dots")]
  InvalidStem { field: &'static str, value: String },

  #[error("retention must be at least 1")]
  InvalidRetention,

  #[error("document {document} needs an explicit prefix because the output directory lies outside the project root")]
  PrefixRequired { document: PathBuf },
}

/// Which flavor of build is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
  Development,
  Production,
}

impl BuildMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      BuildMode::Development => "development",
      BuildMode::Production => "production",
    }
  }

  pub fn is_production(&self) -> bool {
    matches!(self, BuildMode::Production)
  }
}

impl fmt::Display for BuildMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A consumer document entry in `sitepack.json`.
///
/// Either a bare path or an object with an explicit reference prefix.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DocumentDecl {
  Path(PathBuf),
  Detailed { path: PathBuf, prefix: Option<String> },
}

impl DocumentDecl {
  fn parts(&self) -> (&Path, Option<&str>) {
    match self {
      DocumentDecl::Path(path) => (path, None),
      DocumentDecl::Detailed { path, prefix } => (path, prefix.as_deref()),
    }
  }
}

/// Contents of `sitepack.json`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectFile {
  pub entry: Option<PathBuf>,
  pub styles: Option<PathBuf>,
  pub legacy_styles: Option<PathBuf>,
  pub out_dir: Option<PathBuf>,
  pub bundle_stem: Option<String>,
  pub style_stem: Option<String>,
  pub documents: Option<Vec<DocumentDecl>>,
  pub retention: Option<usize>,
  pub version_meta: Option<String>,
}

impl ProjectFile {
  /// Load `sitepack.json` from `root`, returning defaults when it is absent.
  pub fn load(root: &Path) -> Result<Self, ConfigError> {
    let path = root.join(CONFIG_FILENAME);

    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
      Err(source) => return Err(ConfigError::Read { path, source }),
    };

    debug!(path = %path.display(), "loaded project file");
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
  }
}

/// An HTML document whose asset references are rewritten after each build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumerDocument {
  /// Absolute path to the document.
  pub path: PathBuf,
  /// Prepended to artifact filenames inside this document, e.g. `dist/` or `../dist/`.
  pub prefix: String,
}

/// Fully resolved inputs for one pipeline run. All paths are absolute.
#[derive(Debug, Clone, Serialize)]
pub struct BuildConfig {
  pub root: PathBuf,
  pub entry: PathBuf,
  pub style_root: PathBuf,
  pub legacy_style: PathBuf,
  pub out_dir: PathBuf,
  pub bundle_stem: String,
  pub style_stem: String,
  pub documents: Vec<ConsumerDocument>,
  pub retention: usize,
  pub version_meta: String,
}

impl BuildConfig {
  /// Resolve configuration for the project at `root`, including the environment override.
  pub fn load(root: &Path) -> Result<Self, ConfigError> {
    let root = dunce::canonicalize(root).map_err(|source| ConfigError::Root {
      path: root.to_path_buf(),
      source,
    })?;
    let file = ProjectFile::load(&root)?;
    let mut config = Self::from_project_file(&root, file)?;

    if let Some(retention) = retention_from_env() {
      config.retention = retention;
    }

    Ok(config)
  }

  /// Resolve configuration from an already-parsed project file. Ignores the environment.
  pub fn from_project_file(root: &Path, file: ProjectFile) -> Result<Self, ConfigError> {
    let resolve = |value: Option<PathBuf>, default: &str| normalize(&root.join(value.unwrap_or_else(|| default.into())));

    let bundle_stem = validate_stem("bundleStem", file.bundle_stem.unwrap_or_else(|| DEFAULT_BUNDLE_STEM.into()))?;
    let style_stem = validate_stem("styleStem", file.style_stem.unwrap_or_else(|| DEFAULT_STYLE_STEM.into()))?;

    let retention = file.retention.unwrap_or(DEFAULT_RETENTION);
    if retention == 0 {
      return Err(ConfigError::InvalidRetention);
    }

    let out_dir = resolve(file.out_dir, DEFAULT_OUT_DIR);

    let decls = file.documents.unwrap_or_else(|| {
      DEFAULT_DOCUMENTS
        .iter()
        .map(|d| DocumentDecl::Path(PathBuf::from(d)))
        .collect()
    });

    let mut documents = Vec::with_capacity(decls.len());
    for decl in &decls {
      let (rel, prefix) = decl.parts();
      let path = normalize(&root.join(rel));
      let prefix = match prefix {
        Some(p) => p.to_string(),
        None => derive_prefix(root, &path, &out_dir)?,
      };
      documents.push(ConsumerDocument { path, prefix });
    }

    Ok(Self {
      root: root.to_path_buf(),
      entry: resolve(file.entry, DEFAULT_ENTRY),
      style_root: resolve(file.styles, DEFAULT_STYLE_ROOT),
      legacy_style: resolve(file.legacy_styles, DEFAULT_LEGACY_STYLE),
      out_dir,
      bundle_stem,
      style_stem,
      documents,
      retention,
      version_meta: file.version_meta.unwrap_or_else(|| DEFAULT_VERSION_META.into()),
    })
  }
}

fn validate_stem(field: &'static str, value: String) -> Result<String, ConfigError> {
  let valid = !value.is_empty() && !value.contains(['/', '\\', '.']);
  if valid {
    Ok(value)
  } else {
    Err(ConfigError::InvalidStem { field, value })
  }
}

/// Read `SITEPACK_RETENTION`. Unparseable or zero values are logged and ignored.
pub fn retention_from_env() -> Option<usize> {
  let raw = std::env::var(RETENTION_ENV).ok()?;
  match raw.trim().parse::<usize>() {
    Ok(0) => {
      warn!(var = RETENTION_ENV, value = %raw, "retention must be at least 1; using configured value");
      None
    }
    Ok(n) => Some(n),
    Err(e) => {
      warn!(var = RETENTION_ENV, value = %raw, error = %e, "ignoring unparseable retention override");
      None
    }
  }
}

/// Relative prefix from `document`'s directory to `out_dir`, ending in `/`.
///
/// `root/index.html` with `root/dist` gives `dist/`; `root/blog/post.html` gives `../dist/`.
pub fn derive_prefix(root: &Path, document: &Path, out_dir: &Path) -> Result<String, ConfigError> {
  let out_rel = relative_to(out_dir, root);
  if out_rel.is_absolute() {
    return Err(ConfigError::PrefixRequired {
      document: document.to_path_buf(),
    });
  }

  let doc_rel = relative_to(document, root);
  let depth = doc_rel.parent().map(|p| p.components().count()).unwrap_or(0);

  let mut prefix = "../".repeat(depth);
  let out = to_slash(&out_rel);
  if !out.is_empty() {
    prefix.push_str(&out);
    prefix.push('/');
  }
  Ok(prefix)
}

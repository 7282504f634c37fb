//! Content-addressed artifact output.
//!
//! Artifacts are written as `<stem>.<hash>.<ext>` into the output directory.
//! The filename is a pure function of the content, so rewriting identical
//! bytes lands on the identical file.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{SCRIPT_EXTENSION, STYLE_EXTENSION};
use crate::util::hash::{AssetHash, is_asset_hash};

#[derive(Debug, Error)]
pub enum ArtifactError {
  #[error("failed to create output directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write artifact {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
  Script,
  Style,
}

impl ArtifactKind {
  pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Script, ArtifactKind::Style];

  pub fn extension(&self) -> &'static str {
    match self {
      ArtifactKind::Script => SCRIPT_EXTENSION,
      ArtifactKind::Style => STYLE_EXTENSION,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      ArtifactKind::Script => "script",
      ArtifactKind::Style => "style",
    }
  }
}

impl fmt::Display for ArtifactKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A written output blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
  pub kind: ArtifactKind,
  pub filename: String,
  pub hash: AssetHash,
  pub path: PathBuf,
  pub size: u64,
}

/// `<stem>.<hash>.<ext>`
pub fn artifact_filename(stem: &str, hash: &AssetHash, kind: ArtifactKind) -> String {
  format!("{}.{}.{}", stem, hash, kind.extension())
}

/// Extract the hash from a filename shaped `<stem>.<hash>.<ext>` for this kind.
pub fn parse_artifact_filename(filename: &str, stem: &str, kind: ArtifactKind) -> Option<AssetHash> {
  let rest = filename.strip_prefix(stem)?.strip_prefix('.')?;
  let hash = rest.strip_suffix(kind.extension())?.strip_suffix('.')?;
  is_asset_hash(hash).then(|| AssetHash(hash.to_string()))
}

/// Hash `content` and write it into `out_dir` under its content-derived name.
///
/// Writes go through a temporary file and a rename so a reader never sees a
/// partially written artifact.
pub fn write_artifact(out_dir: &Path, kind: ArtifactKind, stem: &str, content: &[u8]) -> Result<Artifact, ArtifactError> {
  fs::create_dir_all(out_dir).map_err(|source| ArtifactError::CreateDir {
    path: out_dir.to_path_buf(),
    source,
  })?;

  let hash = AssetHash::of(content);
  let filename = artifact_filename(stem, &hash, kind);
  let path = out_dir.join(&filename);
  let temp_path = out_dir.join(format!(".{}.tmp", filename));

  let write_err = |source| ArtifactError::Write {
    path: path.clone(),
    source,
  };
  fs::write(&temp_path, content).map_err(write_err)?;
  fs::rename(&temp_path, &path).map_err(write_err)?;

  debug!(path = %path.display(), "artifact written");
  info!(kind = %kind, filename = %filename, bytes = content.len(), "artifact ready");

  Ok(Artifact {
    kind,
    filename,
    hash,
    path,
    size: content.len() as u64,
  })
}

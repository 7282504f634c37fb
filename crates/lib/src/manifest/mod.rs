//! Build manifest.
//!
//! One JSON record per output directory describing the latest build. It is
//! written once at the end of a successful build, replacing any previous one.
//!
//! ```json
//! {
//!   "buildId": "5b0c6a1e-...",
//!   "version": "3f2a9c01de",
//!   "timestamp": "2026-10-18T09:30:00.000Z",
//!   "assets": {
//!     "script": { "filename": "bundle.1a2b3c4d5e.js", "hash": "1a2b3c4d5e" },
//!     "style": { "filename": "styles.0f9e8d7c6b.css", "hash": "0f9e8d7c6b" }
//!   },
//!   "environment": "production"
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::artifact::{Artifact, ArtifactKind};
use crate::config::BuildMode;
use crate::consts::MANIFEST_FILENAME;
use crate::util::hash::{AssetHash, hash_file};

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to serialize manifest: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write manifest {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read manifest {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse manifest {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
  pub filename: String,
  pub hash: AssetHash,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestAssets {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub script: Option<AssetEntry>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub style: Option<AssetEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildManifest {
  pub build_id: String,
  pub version: String,
  #[serde(with = "iso8601")]
  pub timestamp: DateTime<Utc>,
  pub assets: ManifestAssets,
  pub environment: String,
}

impl BuildManifest {
  pub fn new(build_id: String, mode: BuildMode, timestamp: DateTime<Utc>, artifacts: &[Artifact]) -> Self {
    let mut assets = ManifestAssets::default();
    for artifact in artifacts {
      let entry = Some(AssetEntry {
        filename: artifact.filename.clone(),
        hash: artifact.hash.clone(),
      });
      match artifact.kind {
        ArtifactKind::Script => assets.script = entry,
        ArtifactKind::Style => assets.style = entry,
      }
    }

    Self {
      build_id,
      version: compute_version(&assets),
      timestamp,
      assets,
      environment: mode.as_str().to_string(),
    }
  }

  pub fn asset(&self, kind: ArtifactKind) -> Option<&AssetEntry> {
    match kind {
      ArtifactKind::Script => self.assets.script.as_ref(),
      ArtifactKind::Style => self.assets.style.as_ref(),
    }
  }
}

/// Fingerprint of the artifact set. Unchanged artifacts give an unchanged version.
pub fn compute_version(assets: &ManifestAssets) -> String {
  let mut material = String::new();
  for (kind, entry) in [("script", &assets.script), ("style", &assets.style)] {
    if let Some(entry) = entry {
      material.push_str(&format!("{}:{}\n", kind, entry.hash));
    }
  }
  AssetHash::of(material.as_bytes()).0
}

/// Random per-invocation identifier.
pub fn generate_build_id() -> String {
  uuid::Uuid::new_v4().to_string()
}

pub fn manifest_path(out_dir: &Path) -> PathBuf {
  out_dir.join(MANIFEST_FILENAME)
}

/// Write the manifest into `out_dir`, replacing any previous one atomically.
pub fn write_manifest(out_dir: &Path, manifest: &BuildManifest) -> Result<PathBuf, ManifestError> {
  let path = manifest_path(out_dir);
  let temp_path = out_dir.join(format!("{}.tmp", MANIFEST_FILENAME));

  let mut content = serde_json::to_string_pretty(manifest).map_err(ManifestError::Serialize)?;
  content.push('\n');

  fs::write(&temp_path, &content).map_err(|source| ManifestError::Write {
    path: temp_path.clone(),
    source,
  })?;
  fs::rename(&temp_path, &path).map_err(|source| ManifestError::Write {
    path: path.clone(),
    source,
  })?;

  info!(path = %path.display(), build_id = %manifest.build_id, version = %manifest.version, "manifest written");
  Ok(path)
}

/// Load the manifest from `out_dir`. Returns `Ok(None)` if none has been written.
pub fn load_manifest(out_dir: &Path) -> Result<Option<BuildManifest>, ManifestError> {
  let path = manifest_path(out_dir);

  let content = match fs::read_to_string(&path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(source) => return Err(ManifestError::Read { path, source }),
  };

  serde_json::from_str(&content)
    .map(Some)
    .map_err(|source| ManifestError::Parse { path, source })
}

/// On-disk state of an artifact named by the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetState {
  Present,
  Missing,
  /// Content no longer hashes to the recorded value.
  Modified,
  Unreadable,
}

/// Check that `entry` still exists in `out_dir` with the recorded content.
pub fn check_asset(out_dir: &Path, entry: &AssetEntry) -> AssetState {
  let path = out_dir.join(&entry.filename);
  match hash_file(&path) {
    Ok(full) if full.0.starts_with(entry.hash.as_str()) => AssetState::Present,
    Ok(_) => AssetState::Modified,
    Err(e) if e.kind() == io::ErrorKind::NotFound => AssetState::Missing,
    Err(_) => AssetState::Unreadable,
  }
}

/// ISO-8601 timestamps with millisecond precision and a `Z` suffix.
mod iso8601 {
  use chrono::{DateTime, SecondsFormat, Utc};
  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
      .map(|dt| dt.with_timezone(&Utc))
      .map_err(serde::de::Error::custom)
  }
}

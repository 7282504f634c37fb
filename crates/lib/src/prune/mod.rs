//! Retention pruning of superseded hashed artifacts.
//!
//! For each artifact kind the output directory is scanned for files shaped
//! `<stem>.<hash>.<ext>`. The newest `retention` files by modification time
//! are kept and the rest deleted. The artifact of the current build is always
//! kept. Individual stat or delete failures are logged and skipped.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::artifact::{ArtifactKind, parse_artifact_filename};
use crate::config::BuildConfig;
use crate::manifest::{BuildManifest, ManifestError, load_manifest};

#[derive(Debug, Error)]
pub enum PruneError {
  #[error("failed to list output directory {path}: {source}")]
  List {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error(transparent)]
  Manifest(#[from] ManifestError),
}

/// One artifact kind to prune.
#[derive(Debug, Clone)]
pub struct PruneTarget {
  pub kind: ArtifactKind,
  pub stem: String,
  /// Filename of the live artifact, never deleted.
  pub current: Option<String>,
}

impl PruneTarget {
  /// One target per kind, protecting whatever `manifest` names.
  pub fn from_manifest(config: &BuildConfig, manifest: Option<&BuildManifest>) -> Vec<PruneTarget> {
    ArtifactKind::ALL
      .iter()
      .map(|&kind| PruneTarget {
        kind,
        stem: match kind {
          ArtifactKind::Script => config.bundle_stem.clone(),
          ArtifactKind::Style => config.style_stem.clone(),
        },
        current: manifest.and_then(|m| m.asset(kind)).map(|a| a.filename.clone()),
      })
      .collect()
  }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PruneStats {
  pub scanned: usize,
  pub kept: usize,
  pub deleted: usize,
  pub failed: usize,
  pub bytes_freed: u64,
}

#[derive(Debug, Default, Serialize)]
pub struct PruneResult {
  pub stats: PruneStats,
  pub retention: usize,
  pub dry_run: bool,
  pub kept_paths: Vec<PathBuf>,
  pub deleted_paths: Vec<PathBuf>,
}

#[derive(Debug)]
struct Candidate {
  filename: String,
  path: PathBuf,
  modified: SystemTime,
  size: u64,
}

fn list_matching(out_dir: &Path, target: &PruneTarget) -> Result<Vec<(String, PathBuf)>, PruneError> {
  let mut matches = Vec::new();

  for entry in WalkDir::new(out_dir).min_depth(1).max_depth(1) {
    let entry = entry.map_err(|source| PruneError::List {
      path: out_dir.to_path_buf(),
      source,
    })?;
    if !entry.file_type().is_file() {
      continue;
    }
    let Some(name) = entry.file_name().to_str() else {
      continue;
    };
    if parse_artifact_filename(name, &target.stem, target.kind).is_some() {
      matches.push((name.to_string(), entry.into_path()));
    }
  }

  Ok(matches)
}

/// Stat every file concurrently. Files that cannot be stat-ed are dropped.
async fn stat_all(files: Vec<(String, PathBuf)>) -> Vec<Candidate> {
  let mut join_set = JoinSet::new();
  for (filename, path) in files {
    join_set.spawn(async move {
      let result = tokio::fs::metadata(&path).await.and_then(|m| Ok((m.modified()?, m.len())));
      (filename, path, result)
    });
  }

  let mut candidates = Vec::new();
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((filename, path, Ok((modified, size)))) => candidates.push(Candidate {
        filename,
        path,
        modified,
        size,
      }),
      Ok((_, path, Err(e))) => {
        warn!(path = %path.display(), error = %e, "failed to stat artifact; leaving it in place");
      }
      Err(e) => error!(error = %e, "artifact stat task panicked"),
    }
  }
  candidates
}

/// Keep order: the current artifact, then newest first, then by filename.
fn order_candidates(candidates: &mut [Candidate], current: Option<&str>) {
  candidates.sort_by(|a, b| {
    let a_current = current == Some(a.filename.as_str());
    let b_current = current == Some(b.filename.as_str());
    b_current
      .cmp(&a_current)
      .then_with(|| Reverse(a.modified).cmp(&Reverse(b.modified)))
      .then_with(|| a.filename.cmp(&b.filename))
  });
}

/// Apply the retention policy to every target in `out_dir`.
pub async fn prune_artifacts(
  out_dir: &Path,
  targets: &[PruneTarget],
  retention: usize,
  dry_run: bool,
) -> Result<PruneResult, PruneError> {
  let mut result = PruneResult {
    retention,
    dry_run,
    ..Default::default()
  };

  if !out_dir.is_dir() {
    debug!(path = %out_dir.display(), "output directory does not exist; nothing to prune");
    return Ok(result);
  }

  for target in targets {
    let files = list_matching(out_dir, target)?;
    let mut candidates = stat_all(files).await;
    result.stats.scanned += candidates.len();
    order_candidates(&mut candidates, target.current.as_deref());

    let split = retention.min(candidates.len());
    let (keep, remove) = candidates.split_at(split);

    for candidate in keep {
      debug!(kind = %target.kind, filename = %candidate.filename, "artifact retained");
      result.stats.kept += 1;
      result.kept_paths.push(candidate.path.clone());
    }

    for candidate in remove {
      if dry_run {
        debug!(path = %candidate.path.display(), "would remove superseded artifact");
      } else if let Err(e) = tokio::fs::remove_file(&candidate.path).await {
        warn!(path = %candidate.path.display(), error = %e, "failed to delete superseded artifact");
        result.stats.failed += 1;
        continue;
      } else {
        debug!(path = %candidate.path.display(), "removed superseded artifact");
      }
      result.stats.deleted += 1;
      result.stats.bytes_freed += candidate.size;
      result.deleted_paths.push(candidate.path.clone());
    }
  }

  info!(
    kept = result.stats.kept,
    deleted = result.stats.deleted,
    failed = result.stats.failed,
    bytes_freed = result.stats.bytes_freed,
    retention,
    dry_run,
    "artifact pruning complete"
  );

  Ok(result)
}

/// Standalone pruning pass protecting the artifacts named by the current manifest.
pub async fn prune_output(config: &BuildConfig, dry_run: bool) -> Result<PruneResult, PruneError> {
  let manifest = load_manifest(&config.out_dir)?;
  if manifest.is_none() {
    warn!(path = %config.out_dir.display(), "no manifest found; no artifact is protected as current");
  }
  let targets = PruneTarget::from_manifest(config, manifest.as_ref());
  prune_artifacts(&config.out_dir, &targets, config.retention, dry_run).await
}

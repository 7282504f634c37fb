//! The build pipeline.
//!
//! One invocation runs the steps strictly in order:
//!
//! 1. load the module graph from the entry file
//! 2. emit the bundle and write it as a hashed artifact
//! 3. aggregate and write the stylesheet (omitted when no source exists)
//! 4. write the manifest
//! 5. synchronize consumer documents
//! 6. prune superseded artifacts (production only)
//!
//! Failures in steps 1 through 4 abort the build before a manifest is
//! written. Synchronization and pruning failures are reported but never fail
//! the build.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::artifact::{Artifact, ArtifactError, ArtifactKind, write_artifact};
use crate::bundle::emit_bundle;
use crate::bundle::strip::{strip_script, strip_style};
use crate::config::{BuildConfig, BuildMode, ConfigError};
use crate::graph::{ExternalRef, GraphError, ModuleGraph, load_graph};
use crate::manifest::{BuildManifest, ManifestError, generate_build_id, write_manifest};
use crate::prune::{PruneResult, PruneTarget, prune_artifacts};
use crate::styles::{StyleError, StyleOrigin, aggregate_styles};
use crate::sync::{References, SyncReport, sync_documents};

#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("failed to create output directory {path}: {source}")]
  OutputDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Style(#[from] StyleError),

  #[error(transparent)]
  Artifact(#[from] ArtifactError),

  #[error(transparent)]
  Manifest(#[from] ManifestError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
  Graph,
  Script,
  Style,
  Manifest,
  Sync,
  Prune,
}

impl Step {
  pub fn as_str(&self) -> &'static str {
    match self {
      Step::Graph => "graph",
      Step::Script => "script",
      Step::Style => "style",
      Step::Manifest => "manifest",
      Step::Sync => "sync",
      Step::Prune => "prune",
    }
  }
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum StepOutcome {
  Ok(String),
  /// Completed with logged warnings.
  Warn(String),
  Skipped(String),
  Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
  pub step: Step,
  pub outcome: StepOutcome,
}

#[derive(Debug, Serialize)]
pub struct BuildReport {
  pub build_id: String,
  pub mode: BuildMode,
  pub version: String,
  pub out_dir: PathBuf,
  pub manifest_path: PathBuf,
  pub modules: usize,
  pub externals: Vec<ExternalRef>,
  pub artifacts: Vec<Artifact>,
  pub steps: Vec<StepReport>,
  pub sync: SyncReport,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub prune: Option<PruneResult>,
  pub duration_ms: u128,
}

impl BuildReport {
  pub fn artifact(&self, kind: ArtifactKind) -> Option<&Artifact> {
    self.artifacts.iter().find(|a| a.kind == kind)
  }
}

/// State of one build invocation. Owned by the pipeline and dropped with it,
/// so repeated builds in one process never share loader state.
struct BuildContext<'a> {
  config: &'a BuildConfig,
  mode: BuildMode,
  build_id: String,
  started_at: DateTime<Utc>,
  clock: Instant,
  graph: Option<ModuleGraph>,
  artifacts: Vec<Artifact>,
  steps: Vec<StepReport>,
}

impl<'a> BuildContext<'a> {
  fn new(config: &'a BuildConfig, mode: BuildMode) -> Self {
    Self {
      config,
      mode,
      build_id: generate_build_id(),
      started_at: Utc::now(),
      clock: Instant::now(),
      graph: None,
      artifacts: Vec::new(),
      steps: Vec::new(),
    }
  }

  fn record(&mut self, step: Step, outcome: StepOutcome) {
    debug!(step = %step, outcome = ?outcome, "step finished");
    self.steps.push(StepReport { step, outcome });
  }

  fn prepare_output(&self) -> Result<(), BuildError> {
    std::fs::create_dir_all(&self.config.out_dir).map_err(|source| BuildError::OutputDir {
      path: self.config.out_dir.clone(),
      source,
    })
  }

  fn load_graph(&mut self) -> Result<(), BuildError> {
    let graph = load_graph(&self.config.entry)?;
    let externals = graph.externals();
    let detail = format!("{} module(s), {} external reference(s)", graph.len(), externals.len());
    let outcome = if externals.is_empty() {
      StepOutcome::Ok(detail)
    } else {
      StepOutcome::Warn(detail)
    };
    self.record(Step::Graph, outcome);
    self.graph = Some(graph);
    Ok(())
  }

  fn write_script(&mut self) -> Result<(), BuildError> {
    let Some(graph) = self.graph.as_ref() else {
      return Ok(());
    };
    let bundle = emit_bundle(graph);
    let code = if self.mode.is_production() {
      strip_script(&bundle.code)
    } else {
      bundle.code
    };

    let artifact = write_artifact(
      &self.config.out_dir,
      ArtifactKind::Script,
      &self.config.bundle_stem,
      code.as_bytes(),
    )?;
    self.record(Step::Script, StepOutcome::Ok(artifact.filename.clone()));
    self.artifacts.push(artifact);
    Ok(())
  }

  fn write_style(&mut self) -> Result<(), BuildError> {
    let Some(sheet) = aggregate_styles(&self.config.style_root, &self.config.legacy_style)? else {
      self.record(Step::Style, StepOutcome::Skipped("no stylesheet sources found".into()));
      return Ok(());
    };

    let css = if self.mode.is_production() {
      strip_style(&sheet.css)
    } else {
      sheet.css
    };

    let artifact = write_artifact(
      &self.config.out_dir,
      ArtifactKind::Style,
      &self.config.style_stem,
      css.as_bytes(),
    )?;
    let detail = match sheet.origin {
      StyleOrigin::Modular(_) => artifact.filename.clone(),
      StyleOrigin::Legacy(_) => format!("{} (legacy stylesheet)", artifact.filename),
    };
    self.record(Step::Style, StepOutcome::Ok(detail));
    self.artifacts.push(artifact);
    Ok(())
  }

  fn write_manifest(&mut self) -> Result<(BuildManifest, PathBuf), BuildError> {
    let manifest = BuildManifest::new(self.build_id.clone(), self.mode, self.started_at, &self.artifacts);
    let path = write_manifest(&self.config.out_dir, &manifest)?;
    self.record(Step::Manifest, StepOutcome::Ok(format!("version {}", manifest.version)));
    Ok((manifest, path))
  }

  async fn sync(&mut self, manifest: &BuildManifest) -> SyncReport {
    let refs = References::new(
      manifest,
      &self.config.bundle_stem,
      &self.config.style_stem,
      &self.config.version_meta,
    );
    let report = sync_documents(&self.config.documents, &refs).await;

    let detail = format!(
      "{} updated, {} unchanged, {} missing",
      report.updated.len(),
      report.unchanged.len(),
      report.missing.len()
    );
    let outcome = if !report.failed.is_empty() {
      StepOutcome::Failed(format!("{} document(s) failed; {}", report.failed.len(), detail))
    } else if !report.missing.is_empty() {
      StepOutcome::Warn(detail)
    } else {
      StepOutcome::Ok(detail)
    };
    self.record(Step::Sync, outcome);
    report
  }

  async fn prune(&mut self, manifest: &BuildManifest) -> Option<PruneResult> {
    if !self.mode.is_production() {
      self.record(Step::Prune, StepOutcome::Skipped("development build".into()));
      return None;
    }

    let targets = PruneTarget::from_manifest(self.config, Some(manifest));
    match prune_artifacts(&self.config.out_dir, &targets, self.config.retention, false).await {
      Ok(result) => {
        let detail = format!(
          "kept {}, removed {} (retention {})",
          result.stats.kept, result.stats.deleted, result.retention
        );
        let outcome = if result.stats.failed > 0 {
          StepOutcome::Warn(format!("{}, {} failed", detail, result.stats.failed))
        } else {
          StepOutcome::Ok(detail)
        };
        self.record(Step::Prune, outcome);
        Some(result)
      }
      Err(e) => {
        warn!(error = %e, "artifact pruning failed");
        self.record(Step::Prune, StepOutcome::Failed(e.to_string()));
        None
      }
    }
  }
}

/// Run one build of the project described by `config`.
pub async fn run_build(config: &BuildConfig, mode: BuildMode) -> Result<BuildReport, BuildError> {
  let mut ctx = BuildContext::new(config, mode);
  info!(build_id = %ctx.build_id, mode = %mode, entry = %config.entry.display(), "build started");

  ctx.prepare_output()?;
  ctx.load_graph()?;
  ctx.write_script()?;
  ctx.write_style()?;
  let (manifest, manifest_path) = ctx.write_manifest()?;

  let sync = ctx.sync(&manifest).await;
  let prune = ctx.prune(&manifest).await;

  let duration_ms = ctx.clock.elapsed().as_millis();
  info!(
    build_id = %ctx.build_id,
    version = %manifest.version,
    duration_ms = duration_ms as u64,
    "build complete"
  );

  let (modules, externals) = ctx
    .graph
    .as_ref()
    .map(|g| (g.len(), g.externals()))
    .unwrap_or_default();

  Ok(BuildReport {
    build_id: ctx.build_id,
    mode,
    version: manifest.version,
    out_dir: config.out_dir.clone(),
    manifest_path,
    modules,
    externals,
    artifacts: ctx.artifacts,
    steps: ctx.steps,
    sync,
    prune,
    duration_ms,
  })
}

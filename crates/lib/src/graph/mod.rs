//! Source module graph.
//!
//! The graph holds every locally resolvable module reachable from the entry
//! file. Node indices are assigned in depth-first discovery order, so a
//! module's [`ModuleId`] is its discovery rank and the entry module is id 0.

mod directive;
mod loader;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

pub use directive::{Binding, Directive, DirectiveKind, ScanResult, Unsupported, scan};
pub use loader::{GraphError, load_graph};

/// Dense, build-local module identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ModuleId(pub usize);

impl fmt::Display for ModuleId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<NodeIndex> for ModuleId {
  fn from(index: NodeIndex) -> Self {
    ModuleId(index.index())
  }
}

/// Why a directive target is not part of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalReason {
  /// Not a relative path (`lodash`, `/abs.js`, `https://...`).
  Bare,
  /// Relative path that does not name an existing file.
  Missing,
  /// The file exists but could not be read.
  Unreadable,
}

impl ExternalReason {
  pub fn as_str(&self) -> &'static str {
    match self {
      ExternalReason::Bare => "bare",
      ExternalReason::Missing => "missing",
      ExternalReason::Unreadable => "unreadable",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
  Local(ModuleId),
  External(ExternalReason),
}

/// A directive together with where its specifier resolved to.
///
/// `target` is `None` for directives that reference no other file (local exports).
#[derive(Debug, Clone)]
pub struct ResolvedDirective {
  pub directive: Directive,
  pub target: Option<Target>,
}

/// One file in the graph. Immutable once loading completes.
#[derive(Debug, Clone)]
pub struct SourceModule {
  /// Canonical absolute path.
  pub path: PathBuf,
  pub source: String,
  pub directives: Vec<ResolvedDirective>,
}

/// External dependency record for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalRef {
  pub module: PathBuf,
  pub specifier: String,
  pub reason: ExternalReason,
}

#[derive(Debug)]
pub struct ModuleGraph {
  graph: DiGraph<SourceModule, ()>,
  ids: HashMap<PathBuf, NodeIndex>,
  entry: NodeIndex,
}

impl ModuleGraph {
  pub fn entry(&self) -> ModuleId {
    self.entry.into()
  }

  pub fn entry_module(&self) -> &SourceModule {
    &self.graph[self.entry]
  }

  /// Directory of the entry module; module labels are relative to it.
  pub fn base_dir(&self) -> &Path {
    self.entry_module().path.parent().unwrap_or(Path::new(""))
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  pub fn id_of(&self, path: &Path) -> Option<ModuleId> {
    self.ids.get(path).map(|idx| (*idx).into())
  }

  /// Modules in discovery order.
  pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &SourceModule)> {
    self
      .graph
      .node_indices()
      .map(move |idx| (ModuleId::from(idx), &self.graph[idx]))
  }

  /// Distinct local dependencies of `id`, sorted by id.
  pub fn dependencies(&self, id: ModuleId) -> Vec<ModuleId> {
    let mut deps: Vec<ModuleId> = self.graph.neighbors(NodeIndex::new(id.0)).map(ModuleId::from).collect();
    deps.sort();
    deps.dedup();
    deps
  }

  /// Every directive whose target stayed outside the graph.
  pub fn externals(&self) -> Vec<ExternalRef> {
    self
      .modules()
      .flat_map(|(_, module)| {
        module.directives.iter().filter_map(move |rd| match (&rd.target, &rd.directive.specifier) {
          (Some(Target::External(reason)), Some(spec)) => Some(ExternalRef {
            module: module.path.clone(),
            specifier: spec.clone(),
            reason: *reason,
          }),
          _ => None,
        })
      })
      .collect()
  }
}

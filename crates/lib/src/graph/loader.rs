//! Depth-first module graph loading.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use super::directive::scan;
use super::{ExternalReason, ModuleGraph, ResolvedDirective, SourceModule, Target};
use crate::consts::SCRIPT_EXTENSION;
use crate::util::paths::normalize;

#[derive(Debug, Error)]
pub enum GraphError {
  #[error("entry module {path} not found")]
  EntryNotFound { path: PathBuf },

  #[error("failed to read entry module {path}: {source}")]
  EntryRead {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Load the module graph rooted at `entry`.
///
/// Only relative specifiers (`./`, `../`) that name an existing, readable file
/// join the graph. Everything else is recorded as [`Target::External`] and the
/// load continues. Only a missing or unreadable entry file is an error.
pub fn load_graph(entry: &Path) -> Result<ModuleGraph, GraphError> {
  let canonical = dunce::canonicalize(entry).map_err(|source| {
    if source.kind() == io::ErrorKind::NotFound {
      GraphError::EntryNotFound {
        path: entry.to_path_buf(),
      }
    } else {
      GraphError::EntryRead {
        path: entry.to_path_buf(),
        source,
      }
    }
  })?;

  let source = fs::read_to_string(&canonical).map_err(|source| GraphError::EntryRead {
    path: canonical.clone(),
    source,
  })?;

  let mut loader = Loader::default();
  let entry = loader.visit(canonical, source);

  let graph = ModuleGraph {
    graph: loader.graph,
    ids: loader.ids,
    entry,
  };

  info!(
    modules = graph.len(),
    externals = graph.externals().len(),
    "module graph loaded"
  );

  Ok(graph)
}

#[derive(Default)]
struct Loader {
  graph: DiGraph<SourceModule, ()>,
  ids: HashMap<PathBuf, NodeIndex>,
  unreadable: HashSet<PathBuf>,
}

impl Loader {
  /// Register `path` and recurse into its dependencies. Returns its node.
  fn visit(&mut self, path: PathBuf, source: String) -> NodeIndex {
    let scanned = scan(&source);
    for unsupported in &scanned.unsupported {
      warn!(
        module = %path.display(),
        line = unsupported.line,
        text = %unsupported.text,
        "unsupported directive form left unchanged"
      );
    }

    // Registered before recursing so the id reflects discovery order and cycles terminate.
    let idx = self.graph.add_node(SourceModule {
      path: path.clone(),
      source,
      directives: Vec::new(),
    });
    self.ids.insert(path.clone(), idx);
    trace!(module = %path.display(), id = idx.index(), "module discovered");

    let dir = path.parent().unwrap_or(Path::new(""));
    let mut resolved = Vec::with_capacity(scanned.directives.len());
    for directive in scanned.directives {
      let target = directive
        .specifier
        .as_deref()
        .map(|spec| self.resolve(idx, &path, dir, spec));
      resolved.push(ResolvedDirective { directive, target });
    }

    self.graph[idx].directives = resolved;
    idx
  }

  fn resolve(&mut self, from: NodeIndex, from_path: &Path, dir: &Path, spec: &str) -> Target {
    let Some(candidate) = candidate_path(dir, spec) else {
      debug!(module = %from_path.display(), specifier = spec, "bare specifier left external");
      return Target::External(ExternalReason::Bare);
    };

    if !candidate.is_file() {
      warn!(
        module = %from_path.display(),
        specifier = spec,
        "relative import does not resolve to a file; leaving it external"
      );
      return Target::External(ExternalReason::Missing);
    }

    let canonical = dunce::canonicalize(&candidate).unwrap_or(candidate);

    let idx = match self.ids.get(&canonical) {
      Some(idx) => *idx,
      None if self.unreadable.contains(&canonical) => return Target::External(ExternalReason::Unreadable),
      None => match fs::read_to_string(&canonical) {
        Ok(source) => self.visit(canonical, source),
        Err(e) => {
          warn!(
            module = %canonical.display(),
            error = %e,
            "failed to read module; leaving it out of the bundle"
          );
          self.unreadable.insert(canonical);
          return Target::External(ExternalReason::Unreadable);
        }
      },
    };

    self.graph.update_edge(from, idx, ());
    Target::Local(idx.into())
  }
}

/// Resolve a relative specifier against `dir`, appending `.js` when the
/// specifier has no script extension. Returns `None` for non-relative specifiers.
fn candidate_path(dir: &Path, spec: &str) -> Option<PathBuf> {
  if !(spec.starts_with("./") || spec.starts_with("../")) {
    return None;
  }

  let has_extension = Path::new(spec)
    .extension()
    .is_some_and(|ext| ext == SCRIPT_EXTENSION || ext == "mjs");

  let spec = if has_extension {
    spec.to_string()
  } else {
    format!("{}.{}", spec, SCRIPT_EXTENSION)
  };

  Some(normalize(&dir.join(spec)))
}

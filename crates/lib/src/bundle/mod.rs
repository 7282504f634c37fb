//! Bundle emission.
//!
//! Turns a [`ModuleGraph`] into one self-executing script. Each module body
//! becomes an initializer registered under its [`ModuleId`]; directives are
//! rewritten into calls against a small runtime loader that caches module
//! objects so every initializer runs at most once.
//!
//! # Output shape
//!
//! ```text
//! (function () {
//!   <runtime: registry, cache, loader>
//!   // js/main.js
//!   __sitepack_modules[0] = function (module, exports, __sitepack_require) {
//!   <rewritten body>
//!   };
//!   ...
//!   __sitepack_require(<entry id>);
//! })();
//! ```

pub mod strip;

use tracing::{debug, info};

use crate::graph::{Binding, DirectiveKind, ExternalRef, ModuleGraph, ModuleId, ResolvedDirective, SourceModule, Target};
use crate::util::paths::{diff_paths, to_slash};

const REGISTRY: &str = "__sitepack_modules";
const LOADER: &str = "__sitepack_require";
const EXPORT_ALL: &str = "__sitepack_export_all";

/// The emitted script plus what went into it.
#[derive(Debug, Clone)]
pub struct Bundle {
  pub code: String,
  pub modules: Vec<ModuleId>,
  pub externals: Vec<ExternalRef>,
}

/// Emit the bundle for `graph`.
///
/// Output bytes depend only on module contents and their paths relative to
/// the entry directory, never on absolute locations.
pub fn emit_bundle(graph: &ModuleGraph) -> Bundle {
  let base = graph.base_dir();
  let mut code = String::new();

  code.push_str(&format!(
    "/* sitepack bundle: {} module(s), entry {} */\n",
    graph.len(),
    module_label(base, graph.entry_module())
  ));
  code.push_str(&runtime_preamble());

  let mut modules = Vec::with_capacity(graph.len());
  for (id, module) in graph.modules() {
    let label = module_label(base, module);
    debug!(id = id.0, module = %label, "emitting module");

    code.push_str(&format!("  // {}\n", label));
    code.push_str(&format!(
      "  {}[{}] = function (module, exports, {}) {{\n",
      REGISTRY, id, LOADER
    ));
    code.push_str(&transform_module(module));
    if !code.ends_with('\n') {
      code.push('\n');
    }
    code.push_str("  };\n");
    modules.push(id);
  }

  code.push_str(&format!("  {}({});\n", LOADER, graph.entry()));
  code.push_str("})();\n");

  let externals = graph.externals();
  info!(modules = modules.len(), externals = externals.len(), bytes = code.len(), "bundle emitted");

  Bundle {
    code,
    modules,
    externals,
  }
}

fn module_label(base: &std::path::Path, module: &SourceModule) -> String {
  to_slash(&diff_paths(&module.path, base))
}

fn runtime_preamble() -> String {
  format!(
    r#"(function () {{
  'use strict';
  var {registry} = {{}};
  var __sitepack_cache = {{}};
  function {loader}(id) {{
    var cached = __sitepack_cache[id];
    if (cached) {{
      return cached.exports;
    }}
    var module = {{ id: id, exports: {{}} }};
    __sitepack_cache[id] = module;
    {registry}[id](module, module.exports, {loader});
    return module.exports;
  }}
  function {export_all}(target, source) {{
    Object.keys(source).forEach(function (key) {{
      if (key !== 'default') {{
        target[key] = source[key];
      }}
    }});
  }}
"#,
    registry = REGISTRY,
    loader = LOADER,
    export_all = EXPORT_ALL,
  )
}

/// Rewrite one module's directives in place.
///
/// Export declarations keep their declaration and get an `exports.x = x;`
/// assignment appended after the body.
pub fn transform_module(module: &SourceModule) -> String {
  let source = module.source.as_str();
  let mut out = String::with_capacity(source.len() + 256);
  let mut trailing = Vec::new();
  let mut cursor = 0;

  for resolved in &module.directives {
    let span = &resolved.directive.span;
    out.push_str(&source[cursor..span.start]);
    out.push_str(&rewrite(resolved, &mut trailing));
    cursor = span.end;
  }
  out.push_str(&source[cursor..]);

  if !trailing.is_empty() {
    if !out.ends_with('\n') {
      out.push('\n');
    }
    for line in trailing {
      out.push_str(&line);
      out.push('\n');
    }
  }

  out
}

fn require(id: ModuleId) -> String {
  format!("{}({})", LOADER, id)
}

fn rewrite(resolved: &ResolvedDirective, trailing: &mut Vec<String>) -> String {
  let directive = &resolved.directive;

  match (&directive.kind, &resolved.target) {
    (DirectiveKind::ExportDefaultExpr, _) => "exports.default = ".to_string(),
    (DirectiveKind::ExportDefaultDecl { name }, _) => {
      trailing.push(format!("exports.default = {};", name));
      String::new()
    }
    (DirectiveKind::ExportDecl { names }, _) => {
      trailing.extend(names.iter().map(|name| format!("exports.{} = {};", name, name)));
      String::new()
    }
    (DirectiveKind::ExportList { bindings }, _) => bindings
      .iter()
      .map(|Binding { name, alias }| format!("exports.{} = {};", alias, name))
      .collect::<Vec<_>>()
      .join(" "),

    (
      DirectiveKind::Import {
        default,
        namespace,
        named,
      },
      Some(Target::Local(id)),
    ) => {
      let mut parts = Vec::new();
      if let Some(local) = default {
        parts.push(format!("var {} = {}.default;", local, require(*id)));
      }
      if let Some(local) = namespace {
        parts.push(format!("var {} = {};", local, require(*id)));
      }
      for Binding { name, alias } in named {
        parts.push(format!("var {} = {}.{};", alias, require(*id), name));
      }
      if parts.is_empty() {
        parts.push(format!("{};", require(*id)));
      }
      parts.join(" ")
    }
    (DirectiveKind::ReExport { bindings }, Some(Target::Local(id))) => bindings
      .iter()
      .map(|Binding { name, alias }| format!("exports.{} = {}.{};", alias, require(*id), name))
      .collect::<Vec<_>>()
      .join(" "),
    (DirectiveKind::ReExportAll, Some(Target::Local(id))) => {
      format!("{}(exports, {});", EXPORT_ALL, require(*id))
    }

    (_, Some(Target::External(reason))) => external_comment(directive.specifier.as_deref(), reason.as_str()),
    // Import forms always carry a specifier, so the loader always sets a target.
    (_, None) => external_comment(directive.specifier.as_deref(), "unresolved"),
  }
}

/// Replacement for a directive whose target is outside the bundle. Its
/// bindings fall through to globals provided by the page.
fn external_comment(specifier: Option<&str>, reason: &str) -> String {
  let specifier = specifier.unwrap_or("").replace("*/", "*\\/");
  format!("/* sitepack: external '{}' ({}) */", specifier, reason)
}

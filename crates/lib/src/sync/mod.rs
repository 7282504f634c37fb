//! Consumer document synchronization.
//!
//! Rewrites artifact references in HTML documents to the filenames of the
//! current manifest and upserts a version meta tag. Only the `src` attribute
//! of `<script>` tags and the `href` attribute of `<link>` tags are touched,
//! and only when the referenced file name has the bundler's shape
//! (`<stem>.<ext>` or `<stem>.<hex>.<ext>`). Running twice with the same
//! manifest leaves documents byte-identical.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::artifact::ArtifactKind;
use crate::config::ConsumerDocument;
use crate::manifest::BuildManifest;

static TAG_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?is)<(script|link)\b[^>]*>").expect("valid tag pattern"));

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(?i)(\s)(src|href)(\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).expect("valid attribute pattern")
});

static CHARSET_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*\bcharset\s*=[^>]*>").expect("valid charset pattern"));

static HEAD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<head\b[^>]*>").expect("valid head pattern"));

/// One artifact a document may reference.
#[derive(Debug, Clone)]
struct AssetRef {
  kind: ArtifactKind,
  stem: String,
  filename: String,
}

/// Everything a document rewrite needs from the current build.
#[derive(Debug, Clone)]
pub struct References {
  assets: Vec<AssetRef>,
  version: String,
  meta_re: Regex,
  meta_tag: String,
}

impl References {
  pub fn new(manifest: &BuildManifest, bundle_stem: &str, style_stem: &str, meta_name: &str) -> Self {
    let assets = ArtifactKind::ALL
      .iter()
      .filter_map(|kind| {
        let stem = match kind {
          ArtifactKind::Script => bundle_stem,
          ArtifactKind::Style => style_stem,
        };
        manifest.asset(*kind).map(|entry| AssetRef {
          kind: *kind,
          stem: stem.to_string(),
          filename: entry.filename.clone(),
        })
      })
      .collect();

    let meta_re = Regex::new(&format!(
      r#"(?is)<meta\b[^>]*\bname\s*=\s*["']{}["'][^>]*>"#,
      regex::escape(meta_name)
    ))
    .expect("escaped meta pattern is valid");

    Self {
      assets,
      version: manifest.version.clone(),
      meta_re,
      meta_tag: format!(r#"<meta name="{}" content="{}">"#, meta_name, manifest.version),
    }
  }

  pub fn version(&self) -> &str {
    &self.version
  }
}

/// `name` is `<stem>.<ext>` or `<stem>.<hex>.<ext>`.
fn matches_artifact(name: &str, stem: &str, kind: ArtifactKind) -> bool {
  let Some(rest) = name.strip_prefix(stem).and_then(|r| r.strip_prefix('.')) else {
    return false;
  };
  let Some(middle) = rest.strip_suffix(kind.extension()) else {
    return false;
  };
  if middle.is_empty() {
    return true;
  }
  middle
    .strip_suffix('.')
    .is_some_and(|hash| !hash.is_empty() && hash.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn rewrite_value(value: &str, tag: &str, refs: &References, prefix: &str) -> Option<String> {
  let path = value.split(['?', '#']).next().unwrap_or(value);
  let name = path.rsplit('/').next().unwrap_or(path);

  refs
    .assets
    .iter()
    .filter(|asset| match asset.kind {
      ArtifactKind::Script => tag == "script",
      ArtifactKind::Style => tag == "link",
    })
    .find(|asset| matches_artifact(name, &asset.stem, asset.kind))
    .map(|asset| format!("{}{}", prefix, asset.filename))
}

fn rewrite_tag(tag: &str, refs: &References, prefix: &str) -> String {
  let tag_name = tag[1..]
    .split(|c: char| !c.is_ascii_alphanumeric())
    .next()
    .unwrap_or("")
    .to_ascii_lowercase();
  let wanted_attr = if tag_name == "script" { "src" } else { "href" };

  ATTR_RE
    .replace_all(tag, |caps: &Captures| {
      if !caps[2].eq_ignore_ascii_case(wanted_attr) {
        return caps[0].to_string();
      }
      let (value, quote) = match (caps.get(4), caps.get(5)) {
        (Some(v), _) => (v.as_str(), '"'),
        (_, Some(v)) => (v.as_str(), '\''),
        _ => return caps[0].to_string(),
      };
      match rewrite_value(value, &tag_name, refs, prefix) {
        Some(new_value) => format!("{}{}{}{}{}{}", &caps[1], &caps[2], &caps[3], quote, new_value, quote),
        None => caps[0].to_string(),
      }
    })
    .into_owned()
}

/// Leading whitespace of the line containing byte offset `at`.
fn line_indent(html: &str, at: usize) -> &str {
  let line_start = html[..at].rfind('\n').map(|i| i + 1).unwrap_or(0);
  let line = &html[line_start..];
  &line[..line.len() - line.trim_start_matches([' ', '\t']).len()]
}

fn upsert_meta(html: &str, refs: &References) -> Option<String> {
  if refs.meta_re.is_match(html) {
    return Some(refs.meta_re.replace_all(html, refs.meta_tag.as_str()).into_owned());
  }

  let (anchor_end, indent) = if let Some(m) = CHARSET_RE.find(html) {
    (m.end(), line_indent(html, m.start()).to_string())
  } else if let Some(m) = HEAD_RE.find(html) {
    (m.end(), format!("{}  ", line_indent(html, m.start())))
  } else {
    return None;
  };

  let mut out = String::with_capacity(html.len() + refs.meta_tag.len() + 8);
  out.push_str(&html[..anchor_end]);
  out.push('\n');
  out.push_str(&indent);
  out.push_str(&refs.meta_tag);
  out.push_str(&html[anchor_end..]);
  Some(out)
}

/// Rewrite one document's references and version meta tag.
///
/// Returns the new text and whether a meta tag anchor was found.
pub fn rewrite_document(html: &str, refs: &References, prefix: &str) -> (String, bool) {
  let rewritten = TAG_RE
    .replace_all(html, |caps: &Captures| rewrite_tag(&caps[0], refs, prefix))
    .into_owned();

  match upsert_meta(&rewritten, refs) {
    Some(with_meta) => (with_meta, true),
    None => (rewritten, false),
  }
}

#[derive(Debug, Error)]
pub enum SyncError {
  #[error("failed to read document {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write document {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

#[derive(Debug)]
enum Outcome {
  Updated,
  Unchanged,
  Missing,
  Failed(SyncError),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
  pub updated: Vec<PathBuf>,
  pub unchanged: Vec<PathBuf>,
  pub missing: Vec<PathBuf>,
  pub failed: Vec<(PathBuf, String)>,
}

async fn sync_one(path: PathBuf, prefix: String, refs: References) -> (PathBuf, Outcome) {
  let html = match tokio::fs::read_to_string(&path).await {
    Ok(html) => html,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      warn!(document = %path.display(), "consumer document not found; skipping");
      return (path, Outcome::Missing);
    }
    Err(source) => {
      let err = SyncError::Read { path: path.clone(), source };
      warn!(error = %err, "consumer document skipped");
      return (path, Outcome::Failed(err));
    }
  };

  let (rewritten, has_anchor) = rewrite_document(&html, &refs, &prefix);
  if !has_anchor {
    warn!(document = %path.display(), "no <meta charset> or <head> tag; version meta tag not inserted");
  }

  if rewritten == html {
    debug!(document = %path.display(), "document already up to date");
    return (path, Outcome::Unchanged);
  }

  match tokio::fs::write(&path, rewritten).await {
    Ok(()) => {
      info!(document = %path.display(), "document references updated");
      (path, Outcome::Updated)
    }
    Err(source) => {
      let err = SyncError::Write { path: path.clone(), source };
      warn!(error = %err, "consumer document not updated");
      (path, Outcome::Failed(err))
    }
  }
}

/// Rewrite every consumer document concurrently. Never fails; problems are
/// logged and reported per document.
pub async fn sync_documents(documents: &[ConsumerDocument], refs: &References) -> SyncReport {
  let mut join_set = JoinSet::new();
  let mut seen: HashSet<&Path> = HashSet::new();

  for document in documents {
    if !seen.insert(document.path.as_path()) {
      continue;
    }
    join_set.spawn(sync_one(document.path.clone(), document.prefix.clone(), refs.clone()));
  }

  let mut report = SyncReport::default();
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((path, Outcome::Updated)) => report.updated.push(path),
      Ok((path, Outcome::Unchanged)) => report.unchanged.push(path),
      Ok((path, Outcome::Missing)) => report.missing.push(path),
      Ok((path, Outcome::Failed(err))) => report.failed.push((path, err.to_string())),
      Err(e) => error!(error = %e, "document sync task panicked"),
    }
  }

  for list in [&mut report.updated, &mut report.unchanged, &mut report.missing] {
    list.sort();
  }
  report.failed.sort();

  info!(
    updated = report.updated.len(),
    unchanged = report.unchanged.len(),
    missing = report.missing.len(),
    failed = report.failed.len(),
    version = refs.version(),
    "consumer documents synchronized"
  );
  report
}

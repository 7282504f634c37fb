//! Path helpers.

use std::path::{Component, Path, PathBuf};

/// Render a path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
  path
    .components()
    .filter_map(|c| match c {
      Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
      Component::ParentDir => Some("..".to_string()),
      Component::CurDir => None,
      Component::RootDir | Component::Prefix(_) => Some(String::new()),
    })
    .collect::<Vec<_>>()
    .join("/")
}

/// `path` relative to `base` when it lives below it, otherwise `path` unchanged.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
  path.strip_prefix(base).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}

/// Lexically resolve `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !out.pop() {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

/// Relative path leading from directory `base` to `path`, using `..` where needed.
///
/// Both paths must be absolute (or both relative) for the result to be meaningful.
pub fn diff_paths(path: &Path, base: &Path) -> PathBuf {
  let path: Vec<Component> = path.components().collect();
  let base: Vec<Component> = base.components().collect();

  let common = path.iter().zip(base.iter()).take_while(|(a, b)| a == b).count();

  let mut out = PathBuf::new();
  for _ in common..base.len() {
    out.push("..");
  }
  for component in &path[common..] {
    out.push(component.as_os_str());
  }
  out
}

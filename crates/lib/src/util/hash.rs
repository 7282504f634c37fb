//! Content hashing for cache-busting filenames.
//!
//! This module provides:
//! - `AssetHash`: a truncated 10-character hash used in artifact filenames
//! - `ContentHash`: the full 64-character hash for verification
//! - `hash_bytes()` / `hash_file()`: arbitrary content hashing

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::ASSET_HASH_LEN;

/// A content-derived fingerprint naming one artifact.
///
/// The hash is the first [`ASSET_HASH_LEN`] characters of the lowercase
/// hex SHA-256 of the artifact bytes. It is a pure function of those bytes:
/// no timestamps, seeds or paths are mixed in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetHash(pub String);

impl AssetHash {
  pub fn of(data: &[u8]) -> Self {
    let full = hash_bytes(data);
    AssetHash(full.0[..ASSET_HASH_LEN].to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for AssetHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A full 64-character SHA256 hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}

/// Hash a file's contents, streaming in 8 KiB chunks.
pub fn hash_file(path: &Path) -> std::io::Result<ContentHash> {
  let mut file = fs::File::open(path)?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Returns true when `s` looks like an [`AssetHash`]: exact length, lowercase hex.
pub fn is_asset_hash(s: &str) -> bool {
  s.len() == ASSET_HASH_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

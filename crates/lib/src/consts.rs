//! Crate-wide constants.

/// Number of hex characters kept from the SHA-256 digest in artifact filenames.
pub const ASSET_HASH_LEN: usize = 10;

/// Name of the manifest written into the output directory.
pub const MANIFEST_FILENAME: &str = "build-manifest.json";

/// Optional per-project configuration file, looked up in the project root.
pub const CONFIG_FILENAME: &str = "sitepack.json";

/// Environment variable overriding the retention count.
pub const RETENTION_ENV: &str = "SITEPACK_RETENTION";

pub const DEFAULT_RETENTION: usize = 3;

/// Extension appended to module specifiers that omit one.
pub const SCRIPT_EXTENSION: &str = "js";

pub const STYLE_EXTENSION: &str = "css";

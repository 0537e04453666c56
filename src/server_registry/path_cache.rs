//! Remembers the last server configuration path across runs.

use std::path::{Path, PathBuf};

/// Used when no path was given and none was remembered.
pub const DEFAULT_CONFIG_FILE: &str = "mcp_config.json";

const CACHE_FILE: &str = "last_config_path";

/// Default location of the cache file inside the app data directory.
pub fn default_cache_file() -> PathBuf {
    crate::data_dir().join(CACHE_FILE)
}

/// The remembered config path, or `mcp_config.json` in the working directory.
pub fn saved_config_path(cache_file: &Path) -> PathBuf {
    match std::fs::read_to_string(cache_file) {
        Ok(contents) if !contents.trim().is_empty() => PathBuf::from(contents.trim()),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

/// Persist `config_path` (made absolute when possible). Failures are logged
/// and otherwise ignored.
pub fn save_config_path(cache_file: &Path, config_path: &Path) {
    let absolute = std::fs::canonicalize(config_path).unwrap_or_else(|_| config_path.to_path_buf());

    if let Some(parent) = cache_file.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!(path = %parent.display(), error = %e, "cannot create cache dir");
            return;
        }
    }

    if let Err(e) = std::fs::write(cache_file, absolute.to_string_lossy().as_bytes()) {
        tracing::warn!(path = %cache_file.display(), error = %e, "cannot save config path");
    }
}

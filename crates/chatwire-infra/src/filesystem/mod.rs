//! Local filesystem: data directory resolution and the file-backed store.

pub mod kv;

use std::path::PathBuf;

pub use kv::FileKv;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "CHATWIRE_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `CHATWIRE_DATA_DIR` environment variable
/// 2. `~/.chatwire`
/// 3. `./.chatwire`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".chatwire");
    }

    PathBuf::from(".chatwire")
}

/// Directory holding the persisted chat state inside the data directory.
pub fn store_dir(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("store")
}

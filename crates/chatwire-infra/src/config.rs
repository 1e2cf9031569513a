//! Client configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.chatwire/` in production)
//! and deserializes it into [`ClientConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::Path;

use chatwire_types::config::ClientConfig;

/// Name of the config file inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Load client configuration from `{data_dir}/config.toml`.
///
/// A missing file yields [`ClientConfig::default()`]; an unreadable or
/// unparsable one logs a warning and yields the default as well.
pub async fn load_client_config(data_dir: &Path) -> ClientConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ClientConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ClientConfig::default();
        }
    };

    match toml::from_str::<ClientConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ClientConfig::default()
        }
    }
}

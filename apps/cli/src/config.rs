//! Layered CLI configuration: optional TOML file, `CRYPTO_LIC__*`
//! environment overrides.

use clic::discovery::SearchPath;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application this CLI fronts; names the default config directory.
const APP_NAME: &str = "crypto-licensing";

/// Settings the engine does not take as per-call arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Search path directories, most-general first. Empty means the
    /// standard path (user config directory, then the working directory).
    pub search_path: Vec<PathBuf>,
    /// Directory for rolling log files; console-only when absent.
    pub log_path: Option<PathBuf>,
}

impl CliConfig {
    /// The effective search path.
    #[must_use]
    pub fn search_path(&self) -> SearchPath {
        if self.search_path.is_empty() {
            SearchPath::standard(APP_NAME)
        } else {
            SearchPath::new(self.search_path.clone())
        }
    }
}

/// Loads configuration: the file at `path` (optional, and optional on
/// disk), then environment overrides (`CRYPTO_LIC__SEARCH_PATH`, ...).
///
/// # Errors
/// Returns the underlying `config` error when the file exists but does not
/// parse, or when an override has the wrong shape.
pub fn load_config(path: Option<&Path>) -> Result<CliConfig, config::ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        debug!(path = %path.display(), "loading config file");
        builder = builder.add_source(File::from(path).required(true));
    }
    // `prefix_separator` keeps the bare credential variables
    // (CRYPTO_LIC_USERNAME / CRYPTO_LIC_PASSWORD) out of this layer; those
    // belong to the keystore's credential-candidate contract.
    builder = builder.add_source(
        Environment::with_prefix("CRYPTO_LIC").prefix_separator("__").separator("__"),
    );

    builder.build()?.try_deserialize::<CliConfig>()
}

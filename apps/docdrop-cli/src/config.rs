//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/docdrop/config.toml`
//! - Windows: `%APPDATA%/docdrop/config.toml`

use std::path::{Path, PathBuf};

use anyhow::Context;
use docdrop_upload::UploadConfig;
use serde::{Deserialize, Serialize};

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Upload engine settings (`[upload]` table).
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Config {
    /// Loads `path`, or the default location when `None`.
    ///
    /// An explicit path must exist. A missing default file is created with
    /// default values.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }

        let path = config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Config::default();
            if let Err(e) = config.save_to(&path) {
                tracing::warn!(path = %path.display(), error = %e, "could not write default configuration");
            }
            Ok(config)
        }
    }

    /// Parses the TOML file at `path`.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration read");
        Ok(config)
    }

    /// Writes the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("docdrop").join("config.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("docdrop")
            .join("config.toml"))
    }
}

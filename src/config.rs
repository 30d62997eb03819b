use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
}

/// Save-data directory configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Override the default campaign save root.
    pub save_root: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from `~/.config/solodm/config.toml`.
    /// Returns `Default` if the file is missing or unparseable.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    log::warn!(
                        "Failed to parse config at {}: {e} — using defaults",
                        config_path.display()
                    );
                    Self::default()
                }
            },
            Err(_) => {
                log::debug!(
                    "No config file at {} — using defaults",
                    config_path.display()
                );
                Self::default()
            }
        }
    }

    /// Resolved campaign save root (override or XDG default).
    pub fn save_root(&self) -> PathBuf {
        self.data.save_root.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("solodm").join("campaigns"))
                .unwrap_or_else(|| PathBuf::from("campaigns"))
        })
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("solodm").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }
}

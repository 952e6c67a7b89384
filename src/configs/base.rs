use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{common::types::AnyResult, configs::*};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub feeder: FeederConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Loads `config.toml`, then `config.default.toml`, then built-in defaults.
    pub fn load() -> AnyResult<Self> {
        let Some(config_path) = ["config.toml", "config.default.toml"]
            .into_iter()
            .find(|p| Path::new(p).exists())
        else {
            return Ok(Self::default());
        };

        Self::from_file(config_path)
    }

    pub fn from_file(path: impl AsRef<Path>) -> AnyResult<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)?;
        if config_str.trim().is_empty() {
            return Err(format!("{} is empty", path.display()).into());
        }

        Ok(toml::from_str(&config_str)?)
    }
}

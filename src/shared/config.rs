use crate::shared::errors::AppError;
use crate::shared::types::EngineConfig;
use std::fs;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from Config.toml in the working directory
    pub fn load_config() -> Result<EngineConfig, AppError> {
        Self::load_from(Path::new("Config.toml"))
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<EngineConfig, AppError> {
        let config_content = fs::read_to_string(path)
            .map_err(|e| AppError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: EngineConfig = toml::from_str(&config_content)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }
}

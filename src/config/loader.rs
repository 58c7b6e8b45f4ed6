use crate::config::types::Configuration;
use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use std::path::Path;

impl Configuration {
    /// Load the configuration file.
    ///
    /// A missing file is not an error: the fallback configuration is used instead.
    /// A file that exists but cannot be read or parsed is fatal.
    pub async fn try_load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());
        let config = if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Self::from_json(&content).with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            warn!("Config file {} not found, using default config", path.display());
            Self::fallback()
        };
        info!("Read proxy configuration: {} host(s) on port {}", config.hosts.len(), config.port);
        trace!("Configuration: {}", config);
        trace!("Loaded config: {:#?}", config);
        Ok(config)
    }

    /// Parse a configuration from its JSON representation
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str::<Configuration>(content)?)
    }
}

use crate::config::types::Configuration;
use crate::utils::validation::{validate_prefix, validate_target_url};
use anyhow::{Context, Result};

impl Configuration {
    /// Check the parts of the configuration that are fatal at startup
    pub fn validate(&self) -> Result<()> {
        self.port_number().with_context(|| format!("Invalid Port '{}' in configuration", self.port))?;
        Ok(())
    }

    /// Problems that do not stop the proxy but make some routes unusable.
    /// Sorted by prefix so the output is stable.
    pub fn warnings(&self) -> Vec<String> {
        let mut prefixes: Vec<&String> = self.hosts.keys().collect();
        prefixes.sort();

        let mut warnings = Vec::new();
        for prefix in prefixes {
            if let Err(e) = validate_prefix(prefix) {
                warnings.push(format!("{}; requests can never match it", e));
            }
            if let Err(e) = validate_target_url(&self.hosts[prefix]) {
                warnings.push(format!("Target for path prefix '{}': {}", prefix, e));
            }
        }
        warnings
    }
}

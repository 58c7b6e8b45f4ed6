use crate::utils::validation::parse_port;
use anyhow::{Result, anyhow};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Display;

pub const DEFAULT_PORT: &str = "8081";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

// Route used when no configuration file is present
const FALLBACK_PREFIX: &str = "1";
const FALLBACK_TARGET: &str = "https://www.alarm.com";

/// Routing table and listen port, loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    // Path prefix -> absolute backend base URL
    #[serde(rename = "Hosts", alias = "hosts", default)]
    pub(crate) hosts: HashMap<String, String>,
    #[serde(rename = "Port", alias = "port", deserialize_with = "port_or_default", default = "default_port")]
    pub(crate) port: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self { hosts: HashMap::new(), port: default_port() }
    }
}

impl Configuration {
    pub fn new(hosts: HashMap<String, String>, port: impl Into<String>) -> Self {
        Self { hosts, port: port.into() }
    }

    /// Configuration used when the config file does not exist
    pub fn fallback() -> Self {
        let mut hosts = HashMap::new();
        hosts.insert(FALLBACK_PREFIX.to_string(), FALLBACK_TARGET.to_string());
        Self { hosts, port: default_port() }
    }

    pub fn get_hosts(&self) -> &HashMap<String, String> {
        &self.hosts
    }

    pub fn get_port(&self) -> &str {
        &self.port
    }

    /// Exact-match lookup of the backend target configured for a prefix
    pub fn lookup_target(&self, prefix: impl AsRef<str>) -> Option<&str> {
        self.hosts.get(prefix.as_ref()).map(String::as_str)
    }

    /// The listen port as a number
    pub fn port_number(&self) -> Result<u16> {
        parse_port(&self.port).map_err(|e| anyhow!(e))
    }
}

impl Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?;
        write!(f, "{}", json)
    }
}

fn default_port() -> String {
    DEFAULT_PORT.to_string()
}

// Forgiving port: accepts a string or an unsigned number, anything else falls back to the default.
fn port_or_default<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer) {
        Ok(Value::String(s)) => Ok(s),
        Ok(Value::Number(n)) if n.is_u64() => Ok(n.to_string()),
        Ok(other) => {
            warn!("Invalid Port value {}, using default {}", other, DEFAULT_PORT);
            Ok(default_port())
        }
        Err(e) => {
            warn!("Failed to deserialize Port value: {}, using default {}", e, DEFAULT_PORT);
            Ok(default_port())
        }
    }
}

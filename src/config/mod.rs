// Configuration module
//
// - types: the Configuration structure and its JSON shape
// - loader: reading the configuration file at startup
// - validator: startup checks and route warnings

pub mod loader;
pub mod types;
pub mod validator;

pub use types::{Configuration, DEFAULT_CONFIG_PATH, DEFAULT_PORT};

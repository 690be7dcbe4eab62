//! Configuration loading from files and environment variables.

use config::{Config, Environment, File};

use crate::error::{ClientError, ClientResult};

use super::ClientConfig;

/// Config file stem searched in the working directory (`docex.toml`, ...)
const CONFIG_FILE: &str = "docex";

/// Prefix for environment overrides, e.g. `DOCEX__API__BASE_URL`
const ENV_PREFIX: &str = "DOCEX";

/// Load configuration from `./docex.*` (optional) and the environment
pub fn load_config() -> ClientResult<ClientConfig> {
    load_config_from(CONFIG_FILE)
}

/// Load configuration from the given file path or stem (optional) and the environment
pub fn load_config_from(path: &str) -> ClientResult<ClientConfig> {
    Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ClientError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| ClientError::Config {
            message: format!("Failed to deserialize config: {}", e),
        })
}

//! Client configuration.
//!
//! Values come from an optional `docex` config file and `DOCEX__*`
//! environment variables, layered by [`load_config`]. Every field has a
//! default so an empty environment yields a usable local setup.

mod loader;

use serde::Deserialize;
use std::time::Duration;

pub use loader::{load_config, load_config_from};

/// Top-level client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_api")]
    pub api: ApiConfig,

    #[serde(default = "default_upload")]
    pub upload: UploadConfig,

    #[serde(default = "default_polling")]
    pub polling: PollingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: default_api(),
            upload: default_upload(),
            polling: default_polling(),
        }
    }
}

/// Extraction backend endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path segment in front of every route, e.g. `lite-demo` for
    /// `{base_url}/lite-demo/get-document`. Empty means no prefix.
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Absolute URL for a backend route
    pub fn endpoint(&self, route: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let prefix = self.route_prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{}/{}", base, route)
        } else {
            format!("{}/{}/{}", base, prefix, route)
        }
    }
}

/// Client-side upload rules
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Upload type sent to the link provider
    #[serde(default = "default_upload_type")]
    pub upload_type: String,

    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,

    #[serde(default = "default_allowed_content_type")]
    pub allowed_content_type: String,
}

/// Document status polling
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

// ==================== Default Value Functions ====================

pub(crate) fn default_api() -> ApiConfig {
    ApiConfig {
        base_url: default_base_url(),
        route_prefix: default_route_prefix(),
        timeout_secs: default_timeout_secs(),
        user_agent: default_user_agent(),
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_route_prefix() -> String {
    "lite-demo".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("docex/{}", env!("CARGO_PKG_VERSION"))
}

pub(crate) fn default_upload() -> UploadConfig {
    UploadConfig {
        upload_type: default_upload_type(),
        max_file_size_bytes: default_max_file_size(),
        allowed_content_type: default_allowed_content_type(),
    }
}

fn default_upload_type() -> String {
    "document".to_string()
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

fn default_allowed_content_type() -> String {
    mime::APPLICATION_PDF.essence_str().to_string()
}

pub(crate) fn default_polling() -> PollingConfig {
    PollingConfig {
        interval_ms: default_interval_ms(),
        max_attempts: default_max_attempts(),
    }
}

fn default_interval_ms() -> u64 {
    3000
}

fn default_max_attempts() -> u32 {
    60
}

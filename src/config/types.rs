// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::collections::HashMap;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub storage: StorageConfig,
    pub content: ContentConfig,
    #[serde(default)]
    pub mime_type_map: MimeTypeMapConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// Blob storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory blobs are served from
    pub root: String,
}

/// Response shaping configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ContentConfig {
    /// `Cache-Control` max-age in seconds, 0 disables caching
    pub cache_max_age: u32,
    /// Serve SVG as `image/svg+xml` under a restrictive CSP
    pub svg_enabled: bool,
}

/// Extension to MIME type overrides
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MimeTypeMapConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Keys are extensions such as `.apk`
    #[serde(default)]
    pub map: HashMap<String, String>,
}

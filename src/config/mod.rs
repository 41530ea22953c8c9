// Configuration module entry point
// Loads application configuration and holds shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

use crate::content::ResponderOptions;
use crate::http::cache::CachePolicy;
use crate::http::mime::MimeTypeMap;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, ContentConfig, LoggingConfig, MimeTypeMapConfig, PerformanceConfig, ServerConfig,
    StorageConfig,
};

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("BLOBSERVE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("storage.root", "blobs")?
            .set_default("content.cache_max_age", 86_400)?
            .set_default("content.svg_enabled", true)?
            .set_default("mime_type_map.enabled", false)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Options handed to the content responder
    pub fn responder_options(&self) -> ResponderOptions {
        ResponderOptions {
            cache: CachePolicy::from_max_age(self.content.cache_max_age),
            svg_enabled: self.content.svg_enabled,
            mime_map: MimeTypeMap::new(self.mime_type_map.enabled, &self.mime_type_map.map),
        }
    }
}

// Application state module
// Shared per-process state handed to every connection

use std::sync::atomic::{AtomicBool, Ordering};

use super::types::Config;
use crate::blob::{BlobServer, FsBlobStore};
use crate::content::ContentResponder;

/// Application state
pub struct AppState {
    pub config: Config,
    pub blobs: BlobServer<FsBlobStore>,

    // Cached config values for fast access
    pub cached_access_log: AtomicBool,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let responder = ContentResponder::new(config.responder_options());
        let blobs = BlobServer::new(FsBlobStore::new(&config.storage.root), responder);

        Self {
            config: config.clone(),
            blobs,
            cached_access_log: AtomicBool::new(config.logging.access_log),
        }
    }

    pub fn access_log_enabled(&self) -> bool {
        self.cached_access_log.load(Ordering::Relaxed)
    }
}

// Signal handling module
//
// SIGTERM and SIGINT (Ctrl+C) stop the accept loop; connections already
// being served finish in the background.

use crate::logger;

/// Resolve once a shutdown signal arrives, naming the signal
#[cfg(unix)]
pub async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            logger::log_error(&format!("Failed to register SIGTERM handler: {e}"));
            return ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM received",
        reason = ctrl_c() => reason,
    }
}

/// Non-Unix fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub async fn shutdown_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "SIGINT received",
        Err(e) => {
            logger::log_error(&format!("Failed to listen for Ctrl+C: {e}"));
            // Without a handler the server runs until killed
            std::future::pending().await
        }
    }
}

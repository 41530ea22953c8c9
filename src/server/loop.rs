// Server loop module
// Accepts connections until the shutdown future resolves

use std::future::Future;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Accept loop for the blob server
///
/// Must run inside a `LocalSet`. Returns once `shutdown` resolves; the
/// listener is dropped on return while accepted connections keep running.
pub async fn start_server_loop<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
    shutdown: F,
) where
    F: Future<Output = &'static str>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            reason = &mut shutdown => {
                logger::log_shutdown(reason);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::listener::create_reusable_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_serves_blob_over_tcp_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"over the wire").unwrap();

        let mut config = Config::load_from("does-not-exist/config").unwrap();
        config.storage.root = dir.path().to_string_lossy().into_owned();
        config.logging.access_log = false;
        let state = Arc::new(AppState::new(&config));

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let server = tokio::task::spawn_local(start_server_loop(
                    listener,
                    state,
                    Arc::new(AtomicUsize::new(0)),
                    async move {
                        let _ = stop_rx.await;
                        "test finished"
                    },
                ));

                let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
                client
                    .write_all(b"GET /a.txt HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                    .await
                    .unwrap();
                let mut raw = Vec::new();
                client.read_to_end(&mut raw).await.unwrap();
                let raw = String::from_utf8(raw).unwrap();

                assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
                assert!(raw.to_ascii_lowercase().contains("content-length: 13\r\n"));
                assert!(raw.ends_with("\r\n\r\nover the wire"));

                stop_tx.send(()).unwrap();
                server.await.unwrap();
            })
            .await;
    }
}

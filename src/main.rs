use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use blobserve::config::{AppState, Config};
use blobserve::{logger, server};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    // Worker count from configuration, CPU cores otherwise
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_reusable_listener(
        addr,
        server::backlog_for(cfg.performance.max_connections),
    )?;

    if !std::path::Path::new(&cfg.storage.root).is_dir() {
        logger::log_warning(&format!(
            "Blob root {} is not a directory; every lookup will fail",
            cfg.storage.root
        ));
    }

    let state = Arc::new(AppState::new(&cfg));
    let active_connections = Arc::new(AtomicUsize::new(0));

    logger::log_server_start(&addr, &cfg);

    // Use LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::start_server_loop(
            listener,
            state,
            active_connections,
            server::shutdown_signal(),
        ))
        .await;
    Ok(())
}

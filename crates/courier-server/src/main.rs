mod config;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use courier_api::AppStateInner;
use courier_crypto::{MessageCipher, keys};
use courier_db::Store;
use courier_gateway::{connection, dispatcher::Dispatcher};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Store and key
    let store = Store::open(&config.db_path)?;
    let key = keys::load_or_create_key(&config.key_path)?;

    let state = AppStateInner::new(store, MessageCipher::new(key)).with_policy(config.auth_policy());
    let dispatcher = Dispatcher::new(Arc::new(state));

    let addr = config.addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Courier relay listening on {}", addr);

    tokio::select! {
        result = connection::serve(listener, dispatcher, config.max_frame_bytes) => result?,
        _ = shutdown_signal() => {}
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(_) => {
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

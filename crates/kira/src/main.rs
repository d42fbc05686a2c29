//! The `kira` relay binary.
//!
//! Reads `config.toml` (or the file named by `KIRA_CONFIG`), creating it
//! with defaults on first run, then relays until killed. Log verbosity is
//! controlled by `RUST_LOG`; packet logs go to the `kira::packets` target.

use kira::prelude::*;
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "KIRA_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<(), KiraError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = ProxyConfig::load_or_create(&path)?;
    tracing::info!(
        config = %path,
        listen = %config.connection.local_address,
        upstream = %config.connection.remote_address,
        "configuration loaded"
    );

    let server = ProxyServer::builder().config(&config).build().await?;
    if let Ok(addr) = server.local_addr() {
        tracing::info!(%addr, "listening for clients");
    }
    server.run().await
}

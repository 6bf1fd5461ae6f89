//! Pings the deployed BloomIQ backend so the host does not idle it.

use bloomiq_lib::config::KeepAliveConfig;
use bloomiq_lib::keep_alive;

#[tokio::main]
async fn main() {
    bloomiq_lib::init_tracing();

    let config = match KeepAliveConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    if let Err(e) = keep_alive::run(config, shutdown).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

use clap::Parser;
use log::{error, info, warn};
use server::config::BridgeConfig;
use server::econ::EconClient;
use server::hub::EventHub;
use server::ingest::IngestLoop;
use server::{api, feed};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Starts the command API and event feed, connects to ECON and ingests
/// console output until interrupted.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = BridgeConfig::parse();

    let econ = Arc::new(EconClient::new(
        &config.econ_host,
        config.econ_port,
        &config.econ_password,
    ));
    let hub = Arc::new(EventHub::new());

    let web_listener = TcpListener::bind(config.web_addr()).await?;
    let ws_listener = TcpListener::bind(config.ws_addr()).await?;

    // A failed first attempt is retried by the ingest loop
    if let Err(e) = econ.connect().await {
        warn!("Initial connection to ECON failed: {}", e);
    }

    let api_handle = tokio::spawn(api::serve(web_listener, Arc::clone(&econ)));
    let feed_handle = tokio::spawn(feed::serve(ws_listener, Arc::clone(&hub)));
    let ingest_handle = {
        let ingest = IngestLoop::new(Arc::clone(&econ), Arc::clone(&hub))
            .with_reconnect_delay(config.reconnect_delay());
        tokio::spawn(async move { ingest.run().await })
    };

    tokio::select! {
        result = api_handle => match result {
            Ok(Ok(())) => info!("Command API stopped"),
            Ok(Err(e)) => error!("Command API failed: {}", e),
            Err(e) => error!("Command API task panicked: {}", e),
        },
        result = feed_handle => match result {
            Ok(Ok(())) => info!("Event feed stopped"),
            Ok(Err(e)) => error!("Event feed failed: {}", e),
            Err(e) => error!("Event feed task panicked: {}", e),
        },
        result = ingest_handle => {
            if let Err(e) = result {
                error!("Ingest task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    if let Err(e) = econ.disconnect().await {
        warn!("Error while disconnecting from ECON: {}", e);
    }

    Ok(())
}

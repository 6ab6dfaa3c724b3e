//! Headless AIS viewer
//!
//! Streams vessels from the configured WebSocket server. Map events are read
//! as JSON lines from stdin; markers are reported through the log.

use ais_viewer::{
    config::AppConfig, errors::AisViewerError, map_events, presenter::HeadlessPresenter,
    session::ViewerSession, transport::WsClientBuilder,
};
use tokio::{io::BufReader, signal, sync::mpsc};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AisViewerError> {
    #[cfg(feature = "dotenvy")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    let client = WsClientBuilder::new(&config.websocket)?.connect();
    let (inbound, outbound, channel) = client.into_parts();

    let (map_tx, map_rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = map_events::forward_lines(stdin, map_tx).await {
            error!("Map event input failed: {}", e);
        }
    });

    let session = ViewerSession::new(HeadlessPresenter::new(), &config.viewer, outbound, channel)?;

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    let presenter = session.run(inbound, map_rx, shutdown).await;
    info!("AIS viewer stopped: {:?}", presenter.stats());

    Ok(())
}

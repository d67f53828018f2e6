use cadence::server::{self, AppState};
use tokio::net::TcpListener;

use crate::config::Config;
use crate::shutdown::shutdown_signal;

pub(crate) async fn handle_serve(
    host: Option<String>,
    port: Option<u16>,
    config: &Config,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let store = super::open_store(database_url).await?;
    let orchestrator = super::build_orchestrator(config, store)?;
    let state = AppState::new(orchestrator).with_request_timeout(config.request_timeout());

    let listener = TcpListener::bind((host.as_str(), port)).await?;
    server::serve(listener, state, shutdown_signal()).await?;

    tracing::info!("Server stopped");
    Ok(())
}

// Example: discover a Pellet Server and list what it offers
//
// Run against a local server:
//   cargo run --example explore_server -- http://localhost:8080/

use anyhow::Result;
use pellet_client::{ClientConfig, Server};
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8080/".to_string());
    let server = Server::connect(ClientConfig::with_url(url))?;

    info!(url = %server.endpoint().url(), "Connected");
    for (key, value) in server.info() {
        info!("  {} = {}", key, value);
    }

    for kb in server.knowledge_bases() {
        info!("Knowledge base {}: {:?}", kb.name(), kb.service_names());
    }
    info!("Server services: {:?}", server.service_names());
    Ok(())
}

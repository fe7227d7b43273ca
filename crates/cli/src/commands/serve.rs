//! Gateway server command.

use packrat_config::PackratConfig;

pub async fn run(
    mut config: PackratConfig,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port {
        config.gateway.port = port;
    }
    packrat_gateway::start(config).await
}

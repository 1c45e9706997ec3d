//! Serves the greeting API.

use greeting_api::{
    app,
    infra::{config, logging},
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config()?;
    let _guard = logging::init_logging(&config.logging)?;

    let listener = TcpListener::bind(format!(
        "{}:{}",
        config.server.http_address, config.server.http_port
    ))
    .await?;
    app::run_app(listener, config).await?;

    Ok(())
}

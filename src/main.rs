use std::sync::Arc;

use kingjuke_engine::{
    config::JukeboxConfig,
    player::{output::SinkController, resolver::LocalFileResolver},
    Engine,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = JukeboxConfig::load()?;

    let controller = SinkController::new(config.output_device.as_deref())?;
    let resolver = LocalFileResolver::new(config.library_dir.clone());

    let (engine, completion_listener) =
        Engine::create(&config, Arc::new(resolver), Arc::new(controller));

    let _service = engine.serve(&config.socket_name, completion_listener)?;

    info!("Jukebox {:?} is up", config.theme);

    tokio::signal::ctrl_c().await?;

    info!("Shutting down");

    Ok(())
}

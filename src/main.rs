use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rust_chess_live::config::CONFIG_ENV;
use rust_chess_live::server::Server;
use rust_chess_live::{Coordinator, MemoryGateway, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config_path = env::args().nth(1).or_else(|| env::var(CONFIG_ENV).ok()).map(PathBuf::from);
    let config = ServerConfig::load(config_path.as_deref())?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("rust_chess_live server v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!(path = %path.display(), "loaded configuration"),
        None => warn!("no configuration file given, using defaults"),
    }

    let gateway = Arc::new(MemoryGateway::new());
    for (username, token) in config.seed(&gateway)? {
        info!(user = %username, token = %token, "seeded user");
    }

    let coordinator = Arc::new(Coordinator::new(gateway));
    let server = Server::bind(&config, coordinator).await?;
    server.run().await?;
    Ok(())
}

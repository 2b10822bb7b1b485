//! natter — minimal real-time chat relay

use std::path::Path;

use clap::Parser;
use tracing::info;

use natter_server::RelayServer;

use natter_cli::{
    backends,
    cli::{Cli, Commands},
    client,
    config::AppConfig,
    error::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        command,
        verbose,
        config,
    } = Cli::parse();

    setup_logging(verbose);

    match command {
        Commands::Serve { host, port, backend } => {
            let mut config = load_configuration(config.as_deref())?;

            // CLI flags win over the config file
            if let Some(host) = host {
                config.listen.host = host;
            }
            if let Some(port) = port {
                config.listen.port = port;
            }
            if let Some(backend) = backend {
                config.backend.kind = backend;
            }

            let persister = backends::select(&config.backend).await?;
            let server = RelayServer::bind(&config.listen, persister).await?;
            server.run().await?;
        }
        Commands::Chat { nick, host, port } => {
            client::run(&host, port, &nick).await?;
        }
    }

    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        info!("loading configuration from {}", path.display());
    } else {
        info!("using default configuration");
    }
    AppConfig::load(path)
}

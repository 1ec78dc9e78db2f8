mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use leadflow::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => {
            let mut config = match args.config {
                Some(path) => Config::load_from_path(path)?,
                None => Config::load()?,
            };
            if let Some(address) = args.address {
                config.server.bind_addr = address;
            }
            if let Some(data_path) = args.data_path {
                config.server.data_path = data_path;
            }

            // RUST_LOG wins over the configured level
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
            tracing_subscriber::fmt().with_env_filter(filter).init();

            leadflow::api::run(config).await?
        }
    }

    Ok(())
}

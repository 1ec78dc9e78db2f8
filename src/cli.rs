use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "leadflow")]
#[command(about = "Lead distribution and vendor quota service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the admin HTTP server
    Server(ServerArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Configuration file (overrides LEADFLOW_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to bind the HTTP server to (overrides server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Fjall data directory (overrides server.data_path)
    #[arg(long)]
    pub data_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_overrides() {
        let cli = Cli::parse_from([
            "leadflow",
            "server",
            "--address",
            "127.0.0.1:9100",
            "--data-path",
            "/tmp/leadflow",
        ]);
        let Commands::Server(args) = cli.command;
        assert_eq!(args.address, Some("127.0.0.1:9100".parse().unwrap()));
        assert_eq!(args.data_path, Some(PathBuf::from("/tmp/leadflow")));
        assert!(args.config.is_none());
    }
}

//! Crashpot server binary.

use std::path::PathBuf;

use clap::Parser;

use crashpot::config::{IpFamily, ServerConfig};
use crashpot::server::GameServer;
use crashpot::{logging, Result};

#[derive(Parser, Debug)]
#[command(
    name = "server",
    version,
    about = "Crashpot - authoritative crash game server"
)]
struct Args {
    /// Address family to listen on
    #[arg(value_enum)]
    family: IpFamily,

    /// TCP port to listen on
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Optional TOML config file; family and port given here override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter (tracing EnvFilter syntax)
    #[arg(short, long, default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.verbosity);

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    config.family = args.family;
    config.port = args.port;

    let server = GameServer::new(config);
    let listener = match server.bind() {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("{}", err);
            return Err(err);
        }
    };
    tracing::info!(
        "listening on {} ({} seats)",
        listener.local_addr()?,
        server.config.capacity
    );
    server.serve(listener).await
}

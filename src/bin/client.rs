//! Crashpot terminal client binary.

use std::net::IpAddr;

use clap::Parser;

use crashpot::client::{self, ClientOptions};
use crashpot::config::validate_nick;
use crashpot::{logging, Result};

#[derive(Parser, Debug)]
#[command(name = "client", version, about = "Crashpot - terminal client")]
struct Args {
    /// Server address
    ip: IpAddr,

    /// Server port
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Display name, 1..=13 graphic ASCII characters
    #[arg(short, long, value_parser = parse_nick)]
    nick: String,

    /// Log filter (tracing EnvFilter syntax)
    #[arg(short, long, default_value = "warn")]
    verbosity: String,
}

fn parse_nick(raw: &str) -> std::result::Result<String, String> {
    validate_nick(raw).map_err(|e| e.to_string())?;
    Ok(raw.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.verbosity);

    client::run(ClientOptions {
        ip: args.ip,
        port: args.port,
        nick: args.nick,
    })
    .await
}

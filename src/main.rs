use std::net::{IpAddr, SocketAddr};
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use road_core::db::{DbConfig, Postgres};
use road_core::server::CoreServer;
use road_core::store::GameStore;

/// The game service.
#[derive(Debug, Parser)]
#[command(name = "road-core", version, about)]
struct Args {
  /// Server host address
  #[arg(long, default_value = "127.0.0.1")]
  host: String,

  /// Server port number
  #[arg(long, default_value_t = 8080)]
  port: u16,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();
  info!("starting up: host={}, port={}", args.host, args.port);

  if let Err(err) = run(args).await {
    error!("fatal: {}", err);
    process::exit(1);
  }

  info!("shut down cleanly");
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
  let host: IpAddr = args.host.parse()?;
  let addr = SocketAddr::new(host, args.port);

  let db = Postgres::connect(&DbConfig::from_env()).await?;
  db.ensure_schema().await?;

  let mut server = CoreServer::new();
  GameStore::new(Arc::new(db)).attach_to(&mut server)?;

  server.run(addr).await?;
  Ok(())
}

//! Chess-vs-engine TCP server.

use std::path::PathBuf;

use anyhow::Result;
use chess_server::config::Config;
use chess_server::server;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "chess-server", about = "Play chess against a UCI engine over TCP")]
struct Cli {
    /// TOML config file; CHESS_* environment variables still apply on top.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind.
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// UCI engine executable.
    #[arg(long)]
    engine: Option<String>,

    /// Engine think-time per move, in milliseconds.
    #[arg(long)]
    movetime_ms: Option<u64>,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "chess_server=debug"
    } else {
        "chess_server=info"
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&cli)?;

    info!(
        "starting chess-server on {} (max_clients = {}, engine = {}, movetime = {} ms)",
        config.socket_addr_string(),
        config.max_clients,
        config.engine.program,
        config.engine.movetime_ms
    );

    server::run(config).await
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_toml_file(path)?.with_env_overrides()?,
        None => Config::from_env()?,
    };

    if let Some(bind) = &cli.bind {
        config.bind_addr = bind.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(engine) = &cli.engine {
        config.engine.program = engine.clone();
    }
    if let Some(movetime_ms) = cli.movetime_ms {
        config.engine.movetime_ms = movetime_ms;
    }
    Ok(config)
}

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wulang_gateway::{Config, Daemon};

/// Wulang - WhatsApp study-assistant gateway
#[derive(Parser)]
#[command(name = "wulang", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long, env = "WULANG_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one maintenance pass (retention, staged media, orphans)
    Maintain,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,wulang_gateway=info",
        1 => "info,wulang_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if let Some(Command::Maintain) = cli.command {
        let daemon = Daemon::new(config)?;
        daemon.run_maintenance_once().await?;
        return Ok(());
    }

    tracing::info!(port = config.server.port, "starting wulang gateway");
    let daemon = Daemon::new(config)?;
    daemon.run().await?;
    Ok(())
}

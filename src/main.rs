use anyhow::Result;
use clap::{Parser, Subcommand};
use parley::app;
use parley::gateway;
use parley::Config;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "parley", version, about = "Chat history retention engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway (plus the timer-driven sweep when configured)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one retention sweep for a user and print the deletion count
    Sweep { user_id: String },
    /// Print a user's storage statistics
    Stats { user_id: String },
    /// Delete all of a user's sessions, regardless of policy
    ClearHistory { user_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    let mut config = Config::load_or_init()?;

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            gateway::run_gateway(config).await
        }
        Command::Sweep { user_id } => {
            let services = app::build_services(&config).await?;
            let deleted = services.sweeper.sweep(&user_id).await?;
            println!("deleted {deleted} expired session(s) for {user_id}");
            Ok(())
        }
        Command::Stats { user_id } => {
            let services = app::build_services(&config).await?;
            let stats = services.stats.compute(&user_id).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Command::ClearHistory { user_id } => {
            let services = app::build_services(&config).await?;
            let deleted = services.sweeper.purge_all(&user_id).await?;
            println!("deleted {deleted} session(s) for {user_id}");
            Ok(())
        }
    }
}

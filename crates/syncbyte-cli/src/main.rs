mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use syncbyte_types::Version;

#[derive(Parser)]
#[command(
    name = "syncbyte",
    version,
    about = "Protocol migration and checkpoint tooling for connector syncs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate connector messages (JSON lines) or a configured catalog between protocol versions
    Migrate {
        /// Protocol version the input is written in
        #[arg(long)]
        from: Version,
        /// Protocol version to produce
        #[arg(long)]
        to: Version,
        /// Treat the input as one configured catalog document
        #[arg(long)]
        catalog: bool,
        /// Input file
        input: PathBuf,
    },
    /// Run one sync attempt over recorded connector output
    Replay {
        /// Path to sync config YAML file
        #[arg(long)]
        config: PathBuf,
        /// Connection the state belongs to
        #[arg(long)]
        connection: String,
        /// Protocol version the connector speaks (detected when omitted)
        #[arg(long)]
        protocol_version: Option<Version>,
        /// Configured catalog of the connection, at the platform version
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Recorded connector output, one message per line
        output: PathBuf,
    },
    /// Print the persisted state of a connection
    State {
        /// Path to sync config YAML file
        #[arg(long)]
        config: PathBuf,
        /// Connection to look up
        #[arg(long)]
        connection: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Migrate {
            from,
            to,
            catalog,
            input,
        } => commands::migrate::execute(&input, from, to, catalog),
        Commands::Replay {
            config,
            connection,
            protocol_version,
            catalog,
            output,
        } => {
            commands::replay::execute(
                &config,
                &connection,
                protocol_version,
                catalog.as_deref(),
                &output,
            )
            .await
        }
        Commands::State { config, connection } => commands::state::execute(&config, &connection),
    }
}

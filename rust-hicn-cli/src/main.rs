use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use rust_hicn_mapme::MapMeConfig;
use std::path::PathBuf;

mod commands;
mod utils;

/// hICN MAP-Me command line interface
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML, JSON or YAML)
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a producer moving between the faces of a forwarder
    Simulate {
        /// Prefix served by the producer
        #[clap(short, long, default_value = "b001::/64")]
        prefix: String,

        /// Number of faces of the forwarder
        #[clap(short, long, default_value = "3")]
        faces: usize,

        /// Number of producer moves
        #[clap(short, long, default_value = "3")]
        moves: u32,

        /// Neighbours never acknowledge Interest Updates
        #[clap(long)]
        no_ack: bool,

        /// Print the final state as JSON
        #[clap(long)]
        json: bool,
    },

    /// Encode or decode Interest Update packets
    Iu {
        #[clap(subcommand)]
        cmd: IuCommands,
    },

    /// Show the effective configuration
    Config,
}

#[derive(Subcommand)]
enum IuCommands {
    /// Encode a control message as hex
    Encode {
        /// Name prefix, e.g. b001::/64
        prefix: String,

        /// Sequence number
        seq: u32,

        /// Encode a notification instead of an update
        #[clap(long)]
        notification: bool,

        /// Encode the acknowledgment
        #[clap(long)]
        ack: bool,
    },

    /// Decode a hex encoded control message
    Decode {
        /// Packet bytes in hex
        hex: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "info" },
    ))
    .init();

    let config = MapMeConfig::load(cli.config.as_deref())
        .context("Failed to load MAP-Me configuration")?;
    debug!("Effective configuration: {:?}", config);

    match cli.command {
        Commands::Simulate {
            prefix,
            faces,
            moves,
            no_ack,
            json,
        } => {
            let args = commands::simulate::SimulateArgs {
                prefix,
                faces,
                moves,
                ack: !no_ack,
                json,
            };
            commands::simulate::run(config, args).await?;
        }
        Commands::Iu { cmd } => {
            commands::iu::handle_command(cmd)?;
        }
        Commands::Config => {
            commands::config::show(&config)?;
        }
    }

    Ok(())
}

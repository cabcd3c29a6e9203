//! Herald CLI
//!
//! Inspects event configuration and exercises dispatchers under a simulated
//! multithreaded frame loop.

mod config;
mod simulate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use herald_core::EventHub;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::simulate::SimulateOptions;

/// Event dispatch diagnostics
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(about = "Inspect herald event configuration and run dispatch simulations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a starter herald.toml
    Init {
        /// Target directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// List configured events
    Events {
        /// Directory or file holding herald.toml
        #[arg(short, long, default_value = ".")]
        config: PathBuf,
    },

    /// Run a simulated frame loop against a hub
    Simulate {
        /// Directory or file holding herald.toml
        #[arg(short, long, default_value = ".")]
        config: PathBuf,

        /// Number of frames to dispatch
        #[arg(long, default_value = "120")]
        frames: u64,

        /// Background threads subscribing and unsubscribing
        #[arg(long, default_value = "4")]
        loaders: usize,

        /// Milliseconds between frames
        #[arg(long, default_value = "2")]
        frame_ms: u64,

        /// Frame on which a subscriber panics
        #[arg(long)]
        panic_frame: Option<u64>,

        /// Region the built-in guard vetoes
        #[arg(long, default_value = "restricted")]
        restricted: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Init { dir } => {
            let path = config::init(&dir)?;
            tracing::info!("Created {}", path.display());
        }
        Command::Events { config } => {
            let config = config::load(&config)?;
            if config.events.is_empty() {
                println!("no events configured");
            }
            for event in &config.events {
                println!(
                    "{}.{}\tdefault_veto={}\terror_message={:?}",
                    event.owner, event.name, event.default_veto, event.error_message
                );
            }
        }
        Command::Simulate {
            config,
            frames,
            loaders,
            frame_ms,
            panic_frame,
            restricted,
            json,
        } => {
            let hub = EventHub::with_config(config::load_or_default(&config)?);
            let options = SimulateOptions {
                frames,
                loaders,
                frame_interval: Duration::from_millis(frame_ms),
                panic_frame,
                restricted_region: restricted,
            };

            let report = simulate::run(&hub, &options)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{report:#?}");
            }
        }
    }

    Ok(())
}

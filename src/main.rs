// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "qrscan")]
#[command(about = "Recognize QR codes and barcodes in images and frame sequences")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.config/qrscan/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize codes in image files (one manual capture per file)
    Scan {
        /// Image files to scan
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Report every code found, most popular format first
        #[arg(short, long)]
        all: bool,

        /// Print results as JSON
        #[arg(short, long)]
        json: bool,

        /// Route each file through the request queue instead of decoding directly
        #[arg(short, long, conflicts_with = "all")]
        queued: bool,
    },

    /// Feed image files as continuous camera frames and print session updates
    Stream {
        /// Frames to feed, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Delay between frames in milliseconds (100-2000)
        #[arg(short, long)]
        interval: Option<u64>,

        /// How many times to replay the frame list
        #[arg(short, long, default_value = "1")]
        rounds: u32,

        /// Write the detection history report to this file
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// List supported barcode formats in ranking order
    Formats,

    /// Show the effective configuration
    Config {
        /// Print only the configuration file path
        #[arg(long)]
        path: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=qrscan=trace, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let outcome = match cli.command {
        Commands::Scan {
            files,
            all,
            json,
            queued,
        } => cli::scan(config, files, all, json, queued),
        Commands::Stream {
            files,
            interval,
            rounds,
            export,
        } => cli::stream(config, files, interval, rounds, export),
        Commands::Formats => cli::list_formats(),
        Commands::Config { path } => cli::show_config(config, path),
    };
    outcome?;
    Ok(())
}

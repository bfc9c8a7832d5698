//! Mediabox - record audio, keep a catalog of captured media and play it back
//!
//! This is the main entry point for the Mediabox command-line tool.

mod app;
mod audio;
mod capture;
mod catalog;
mod cli;
mod error;
mod format;
mod models;
mod playback;
mod settings;

use clap::Parser;
use log::{error, info};
use std::path::PathBuf;

/// Root directory for Mediabox data (~/.local/share/mediabox)
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mediabox")
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command-line arguments and initialize logging
    let args = cli::Args::parse();
    cli::init_logging(&args);

    info!("Starting Mediabox");

    if let Err(e) = app::run(args.command, args.catalog).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

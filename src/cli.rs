//! Command-line interface for Mediabox
//!
//! Handles argument parsing and logging configuration.

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;

use crate::models::MediaType;

/// Mediabox - record audio, catalog media and play it back
#[derive(Parser, Debug)]
#[command(name = "mediabox")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace, -vvvv = all deps
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Catalog file to use instead of the default
    #[arg(long, global = true, env = "MEDIABOX_CATALOG")]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record from the default microphone until Ctrl-C
    Record {
        /// Stop automatically after this many seconds
        #[arg(short, long)]
        seconds: Option<u64>,
    },
    /// Add an existing image, video or audio file to the catalog
    Import {
        path: PathBuf,
        #[arg(short, long, value_enum)]
        kind: MediaKind,
        /// Display name (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
        /// Duration in milliseconds, read from the file for WAV audio
        #[arg(long)]
        duration_ms: Option<u64>,
    },
    /// List cataloged media, newest first
    List {
        #[arg(value_enum)]
        kind: Option<MediaKind>,
    },
    /// Remove a record from the catalog (the file is kept)
    Delete { id: u64 },
    /// Play a catalog id or a file path.
    /// Reads `bg`, `fg`, `vol <0-1>`, `status` and `quit` from stdin.
    Play { target: String },
    /// Show or change the playback volume
    Volume {
        #[arg(allow_negative_numbers = true)]
        level: Option<f32>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Image,
    Video,
}

impl From<MediaKind> for MediaType {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Audio => MediaType::Audio,
            MediaKind::Image => MediaType::Image,
            MediaKind::Video => MediaType::Video,
        }
    }
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Base level for all modules - keep at warn to suppress noisy deps
    builder.filter_level(LevelFilter::Warn);

    builder.filter_module("mediabox", args.log_level());

    // Dependency internals only at -vvvv
    if args.verbose >= 4 {
        builder.filter_level(args.log_level());
    }

    builder.format_timestamp_millis().init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let args = Args::parse_from(["mediabox", "-vv", "list"]);
        assert_eq!(args.log_level(), LevelFilter::Debug);

        let args = Args::parse_from(["mediabox", "list", "-q"]);
        assert_eq!(args.log_level(), LevelFilter::Error);

        let args = Args::parse_from(["mediabox", "list"]);
        assert_eq!(args.log_level(), LevelFilter::Warn);
    }

    #[test]
    fn test_import_arguments() {
        let args = Args::parse_from(["mediabox", "import", "/tmp/pic.jpg", "--kind", "image"]);
        match args.command {
            Command::Import { path, kind, name, .. } => {
                assert_eq!(path, PathBuf::from("/tmp/pic.jpg"));
                assert_eq!(MediaType::from(kind), MediaType::Image);
                assert!(name.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_list_filter_is_optional() {
        let args = Args::parse_from(["mediabox", "list", "video"]);
        assert!(matches!(args.command, Command::List { kind: Some(MediaKind::Video) }));
        let args = Args::parse_from(["mediabox", "list"]);
        assert!(matches!(args.command, Command::List { kind: None }));
    }
}

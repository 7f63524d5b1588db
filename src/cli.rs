use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediafetch")]
#[command(author, version, about = "Download media through yt-dlp with live progress")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory for finished downloads (overrides config)
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },

    /// Print metadata and download options for a URL as JSON
    Extract {
        /// Media page URL
        url: String,
    },

    /// Download one format, printing progress events as they happen
    Download {
        /// Media page URL
        url: String,

        /// Format id from `extract`
        #[arg(short, long)]
        format: String,

        /// Directory for the finished file (overrides config)
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Display version information
    Version,
}

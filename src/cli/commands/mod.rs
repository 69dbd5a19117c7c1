//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod batch;
mod check;
mod extract;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::load_settings;

#[derive(Parser)]
#[command(name = "docphoto")]
#[command(about = "Extract face photos and personal information from identity documents")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Extract faces and personal information from one document
    Extract {
        /// Document to process (PDF, DOCX or image)
        file: PathBuf,
        /// Output directory (default: extracted_<name> next to the input)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Only write the JSON result and print its path
        #[arg(long)]
        json_only: bool,
        /// Skip face detection and face analysis
        #[arg(long)]
        skip_faces: bool,
        /// API key for the analysis provider (overrides config and environment)
        #[arg(long, env = "DOCPHOTO_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Process every supported document in a directory
    Batch {
        /// Directory containing documents
        dir: PathBuf,
        /// Output directory, one subdirectory per document (default: configured output_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
        /// Skip face detection and face analysis
        #[arg(long)]
        skip_faces: bool,
        /// Only print the path of each JSON result
        #[arg(long)]
        json_only: bool,
        /// API key for the analysis provider (overrides config and environment)
        #[arg(long, env = "DOCPHOTO_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Start the web interface
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default: 127.0.0.1:5000)
        #[arg(default_value = "127.0.0.1:5000")]
        bind: String,
    },

    /// Check that external tools and the analysis provider are available
    Check,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Extract {
            file,
            output_dir,
            json_only,
            skip_faces,
            api_key,
        } => {
            extract::cmd_extract(
                &settings,
                &file,
                output_dir.as_deref(),
                json_only,
                skip_faces,
                api_key,
            )
            .await
        }
        Commands::Batch {
            dir,
            output_dir,
            recursive,
            skip_faces,
            json_only,
            api_key,
        } => {
            batch::cmd_batch(
                &settings,
                &dir,
                output_dir.as_deref(),
                recursive,
                skip_faces,
                json_only,
                api_key,
            )
            .await
        }
        Commands::Serve { bind } => serve::cmd_serve(&settings, &bind).await,
        Commands::Check => check::cmd_check(&settings).await,
    }
}

//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod extract;
mod helpers;
mod llm;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use specsift::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "specsift")]
#[command(about = "Extract catalogue attributes from OCR'd product spec sheets")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output directory for results and caches (overrides config file)
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

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
    /// Extract attributes from OCR'd documents
    Extract {
        /// Documents to process: PaddleOCR JSON files or directories of page results
        inputs: Vec<PathBuf>,
        /// Attribute schema (JSON)
        #[arg(short, long)]
        schema: PathBuf,
        /// Treat every entry of this directory as a document
        #[arg(short, long)]
        input_dir: Option<PathBuf>,
        /// Copy inputs into success_found/ or not_found/ after processing
        #[arg(long)]
        sort: bool,
    },

    /// Build or show the product-type to mounting-term lookup
    Lookup {
        /// Attribute schema (JSON)
        #[arg(short, long)]
        schema: PathBuf,
        /// Regenerate every entry instead of reusing the cache
        #[arg(long)]
        refresh: bool,
    },

    /// Build or show regex guidance for a schema
    Guidance {
        /// Attribute schema (JSON)
        #[arg(short, long)]
        schema: PathBuf,
    },

    /// Show the OCR-confusion variants of a term
    Variants {
        /// Term to expand
        term: String,
        /// Maximum number of variants to print (0 = all)
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show configuration and collaborator availability
    Status,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        output_dir: cli.output_dir,
    };
    let (mut settings, config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Extract {
            inputs,
            schema,
            input_dir,
            sort,
        } => {
            if sort {
                settings.sort_inputs = true;
            }
            extract::cmd_extract(&settings, &schema, inputs, input_dir.as_deref()).await
        }
        Commands::Lookup { schema, refresh } => {
            llm::cmd_lookup(&settings, &schema, refresh).await
        }
        Commands::Guidance { schema } => llm::cmd_guidance(&settings, &schema).await,
        Commands::Variants { term, limit } => {
            helpers::cmd_variants(&settings, &term, limit);
            Ok(())
        }
        Commands::Status => status::cmd_status(&settings, &config).await,
    }
}

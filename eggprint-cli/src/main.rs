//! Eggprint CLI - perceptual fingerprinting of egg image datasets.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use eggprint_core::builder::{DEFAULT_BATCH_SIZE, DEFAULT_CHECKPOINT_INTERVAL};
use eggprint_core::{AlgorithmId, DEFAULT_SIMILARITY_THRESHOLD};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  65  Data error (invalid manifest, algorithm mismatch, undecodable image)
  66  Input not found (dataset, image or manifest)
  74  I/O error (manifest could not be written)";

#[derive(Parser)]
#[command(name = "eggprint")]
#[command(author, version, about = "Perceptual fingerprinting and duplicate detection for egg image datasets", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Suppress human-readable output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Fingerprint every image of a dataset and write the manifest
    Generate {
        /// Dataset root containing fertil/ and infertil/ (or fertile/ and infertile/)
        #[arg(short, long, value_name = "DIR")]
        data_dir: PathBuf,

        /// Manifest output path
        #[arg(short, long, value_name = "FILE", default_value = "fingerprints.json")]
        output: PathBuf,

        /// Images hashed per batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Processed images between checkpoints (0 disables checkpoints)
        #[arg(long, default_value_t = DEFAULT_CHECKPOINT_INTERVAL)]
        checkpoint_interval: usize,

        /// Hash algorithm
        #[arg(short, long, default_value_t = AlgorithmId::default())]
        algorithm: AlgorithmId,

        /// Similarity threshold recorded in the manifest
        #[arg(short, long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD, value_parser = utils::parse_threshold)]
        threshold: f64,

        /// Continue from a checkpoint manifest
        #[arg(long, value_name = "CHECKPOINT")]
        resume_from: Option<PathBuf>,
    },

    /// Check whether an image duplicates a manifest entry
    Match {
        /// Image to check
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Manifest to match against
        #[arg(short, long, value_name = "FILE")]
        manifest: PathBuf,

        /// Override the manifest's similarity threshold
        #[arg(short, long, value_parser = utils::parse_threshold)]
        threshold: Option<f64>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Validate a manifest and print its metadata
    Inspect {
        /// Manifest file
        #[arg(value_name = "FILE")]
        manifest: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit = match run(cli) {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}

fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Generate {
            data_dir,
            output,
            batch_size,
            checkpoint_interval,
            algorithm,
            threshold,
            resume_from,
        } => commands::generate::execute(
            commands::generate::GenerateArgs {
                data_dir,
                output,
                batch_size,
                checkpoint_interval,
                algorithm,
                threshold,
                resume_from,
            },
            quiet,
        ),
        Commands::Match {
            image,
            manifest,
            threshold,
            format,
        } => commands::match_image::execute(image, manifest, threshold, format, quiet),
        Commands::Inspect { manifest, format } => {
            commands::inspect::execute(manifest, format, quiet)
        }
    }
}

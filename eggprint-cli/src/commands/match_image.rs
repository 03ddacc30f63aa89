//! Match command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use eggprint_core::{DecodeLimits, DuplicateMatcher, FingerprintError, MatchOutcome, MatchResult};
use tracing::info;

use crate::utils::format_similarity;
use crate::OutputFormat;

/// Execute the match command.
pub fn execute(
    image: PathBuf,
    manifest: PathBuf,
    threshold: Option<f64>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let matcher = DuplicateMatcher::load(&manifest)
        .with_context(|| format!("Failed to load manifest: {}", manifest.display()))?;

    let bytes = std::fs::read(&image)
        .with_context(|| format!("Failed to read image: {}", image.display()))?;
    info!(path = %image.display(), bytes = bytes.len(), "Read image");

    // local files are trusted: no decode deadline, only the pixel bounds
    let limits = DecodeLimits {
        max_bytes: usize::MAX,
        timeout: None,
        ..DecodeLimits::default()
    };
    let outcome = matcher
        .match_image_bytes(&bytes, &limits, threshold)
        .with_context(|| format!("Failed to fingerprint image: {}", image.display()))?;

    if !quiet {
        match format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&outcome)
                    .context("Failed to serialize match result")?;
                println!("{json}");
            }
            OutputFormat::Text => print_outcome(&outcome),
        }
    }

    match outcome {
        MatchOutcome::Match(result) => {
            info!(
                duplicate = result.duplicate,
                similarity = result.similarity,
                "Match complete"
            );
            Ok(())
        }
        MatchOutcome::VersionMismatch { manifest, query } => {
            bail!(FingerprintError::AlgorithmVersionMismatch {
                expected: manifest,
                found: query,
            })
        }
    }
}

fn print_outcome(outcome: &MatchOutcome) {
    println!();
    match outcome {
        MatchOutcome::Match(result) if result.duplicate => {
            println!("{}", "╔════════════════════════════════════════╗".red());
            println!("{}", "║              DUPLICATE                 ║".red().bold());
            println!("{}", "╚════════════════════════════════════════╝".red());
            println!();
            print_result(result);
        }
        MatchOutcome::Match(result) => {
            println!("{}", "╔════════════════════════════════════════╗".green());
            println!("{}", "║                UNIQUE                  ║".green().bold());
            println!("{}", "╚════════════════════════════════════════╝".green());
            println!();
            print_result(result);
        }
        MatchOutcome::VersionMismatch { manifest, query } => {
            println!("{}", "╔════════════════════════════════════════╗".yellow());
            println!("{}", "║           VERSION MISMATCH             ║".yellow().bold());
            println!("{}", "╚════════════════════════════════════════╝".yellow());
            println!();
            println!("   {} {}", "Manifest algorithm:".dimmed(), manifest);
            println!("   {} {}", "Query algorithm:".dimmed(), query);
        }
    }
}

fn print_result(result: &MatchResult) {
    println!(
        "   {} {}",
        "Similarity:".dimmed(),
        format_similarity(result.similarity)
    );
    println!(
        "   {} {}",
        "Threshold:".dimmed(),
        format_similarity(result.threshold)
    );
    match &result.matched_entry {
        Some(entry) => {
            println!("   {} {}", "Closest entry:".dimmed(), entry.relative_filename);
            println!("   {} {}", "Class:".dimmed(), entry.class_label);
            println!("   {} {}x{}", "Size:".dimmed(), entry.width, entry.height);
        }
        None => println!("   {} {}", "Closest entry:".dimmed(), "none (empty manifest)"),
    }
}

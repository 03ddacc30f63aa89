//! Generate command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use eggprint_core::builder::{BuildProgress, BuildReport, BuilderConfig, ManifestBuilder};
use eggprint_core::{AlgorithmId, ClassLabel};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::utils::{format_bytes, format_similarity};

/// Failed files listed in the summary before eliding the rest.
const MAX_LISTED_FAILURES: usize = 10;

pub struct GenerateArgs {
    pub data_dir: PathBuf,
    pub output: PathBuf,
    pub batch_size: usize,
    pub checkpoint_interval: usize,
    pub algorithm: AlgorithmId,
    pub threshold: f64,
    pub resume_from: Option<PathBuf>,
}

/// Drives an indicatif bar from builder progress notifications.
struct BarProgress(ProgressBar);

impl BuildProgress for BarProgress {
    fn start(&self, total: u64) {
        self.0.set_length(total);
    }

    fn advance(&self, delta: u64) {
        self.0.inc(delta);
    }

    fn finish(&self) {
        self.0.finish_and_clear();
    }
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images ({eta})",
    ) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

/// Execute the generate command.
pub fn execute(args: GenerateArgs, quiet: bool) -> Result<()> {
    let config = BuilderConfig {
        data_dir: args.data_dir,
        output: args.output,
        algorithm: args.algorithm,
        batch_size: args.batch_size,
        checkpoint_interval: args.checkpoint_interval,
        similarity_threshold: args.threshold,
        resume_from: args.resume_from,
        ..BuilderConfig::default()
    };

    info!(
        data_dir = %config.data_dir.display(),
        output = %config.output.display(),
        algorithm = %config.algorithm,
        batch_size = config.batch_size,
        "Generating manifest"
    );

    if !quiet {
        println!();
        println!("{}", "Generating fingerprint manifest".bold());
        println!("   {} {}", "Dataset:".dimmed(), config.data_dir.display());
        println!("   {} {}", "Algorithm:".dimmed(), config.algorithm);
        if let Some(resume) = &config.resume_from {
            println!("   {} {}", "Resuming from:".dimmed(), resume.display());
        }
        println!();
    }

    let data_dir = config.data_dir.clone();
    let report = ManifestBuilder::new(config)
        .with_progress(Arc::new(BarProgress(progress_bar(quiet))))
        .build()
        .with_context(|| format!("Failed to generate manifest from {}", data_dir.display()))?;

    if !quiet {
        print_summary(&report);
    }

    Ok(())
}

fn print_summary(report: &BuildReport) {
    let manifest = &report.manifest;
    let total = manifest.len();

    if total == 0 {
        println!("{}", "No images were fingerprinted.".yellow());
    } else {
        println!("{}", "Manifest generated!".green().bold());
    }
    println!();
    println!("   {} {}", "Total images:".dimmed(), total);
    for label in ClassLabel::ALL {
        println!(
            "   {} {}",
            format!("  {label}:").dimmed(),
            manifest.entries_for(label).count()
        );
    }
    if report.skipped > 0 {
        println!("   {} {}", "Resumed:".dimmed(), report.skipped);
    }
    println!("   {} {}", "Batches:".dimmed(), report.batches.len());
    println!("   {} {}", "Checkpoints:".dimmed(), report.checkpoints.len());
    println!(
        "   {} {}",
        "Threshold:".dimmed(),
        format_similarity(manifest.metadata.similarity_threshold)
    );
    println!("   {} {}", "Output:".dimmed(), report.output.display());
    println!("   {} {}", "File size:".dimmed(), format_bytes(report.file_size));
    if total > 0 {
        println!(
            "   {} {}",
            "Per image:".dimmed(),
            format_bytes(report.file_size / total as u64)
        );
    }
    println!("   {} {:.1}s", "Elapsed:".dimmed(), report.elapsed.as_secs_f64());

    if !report.failures.is_empty() {
        println!();
        println!(
            "{}",
            format!("{} image(s) could not be processed:", report.failures.len()).yellow()
        );
        for failure in report.failures.iter().take(MAX_LISTED_FAILURES) {
            println!("   {} {}", failure.relative_filename, failure.message.dimmed());
        }
        if report.failures.len() > MAX_LISTED_FAILURES {
            println!(
                "   {}",
                format!("... and {} more", report.failures.len() - MAX_LISTED_FAILURES).dimmed()
            );
        }
    }
}

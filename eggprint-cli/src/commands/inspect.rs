//! Inspect command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use eggprint_core::{ClassLabel, Manifest, ManifestMetadata};
use serde::Serialize;
use tracing::info;

use crate::utils::{format_similarity, format_timestamp};
use crate::OutputFormat;

#[derive(Serialize)]
struct ClassCount {
    class: ClassLabel,
    images: usize,
}

#[derive(Serialize)]
struct InspectReport<'a> {
    metadata: &'a ManifestMetadata,
    classes: Vec<ClassCount>,
}

/// Execute the inspect command.
pub fn execute(path: PathBuf, format: OutputFormat, quiet: bool) -> Result<()> {
    let manifest = Manifest::load(&path)
        .with_context(|| format!("Failed to load manifest: {}", path.display()))?;
    info!(path = %path.display(), images = manifest.len(), "Manifest is valid");

    if quiet {
        return Ok(());
    }

    let report = InspectReport {
        metadata: &manifest.metadata,
        classes: ClassLabel::ALL
            .into_iter()
            .map(|class| ClassCount {
                class,
                images: manifest.entries_for(class).count(),
            })
            .collect(),
    };

    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{json}");
        }
        OutputFormat::Text => {
            let meta = report.metadata;
            println!();
            println!("{}", "Manifest is valid".green().bold());
            println!();
            println!("   {} {}", "File:".dimmed(), path.display());
            println!("   {} {}", "Version:".dimmed(), meta.version);
            println!("   {} {}", "Algorithm:".dimmed(), meta.algorithm_id);
            println!("   {} {}", "Generated:".dimmed(), format_timestamp(&meta.generated_at));
            println!(
                "   {} {}",
                "Threshold:".dimmed(),
                format_similarity(meta.similarity_threshold)
            );
            println!("   {} {}", "Total images:".dimmed(), meta.total_images);
            for count in &report.classes {
                println!("   {} {}", format!("  {}:", count.class).dimmed(), count.images);
            }
        }
    }

    Ok(())
}

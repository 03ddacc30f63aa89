//! End-to-end manifest generation over synthetic datasets.

use std::fs;
use std::path::Path;

use eggprint_core::builder::{BuilderConfig, ManifestBuilder};
use eggprint_core::manifest::checkpoint_path;
use eggprint_core::{AlgorithmId, ClassLabel, Manifest, HASH_BITS};
use image::{Rgb, RgbImage};
use tempfile::TempDir;

/// Write `count` small distinct PNGs into `dir`.
fn populate(dir: &Path, count: usize, seed: u32) {
    fs::create_dir_all(dir).unwrap();
    for i in 0..count as u32 {
        let img = RgbImage::from_fn(6, 4, |x, y| {
            Rgb([
                ((i * 7 + seed) % 256) as u8,
                ((x * 40 + i) % 256) as u8,
                ((y * 60 + seed * 3) % 256) as u8,
            ])
        });
        img.save(dir.join(format!("{i:03}.png"))).unwrap();
    }
}

// ============================================================================
// Batching and checkpoints
// ============================================================================

#[test]
fn test_250_images_three_batches_one_checkpoint() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("dataset");
    populate(&data_dir.join("fertile"), 125, 1);
    populate(&data_dir.join("infertile"), 125, 2);

    let output = temp.path().join("out/fingerprints.json");
    let config = BuilderConfig {
        data_dir,
        output: output.clone(),
        batch_size: 100,
        checkpoint_interval: 200,
        ..BuilderConfig::default()
    };

    let report = ManifestBuilder::new(config).build().expect("build should succeed");

    assert_eq!(report.batches, vec![100, 100, 50]);
    assert!(report.failures.is_empty());

    let expected_checkpoint = checkpoint_path(&output, 200);
    assert_eq!(report.checkpoints, vec![expected_checkpoint.clone()]);
    assert_eq!(
        expected_checkpoint.file_name().unwrap(),
        "fingerprints_checkpoint_200.json"
    );

    let checkpoint = Manifest::load(&expected_checkpoint).unwrap();
    assert_eq!(checkpoint.metadata.total_images, 200);
    assert_eq!(checkpoint.images.len(), 200);

    let final_manifest = Manifest::load(&output).unwrap();
    assert_eq!(final_manifest.metadata.total_images, 250);
    assert_eq!(final_manifest.entries_for(ClassLabel::Fertile).count(), 125);
    assert_eq!(final_manifest.entries_for(ClassLabel::Infertile).count(), 125);

    // checkpoint is a prefix of the final manifest
    assert_eq!(checkpoint.images[..], final_manifest.images[..200]);
}

#[test]
fn test_250_images_in_one_class() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("dataset");
    populate(&data_dir.join("fertil"), 250, 5);

    let output = temp.path().join("fingerprints.json");
    let report = ManifestBuilder::new(BuilderConfig {
        data_dir,
        output: output.clone(),
        batch_size: 100,
        checkpoint_interval: 200,
        ..BuilderConfig::default()
    })
    .build()
    .expect("build should succeed");

    assert_eq!(report.batches, vec![100, 100, 50]);
    assert_eq!(report.checkpoints, vec![checkpoint_path(&output, 200)]);

    let checkpoint = Manifest::load(&checkpoint_path(&output, 200)).unwrap();
    assert_eq!(checkpoint.images.len(), 200);

    let final_manifest = Manifest::load(&output).unwrap();
    assert_eq!(final_manifest.images.len(), 250);
    assert_eq!(final_manifest.entries_for(ClassLabel::Fertile).count(), 250);
    assert_eq!(final_manifest.entries_for(ClassLabel::Infertile).count(), 0);
    assert_eq!(final_manifest.images[249].relative_filename, "fertil/249.png");
}

#[test]
fn test_entries_follow_sorted_input_order() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("dataset");
    populate(&data_dir.join("infertil"), 4, 9);
    populate(&data_dir.join("fertil"), 4, 3);

    let report = ManifestBuilder::new(BuilderConfig {
        data_dir,
        output: temp.path().join("fingerprints.json"),
        batch_size: 3,
        ..BuilderConfig::default()
    })
    .build()
    .unwrap();

    let names: Vec<_> = report
        .manifest
        .images
        .iter()
        .map(|e| e.relative_filename.as_str())
        .collect();
    assert_eq!(
        names,
        [
            "fertil/000.png",
            "fertil/001.png",
            "fertil/002.png",
            "fertil/003.png",
            "infertil/000.png",
            "infertil/001.png",
            "infertil/002.png",
            "infertil/003.png",
        ]
    );
    assert_eq!(report.batches, vec![3, 3, 2]);
    assert!(report.checkpoints.is_empty());
}

// ============================================================================
// Determinism and persistence
// ============================================================================

#[test]
fn test_rebuild_is_deterministic() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("dataset");
    populate(&data_dir.join("fertile"), 10, 5);

    for algorithm in AlgorithmId::ALL {
        let build = |name: &str| {
            ManifestBuilder::new(BuilderConfig {
                data_dir: data_dir.clone(),
                output: temp.path().join(name),
                algorithm,
                batch_size: 4,
                ..BuilderConfig::default()
            })
            .build()
            .unwrap()
            .manifest
        };
        let a = build("a.json");
        let b = build("b.json");
        assert_eq!(a.images, b.images, "{algorithm}");
        assert_eq!(a.algorithm_id(), algorithm);
        for entry in &a.images {
            for (name, bits) in entry.hashes.iter() {
                assert_eq!(bits.len(), HASH_BITS, "{algorithm} {name}");
            }
        }
    }
}

#[test]
fn test_written_manifest_round_trips() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("dataset");
    populate(&data_dir.join("fertile"), 3, 1);
    populate(&data_dir.join("infertile"), 2, 7);

    let output = temp.path().join("fingerprints.json");
    let report = ManifestBuilder::new(BuilderConfig {
        data_dir,
        output: output.clone(),
        ..BuilderConfig::default()
    })
    .build()
    .unwrap();

    let loaded = Manifest::load(&output).unwrap();
    assert_eq!(loaded, report.manifest);

    let json = fs::read_to_string(&output).unwrap();
    let reparsed = Manifest::from_json(&json).unwrap();
    assert_eq!(reparsed.to_json().unwrap(), json);
}

#[test]
fn test_resume_after_interrupted_run() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("dataset");
    populate(&data_dir.join("fertile"), 5, 2);
    let output = temp.path().join("fingerprints.json");

    let config = BuilderConfig {
        data_dir: data_dir.clone(),
        output: output.clone(),
        batch_size: 2,
        checkpoint_interval: 2,
        ..BuilderConfig::default()
    };
    let full = ManifestBuilder::new(config.clone()).build().unwrap();
    assert_eq!(full.checkpoints.len(), 2);

    // continue from the first checkpoint as if the run had stopped there
    let resumed = ManifestBuilder::new(BuilderConfig {
        resume_from: Some(checkpoint_path(&output, 2)),
        ..config
    })
    .build()
    .unwrap();

    assert_eq!(resumed.skipped, 2);
    assert_eq!(resumed.batches, vec![2, 1]);
    assert_eq!(resumed.manifest.images, full.manifest.images);
}

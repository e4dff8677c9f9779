//! Integration tests for the aapso pipeline.
//!
//! These tests verify end-to-end workflows combining multiple components.

use aapso::config::ExperimentConfig;
use aapso::metaheuristics::FitnessEvaluation;
use aapso::prelude::*;
use aapso::transfer::BackboneKind;
use image::{Rgb, RgbImage};
use std::path::Path;
use tempfile::tempdir;

/// `root/{train,val}/{red,blue,green}/*.png`, one solid color per class
/// with small per-image variations.
fn write_image_tree(root: &Path, train_per_class: usize, val_per_class: usize) {
    let palette = [("blue", [20u8, 30, 220]), ("green", [30, 200, 40]), ("red", [210, 25, 30])];
    for (split, n) in [("train", train_per_class), ("val", val_per_class)] {
        for (class, rgb) in palette {
            let dir = root.join(split).join(class);
            std::fs::create_dir_all(&dir).expect("create class dir");
            for i in 0..n {
                let jitter = (i * 5) as u8;
                let px = Rgb([
                    rgb[0].saturating_add(jitter),
                    rgb[1].saturating_sub(jitter),
                    rgb[2].saturating_add(jitter / 2),
                ]);
                RgbImage::from_pixel(24, 20, px)
                    .save(dir.join(format!("sample_{i}.png")))
                    .expect("write png");
            }
        }
    }
}

fn tiny_config(root: &Path) -> ExperimentConfig {
    let mut config = ExperimentConfig::default();
    config.seed = Some(17);
    config.data.data_directory = root.to_path_buf();
    config.data.image_size = 16;
    config.data.batch_size = 4;
    config.train.backbone = BackboneKind::Tiny;
    config.train.hidden_units = 16;
    config.train.epochs = 2;
    config.train.learning_rate = 1e-3;
    config.swarm.num_agents = 5;
    config.swarm.max_iter = 3;
    config.swarm.k = 3;
    config.validation.k = 3;
    config
}

#[test]
fn test_image_folder_to_report_workflow() {
    let dir = tempdir().expect("temp dir");
    write_image_tree(dir.path(), 5, 2);
    let mut config = tiny_config(dir.path());
    config.validation.plot_dir = Some(dir.path().join("plots"));

    let report = run_experiment(&config).expect("pipeline succeeds");

    assert_eq!(report.classes, vec!["blue", "green", "red"]);
    assert_eq!(report.train_batches, 4); // 15 images in batches of 4
    assert_eq!(report.val_batches, 6); // batch size 1
    assert_eq!(report.history.epochs(), 2);
    assert_eq!(report.n_samples, 21);
    assert_eq!(report.n_features, 16);

    let selection = &report.selection;
    assert_eq!(selection.convergence_curve.len(), 4);
    assert_eq!(selection.mask.len(), 16);
    assert!(selection.n_selected >= 1);
    assert!(selection.score > WORST_FITNESS);

    let validation = report.validation.as_ref().expect("non-empty best mask");
    assert_eq!(validation.selected_indices, selection.selected_indices);
    assert_eq!(validation.confusion.shape(), (3, 3));
    assert_eq!(validation.report.classes.len(), 3);
    let total: usize = validation.confusion.row_sums().iter().sum();
    assert_eq!(total, validation.y_true.len());

    let plot = report.plot.expect("plot requested");
    assert!(plot.is_file());
}

#[test]
fn test_seeded_experiment_is_reproducible() {
    let dir = tempdir().expect("temp dir");
    write_image_tree(dir.path(), 4, 2);
    let config = tiny_config(dir.path());

    let first = run_experiment(&config).expect("first run");
    let second = run_experiment(&config).expect("second run");
    assert_eq!(first.history.train, second.history.train);
    assert_eq!(first.selection.mask, second.selection.mask);
    assert_eq!(first.selection.score, second.selection.score);
    assert_eq!(
        first.validation.map(|v| v.y_pred),
        second.validation.map(|v| v.y_pred)
    );
}

#[test]
fn test_validation_class_outside_training_is_rejected() {
    let dir = tempdir().expect("temp dir");
    write_image_tree(dir.path(), 3, 1);
    let stray = dir.path().join("val").join("purple");
    std::fs::create_dir_all(&stray).expect("mkdir");
    RgbImage::from_pixel(8, 8, Rgb([120, 0, 120]))
        .save(stray.join("x.png"))
        .expect("write png");

    assert!(matches!(
        run_experiment(&tiny_config(dir.path())),
        Err(AapsoError::Data { .. })
    ));
}

#[test]
fn test_feature_matrix_selection_and_validation_workflow() {
    // columns 0 and 1 encode the class, columns 2..8 are deterministic noise
    let rows: Vec<Vec<f32>> = (0..60)
        .map(|i| {
            let class = (i % 3) as f32;
            let mut row = vec![class * 20.0, class * -15.0];
            row.extend((2..8).map(|j| ((i * 31 + j * 17) % 23) as f32 / 2.0));
            row
        })
        .collect();
    let y: Vec<usize> = (0..60).map(|i| i % 3).collect();
    let x = Matrix::from_rows(&rows).expect("equal rows");

    let optimizer = Aapso::new()
        .with_population_size(10)
        .with_max_iter(15)
        .with_seed(5);
    let options = WrapperOptions {
        k: 5,
        evaluation: FitnessEvaluation::CrossValidation { folds: 3 },
        seed: Some(5),
        ..WrapperOptions::default()
    };
    let selection = select_features(&x, &y, &optimizer, options).expect("valid data");
    assert!(selection.accuracy.expect("non-empty mask") > 0.9);
    assert!(selection.n_selected < 8);

    let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let report = validate_selection(
        &x,
        &y,
        &selection.mask,
        &labels,
        ValidationOptions {
            k: 5,
            test_size: 0.2,
            seed: Some(5),
        },
    )
    .expect("valid selection");
    assert!(report.accuracy > 0.9);
    assert!(report.f1 > 0.9);
    assert_eq!(report.y_true.len(), 12);
}

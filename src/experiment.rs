//! End-to-end experiment: fine-tune, extract, select, validate.

use crate::config::ExperimentConfig;
use crate::data::{Compose, DataLoader, ImageFolder};
use crate::error::Result;
use crate::metaheuristics::{
    select_features, validate_selection, FeatureSelectionResult, ValidationOptions,
    ValidationReport,
};
use crate::primitives::Matrix;
use crate::train::{get_features, train_model, TrainingHistory};
use crate::transfer::{ConvNet, TransferEncoder};
use crate::viz::save_confusion_png;
use std::path::PathBuf;
use tracing::{info, warn};

/// File name of the confusion-matrix plot inside the plot directory.
pub const CONFUSION_PLOT: &str = "confusion_matrix.png";

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct ExperimentReport {
    /// Class names; index `i` is label `i`
    pub classes: Vec<String>,
    /// Batches per training pass
    pub train_batches: usize,
    /// Batches per validation pass
    pub val_batches: usize,
    /// Fine-tuning record
    pub history: TrainingHistory,
    /// Rows of the extracted feature matrix (train then val)
    pub n_samples: usize,
    /// Columns of the extracted feature matrix
    pub n_features: usize,
    /// AAPSO outcome
    pub selection: FeatureSelectionResult,
    /// k-NN metrics on the selected features; `None` when the best mask
    /// selects nothing
    pub validation: Option<ValidationReport>,
    /// Confusion-matrix PNG, when a plot directory was configured
    pub plot: Option<PathBuf>,
}

/// Runs the whole pipeline described by `config`.
///
/// # Errors
///
/// Returns the first error of any stage; nothing is retried.
pub fn run_experiment(config: &ExperimentConfig) -> Result<ExperimentReport> {
    config.validate()?;
    let seed = config.seed;
    let size = config.data.image_size;

    let train_set = ImageFolder::new(config.data.train_dir(), Compose::training(size))?;
    let val_set = ImageFolder::with_classes(
        config.data.val_dir(),
        train_set.classes(),
        Compose::evaluation(size),
    )?;
    let classes = train_set.classes().to_vec();
    info!(
        classes = classes.len(),
        train = train_set.samples().len(),
        val = val_set.samples().len(),
        "datasets indexed"
    );

    let mut train_loader = DataLoader::new(&train_set, config.data.batch_size).with_shuffle(true);
    if let Some(s) = seed {
        train_loader = train_loader.with_seed(s);
    }
    let mut val_loader = DataLoader::new(&val_set, 1);
    info!("Length of training loader = {}", train_loader.len());
    info!("Length of validation loader = {}", val_loader.len());
    let (train_batches, val_batches) = (train_loader.len(), val_loader.len());

    let mut model = ConvNet::new(
        config.train.backbone,
        classes.len(),
        config.train.hidden_units,
        seed,
    )?;
    if let Some(path) = &config.train.pretrained {
        model.load_pretrained(path)?;
    }
    if config.train.freeze_backbone {
        model.freeze_base();
    }

    let history = train_model(
        &mut model,
        &mut train_loader,
        &mut val_loader,
        &config.train.options(),
    )?;

    let train_eval = train_set.with_transform(Compose::evaluation(size));
    let (x, y) = get_features(
        &mut model,
        &mut DataLoader::new(&train_eval, config.data.batch_size),
        &mut DataLoader::new(&val_set, config.data.batch_size),
    )?;

    let optimizer = config.swarm.optimizer(seed);
    info!(
        agents = optimizer.population_size,
        iterations = optimizer.max_iter,
        features = x.n_cols(),
        "starting AAPSO"
    );
    let selection = select_features(&x, &y, &optimizer, config.swarm.wrapper(seed))?;
    info!(
        selected = selection.n_selected,
        fitness = selection.score,
        "AAPSO finished in {:.2?}",
        selection.execution_time
    );

    let validation = validate_best(
        &x,
        &y,
        &selection,
        &classes,
        config.validation.options(seed),
    )?;

    let plot = match (&config.validation.plot_dir, &validation) {
        (Some(dir), Some(v)) => {
            let path = dir.join(CONFUSION_PLOT);
            save_confusion_png(&v.confusion, &path)?;
            info!(path = %path.display(), "confusion matrix plot written");
            Some(path)
        }
        _ => None,
    };

    Ok(ExperimentReport {
        classes,
        train_batches,
        val_batches,
        history,
        n_samples: x.n_rows(),
        n_features: x.n_cols(),
        selection,
        validation,
        plot,
    })
}

/// Validates the best subset; an empty best mask skips validation.
fn validate_best(
    x: &Matrix<f32>,
    y: &[usize],
    selection: &FeatureSelectionResult,
    classes: &[String],
    options: ValidationOptions,
) -> Result<Option<ValidationReport>> {
    if selection.n_selected == 0 {
        warn!(
            fitness = selection.score,
            "best mask selects no feature, skipping validation"
        );
        return Ok(None);
    }
    validate_selection(x, y, &selection.mask, classes, options).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AapsoError;
    use crate::metaheuristics::{Aapso, WrapperOptions};
    use tempfile::tempdir;

    #[test]
    fn test_missing_data_directory_fails_early() {
        let dir = tempdir().expect("temp dir");
        let mut config = ExperimentConfig::default();
        config.data.data_directory = dir.path().join("absent");
        assert!(matches!(
            run_experiment(&config),
            Err(AapsoError::Data { .. })
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected_before_io() {
        let mut config = ExperimentConfig::default();
        config.swarm.num_agents = 0;
        assert!(matches!(
            run_experiment(&config),
            Err(AapsoError::InvalidHyperparameter { .. })
        ));
    }

    #[test]
    fn test_empty_best_mask_skips_validation() {
        let x = Matrix::from_vec(6, 1, vec![0.0, 0.1, 0.2, 5.0, 5.1, 5.2]).expect("6x1");
        let y = vec![0, 0, 0, 1, 1, 1];
        let classes = vec!["a".to_string(), "b".to_string()];
        let wrapper = WrapperOptions {
            k: 1,
            seed: Some(0),
            ..WrapperOptions::default()
        };

        // a lone agent that starts below the threshold never selects anything
        let empty = (0..64)
            .map(|seed| {
                let optimizer = Aapso::new()
                    .with_population_size(1)
                    .with_max_iter(0)
                    .with_seed(seed);
                select_features(&x, &y, &optimizer, wrapper).expect("valid data")
            })
            .find(|s| s.n_selected == 0)
            .expect("some seed yields an empty mask");

        let options = ValidationOptions {
            k: 1,
            test_size: 0.34,
            seed: Some(0),
        };
        assert!(validate_best(&x, &y, &empty, &classes, options)
            .expect("skipped")
            .is_none());

        let full = FeatureSelectionResult {
            selected_indices: vec![0],
            n_selected: 1,
            mask: vec![true],
            accuracy: Some(1.0),
            ..empty
        };
        let report = validate_best(&x, &y, &full, &classes, options)
            .expect("valid")
            .expect("validated");
        assert_eq!(report.confusion.shape(), (2, 2));
    }
}

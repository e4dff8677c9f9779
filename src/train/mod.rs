//! Fine-tuning loop and penultimate-feature extraction.
//!
//! Each epoch runs a `training` phase (forward, backward, Adam step) and
//! a `validation` phase (forward only). The step schedule decays the
//! learning rate after every training phase, and the weights with the
//! best validation accuracy are restored once training ends.

use crate::data::{DataLoader, Dataset};
use crate::error::{AapsoError, Result};
use crate::nn::{Adam, CrossEntropyLoss, LRScheduler, Module, Optimizer, StepLR};
use crate::primitives::Matrix;
use crate::serialization::StateDict;
use crate::transfer::TransferEncoder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Phase of a training epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Parameters are updated
    Training,
    /// Parameters are only evaluated
    Validation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Training => "training",
            Phase::Validation => "validation",
        })
    }
}

/// Hyperparameters of [`train_model`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainOptions {
    /// Number of epochs
    pub epochs: usize,
    /// Initial Adam learning rate
    pub learning_rate: f32,
    /// Epochs between learning-rate decays
    pub step_size: usize,
    /// Decay factor applied every `step_size` epochs
    pub gamma: f32,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 10,
            learning_rate: 1e-4,
            step_size: 5,
            gamma: 0.1,
        }
    }
}

/// Mean loss and accuracy of one phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseMetrics {
    /// Sample-weighted mean loss
    pub loss: f32,
    /// Fraction of correct predictions
    pub accuracy: f32,
}

/// Per-epoch record of a training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Training-phase metrics, one per epoch
    pub train: Vec<PhaseMetrics>,
    /// Validation-phase metrics, one per epoch
    pub val: Vec<PhaseMetrics>,
    /// Learning rate in effect during each epoch
    pub learning_rates: Vec<f32>,
    /// Best validation accuracy
    pub best_val_acc: f32,
    /// Epoch (0-based) whose weights were restored
    pub best_epoch: Option<usize>,
    /// Wall-clock training time
    pub elapsed: Duration,
}

impl TrainingHistory {
    /// Number of completed epochs.
    #[must_use]
    pub fn epochs(&self) -> usize {
        self.train.len()
    }
}

/// Copies every parameter value of `model`.
#[must_use]
pub fn snapshot<M: Module + ?Sized>(model: &M) -> StateDict {
    model
        .named_parameters()
        .into_iter()
        .map(|(name, p)| (name, p.value.clone()))
        .collect()
}

/// Writes a [`snapshot`] back into `model`.
///
/// # Errors
///
/// Returns an error if a parameter is missing or has a different shape.
pub fn restore<M: Module + ?Sized>(model: &mut M, state: &StateDict) -> Result<()> {
    for (name, param) in model.named_parameters_mut() {
        let value = state
            .get(&name)
            .ok_or_else(|| AapsoError::Other(format!("snapshot has no parameter {name}")))?;
        param.assign(value.clone())?;
    }
    Ok(())
}

fn run_phase<M, D>(
    model: &mut M,
    loader: &mut DataLoader<'_, D>,
    phase: Phase,
    criterion: &CrossEntropyLoss,
    optimizer: &mut Adam,
) -> Result<PhaseMetrics>
where
    M: Module + ?Sized,
    D: Dataset + ?Sized,
{
    model.set_training(phase == Phase::Training);
    let (mut loss_sum, mut correct, mut seen) = (0.0f64, 0usize, 0usize);

    for batch in loader.batches() {
        let batch = batch?;
        let logits = model.forward(&batch.inputs)?;
        let (loss, grad) = criterion.forward(&logits, &batch.targets)?;
        if phase == Phase::Training {
            model.zero_grad();
            model.backward(&grad)?;
            optimizer.step(&mut model.parameters_mut());
        }
        let preds = logits.argmax_rows()?;
        correct += preds
            .iter()
            .zip(&batch.targets)
            .filter(|(p, t)| p == t)
            .count();
        loss_sum += f64::from(loss) * batch.len() as f64;
        seen += batch.len();
    }

    if seen == 0 {
        return Err(AapsoError::empty_input(&format!("{phase} loader")));
    }
    Ok(PhaseMetrics {
        loss: (loss_sum / seen as f64) as f32,
        accuracy: correct as f32 / seen as f32,
    })
}

/// Fine-tunes `model` and restores its best-validation weights.
///
/// # Errors
///
/// Returns an error if either loader is empty, a batch fails to load, or
/// the model rejects a batch.
pub fn train_model<M, A, B>(
    model: &mut M,
    train_loader: &mut DataLoader<'_, A>,
    val_loader: &mut DataLoader<'_, B>,
    options: &TrainOptions,
) -> Result<TrainingHistory>
where
    M: Module + ?Sized,
    A: Dataset + ?Sized,
    B: Dataset + ?Sized,
{
    if options.learning_rate <= 0.0 || !options.learning_rate.is_finite() {
        return Err(AapsoError::invalid_hyperparameter(
            "learning_rate",
            options.learning_rate,
            "finite and > 0",
        ));
    }
    if train_loader.is_empty() {
        return Err(AapsoError::empty_input("training set"));
    }
    if val_loader.is_empty() {
        return Err(AapsoError::empty_input("validation set"));
    }

    let start = Instant::now();
    let criterion = CrossEntropyLoss::new();
    let mut optimizer = Adam::new(options.learning_rate);
    let mut scheduler = StepLR::new(options.step_size, options.gamma);
    let mut history = TrainingHistory::default();
    let mut best = snapshot(model);

    for epoch in 0..options.epochs {
        info!(epoch = epoch + 1, epochs = options.epochs, "epoch");
        history.learning_rates.push(optimizer.lr());

        let train = run_phase(model, train_loader, Phase::Training, &criterion, &mut optimizer)?;
        scheduler.step(&mut optimizer);
        info!(phase = %Phase::Training, "Loss: {:.4} Acc: {:.4}", train.loss, train.accuracy);

        let val = run_phase(model, val_loader, Phase::Validation, &criterion, &mut optimizer)?;
        info!(phase = %Phase::Validation, "Loss: {:.4} Acc: {:.4}", val.loss, val.accuracy);

        if history.best_epoch.is_none() || val.accuracy > history.best_val_acc {
            history.best_val_acc = val.accuracy;
            history.best_epoch = Some(epoch);
            best = snapshot(model);
            debug!(epoch = epoch + 1, accuracy = val.accuracy, "new best weights");
        }
        history.train.push(train);
        history.val.push(val);
    }

    restore(model, &best)?;
    model.set_training(false);
    history.elapsed = start.elapsed();
    let secs = history.elapsed.as_secs();
    info!("Training complete in {}mins {}s", secs / 60, secs % 60);
    info!("Best val Acc: {:.4}", history.best_val_acc);
    Ok(history)
}

/// Runs `model` in inference mode over `loader`, collecting penultimate
/// activations (one row per sample, in loader order) and labels.
///
/// # Errors
///
/// Returns an error if the loader is empty or a batch fails.
pub fn extract_features<M, D>(
    model: &mut M,
    loader: &mut DataLoader<'_, D>,
) -> Result<(Matrix<f32>, Vec<usize>)>
where
    M: TransferEncoder + ?Sized,
    D: Dataset + ?Sized,
{
    model.set_training(false);
    let mut data = Vec::new();
    let mut labels = Vec::with_capacity(loader.num_samples());
    let mut width = None;

    for batch in loader.batches() {
        let batch = batch?;
        let features = model.extract_features(&batch.inputs)?;
        features.expect_ndim(2, "penultimate features")?;
        let cols = features.dim(1);
        let expected = *width.get_or_insert(cols);
        if expected != cols {
            return Err(AapsoError::dimension_mismatch("feature width", expected, cols));
        }
        data.extend_from_slice(features.data());
        labels.extend_from_slice(&batch.targets);
    }

    let cols = width.ok_or_else(|| AapsoError::empty_input("feature extraction loader"))?;
    let matrix = Matrix::from_vec(labels.len(), cols, data)?;
    debug!(samples = labels.len(), features = cols, "extracted features");
    Ok((matrix, labels))
}

/// Features of the training set followed by the validation set.
///
/// # Errors
///
/// Returns an error if extraction fails on either loader.
pub fn get_features<M, A, B>(
    model: &mut M,
    train_loader: &mut DataLoader<'_, A>,
    val_loader: &mut DataLoader<'_, B>,
) -> Result<(Matrix<f32>, Vec<usize>)>
where
    M: TransferEncoder + ?Sized,
    A: Dataset + ?Sized,
    B: Dataset + ?Sized,
{
    let (train_x, mut y) = extract_features(model, train_loader)?;
    let (val_x, val_y) = extract_features(model, val_loader)?;
    if train_x.n_cols() != val_x.n_cols() {
        return Err(AapsoError::dimension_mismatch(
            "validation feature width",
            train_x.n_cols(),
            val_x.n_cols(),
        ));
    }
    let mut data = train_x.as_slice().to_vec();
    data.extend_from_slice(val_x.as_slice());
    y.extend(val_y);
    let x = Matrix::from_vec(y.len(), train_x.n_cols(), data)?;
    info!(samples = x.n_rows(), features = x.n_cols(), "feature matrix assembled");
    Ok((x, y))
}

#[cfg(test)]
mod tests;

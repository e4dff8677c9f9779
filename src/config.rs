//! Experiment configuration.
//!
//! Every field has a default, so a JSON file only needs the values it
//! changes:
//!
//! ```
//! use aapso::config::ExperimentConfig;
//!
//! let config = ExperimentConfig::from_json(r#"{ "train": { "epochs": 3 } }"#)
//!     .expect("valid config");
//! assert_eq!(config.train.epochs, 3);
//! assert_eq!(config.swarm.num_agents, 30);
//! ```

use crate::error::{AapsoError, Result};
use crate::metaheuristics::{Aapso, FitnessEvaluation, ValidationOptions, WrapperOptions};
use crate::train::TrainOptions;
use crate::transfer::BackboneKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Dataset location and preprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding `train/` and `val/`
    pub data_directory: PathBuf,
    /// Side of the square network input
    pub image_size: u32,
    /// Training mini-batch size
    pub batch_size: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from("./"),
            image_size: 224,
            batch_size: 32,
        }
    }
}

impl DataConfig {
    /// Data directory without trailing separators.
    #[must_use]
    pub fn root(&self) -> PathBuf {
        let raw = self.data_directory.to_string_lossy();
        let trimmed = raw.trim_end_matches('/');
        if trimmed.is_empty() {
            if raw.starts_with('/') {
                PathBuf::from("/")
            } else {
                PathBuf::from(".")
            }
        } else {
            PathBuf::from(trimmed)
        }
    }

    /// Training image tree.
    #[must_use]
    pub fn train_dir(&self) -> PathBuf {
        self.root().join("train")
    }

    /// Validation image tree.
    #[must_use]
    pub fn val_dir(&self) -> PathBuf {
        self.root().join("val")
    }
}

/// Network and fine-tuning settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Number of epochs
    pub epochs: usize,
    /// Initial Adam learning rate
    pub learning_rate: f32,
    /// Epochs between learning-rate decays
    #[serde(alias = "stepLR")]
    pub step_lr: usize,
    /// Learning-rate decay factor
    pub gamma: f32,
    /// Backbone architecture
    pub backbone: BackboneKind,
    /// Width of the penultimate layer, i.e. the number of extracted features
    pub hidden_units: usize,
    /// `SafeTensors` checkpoint for the backbone
    pub pretrained: Option<PathBuf>,
    /// Train only the head
    pub freeze_backbone: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        let options = TrainOptions::default();
        Self {
            epochs: options.epochs,
            learning_rate: options.learning_rate,
            step_lr: options.step_size,
            gamma: options.gamma,
            backbone: BackboneKind::default(),
            hidden_units: 512,
            pretrained: None,
            freeze_backbone: false,
        }
    }
}

impl TrainConfig {
    /// Options for [`train_model`](crate::train::train_model).
    #[must_use]
    pub fn options(&self) -> TrainOptions {
        TrainOptions {
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            step_size: self.step_lr,
            gamma: self.gamma,
        }
    }
}

/// AAPSO search and wrapper fitness settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Number of agents
    pub num_agents: usize,
    /// Number of iterations
    pub max_iter: usize,
    /// Initial exploration amplitude
    pub alpha0: f64,
    /// Exploration decay per iteration
    pub alpha_decay: f64,
    /// Global-best acceleration at the first iteration
    pub beta_min: f64,
    /// Global-best acceleration at the last iteration
    pub beta_max: f64,
    /// Personal-best attraction
    pub personal_weight: f64,
    /// Mask threshold
    pub threshold: f64,
    /// Neighbors of the wrapper k-NN
    pub k: usize,
    /// Weight of accuracy in the fitness
    pub weight_acc: f64,
    /// Accuracy estimation scheme
    pub evaluation: FitnessEvaluation,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        let aapso = Aapso::default();
        let wrapper = WrapperOptions::default();
        Self {
            num_agents: aapso.population_size,
            max_iter: aapso.max_iter,
            alpha0: aapso.alpha0,
            alpha_decay: aapso.alpha_decay,
            beta_min: aapso.beta_min,
            beta_max: aapso.beta_max,
            personal_weight: aapso.personal_weight,
            threshold: aapso.threshold,
            k: wrapper.k,
            weight_acc: wrapper.weight_acc,
            evaluation: wrapper.evaluation,
        }
    }
}

impl SwarmConfig {
    /// The configured optimizer.
    #[must_use]
    pub fn optimizer(&self, seed: Option<u64>) -> Aapso {
        let aapso = Aapso::new()
            .with_population_size(self.num_agents)
            .with_max_iter(self.max_iter)
            .with_exploration(self.alpha0, self.alpha_decay)
            .with_acceleration(self.beta_min, self.beta_max)
            .with_personal_weight(self.personal_weight)
            .with_threshold(self.threshold);
        match seed {
            Some(s) => aapso.with_seed(s),
            None => aapso,
        }
    }

    /// The configured wrapper fitness options.
    #[must_use]
    pub fn wrapper(&self, seed: Option<u64>) -> WrapperOptions {
        WrapperOptions {
            k: self.k,
            weight_acc: self.weight_acc,
            evaluation: self.evaluation,
            seed,
        }
    }
}

/// Final k-NN validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Neighbors of the validation k-NN
    pub k: usize,
    /// Held-out fraction
    pub test_size: f32,
    /// Directory for the confusion-matrix PNG
    pub plot_dir: Option<PathBuf>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let options = ValidationOptions::default();
        Self {
            k: options.k,
            test_size: options.test_size,
            plot_dir: None,
        }
    }
}

impl ValidationConfig {
    /// Options for [`validate_selection`](crate::metaheuristics::validate_selection).
    #[must_use]
    pub fn options(&self, seed: Option<u64>) -> ValidationOptions {
        ValidationOptions {
            k: self.k,
            test_size: self.test_size,
            seed,
        }
    }
}

/// Complete experiment configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Seed shared by every random stage; `None` draws from entropy
    pub seed: Option<u64>,
    /// Dataset
    pub data: DataConfig,
    /// Fine-tuning
    pub train: TrainConfig,
    /// Feature selection
    pub swarm: SwarmConfig,
    /// Final validation
    pub validation: ValidationConfig,
}

fn check(ok: bool, param: &str, value: impl std::fmt::Display, constraint: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(AapsoError::invalid_hyperparameter(param, value, constraint))
    }
}

impl ExperimentConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or an invalid value.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| AapsoError::Data {
            path: path.to_path_buf(),
            message: format!("cannot read config: {e}"),
        })?;
        Self::from_json(&json)
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every value range.
    ///
    /// # Errors
    ///
    /// Returns [`AapsoError::InvalidHyperparameter`] for the first bad value.
    pub fn validate(&self) -> Result<()> {
        let d = &self.data;
        check(d.image_size > 0, "image_size", d.image_size, ">= 1")?;
        check(d.batch_size > 0, "batch_size", d.batch_size, ">= 1")?;

        let t = &self.train;
        let min_side = 1u32 << t.backbone.num_pools();
        check(
            d.image_size >= min_side,
            "image_size",
            d.image_size,
            &format!(">= {min_side} for the {} backbone", t.backbone),
        )?;
        check(
            t.learning_rate > 0.0 && t.learning_rate.is_finite(),
            "learning_rate",
            t.learning_rate,
            "finite and > 0",
        )?;
        check(t.step_lr > 0, "stepLR", t.step_lr, ">= 1")?;
        check(t.gamma > 0.0 && t.gamma <= 1.0, "gamma", t.gamma, "in (0, 1]")?;
        check(t.hidden_units > 0, "hidden_units", t.hidden_units, ">= 1")?;

        let s = &self.swarm;
        check(s.num_agents > 0, "num_agents", s.num_agents, ">= 1")?;
        check(s.alpha0 >= 0.0, "alpha0", s.alpha0, ">= 0")?;
        check(
            s.alpha_decay > 0.0 && s.alpha_decay <= 1.0,
            "alpha_decay",
            s.alpha_decay,
            "in (0, 1]",
        )?;
        check(
            s.beta_min >= 0.0 && s.beta_min <= s.beta_max,
            "beta_min",
            s.beta_min,
            "0 <= beta_min <= beta_max",
        )?;
        check(s.personal_weight >= 0.0, "personal_weight", s.personal_weight, ">= 0")?;
        check(
            s.threshold > 0.0 && s.threshold < 1.0,
            "threshold",
            s.threshold,
            "in (0, 1)",
        )?;
        check(s.k > 0, "swarm.k", s.k, ">= 1")?;
        check(
            (0.0..=1.0).contains(&s.weight_acc),
            "weight_acc",
            s.weight_acc,
            "in [0, 1]",
        )?;
        match s.evaluation {
            FitnessEvaluation::HoldOut { test_size } => check(
                test_size > 0.0 && test_size < 1.0,
                "swarm.evaluation.test_size",
                test_size,
                "in (0, 1)",
            )?,
            FitnessEvaluation::CrossValidation { folds } => {
                check(folds >= 2, "swarm.evaluation.folds", folds, ">= 2")?;
            }
        }

        let v = &self.validation;
        check(v.k > 0, "validation.k", v.k, ">= 1")?;
        check(
            v.test_size > 0.0 && v.test_size < 1.0,
            "validation.test_size",
            v.test_size,
            "in (0, 1)",
        )?;
        Ok(())
    }
}

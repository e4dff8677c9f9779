//! Transfer learning: a VGG-style backbone with a task-specific head.
//!
//! ```text
//! image ─▶ features (conv/ReLU/pool stack) ─▶ global avg pool ─▶ flatten
//!       ─▶ classifier: Linear(c, hidden) ─▶ ReLU ─▶ Dropout(0.5) ─▶ Linear(hidden, classes)
//!                                          ▲
//!                                 penultimate features
//! ```
//!
//! Backbone parameters use torchvision's names (`features.{i}.weight`,
//! `features.{i}.bias`), so a converted ImageNet checkpoint can initialize
//! the convolution stack before fine-tuning.
//!
//! # References
//!
//! - Yosinski, J., et al. (2014). How transferable are features in deep
//!   neural networks? NeurIPS.
//! - Simonyan, K., & Zisserman, A. (2015). Very deep convolutional networks
//!   for large-scale image recognition. ICLR.

use crate::error::{AapsoError, Result};
use crate::nn::{
    Conv2d, Dropout, Flatten, GlobalAvgPool2d, Linear, MaxPool2d, Module, Parameter, ReLU,
    Sequential,
};
use crate::primitives::Tensor;
use crate::serialization::{load_safetensors, save_safetensors, StateDict};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Encoders whose base can be frozen and whose pre-head features can be read.
pub trait TransferEncoder: Module {
    /// Freeze the backbone; only the head keeps training.
    fn freeze_base(&mut self);

    /// Make the backbone trainable again.
    fn unfreeze_base(&mut self);

    /// Whether the backbone is frozen.
    fn is_frozen(&self) -> bool;

    /// Penultimate-layer activations, `[batch, feature_dim]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input shape is not accepted.
    fn extract_features(&mut self, x: &Tensor) -> Result<Tensor>;
}

/// One entry of a VGG configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// 3x3 convolution (padding 1) to this many channels, then ReLU
    Conv(usize),
    /// 2x2 max pool
    Pool,
}

use Stage::{Conv, Pool};

const VGG11: &[Stage] = &[
    Conv(64), Pool, Conv(128), Pool, Conv(256), Conv(256), Pool, Conv(512), Conv(512), Pool,
    Conv(512), Conv(512), Pool,
];

const VGG16: &[Stage] = &[
    Conv(64), Conv(64), Pool, Conv(128), Conv(128), Pool, Conv(256), Conv(256), Conv(256), Pool,
    Conv(512), Conv(512), Conv(512), Pool, Conv(512), Conv(512), Conv(512), Pool,
];

const TINY: &[Stage] = &[Conv(16), Pool, Conv(32), Pool, Conv(64), Pool, Conv(64), Pool];

/// Convolutional backbone architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackboneKind {
    /// VGG-11 (configuration "A")
    Vgg11,
    /// VGG-16 (configuration "D")
    Vgg16,
    /// Four-stage miniature VGG for CPU-sized experiments
    #[default]
    Tiny,
}

impl BackboneKind {
    fn stages(self) -> &'static [Stage] {
        match self {
            Self::Vgg11 => VGG11,
            Self::Vgg16 => VGG16,
            Self::Tiny => TINY,
        }
    }

    /// `(module index, in_channels, out_channels)` of every convolution,
    /// using torchvision's `features` indexing.
    #[must_use]
    pub fn conv_layout(self) -> Vec<(usize, usize, usize)> {
        let mut layout = Vec::new();
        let (mut index, mut channels) = (0, 3);
        for stage in self.stages() {
            match *stage {
                Conv(out) => {
                    layout.push((index, channels, out));
                    channels = out;
                    index += 2;
                }
                Pool => index += 1,
            }
        }
        layout
    }

    /// Channels leaving the backbone.
    #[must_use]
    pub fn out_channels(self) -> usize {
        self.conv_layout().last().map_or(3, |&(_, _, c)| c)
    }

    /// Number of 2x2 pools, i.e. the spatial down-sampling is `2^pools`.
    #[must_use]
    pub fn num_pools(self) -> usize {
        self.stages().iter().filter(|s| **s == Pool).count()
    }
}

impl fmt::Display for BackboneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vgg11 => "vgg11",
            Self::Vgg16 => "vgg16",
            Self::Tiny => "tiny",
        })
    }
}

impl FromStr for BackboneKind {
    type Err = AapsoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "vgg11" => Ok(Self::Vgg11),
            "vgg16" => Ok(Self::Vgg16),
            "tiny" => Ok(Self::Tiny),
            other => Err(AapsoError::invalid_hyperparameter(
                "backbone",
                other,
                "one of vgg11, vgg16, tiny",
            )),
        }
    }
}

fn backbone<R: rand::Rng>(kind: BackboneKind, rng: &mut R) -> Sequential {
    kind.stages()
        .iter()
        .fold((Sequential::new(), 3), |(seq, channels), stage| match *stage {
            Conv(out) => (
                seq.add(Conv2d::new(channels, out, 3, rng).with_padding(1))
                    .add(ReLU::new()),
                out,
            ),
            Pool => (seq.add(MaxPool2d::new(2)), channels),
        })
        .0
}

/// Pretrained backbone plus a two-layer classification head.
///
/// # Example
///
/// ```
/// use aapso::nn::Module;
/// use aapso::primitives::Tensor;
/// use aapso::transfer::{BackboneKind, ConvNet, TransferEncoder};
///
/// let mut net = ConvNet::new(BackboneKind::Tiny, 3, 32, Some(0)).expect("valid sizes");
/// let x = Tensor::zeros(&[2, 3, 32, 32]);
/// assert_eq!(net.forward(&x).expect("forward").shape(), &[2, 3]);
/// assert_eq!(net.extract_features(&x).expect("features").shape(), &[2, 32]);
/// ```
pub struct ConvNet {
    kind: BackboneKind,
    features: Sequential,
    pool: GlobalAvgPool2d,
    flatten: Flatten,
    classifier: Sequential,
    num_classes: usize,
    hidden: usize,
    frozen: bool,
    input_shape: Option<Vec<usize>>,
}

/// Index of the first head module whose output is the penultimate feature.
const PENULTIMATE: usize = 2;

impl ConvNet {
    /// Builds a freshly initialized network.
    ///
    /// # Errors
    ///
    /// Returns an error if `num_classes` or `hidden` is zero.
    pub fn new(
        kind: BackboneKind,
        num_classes: usize,
        hidden: usize,
        seed: Option<u64>,
    ) -> Result<Self> {
        if num_classes == 0 {
            return Err(AapsoError::invalid_hyperparameter("num_classes", 0, ">= 1"));
        }
        if hidden == 0 {
            return Err(AapsoError::invalid_hyperparameter("hidden", 0, ">= 1"));
        }
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let features = backbone(kind, &mut rng);
        let dropout = match seed {
            Some(s) => Dropout::with_seed(0.5, s.wrapping_add(1))?,
            None => Dropout::new(0.5)?,
        };
        let classifier = Sequential::new()
            .add(Linear::new(kind.out_channels(), hidden, &mut rng))
            .add(ReLU::new())
            .add(dropout)
            .add(Linear::new(hidden, num_classes, &mut rng));

        Ok(Self {
            kind,
            features,
            pool: GlobalAvgPool2d::new(),
            flatten: Flatten::new(),
            classifier,
            num_classes,
            hidden,
            frozen: false,
            input_shape: None,
        })
    }

    /// Backbone architecture.
    #[must_use]
    pub fn kind(&self) -> BackboneKind {
        self.kind
    }

    /// Number of output classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Width of the penultimate features.
    #[must_use]
    pub fn feature_dim(&self) -> usize {
        self.hidden
    }

    /// Smallest input side that survives every pool.
    #[must_use]
    pub fn min_input_size(&self) -> usize {
        1 << self.kind.num_pools()
    }

    /// Copies every parameter value, keyed by name.
    #[must_use]
    pub fn state_dict(&self) -> StateDict {
        self.named_parameters()
            .into_iter()
            .map(|(name, p)| (name, p.value.clone()))
            .collect()
    }

    /// Overwrites parameters from `state`.
    ///
    /// With `strict`, every parameter must be present. Keys the network does
    /// not have are ignored and returned.
    ///
    /// # Errors
    ///
    /// Returns an error on a shape mismatch or, with `strict`, a missing key.
    pub fn load_state_dict(&mut self, state: &StateDict, strict: bool) -> Result<Vec<String>> {
        for (name, param) in self.named_parameters_mut() {
            match state.get(&name) {
                Some(value) => {
                    param.assign(value.clone()).map_err(|e| {
                        AapsoError::Serialization(format!("parameter {name}: {e}"))
                    })?;
                }
                None if strict => {
                    return Err(AapsoError::Serialization(format!(
                        "missing parameter {name}"
                    )));
                }
                None => {}
            }
        }
        let names: Vec<String> = self.named_parameters().into_iter().map(|(n, _)| n).collect();
        let unexpected: Vec<String> = state
            .keys()
            .filter(|k| !names.contains(k))
            .cloned()
            .collect();
        Ok(unexpected)
    }

    /// Initializes the backbone from a `SafeTensors` checkpoint.
    ///
    /// Only `features.*` entries are read; the head stays freshly initialized
    /// because its shape depends on the task. Returns the number of tensors
    /// loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a backbone tensor has the
    /// wrong shape, or no backbone tensor matches.
    pub fn load_pretrained<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let state = load_safetensors(path)?;
        let mut loaded = 0;
        for (name, param) in self.features.named_parameters_mut() {
            let key = format!("features.{name}");
            if let Some(value) = state.get(&key) {
                param
                    .assign(value.clone())
                    .map_err(|e| AapsoError::Serialization(format!("{key}: {e}")))?;
                loaded += 1;
            }
        }
        if loaded == 0 {
            return Err(AapsoError::Data {
                path: path.to_path_buf(),
                message: format!("no {} backbone weights found", self.kind),
            });
        }
        let expected = self.features.named_parameters().len();
        if loaded < expected {
            warn!(loaded, expected, "pretrained checkpoint covers part of the backbone");
        }
        info!(loaded, backbone = %self.kind, path = %path.display(), "loaded pretrained weights");
        Ok(loaded)
    }

    /// Writes every parameter to a `SafeTensors` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_safetensors(path, &self.state_dict())
    }

    fn embed(&mut self, x: &Tensor) -> Result<Tensor> {
        if x.ndim() == 4 {
            let side = x.dim(2).min(x.dim(3));
            if side < self.min_input_size() {
                return Err(AapsoError::DimensionMismatch {
                    expected: format!("{} backbone: input side >= {}", self.kind, self.min_input_size()),
                    actual: format!("{:?}", x.shape()),
                });
            }
        }
        let h = self.features.forward(x)?;
        let h = self.pool.forward(&h)?;
        self.flatten.forward(&h)
    }
}

impl Module for ConvNet {
    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        self.input_shape = Some(input.shape().to_vec());
        let h = self.embed(input)?;
        self.classifier.forward(&h)
    }

    /// Propagates through the head and, unless frozen, the backbone.
    ///
    /// A frozen backbone is not traversed and the returned input gradient
    /// is zero.
    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let shape = self
            .input_shape
            .clone()
            .ok_or_else(|| AapsoError::Other("ConvNet: backward called before forward".into()))?;
        let g = self.classifier.backward(grad_output)?;
        if self.frozen {
            return Ok(Tensor::zeros(&shape));
        }
        let g = self.flatten.backward(&g)?;
        let g = self.pool.backward(&g)?;
        self.features.backward(&g)
    }

    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        let features = self
            .features
            .named_parameters()
            .into_iter()
            .map(|(n, p)| (format!("features.{n}"), p));
        let head = self
            .classifier
            .named_parameters()
            .into_iter()
            .map(|(n, p)| (format!("classifier.{n}"), p));
        features.chain(head).collect()
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        let features = self
            .features
            .named_parameters_mut()
            .into_iter()
            .map(|(n, p)| (format!("features.{n}"), p));
        let head = self
            .classifier
            .named_parameters_mut()
            .into_iter()
            .map(|(n, p)| (format!("classifier.{n}"), p));
        features.chain(head).collect()
    }

    fn set_training(&mut self, training: bool) {
        self.features.set_training(training);
        self.classifier.set_training(training);
    }
}

impl TransferEncoder for ConvNet {
    fn freeze_base(&mut self) {
        for p in self.features.parameters_mut() {
            p.requires_grad = false;
            p.grad.fill_zero();
        }
        self.frozen = true;
    }

    fn unfreeze_base(&mut self) {
        for p in self.features.parameters_mut() {
            p.requires_grad = true;
        }
        self.frozen = false;
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn extract_features(&mut self, x: &Tensor) -> Result<Tensor> {
        let h = self.embed(x)?;
        self.classifier.forward_prefix(&h, PENULTIMATE)
    }
}

impl fmt::Debug for ConvNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvNet")
            .field("kind", &self.kind)
            .field("num_classes", &self.num_classes)
            .field("hidden", &self.hidden)
            .field("frozen", &self.frozen)
            .finish()
    }
}

//! Convolution, pooling and flattening layers for NCHW image batches.
//!
//! # References
//!
//! - `LeCun`, Y., et al. (1998). Gradient-based learning applied to document
//!   recognition. Proceedings of the IEEE.
//! - Simonyan, K., & Zisserman, A. (2015). Very deep convolutional networks
//!   for large-scale image recognition. ICLR.

mod pool;

pub use pool::{Flatten, GlobalAvgPool2d, MaxPool2d};

use super::init::{kaiming_normal, zeros};
use super::module::{missing_forward, Module, Parameter};
use crate::error::{AapsoError, Result};
use crate::primitives::Tensor;
use rand::Rng;

/// Output length of a sliding window along one axis.
pub(crate) fn output_len(input: usize, kernel: usize, stride: usize, padding: usize) -> usize {
    (input + 2 * padding).saturating_sub(kernel) / stride + 1
}

/// Checks that `input` is `[N, C, H, W]` with `channels` channels.
pub(crate) fn expect_nchw(input: &Tensor, channels: Option<usize>, layer: &str) -> Result<()> {
    input.expect_ndim(4, layer)?;
    if let Some(c) = channels {
        if input.dim(1) != c {
            return Err(AapsoError::dimension_mismatch(layer, c, input.dim(1)));
        }
    }
    Ok(())
}

/// 2D convolution layer.
///
/// # Shape
///
/// - Input: `(N, C_in, H, W)`
/// - Output: `(N, C_out, H_out, W_out)` where
///   `H_out = (H + 2*padding - kernel_size) / stride + 1`
///
/// # Example
///
/// ```
/// use aapso::nn::{Conv2d, Module};
/// use aapso::primitives::Tensor;
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let mut conv = Conv2d::new(3, 8, 3, &mut rng).with_padding(1);
/// let y = conv.forward(&Tensor::zeros(&[2, 3, 16, 16])).expect("NCHW input");
/// assert_eq!(y.shape(), &[2, 8, 16, 16]);
/// ```
#[derive(Debug, Clone)]
pub struct Conv2d {
    /// Weight, shape: [`out_channels`, `in_channels`, `kernel_size`, `kernel_size`]
    weight: Parameter,
    /// Bias, shape: [`out_channels`]
    bias: Parameter,
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
    input: Option<Tensor>,
}

impl Conv2d {
    /// Create a Conv2d with stride 1 and no padding.
    ///
    /// Weights use Kaiming normal (fan-out mode) and biases start at zero,
    /// as torchvision does for VGG.
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        rng: &mut R,
    ) -> Self {
        let fan_out = out_channels * kernel_size * kernel_size;
        let weight = kaiming_normal(
            &[out_channels, in_channels, kernel_size, kernel_size],
            fan_out,
            rng,
        );
        Self {
            weight: Parameter::new(weight),
            bias: Parameter::new(zeros(&[out_channels])),
            in_channels,
            out_channels,
            kernel_size,
            stride: 1,
            padding: 0,
            input: None,
        }
    }

    /// Set the stride.
    #[must_use]
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride.max(1);
        self
    }

    /// Set zero-padding added on every side.
    #[must_use]
    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    /// Number of output channels.
    #[must_use]
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn out_hw(&self, h: usize, w: usize) -> (usize, usize) {
        (
            output_len(h, self.kernel_size, self.stride, self.padding),
            output_len(w, self.kernel_size, self.stride, self.padding),
        )
    }

    /// Input coordinate for output position `o` and kernel offset `k`, if inside.
    fn source(&self, o: usize, k: usize, len: usize) -> Option<usize> {
        (o * self.stride + k)
            .checked_sub(self.padding)
            .filter(|&i| i < len)
    }
}

impl Module for Conv2d {
    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        expect_nchw(input, Some(self.in_channels), "Conv2d input channels")?;
        let (n, c, h, w) = (input.dim(0), input.dim(1), input.dim(2), input.dim(3));
        if h + 2 * self.padding < self.kernel_size || w + 2 * self.padding < self.kernel_size {
            return Err(AapsoError::DimensionMismatch {
                expected: format!("spatial size >= kernel {}", self.kernel_size),
                actual: format!("{h}x{w}"),
            });
        }
        let (oh, ow) = self.out_hw(h, w);
        let k = self.kernel_size;
        let x = input.data();
        let wt = self.weight.value.data();
        let bias = self.bias.value.data();

        let mut out = Tensor::zeros(&[n, self.out_channels, oh, ow]);
        let y = out.data_mut();
        for b in 0..n {
            for o in 0..self.out_channels {
                let plane = &mut y[(b * self.out_channels + o) * oh * ow..][..oh * ow];
                plane.iter_mut().for_each(|v| *v = bias[o]);
                for ci in 0..c {
                    let x_plane = &x[(b * c + ci) * h * w..][..h * w];
                    let kernel = &wt[(o * c + ci) * k * k..][..k * k];
                    for oy in 0..oh {
                        for ky in 0..k {
                            let Some(iy) = self.source(oy, ky, h) else {
                                continue;
                            };
                            for ox in 0..ow {
                                let mut acc = 0.0;
                                for kx in 0..k {
                                    if let Some(ix) = self.source(ox, kx, w) {
                                        acc += kernel[ky * k + kx] * x_plane[iy * w + ix];
                                    }
                                }
                                plane[oy * ow + ox] += acc;
                            }
                        }
                    }
                }
            }
        }
        self.input = Some(input.clone());
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let input = self.input.as_ref().ok_or_else(|| missing_forward("Conv2d"))?;
        let (n, c, h, w) = (input.dim(0), input.dim(1), input.dim(2), input.dim(3));
        let (oh, ow) = self.out_hw(h, w);
        if grad_output.shape() != [n, self.out_channels, oh, ow] {
            return Err(AapsoError::DimensionMismatch {
                expected: format!("[{n}, {}, {oh}, {ow}]", self.out_channels),
                actual: format!("{:?}", grad_output.shape()),
            });
        }

        let k = self.kernel_size;
        let x = input.data();
        let wt = self.weight.value.data();
        let gy = grad_output.data();
        let mut grad_w = vec![0.0; wt.len()];
        let mut grad_b = vec![0.0; self.out_channels];
        let mut grad_input = Tensor::zeros(input.shape());
        let gx = grad_input.data_mut();

        for b in 0..n {
            for o in 0..self.out_channels {
                let g_plane = &gy[(b * self.out_channels + o) * oh * ow..][..oh * ow];
                grad_b[o] += g_plane.iter().sum::<f32>();
                for ci in 0..c {
                    let base = (b * c + ci) * h * w;
                    let kbase = (o * c + ci) * k * k;
                    for oy in 0..oh {
                        for ky in 0..k {
                            let Some(iy) = self.source(oy, ky, h) else {
                                continue;
                            };
                            for ox in 0..ow {
                                let g = g_plane[oy * ow + ox];
                                if g == 0.0 {
                                    continue;
                                }
                                for kx in 0..k {
                                    if let Some(ix) = self.source(ox, kx, w) {
                                        let xi = base + iy * w + ix;
                                        grad_w[kbase + ky * k + kx] += g * x[xi];
                                        gx[xi] += g * wt[kbase + ky * k + kx];
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        self.weight.accumulate(&grad_w);
        self.bias.accumulate(&grad_b);
        Ok(grad_input)
    }

    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        vec![("weight".into(), &self.weight), ("bias".into(), &self.bias)]
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        vec![
            ("weight".into(), &mut self.weight),
            ("bias".into(), &mut self.bias),
        ]
    }
}

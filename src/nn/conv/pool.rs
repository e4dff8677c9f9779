use super::{expect_nchw, output_len};
use crate::error::{AapsoError, Result};
use crate::nn::module::{missing_forward, Module};
use crate::primitives::Tensor;

/// 2D max pooling.
///
/// # Shape
///
/// - Input: `(N, C, H, W)`
/// - Output: `(N, C, H_out, W_out)` where `H_out = (H - kernel_size) / stride + 1`
#[derive(Debug, Clone)]
pub struct MaxPool2d {
    kernel_size: usize,
    stride: usize,
    /// Input shape and, per output element, the flat index of its maximum
    cache: Option<(Vec<usize>, Vec<usize>)>,
}

impl MaxPool2d {
    /// Create a pool with `stride == kernel_size`.
    #[must_use]
    pub fn new(kernel_size: usize) -> Self {
        Self::with_stride(kernel_size, kernel_size)
    }

    /// Create a pool with an explicit stride.
    #[must_use]
    pub fn with_stride(kernel_size: usize, stride: usize) -> Self {
        Self {
            kernel_size: kernel_size.max(1),
            stride: stride.max(1),
            cache: None,
        }
    }
}

impl Module for MaxPool2d {
    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        expect_nchw(input, None, "MaxPool2d input")?;
        let (n, c, h, w) = (input.dim(0), input.dim(1), input.dim(2), input.dim(3));
        let k = self.kernel_size;
        if h < k || w < k {
            return Err(AapsoError::DimensionMismatch {
                expected: format!("spatial size >= pool kernel {k}"),
                actual: format!("{h}x{w}"),
            });
        }
        let (oh, ow) = (output_len(h, k, self.stride, 0), output_len(w, k, self.stride, 0));
        let x = input.data();

        let mut out = Tensor::zeros(&[n, c, oh, ow]);
        let mut argmax = Vec::with_capacity(out.numel());
        for (plane, y) in out.data_mut().chunks_mut(oh * ow).enumerate() {
            let base = plane * h * w;
            for oy in 0..oh {
                for ox in 0..ow {
                    let mut best = base + oy * self.stride * w + ox * self.stride;
                    for ky in 0..k {
                        for kx in 0..k {
                            let i = base + (oy * self.stride + ky) * w + ox * self.stride + kx;
                            if x[i] > x[best] {
                                best = i;
                            }
                        }
                    }
                    y[oy * ow + ox] = x[best];
                    argmax.push(best);
                }
            }
        }
        self.cache = Some((input.shape().to_vec(), argmax));
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let (shape, argmax) = self.cache.as_ref().ok_or_else(|| missing_forward("MaxPool2d"))?;
        if grad_output.numel() != argmax.len() {
            return Err(AapsoError::dimension_mismatch(
                "MaxPool2d grad",
                argmax.len(),
                grad_output.numel(),
            ));
        }
        let mut grad_input = Tensor::zeros(shape);
        let gx = grad_input.data_mut();
        for (&i, &g) in argmax.iter().zip(grad_output.data()) {
            gx[i] += g;
        }
        Ok(grad_input)
    }
}

/// Global average pooling: `(N, C, H, W)` to `(N, C, 1, 1)`.
///
/// Equivalent to `AdaptiveAvgPool2d(1)`.
#[derive(Debug, Clone, Default)]
pub struct GlobalAvgPool2d {
    input_shape: Option<Vec<usize>>,
}

impl GlobalAvgPool2d {
    /// Create a global average pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for GlobalAvgPool2d {
    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        expect_nchw(input, None, "GlobalAvgPool2d input")?;
        let (n, c) = (input.dim(0), input.dim(1));
        let area = input.dim(2) * input.dim(3);
        let mut out = Tensor::zeros(&[n, c, 1, 1]);
        if area > 0 {
            for (y, plane) in out.data_mut().iter_mut().zip(input.data().chunks(area)) {
                *y = plane.iter().sum::<f32>() / area as f32;
            }
        }
        self.input_shape = Some(input.shape().to_vec());
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let shape = self
            .input_shape
            .as_ref()
            .ok_or_else(|| missing_forward("GlobalAvgPool2d"))?;
        let planes = shape[0] * shape[1];
        if grad_output.numel() != planes {
            return Err(AapsoError::dimension_mismatch(
                "GlobalAvgPool2d grad",
                planes,
                grad_output.numel(),
            ));
        }
        let area = shape[2] * shape[3];
        let mut grad_input = Tensor::zeros(shape);
        if area > 0 {
            for (plane, &g) in grad_input
                .data_mut()
                .chunks_mut(area)
                .zip(grad_output.data())
            {
                plane.iter_mut().for_each(|v| *v = g / area as f32);
            }
        }
        Ok(grad_input)
    }
}

/// Flattens every dimension after the batch dimension.
#[derive(Debug, Clone, Default)]
pub struct Flatten {
    input_shape: Option<Vec<usize>>,
}

impl Flatten {
    /// Create a flatten layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for Flatten {
    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        if input.ndim() < 2 {
            return Err(AapsoError::DimensionMismatch {
                expected: "Flatten: at least 2-d tensor".into(),
                actual: format!("{:?}", input.shape()),
            });
        }
        let n = input.dim(0);
        let rest = input.shape()[1..].iter().product();
        self.input_shape = Some(input.shape().to_vec());
        input.reshape(&[n, rest])
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let shape = self.input_shape.as_ref().ok_or_else(|| missing_forward("Flatten"))?;
        grad_output.reshape(shape)
    }
}

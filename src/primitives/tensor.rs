//! Dense N-dimensional tensor used by the convolutional network.
//!
//! Storage is contiguous and row-major; images are laid out as
//! `[channels, height, width]` and batches as `[batch, channels, height, width]`.

use crate::error::{AapsoError, Result};

/// Dense f32 tensor with an explicit shape.
///
/// # Examples
///
/// ```
/// use aapso::primitives::Tensor;
///
/// let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).expect("2*3=6 values");
/// assert_eq!(t.shape(), &[2, 3]);
/// assert_eq!(t.numel(), 6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Vec<usize>,
}

impl Tensor {
    /// Creates a tensor from raw data and shape.
    ///
    /// # Errors
    ///
    /// Returns an error if the data length differs from the product of the shape.
    pub fn new(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(AapsoError::DimensionMismatch {
                expected: format!("{shape:?} ({expected} values)"),
                actual: format!("{} values", data.len()),
            });
        }
        Ok(Self {
            data,
            shape: shape.to_vec(),
        })
    }

    /// Creates a zero-filled tensor.
    #[must_use]
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            data: vec![0.0; shape.iter().product()],
            shape: shape.to_vec(),
        }
    }

    /// Creates a tensor by calling `f` once per element in storage order.
    pub fn from_fn(shape: &[usize], mut f: impl FnMut() -> f32) -> Self {
        let numel: usize = shape.iter().product();
        Self {
            data: (0..numel).map(|_| f()).collect(),
            shape: shape.to_vec(),
        }
    }

    /// Creates a zero-filled tensor with the same shape as `self`.
    #[must_use]
    pub fn zeros_like(&self) -> Self {
        Self::zeros(&self.shape)
    }

    /// Stacks equally shaped tensors along a new leading batch dimension.
    ///
    /// # Errors
    ///
    /// Returns an error if `items` is empty or shapes differ.
    pub fn stack(items: &[Tensor]) -> Result<Self> {
        let first = items
            .first()
            .ok_or_else(|| AapsoError::empty_input("cannot stack zero tensors"))?;
        let mut data = Vec::with_capacity(first.numel() * items.len());
        for item in items {
            if item.shape != first.shape {
                return Err(AapsoError::DimensionMismatch {
                    expected: format!("{:?}", first.shape),
                    actual: format!("{:?}", item.shape),
                });
            }
            data.extend_from_slice(&item.data);
        }
        let mut shape = Vec::with_capacity(first.shape.len() + 1);
        shape.push(items.len());
        shape.extend_from_slice(&first.shape);
        Ok(Self { data, shape })
    }

    /// Returns the shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the size of dimension `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis` is out of range.
    #[must_use]
    pub fn dim(&self, axis: usize) -> usize {
        self.shape[axis]
    }

    /// Number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Borrow the underlying data.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutably borrow the underlying data.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consumes the tensor, returning its data.
    #[must_use]
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Returns a tensor with the same data and a new shape.
    ///
    /// # Errors
    ///
    /// Returns an error if the element counts differ.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        Self::new(self.data.clone(), shape)
    }

    /// Requires the tensor to have exactly `ndim` dimensions.
    ///
    /// # Errors
    ///
    /// Returns a dimension mismatch naming `context` otherwise.
    pub fn expect_ndim(&self, ndim: usize, context: &str) -> Result<()> {
        if self.shape.len() == ndim {
            Ok(())
        } else {
            Err(AapsoError::DimensionMismatch {
                expected: format!("{context}: {ndim}-d tensor"),
                actual: format!("{:?}", self.shape),
            })
        }
    }

    /// Row-wise argmax of a 2-D tensor `[rows, cols]`.
    ///
    /// Ties resolve to the lowest column index.
    ///
    /// # Errors
    ///
    /// Returns an error if the tensor is not 2-D.
    pub fn argmax_rows(&self) -> Result<Vec<usize>> {
        self.expect_ndim(2, "argmax_rows")?;
        let cols = self.shape[1];
        Ok(self
            .data
            .chunks(cols.max(1))
            .map(|row| {
                let mut best = 0;
                for (j, &v) in row.iter().enumerate() {
                    if v > row[best] {
                        best = j;
                    }
                }
                best
            })
            .collect())
    }

    /// Adds `other` element-wise into `self`.
    ///
    /// # Errors
    ///
    /// Returns an error if shapes differ.
    pub fn add_assign(&mut self, other: &Tensor) -> Result<()> {
        if self.shape != other.shape {
            return Err(AapsoError::DimensionMismatch {
                expected: format!("{:?}", self.shape),
                actual: format!("{:?}", other.shape),
            });
        }
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
        Ok(())
    }

    /// Sets every element to zero.
    pub fn fill_zero(&mut self) {
        self.data.iter_mut().for_each(|v| *v = 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        assert!(Tensor::new(vec![1.0, 2.0, 3.0], &[2, 2]).is_err());
    }

    #[test]
    fn test_stack_adds_batch_dimension() {
        let a = Tensor::new(vec![1.0, 2.0], &[1, 2]).expect("valid");
        let b = Tensor::new(vec![3.0, 4.0], &[1, 2]).expect("valid");
        let s = Tensor::stack(&[a, b]).expect("same shapes");
        assert_eq!(s.shape(), &[2, 1, 2]);
        assert_eq!(s.data(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_stack_rejects_mismatched_shapes() {
        let a = Tensor::zeros(&[2]);
        let b = Tensor::zeros(&[3]);
        assert!(Tensor::stack(&[a, b]).is_err());
        assert!(Tensor::stack(&[]).is_err());
    }

    #[test]
    fn test_reshape_preserves_data() {
        let t = Tensor::new((0..6).map(|i| i as f32).collect(), &[2, 3]).expect("valid");
        let r = t.reshape(&[3, 2]).expect("same numel");
        assert_eq!(r.shape(), &[3, 2]);
        assert_eq!(r.data(), t.data());
        assert!(t.reshape(&[4]).is_err());
    }

    #[test]
    fn test_argmax_rows_prefers_first_on_tie() {
        let t = Tensor::new(vec![0.1, 0.9, 0.9, 0.5, 0.2, 0.1], &[2, 3]).expect("valid");
        assert_eq!(t.argmax_rows().expect("2-d"), vec![1, 0]);
    }

    #[test]
    fn test_add_assign() {
        let mut a = Tensor::new(vec![1.0, 2.0], &[2]).expect("valid");
        let b = Tensor::new(vec![0.5, 0.5], &[2]).expect("valid");
        a.add_assign(&b).expect("same shape");
        assert_eq!(a.data(), &[1.5, 2.5]);
        a.fill_zero();
        assert_eq!(a.data(), &[0.0, 0.0]);
    }
}

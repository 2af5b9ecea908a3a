use crate::Shape;
use crate::internal::ceil_div;
use crate::scalar::{ Inner, Numeric, Real };


/// Low-level compute operations.
///
/// `gemm` computes `c = a · b + beta · c` for an `m × k` matrix `a`
/// and a `k × n` matrix `b`, writing into the row-major `m × n` slice `c`.
/// Operand layouts are given as `(row_stride, col_stride)` pairs,
/// so transposed operands need no copy.

pub trait Cops: Sized + Copy {
  #[allow(clippy::too_many_arguments)]
  fn gemm(
    m: usize, k: usize, n: usize,
    a: &[Self], a_strides: (isize, isize),
    b: &[Self], b_strides: (isize, isize),
    beta: Self,
    c: &mut [Self],
  );
}


/// How windowed operations treat image borders.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
  /// Zero-pad so that every input position gets a window (`out = ceil(in / stride)`).
  Same,
  /// Only use windows that fit entirely (`out = ceil((in - window + 1) / stride)`).
  Valid,
}

impl Padding {
  /// Output extent of a window sweep over `input` positions.

  pub fn output_size(&self, input: usize, window: usize, stride: usize) -> usize {
    match self {
      Self::Same => ceil_div(input, stride),
      Self::Valid => {
        assert!(input >= window, "Window of {window} doesn't fit input of {input}");
        ceil_div(input - window + 1, stride)
      },
    }
  }

  /// Number of implicit border elements before the first input position.

  pub fn leading(&self, input: usize, window: usize, stride: usize) -> usize {
    match self {
      Self::Same => {
        let output = self.output_size(input, window, stride);
        let total = ((output - 1) * stride + window).saturating_sub(input);
        total / 2
      },
      Self::Valid => 0,
    }
  }
}


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Inner] types.

pub trait BaseOps<I: Inner>: Clone {
  fn shape(&self) -> &Shape;
  fn reshape(&self, dims: &[usize]) -> Self;

  fn dim(&self, dim: isize) -> usize {
    self.shape()[dim]
  }
}


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Numeric] inner types.

pub trait NumericOps<I: Numeric>: Sized {
  /// Sum of all elements, as a scalar.
  fn sum(&self) -> Self;
  fn mean(&self) -> Self;
  fn mm(&self, rhs: &Self) -> Self;
  /// Elementwise product of equally shaped operands.
  fn mul(&self, rhs: &Self) -> Self;
  /// Add a vector along the last dimension.
  fn bias_add(&self, bias: &Self) -> Self;
}


/// Differentiable neural network operations.
///
/// Image tensors are laid out as `[batch, height, width, channels]`.

pub trait RealOps<I: Real> {
  fn relu(&self) -> Self;

  /// Convolve with `kernel` of shape `[height, width, in_channels, out_channels]`.
  fn conv2d(&self, kernel: &Self, stride: usize, padding: Padding) -> Self;

  fn max_pool2d(&self, window: usize, stride: usize, padding: Padding) -> Self;

  /// Per-example cross entropy between softmax(logits) and integer labels.
  fn sparse_softmax_cross_entropy(&self, labels: &[usize]) -> Self;
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn same_padding() {
    assert_eq!(Padding::Same.output_size(28, 7, 1), 28);
    assert_eq!(Padding::Same.leading(28, 7, 1), 3);
    assert_eq!(Padding::Same.leading(6, 3, 1), 1);
    assert_eq!(Padding::Same.output_size(13, 3, 2), 7);
    assert_eq!(Padding::Same.leading(13, 3, 2), 1);
  }

  #[test]
  fn valid_padding() {
    assert_eq!(Padding::Valid.output_size(28, 3, 2), 13);
    assert_eq!(Padding::Valid.output_size(13, 3, 2), 6);
    assert_eq!(Padding::Valid.output_size(6, 3, 2), 2);
    assert_eq!(Padding::Valid.leading(28, 3, 2), 0);
  }
}

use crate::{
  tensor::{ Tensor, nn::{ self, Geometry } },
  scalar::Real,
  ops::{ Padding, BaseOps, NumericOps, RealOps },
};


impl<T: Real> Tensor<T> {
  /// Matrix product with either operand read as its transpose, without copying it.

  pub(crate) fn mm_transposed(&self, rhs: &Self, transpose_lhs: bool, transpose_rhs: bool) -> Self {
    assert!(self.rank() == 2 && rhs.rank() == 2,
      "Matrix multiplication needs two matrices, got {} & {}", self.shape, rhs.shape);
    let (rows_l, cols_l) = (self.shape[0], self.shape[1]);
    let (rows_r, cols_r) = (rhs.shape[0], rhs.shape[1]);
    let (m, k, a_strides) = if transpose_lhs {
      (cols_l, rows_l, (1, cols_l as isize))
    } else {
      (rows_l, cols_l, (cols_l as isize, 1))
    };
    let (k_r, n, b_strides) = if transpose_rhs {
      (cols_r, rows_r, (1, cols_r as isize))
    } else {
      (rows_r, cols_r, (cols_r as isize, 1))
    };
    assert_eq!(k, k_r, "Cannot multiply {} by {}", self.shape, rhs.shape);
    let mut out = vec![T::zero(); m * n];
    self.with_slice(|a| rhs.with_slice(|b| {
      T::gemm(m, k, n, a, a_strides, b, b_strides, T::zero(), &mut out)
    }));
    Self::new(&[m, n], out)
  }
}


impl<T: Real> NumericOps<T> for Tensor<T> {
  fn sum(&self) -> Self {
    Self::scalar(self.param_iter().sum())
  }

  fn mean(&self) -> Self {
    let n = T::from(self.size()).unwrap();
    Self::scalar(self.param_iter().sum::<T>() / n)
  }

  fn mm(&self, rhs: &Self) -> Self {
    self.mm_transposed(rhs, false, false)
  }

  fn mul(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a * b )
  }

  fn bias_add(&self, bias: &Self) -> Self {
    assert!(bias.rank() == 1 && bias.size() == self.shape[-1],
      "Cannot add {} bias to {} tensor", bias.shape, self.shape);
    let bias = bias.to_vec();
    self.collapse_only(|row| row.iter().zip(&bias).map(|(&a, &b)| a + b ).collect() )
  }
}


impl<T: Real> RealOps<T> for Tensor<T> {
  fn relu(&self) -> Self {
    self.vectorize(|a| a.max(T::zero()) )
  }

  fn conv2d(&self, kernel: &Self, stride: usize, padding: Padding) -> Self {
    assert!(kernel.rank() == 4 && kernel.shape[2] == self.shape[-1],
      "Cannot convolve {} images with {} kernel", self.shape, kernel.shape);
    let out_channels = kernel.shape[3];
    let geo = Geometry::new(&self.shape.dims, (kernel.shape[0], kernel.shape[1]), stride, padding);
    let data = self.with_slice(|input| kernel.with_slice(|kernel| {
      nn::conv2d(input, kernel, &geo, out_channels)
    }));
    Self::new(&geo.output_dims(out_channels), data)
  }

  fn max_pool2d(&self, window: usize, stride: usize, padding: Padding) -> Self {
    let geo = Geometry::new(&self.shape.dims, (window, window), stride, padding);
    let data = self.with_slice(|input| nn::max_pool2d(input, &geo) );
    Self::new(&geo.output_dims(geo.channels), data)
  }

  fn sparse_softmax_cross_entropy(&self, labels: &[usize]) -> Self {
    assert_eq!(self.rank(), 2, "Expected [batch, classes] logits, got {}", self.shape);
    let data = self.with_slice(|logits| nn::softmax_cross_entropy(logits, labels, self.dim(-1)) );
    Self::new(&[self.shape[0]], data)
  }
}

use rand::Rng;

use crate::{ ops::*, scalar::Real, Variable, Tensor };


/// Building blocks of a feed-forward network, expressed over explicit parameters.

pub trait Layer<I: Real> {
  fn dense(&self, weights: &Self, bias: &Self) -> Self;
  fn conv2d_biased(&self, kernel: &Self, bias: &Self) -> Self;
  fn dropout(&self, rate: I, train: bool, rng: &mut impl Rng) -> Self;
}

impl<I: Real> Layer<I> for Variable<I> {
  fn dense(&self, weights: &Self, bias: &Self) -> Self {
    self.mm(weights).bias_add(bias)
  }

  /// Stride 1, zero padded convolution that preserves spatial size.

  fn conv2d_biased(&self, kernel: &Self, bias: &Self) -> Self {
    self.conv2d(kernel, 1, Padding::Same).bias_add(bias)
  }

  /// Zero each activation with probability `rate` and rescale the survivors,
  /// so the expected activation is unchanged. Identity outside of training.

  fn dropout(&self, rate: I, train: bool, rng: &mut impl Rng) -> Self {
    if !train || rate == I::zero() { return self.clone() }
    let keep = I::one() - rate;
    let mask = Tensor::bernoulli(&self.shape().dims, keep, rng).scale(I::one() / keep);
    self.mul(&mask.tracked())
  }
}

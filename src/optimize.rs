use std::collections::HashMap;

use crate::{
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
  ops::BaseOps,
};


/// An optimization strategy to be used with [Optimizer].

pub trait Strategy<R: Real> {
  /// Change to be added to `param`, given its current gradient.
  fn update(&mut self, param: &Variable<R>, rate: R) -> Tensor<R>;
}


/// Learning rate as a function of the optimizer's step counter.

pub trait Schedule<R: Real> {
  fn rate(&self, step: usize) -> R;
}


/// Exponential decay that drops by `decay_rate` once per pass over
/// `decay_examples` training examples.
///
/// With `staircase` set, the exponent is floored, which keeps the
/// rate constant within each epoch.

#[derive(Debug, Clone)]
pub struct ExponentialDecay<R: Real> {
  pub initial_rate: R,
  pub decay_rate: R,
  pub examples_per_step: usize,
  pub decay_examples: usize,
  pub staircase: bool,
}

impl<R: Real> ExponentialDecay<R> {
  pub fn per_epoch(initial_rate: R, decay_rate: R, batch_size: usize, train_size: usize) -> Self {
    Self {
      initial_rate,
      decay_rate,
      examples_per_step: batch_size,
      decay_examples: train_size,
      staircase: true,
    }
  }
}

impl<R: Real> Schedule<R> for ExponentialDecay<R> {
  fn rate(&self, step: usize) -> R {
    let seen = step * self.examples_per_step;
    let exponent = if self.staircase {
      R::from(seen / self.decay_examples).unwrap()
    } else {
      R::from(seen).unwrap() / R::from(self.decay_examples).unwrap()
    };
    self.initial_rate * self.decay_rate.powf(exponent)
  }
}


/// Generic optimizer that allows for several optimization [strategies](Strategy) to be used.

pub struct Optimizer<R: Real, S: Strategy<R>> {
  strategy: S,
  schedule: Box<dyn Schedule<R>>,
  step: usize,
}

impl<R: Real, S: Strategy<R>> Optimizer<R, S> {
  pub fn new(schedule: impl Schedule<R> + 'static, strategy: S) -> Self {
    Self { strategy, schedule: Box::new(schedule), step: 0 }
  }

  /// Number of updates applied so far.

  pub fn step(&self) -> usize {
    self.step
  }

  pub fn learning_rate(&self) -> R {
    self.schedule.rate(self.step)
  }

  /// Back-propagate `loss`, update `params` in place and reset all gradients.
  /// Returns the learning rate that was applied.

  pub fn minimize(&mut self, loss: &Variable<R>, params: &[Variable<R>]) -> R {
    let rate = self.learning_rate();

    loss.backward();

    for param in params {
      let change = self.strategy.update(param, rate);
      param.tensor().add_assign(&change);
    }

    loss.reset();

    self.step += 1;
    rate
  }
}


/// Gradient descent with a momentum accumulator.
///
/// Each step computes `accum = momentum * accum + grad`
/// and moves the parameter by `-rate * accum`.

#[derive(Debug, Clone)]
pub struct Momentum<R: Real> {
  pub momentum: R,
  accumulators: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Momentum<R> {
  pub fn new(momentum: R) -> Self {
    Self {
      momentum,
      accumulators: HashMap::new(),
    }
  }
}

impl<R: Real> Default for Momentum<R> {
  fn default() -> Self {
    Self::new(R::from(0.9).unwrap())
  }
}

impl<R: Real> Strategy<R> for Momentum<R> {
  fn update(&mut self, param: &Variable<R>, rate: R) -> Tensor<R> {
    let grad = param.grad().expect("Non-trainable parameters cannot be optimized");
    let accum = self.accumulators
      .entry(param.id())
      .or_insert_with(|| Tensor::zeros(&param.shape().dims) );
    accum.assign(&accum.scale(self.momentum).add(grad));
    accum.scale(-rate)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::ops::NumericOps;

  #[test]
  fn staircase_decay() {
    let schedule = ExponentialDecay::per_epoch(0.01, 0.95, 64, 1000);
    // 15 * 64 = 960 examples still fall within the first epoch
    approx::assert_relative_eq!(schedule.rate(0), 0.01);
    approx::assert_relative_eq!(schedule.rate(15), 0.01);
    approx::assert_relative_eq!(schedule.rate(16), 0.0095, epsilon = 1e-12);
    approx::assert_relative_eq!(schedule.rate(31), 0.0095, epsilon = 1e-12);
    approx::assert_relative_eq!(schedule.rate(32), 0.009025, epsilon = 1e-12);
  }

  #[test]
  fn smooth_decay() {
    let mut schedule = ExponentialDecay::per_epoch(1.0, 0.5, 50, 100);
    schedule.staircase = false;
    approx::assert_relative_eq!(schedule.rate(1), 0.5f64.sqrt(), epsilon = 1e-12);
  }

  #[test]
  fn momentum_accumulates() {
    let w = Tensor::vec(&[1.0]).trained();
    let mut optimizer = Optimizer::new(ExponentialDecay::per_epoch(0.1, 1.0, 1, 1), Momentum::new(0.9));
    for _ in 0..2 {
      // d(w * 2) / dw = 2
      let loss = w.mul(&Tensor::vec(&[2.0]).tracked()).sum();
      let params = loss.parameters();
      optimizer.minimize(&loss, &params);
    }
    // accum: 2 then 0.9 * 2 + 2 = 3.8; w = 1 - 0.1 * 2 - 0.1 * 3.8
    approx::assert_relative_eq!(w.item(), 0.42, epsilon = 1e-12);
    assert_eq!(optimizer.step(), 2);
    assert_eq!(w.grad(), Some(&Tensor::vec(&[0.0])));
  }

  #[test]
  fn minimize_reports_applied_rate() {
    let w = Tensor::vec(&[0.0]).trained();
    let mut optimizer = Optimizer::new(ExponentialDecay::per_epoch(0.01, 0.95, 64, 1000), Momentum::default());
    let rates: Vec<f64> = (0..17).map(|_| {
      let loss = w.mul(&w).sum();
      optimizer.minimize(&loss, &loss.parameters())
    }).collect();
    approx::assert_relative_eq!(rates[0], 0.01);
    approx::assert_relative_eq!(rates[15], 0.01);
    approx::assert_relative_eq!(rates[16], 0.0095, epsilon = 1e-12);
  }
}

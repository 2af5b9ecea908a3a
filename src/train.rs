//! Minibatch training loop with periodic validation.

use std::fmt;
use std::time::Instant;

use log::info;

use crate::{
  ops::*,
  metrics,
  tensor::Tensor,
  config::TrainingConfig,
  data::{ Dataset, Splits },
  model::{ ConvNet, Mode },
  optimize::{ Optimizer, Momentum, ExponentialDecay },
  error::{ Error, Result },
};


/// Start of the minibatch used at `step`.
///
/// Batches cycle through the training set in order, without reshuffling.

pub fn minibatch_offset(step: usize, batch_size: usize, train_size: usize) -> usize {
  if train_size <= batch_size { return 0 }
  (step * batch_size) % (train_size - batch_size)
}

pub fn total_steps(num_epochs: f64, batch_size: usize, train_size: usize) -> usize {
  (num_epochs * train_size as f64) as usize / batch_size
}


/// Run `predict` over `data` in chunks of exactly `eval_batch_size` examples.
///
/// A trailing partial chunk is computed from the last full-sized window of
/// the dataset instead, keeping only the rows that weren't covered yet.
/// Predictions come back in dataset order.

pub fn eval_in_batches<F>(data: &Tensor<f32>, eval_batch_size: usize, mut predict: F) -> Result<Tensor<f32>>
where
  F: FnMut(&Tensor<f32>) -> Tensor<f32>,
{
  if eval_batch_size == 0 {
    return Err(Error::ZeroSetting { name: "eval_batch_size" })
  }
  let size = data.dim(0);
  if size < eval_batch_size {
    return Err(Error::EvalBatchTooLarge { size, batch_size: eval_batch_size })
  }
  let mut predictions = vec![];
  let mut width = 0;
  for begin in (0..size).step_by(eval_batch_size) {
    let end = begin + eval_batch_size;
    let batch = if end <= size {
      predict(&data.rows(begin..end))
    } else {
      let overlap = predict(&data.rows(size - eval_batch_size..size));
      overlap.rows(end - size..eval_batch_size)
    };
    width = batch.dim(-1);
    predictions.extend(batch.to_vec());
  }
  Ok(Tensor::new(&[size, width], predictions))
}


/// Progress report of a single training step.

#[derive(Debug, Clone)]
pub struct Progress {
  pub step: usize,
  pub epoch: f64,
  pub ms_per_step: f64,
  pub loss: f32,
  pub learning_rate: f32,
  pub minibatch_error: f64,
  pub validation_error: f64,
}

impl fmt::Display for Progress {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    writeln!(f, "Step {} (epoch {:.2}), {:.1} ms", self.step, self.epoch, self.ms_per_step)?;
    writeln!(f, "Minibatch loss: {:.3}, learning rate: {:.6}", self.loss, self.learning_rate)?;
    writeln!(f, "Minibatch error: {:.1}%", self.minibatch_error)?;
    write!(f, "Validation error: {:.1}%", self.validation_error)
  }
}


/// Outcome of one optimization step.

#[derive(Debug, Clone)]
pub struct StepOutput {
  pub loss: f32,
  pub learning_rate: f32,
  /// Softmax of the training logits, computed before the update.
  pub predictions: Tensor<f32>,
  pub labels: Vec<usize>,
}


/// Drives a [ConvNet] through minibatch training on a set of [Splits].

pub struct Trainer {
  model: ConvNet,
  optimizer: Optimizer<f32, Momentum<f32>>,
  config: TrainingConfig,
  data: Splits,
}

impl Trainer {
  /// Fails early on empty batch sizes, when an evaluation set is smaller than
  /// one evaluation batch, or when the training set is smaller than one minibatch.

  pub fn new(model: ConvNet, config: TrainingConfig, data: Splits) -> Result<Self> {
    for (name, value) in [("batch_size", config.batch_size), ("eval_batch_size", config.eval_batch_size)] {
      if value == 0 { return Err(Error::ZeroSetting { name }) }
    }
    for set in [&data.validation, &data.test] {
      if set.len() < config.eval_batch_size {
        return Err(Error::EvalBatchTooLarge { size: set.len(), batch_size: config.eval_batch_size })
      }
    }
    if data.train.len() < config.batch_size {
      return Err(Error::InsufficientData { requested: config.batch_size, available: data.train.len() })
    }
    let schedule = ExponentialDecay::per_epoch(
      config.base_learning_rate as f32,
      config.decay_rate as f32,
      config.batch_size,
      data.train.len(),
    );
    let optimizer = Optimizer::new(schedule, Momentum::new(config.momentum as f32));
    Ok(Self { model, optimizer, config, data })
  }

  pub fn model(&self) -> &ConvNet {
    &self.model
  }

  pub fn total_steps(&self) -> usize {
    total_steps(self.config.num_epochs, self.config.batch_size, self.data.train.len())
  }

  /// Train on the minibatch belonging to `step`.

  pub fn step(&mut self, step: usize) -> StepOutput {
    let batch_size = self.config.batch_size;
    let offset = minibatch_offset(step, batch_size, self.data.train.len());
    let (images, labels) = self.data.train.slice(offset, offset + batch_size);
    let logits = self.model.forward(&images, Mode::Train);
    let loss = metrics::loss(&logits, labels);
    let learning_rate = self.optimizer.minimize(&loss, &self.model.parameters());
    StepOutput {
      loss: loss.item(),
      learning_rate,
      predictions: logits.tensor().softmax(),
      labels: labels.to_vec(),
    }
  }

  /// Error rate of the current model on `data`, in percent.

  pub fn evaluate(&self, data: &Dataset) -> Result<f64> {
    let predictions = eval_in_batches(&data.images, self.config.eval_batch_size, |images| {
      self.model.predict(images)
    })?;
    Ok(metrics::error_rate(&predictions, &data.labels))
  }

  /// Run every training step, reporting progress every `eval_frequency` steps.
  /// Returns the final test error.

  pub fn fit(&mut self, mut on_progress: impl FnMut(&Progress)) -> Result<f64> {
    let train_size = self.data.train.len();
    let total_steps = self.total_steps();
    let frequency = self.config.eval_frequency.max(1);
    info!("Initialized!");
    let mut start = Instant::now();
    for step in 0..total_steps {
      let output = self.step(step);
      if step % frequency == 0 {
        let elapsed = start.elapsed().as_secs_f64();
        start = Instant::now();
        let progress = Progress {
          step,
          epoch: (step * self.config.batch_size) as f64 / train_size as f64,
          ms_per_step: 1000.0 * elapsed / frequency as f64,
          loss: output.loss,
          learning_rate: output.learning_rate,
          minibatch_error: metrics::error_rate(&output.predictions, &output.labels),
          validation_error: self.evaluate(&self.data.validation)?,
        };
        on_progress(&progress);
      }
    }
    self.evaluate(&self.data.test)
  }
}


/// A self-test run must classify every synthetic test image correctly.

pub fn check_self_test(test_error: f64) -> Result<()> {
  if test_error == 0.0 {
    Ok(())
  } else {
    Err(Error::SelfTestFailed { test_error })
  }
}

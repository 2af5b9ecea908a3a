use std::cell::RefCell;

use log::{ debug, info };
use rand::{ SeedableRng, rngs::StdRng };

use crate::{
  ops::*,
  config::ModelConfig,
  tensor::Tensor,
  variable::{ Variable, Layer },
};


/// Whether a forward pass is part of a training step.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  Train,
  Inference,
}


/// Weight and bias of one layer.

#[derive(Debug, Clone)]
pub struct Params {
  pub weights: Variable<f32>,
  pub bias: Variable<f32>,
}

impl Params {
  fn new(weights: Tensor<f32>, bias: Tensor<f32>) -> Self {
    Self { weights: weights.trained(), bias: bias.trained() }
  }
}


/// Convolutional classifier owning all of its trainable parameters.
///
/// Parameters are initialized once, from a seeded generator, and
/// updated in place by the optimizer. The same instance serves both
/// training steps and evaluation.

pub struct ConvNet {
  config: ModelConfig,
  stages: Vec<Params>,
  hidden: Params,
  output: Params,
  dropout_rng: RefCell<StdRng>,
}

impl ConvNet {
  pub fn new(config: ModelConfig, seed: u64) -> Self {
    let mut rng = StdRng::seed_from_u64(seed);
    let stddev = config.init_stddev as f32;

    let mut channels = config.num_channels;
    let stages = config.stages.iter().map(|stage| {
      let dims = [stage.kernel, stage.kernel, channels, stage.depth];
      channels = stage.depth;
      Params::new(
        Tensor::truncated_normal(&dims, stddev, &mut rng),
        Tensor::zeros(&[stage.depth]),
      )
    }).collect();

    let hidden = Params::new(
      Tensor::truncated_normal(&[config.flattened_size(), config.hidden_units], stddev, &mut rng),
      Tensor::fill(&[config.hidden_units], config.hidden_bias as f32),
    );
    let output = Params::new(
      Tensor::truncated_normal(&[config.hidden_units, config.num_labels], stddev, &mut rng),
      Tensor::fill(&[config.num_labels], config.output_bias as f32),
    );

    let model = Self {
      config,
      stages,
      hidden,
      output,
      dropout_rng: RefCell::new(StdRng::seed_from_u64(seed)),
    };
    for param in model.parameters() {
      debug!("{}", param);
    }
    info!("Model has {} trainable parameters", model.num_parameters());
    model
  }

  pub fn config(&self) -> &ModelConfig {
    &self.config
  }

  /// All trainable parameters, in layer order.

  pub fn parameters(&self) -> Vec<Variable<f32>> {
    self.stages.iter()
      .chain([&self.hidden, &self.output])
      .flat_map(|params| [params.weights.clone(), params.bias.clone()] )
      .collect()
  }

  pub fn num_parameters(&self) -> usize {
    self.parameters().iter().map(|param| param.size() ).sum()
  }

  /// Map a batch of `[n, height, width, channels]` images to `[n, num_labels]` logits.

  pub fn forward(&self, images: &Tensor<f32>, mode: Mode) -> Variable<f32> {
    let config = &self.config;
    let mut x = images.tracked();
    for (stage, params) in config.stages.iter().zip(&self.stages) {
      x = x.conv2d_biased(&params.weights, &params.bias).relu();
      if stage.pool {
        x = x.max_pool2d(config.pool_window, config.pool_stride, Padding::Valid);
      }
    }
    let batch = x.dim(0);
    let hidden = x
      .reshape(&[batch, 0])
      .dense(&self.hidden.weights, &self.hidden.bias)
      .relu()
      .dropout(config.dropout_rate as f32, mode == Mode::Train, &mut *self.dropout_rng.borrow_mut());
    hidden.dense(&self.output.weights, &self.output.bias)
  }

  /// Class probabilities for a batch of images.

  pub fn predict(&self, images: &Tensor<f32>) -> Tensor<f32> {
    self.forward(images, Mode::Inference).tensor().softmax()
  }
}

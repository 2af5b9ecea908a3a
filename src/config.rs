//! Hyper-parameters for training and for the network topology.
//!
//! Every field has a default, so a JSON file only needs to name the
//! values it overrides:
//!
//! ```json
//! { "training": { "num_epochs": 2 }, "model": { "hidden_units": 512 } }
//! ```

use std::fs;
use std::path::Path;

use serde::{ Serialize, Deserialize };

use crate::error::{ Error, Result };


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
  pub batch_size: usize,
  pub eval_batch_size: usize,
  pub num_epochs: f64,
  /// Steps between progress reports.
  pub eval_frequency: usize,
  pub validation_size: usize,
  pub base_learning_rate: f64,
  /// Factor applied to the learning rate once per epoch.
  pub decay_rate: f64,
  pub momentum: f64,
  pub seed: u64,
}

impl Default for TrainingConfig {
  fn default() -> Self {
    Self {
      batch_size: 64,
      eval_batch_size: 64,
      num_epochs: 10.0,
      eval_frequency: 100,
      validation_size: 5000,
      base_learning_rate: 0.01,
      decay_rate: 0.95,
      momentum: 0.9,
      seed: 66478,
    }
  }
}

impl TrainingConfig {
  pub fn self_test() -> Self {
    Self::default().into_self_test()
  }

  /// Settings for a self-test run: a single epoch over synthetic data.

  pub fn into_self_test(self) -> Self {
    Self { num_epochs: 1.0, ..self }
  }
}


/// One convolution stage: a stride 1, zero padded convolution with bias
/// and ReLU, optionally followed by max pooling.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvStage {
  pub kernel: usize,
  pub depth: usize,
  #[serde(default)]
  pub pool: bool,
}

impl ConvStage {
  pub fn new(kernel: usize, depth: usize, pool: bool) -> Self {
    Self { kernel, depth, pool }
  }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
  pub image_size: usize,
  pub num_channels: usize,
  pub num_labels: usize,
  pub stages: Vec<ConvStage>,
  pub pool_window: usize,
  pub pool_stride: usize,
  pub hidden_units: usize,
  pub dropout_rate: f64,
  /// Standard deviation of the truncated normal weight initializer.
  pub init_stddev: f64,
  pub hidden_bias: f64,
  pub output_bias: f64,
}

impl Default for ModelConfig {
  fn default() -> Self {
    Self {
      image_size: 28,
      num_channels: 1,
      num_labels: 10,
      stages: vec![
        ConvStage::new(7, 64, true),
        ConvStage::new(5, 256, true),
        ConvStage::new(3, 512, false),
        ConvStage::new(3, 1024, false),
        ConvStage::new(3, 512, true),
      ],
      pool_window: 3,
      pool_stride: 2,
      hidden_units: 4096,
      dropout_rate: 0.5,
      init_stddev: 0.03,
      hidden_bias: 0.01,
      output_bias: 0.1,
    }
  }
}

impl ModelConfig {
  /// Spatial extent after the last convolution stage.

  pub fn feature_size(&self) -> usize {
    self.stages.iter().fold(self.image_size, |size, stage| if stage.pool {
      crate::ops::Padding::Valid.output_size(size, self.pool_window, self.pool_stride)
    } else {
      size
    })
  }

  /// Length of the vector each image is flattened into before the dense layers.

  pub fn flattened_size(&self) -> usize {
    let depth = self.stages.last().map_or(self.num_channels, |stage| stage.depth );
    self.feature_size().pow(2) * depth
  }
}


/// Complete run configuration, as read from a JSON file.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub training: TrainingConfig,
  pub model: ModelConfig,
}

impl Config {
  pub fn load(path: &Path) -> Result<Self> {
    let text = fs::read_to_string(path).map_err(|source| Error::Io {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&text).map_err(|source| Error::Config {
      path: path.to_path_buf(),
      source,
    })
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn default_network_flattens_to_2048() {
    let model = ModelConfig::default();
    assert_eq!(model.feature_size(), 2);
    assert_eq!(model.flattened_size(), 2048);
  }

  #[test]
  fn self_test_runs_one_epoch() {
    let config = TrainingConfig::self_test();
    assert_eq!(config.num_epochs, 1.0);
    assert_eq!(config.batch_size, 64);
    let config = TrainingConfig { num_epochs: 3.0, batch_size: 32, ..Default::default() }.into_self_test();
    assert_eq!(config.num_epochs, 1.0);
    assert_eq!(config.batch_size, 32);
  }

  #[test]
  fn partial_file_keeps_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "training": {{ "num_epochs": 2 }}, "model": {{ "hidden_units": 512 }} }}"#).unwrap();
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.training.num_epochs, 2.0);
    assert_eq!(config.training.seed, 66478);
    assert_eq!(config.model.hidden_units, 512);
    assert_eq!(config.model.stages.len(), 5);
  }

  #[test]
  fn malformed_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();
    assert!(matches!(Config::load(file.path()), Err(Error::Config { .. })));
  }
}

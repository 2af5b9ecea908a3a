use std::path::PathBuf;

use thiserror::Error;


pub type Result<T> = std::result::Result<T, Error>;


#[derive(Debug, Error)]
pub enum Error {
  #[error("eval batch size {batch_size} is larger than the dataset size {size}")]
  EvalBatchTooLarge { size: usize, batch_size: usize },

  #[error("{name} must be at least 1")]
  ZeroSetting { name: &'static str },

  #[error("requested {requested} examples, but only {available} are available")]
  InsufficientData { requested: usize, available: usize },

  #[error("invalid magic number {found} in {path:?}, expected {expected}")]
  InvalidMagic { path: PathBuf, expected: u32, found: u32 },

  #[error("label {label} of example {index} in {path:?} is not below {num_labels}")]
  InvalidLabel { path: PathBuf, index: usize, label: usize, num_labels: usize },

  #[error("failed to read {path:?}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config {path:?}: {source}")]
  Config {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("expected 0.0 test_error, got {test_error:.2}")]
  SelfTestFailed { test_error: f64 },
}

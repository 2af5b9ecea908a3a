//! Convolutional digit classifier, trained with momentum SGD on MNIST.
//! Tiny. Few dependencies. CPU only.
//!
//! # Features
//!
//! - **Explicit parameter store**: A [ConvNet](model::ConvNet) owns every
//! trainable tensor. Forward passes and the optimizer both borrow it; there is
//! no global state.
//!
//! - **Eager auto-grad**: Operations on [Variable]s compute their result
//! immediately and record how to differentiate it. Calling
//! [backward](Variable::backward) on the loss fills in every parameter's gradient.
//!
//! - **Zero-copy batches**: Minibatches and evaluation chunks are strided
//! views into the dataset's storage.
//!
//! - **Self-test**: A synthetic two-class dataset checks the whole pipeline
//! end to end in a few steps.
//!
//! # Examples
//!
//! Training the default network on synthetic data:
//! ```no_run
//! use microconv::{
//!   config::{ ModelConfig, TrainingConfig },
//!   data::{ FakeProvider, Provider },
//!   model::ConvNet,
//!   train::{ Trainer, check_self_test },
//! };
//!
//! fn main() -> microconv::Result<()> {
//!   let training = TrainingConfig::self_test();
//!   let data = FakeProvider::new(training.eval_batch_size).load()?;
//!   let net = ConvNet::new(ModelConfig::default(), training.seed);
//!   let mut trainer = Trainer::new(net, training, data)?;
//!
//!   let test_error = trainer.fit(|progress| println!("{progress}") )?;
//!   check_self_test(test_error)
//! }
//! ```
//!
//! # Optional features
//!
//! Some features can be toggled in your `Cargo.toml`.
//!
//! - `unsafe` *(default)*: Accelerated matrix math using [matrixmultiply] crate.
//! - `rayon`: Process the images of a batch in parallel inside convolution and pooling kernels.

mod internal;
mod shape;
mod tensor;
mod variable;
mod error;

pub mod ops;
pub mod scalar;
pub mod optimize;
pub mod config;
pub mod data;
pub mod model;
pub mod metrics;
pub mod train;

pub use shape::Shape;
pub use tensor::Tensor;
pub use variable::{ Variable, Layer, UnaryOp, BinaryOp };
pub use error::{ Error, Result };

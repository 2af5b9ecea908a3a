use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::error;

use microconv::{
  Result,
  config::Config,
  data::{ Provider, FakeProvider, MnistProvider },
  model::ConvNet,
  train::{ Trainer, check_self_test },
};


/// Train a convolutional classifier on MNIST and report its test error.

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
  /// Train on synthetic data for one epoch and require zero test error
  #[arg(long = "self_test")]
  self_test: bool,

  /// Directory holding the gzipped MNIST IDX files
  #[arg(long, default_value = "data")]
  data_dir: PathBuf,

  /// JSON file overriding training and model settings
  #[arg(long)]
  config: Option<PathBuf>,
}


fn run(args: Args) -> Result<()> {
  let mut config = match &args.config {
    Some(path) => Config::load(path)?,
    None => Config::default(),
  };

  let provider: Box<dyn Provider> = if args.self_test {
    config.training = config.training.into_self_test();
    Box::new(FakeProvider::new(config.training.eval_batch_size))
  } else {
    Box::new(MnistProvider::new(&args.data_dir, config.training.validation_size))
  };
  let data = provider.load()?;

  let model = ConvNet::new(config.model, config.training.seed);
  let mut trainer = Trainer::new(model, config.training, data)?;
  let test_error = trainer.fit(|progress| println!("{progress}") )?;
  println!("Test error: {:.1}%", test_error);

  if args.self_test {
    check_self_test(test_error)?;
  }
  Ok(())
}


fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  if let Err(err) = run(Args::parse()) {
    error!("{err}");
    process::exit(1);
  }
}

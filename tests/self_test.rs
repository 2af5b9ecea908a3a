use microconv::{
  Error,
  config::{ ModelConfig, TrainingConfig },
  data::{ FakeProvider, Provider },
  model::ConvNet,
  train::{ Trainer, check_self_test },
};


fn train(config: TrainingConfig) -> (f64, Vec<usize>) {
  let data = FakeProvider::new(config.eval_batch_size).load().unwrap();
  assert_eq!(data.train.len(), 256);
  let net = ConvNet::new(ModelConfig::default(), config.seed);
  let mut trainer = Trainer::new(net, config, data).unwrap();
  assert_eq!(trainer.total_steps(), 4);
  let mut steps = vec![];
  let test_error = trainer.fit(|progress| {
    assert!(progress.loss.is_finite());
    assert!((0.0..=100.0).contains(&progress.validation_error));
    steps.push(progress.step);
  }).unwrap();
  (test_error, steps)
}


#[test]
fn self_test_reaches_zero_error() {
  let config = TrainingConfig { eval_frequency: 1, ..TrainingConfig::self_test() };
  let (test_error, steps) = train(config);
  assert_eq!(steps, vec![0, 1, 2, 3]);
  assert_eq!(test_error, 0.0, "test error {test_error}");
  assert!(check_self_test(test_error).is_ok());
}

#[test]
fn self_test_ignores_configured_epochs() {
  let config = TrainingConfig { num_epochs: 5.0, ..Default::default() }.into_self_test();
  let (test_error, steps) = train(config);
  assert_eq!(steps, vec![0]);
  assert_eq!(test_error, 0.0, "test error {test_error}");
}

#[test]
fn oversized_eval_batch_aborts_before_training() {
  let config = TrainingConfig { eval_batch_size: 128, ..TrainingConfig::self_test() };
  let data = FakeProvider::new(64).load().unwrap();
  let net = ConvNet::new(ModelConfig::default(), config.seed);
  let result = Trainer::new(net, config, data);
  assert!(matches!(result, Err(Error::EvalBatchTooLarge { size: 64, batch_size: 128 })));
}

#[test]
fn empty_eval_batch_aborts_before_training() {
  let config = TrainingConfig { eval_batch_size: 0, ..TrainingConfig::self_test() };
  let data = FakeProvider::new(config.eval_batch_size).load().unwrap();
  let net = ConvNet::new(ModelConfig::default(), config.seed);
  let result = Trainer::new(net, config, data);
  assert!(matches!(result, Err(Error::ZeroSetting { name: "eval_batch_size" })));
}

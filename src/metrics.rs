use crate::{
  ops::*,
  tensor::Tensor,
  variable::Variable,
};


/// Mean sparse softmax cross entropy of a batch of logits.

pub fn loss(logits: &Variable<f32>, labels: &[usize]) -> Variable<f32> {
  logits.sparse_softmax_cross_entropy(labels).mean()
}


/// Percentage of rows whose highest scoring class differs from the label.
///
/// An empty batch has no errors.

pub fn error_rate(predictions: &Tensor<f32>, labels: &[usize]) -> f64 {
  assert_eq!(predictions.dim(0), labels.len(),
    "{} predictions don't match {} labels", predictions.dim(0), labels.len());
  if labels.is_empty() { return 0.0 }
  let correct = predictions.argmax()
    .param_iter()
    .zip(labels)
    .filter(|(predicted, label)| predicted == *label )
    .count();
  100.0 - 100.0 * correct as f64 / labels.len() as f64
}


#[cfg(test)]
mod tests {
  use super::*;

  fn one_hot(classes: &[usize]) -> Tensor<f32> {
    let data = classes.iter()
      .flat_map(|&c| Tensor::<f32>::hot_encode(c, 10).to_vec() )
      .collect();
    Tensor::new(&[classes.len(), 10], data)
  }

  #[test]
  fn perfect_predictions() {
    assert_eq!(error_rate(&one_hot(&[3, 1, 4, 1, 5]), &[3, 1, 4, 1, 5]), 0.0);
  }

  #[test]
  fn partial_errors() {
    let predictions = one_hot(&[0, 1, 2, 3]);
    assert_eq!(error_rate(&predictions, &[0, 1, 9, 9]), 50.0);
    assert_eq!(error_rate(&predictions, &[9, 9, 9, 9]), 100.0);
    assert_eq!(error_rate(&predictions, &[0, 9, 9, 9]), 75.0);
  }

  #[test]
  fn error_rate_is_bounded() {
    let predictions = Tensor::<f32>::arrange(&[7, 10], 0.0, 0.37).vectorize(|a| a.sin() );
    for label in 0..10 {
      let rate = error_rate(&predictions, &[label; 7]);
      assert!((0.0..=100.0).contains(&rate));
    }
  }

  #[test]
  fn uniform_logits_loss() {
    let logits = Tensor::<f32>::zeros(&[4, 10]).trained();
    let loss = loss(&logits, &[0, 1, 2, 3]);
    approx::assert_relative_eq!(loss.item(), 10.0f32.ln(), epsilon = 1e-6);
  }
}

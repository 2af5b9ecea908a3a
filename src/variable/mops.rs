use crate::{
  shape::Shape,
  tensor::{ Tensor, nn::{ self, Geometry } },
  variable::{ Variable, BinaryOp, UnaryOp },
  scalar::Real,
  ops::{ Padding, BaseOps, NumericOps, RealOps },
};


impl<T: Real> BaseOps<T> for Variable<T> {
  fn shape(&self) -> &Shape {
    self.tensor().shape()
  }

  fn reshape(&self, dims: &[usize]) -> Self {
    self.unary_op(Reshape { dims: dims.to_vec() })
  }
}

impl<T: Real> NumericOps<T> for Variable<T> {
  fn sum(&self) -> Self {
    self.unary_op(Sum)
  }

  fn mean(&self) -> Self {
    self.unary_op(Mean)
  }

  fn mm(&self, rhs: &Self) -> Self {
    self.binary_op(MatMul, rhs)
  }

  fn mul(&self, rhs: &Self) -> Self {
    self.binary_op(Mul, rhs)
  }

  fn bias_add(&self, bias: &Self) -> Self {
    self.binary_op(BiasAdd, bias)
  }
}

impl<T: Real> RealOps<T> for Variable<T> {
  fn relu(&self) -> Self {
    self.unary_op(ReLU)
  }

  fn conv2d(&self, kernel: &Self, stride: usize, padding: Padding) -> Self {
    self.binary_op(Conv2d { stride, padding }, kernel)
  }

  fn max_pool2d(&self, window: usize, stride: usize, padding: Padding) -> Self {
    self.unary_op(MaxPool2d { window, stride, padding })
  }

  fn sparse_softmax_cross_entropy(&self, labels: &[usize]) -> Self {
    self.unary_op(SoftmaxCrossEntropy { labels: labels.to_vec() })
  }
}


#[derive(Debug, Clone)]
pub struct Reshape {
  dims: Vec<usize>,
}

impl<T: Real> UnaryOp<T> for Reshape {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.reshape(&self.dims)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad.reshape(&lhs.shape().dims)
  }
}


#[derive(Debug, Clone)]
pub struct Sum;

impl<T: Real> UnaryOp<T> for Sum {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.sum()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    Tensor::fill(&lhs.shape().dims, grad.item())
  }
}


#[derive(Debug, Clone)]
pub struct Mean;

impl<T: Real> UnaryOp<T> for Mean {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.mean()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let n = T::from(lhs.size()).unwrap();
    Tensor::fill(&lhs.shape().dims, grad.item() / n)
  }
}


#[derive(Debug, Clone)]
pub struct MatMul;

impl<T: Real> BinaryOp<T> for MatMul {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs.mm(rhs)
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad.mm_transposed(rhs, false, true),
    lhs.mm_transposed(grad, true, false),
  )}
}


#[derive(Debug, Clone)]
pub struct Mul;

impl<T: Real> BinaryOp<T> for Mul {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs.mul(rhs)
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad.mul(rhs),
    grad.mul(lhs),
  )}
}


#[derive(Debug, Clone)]
pub struct BiasAdd;

impl<T: Real> BinaryOp<T> for BiasAdd {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs.bias_add(rhs)
  }

  fn derive(&self, _lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>) {
    // Bias gradient sums over every position that shares a channel
    let width = rhs.size();
    let mut grad_bias = vec![T::zero(); width];
    grad.with_slice(|values| {
      for row in values.chunks(width) {
        for (acc, &g) in grad_bias.iter_mut().zip(row) {
          *acc += g;
        }
      }
    });
    (grad.clone(), Tensor::new(&[width], grad_bias))
  }
}


#[derive(Debug, Clone)]
pub struct ReLU;

impl<T: Real> UnaryOp<T> for ReLU {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.relu()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad.zip(lhs, |(g, a)| if a > T::zero() { g } else { T::zero() } )
  }
}


#[derive(Debug, Clone)]
pub struct Conv2d {
  stride: usize,
  padding: Padding,
}

impl<T: Real> BinaryOp<T> for Conv2d {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs.conv2d(rhs, self.stride, self.padding)
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>) {
    let kernel_dims = &rhs.shape().dims;
    let geo = Geometry::new(&lhs.shape().dims, (kernel_dims[0], kernel_dims[1]), self.stride, self.padding);
    let (grad_input, grad_kernel) = lhs.with_slice(|input| rhs.with_slice(|kernel| grad.with_slice(|grad| {
      nn::conv2d_backward(input, kernel, grad, &geo, kernel_dims[3])
    })));
    (
      Tensor::new(&lhs.shape().dims, grad_input),
      Tensor::new(kernel_dims, grad_kernel),
    )
  }
}


#[derive(Debug, Clone)]
pub struct MaxPool2d {
  window: usize,
  stride: usize,
  padding: Padding,
}

impl<T: Real> UnaryOp<T> for MaxPool2d {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.max_pool2d(self.window, self.stride, self.padding)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let geo = Geometry::new(&lhs.shape().dims, (self.window, self.window), self.stride, self.padding);
    let data = lhs.with_slice(|input| grad.with_slice(|grad| nn::max_pool2d_backward(input, grad, &geo) ));
    Tensor::new(&lhs.shape().dims, data)
  }
}


#[derive(Debug, Clone)]
pub struct SoftmaxCrossEntropy {
  labels: Vec<usize>,
}

impl<T: Real> UnaryOp<T> for SoftmaxCrossEntropy {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.sparse_softmax_cross_entropy(&self.labels)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let classes = lhs.dim(-1);
    let data = lhs.with_slice(|logits| grad.with_slice(|grad| {
      nn::softmax_cross_entropy_backward(logits, &self.labels, grad, classes)
    }));
    Tensor::new(&lhs.shape().dims, data)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };

  fn rng() -> StdRng {
    StdRng::seed_from_u64(42)
  }

  #[test]
  fn mul() {
    let diff = Variable::<f64>::check_gradients(&[3,2], &mut rng(), |x| x.mul(x) );
    assert!(diff < 1e-6, "{diff}");
  }

  #[test]
  fn mean() {
    let diff = Variable::<f64>::check_gradients(&[4,2], &mut rng(), |x| x.mul(x).mean() );
    assert!(diff < 1e-6, "{diff}");
  }

  #[test]
  fn mm() {
    let w = Tensor::<f64>::randn(&[3,4], &mut rng());
    let diff = Variable::<f64>::check_gradients(&[2,3], &mut rng(), |x| x.mm(&w.tracked()).mul(&x.mm(&w.tracked())) );
    assert!(diff < 1e-6, "{diff}");
    let x = Tensor::<f64>::randn(&[2,3], &mut rng());
    let diff = Variable::<f64>::check_gradients(&[3,4], &mut rng(), |w| x.tracked().mm(w).relu() );
    assert!(diff < 1e-6, "{diff}");
  }

  #[test]
  fn bias_add() {
    let x = Tensor::<f64>::randn(&[2,3,3], &mut rng());
    let diff = Variable::<f64>::check_gradients(&[3], &mut rng(), |b| x.tracked().bias_add(b).relu() );
    assert!(diff < 1e-6, "{diff}");
  }

  #[test]
  fn reshape() {
    let w = Tensor::<f64>::randn(&[6,2], &mut rng());
    let diff = Variable::<f64>::check_gradients(&[2,3,2,1], &mut rng(), |x| x.reshape(&[2,0]).mm(&w.tracked()).relu() );
    assert!(diff < 1e-6, "{diff}");
  }

  #[test]
  fn conv2d_input() {
    let kernel = Tensor::<f64>::randn(&[3,3,2,3], &mut rng());
    let diff = Variable::<f64>::check_gradients(&[2,5,5,2], &mut rng(), |x| {
      x.conv2d(&kernel.tracked(), 1, Padding::Same).relu()
    });
    assert!(diff < 1e-6, "{diff}");
  }

  #[test]
  fn conv2d_kernel() {
    let images = Tensor::<f64>::randn(&[2,6,6,2], &mut rng());
    let diff = Variable::<f64>::check_gradients(&[3,3,2,2], &mut rng(), |k| {
      images.tracked().conv2d(k, 2, Padding::Valid).relu()
    });
    assert!(diff < 1e-6, "{diff}");
  }

  #[test]
  fn max_pool2d() {
    let diff = Variable::<f64>::check_gradients(&[2,7,7,2], &mut rng(), |x| {
      x.max_pool2d(3, 2, Padding::Valid).mul(&x.max_pool2d(3, 2, Padding::Valid))
    });
    assert!(diff < 1e-6, "{diff}");
  }

  #[test]
  fn sparse_softmax_cross_entropy() {
    let diff = Variable::<f64>::check_gradients(&[3,4], &mut rng(), |x| {
      x.sparse_softmax_cross_entropy(&[1, 0, 3]).mean()
    });
    assert!(diff < 1e-6, "{diff}");
  }
}

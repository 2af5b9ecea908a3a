use std::rc::Rc;
use std::collections::HashSet;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::fmt::Debug;

use rand::Rng;

mod mops;
mod layer;

pub use layer::Layer;

use crate::{
  tensor::Tensor,
  scalar::Real,
  ops::{ BaseOps, NumericOps },
};


fn make_id() -> usize {
  static LAST_ID: AtomicUsize = AtomicUsize::new(0);
  LAST_ID.fetch_add(1, Ordering::Relaxed)
}


/// Unary computational operation that can also compute its derivative.

pub trait UnaryOp<T: Real>: Debug {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T>;
  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T>;
}


/// Binary computational operation that can also compute its derivative.

pub trait BinaryOp<T: Real>: Debug {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T>;
  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>);
}


#[derive(Debug)]
enum Op<T: Real> {
  Unary(Box<dyn UnaryOp<T>>),
  Binary(Box<dyn BinaryOp<T>>),
}


/// Node in a computation graph, containing a [Variable]'s data and gradient,
/// as well as the operation used to create it.

#[derive(Debug)]
struct Node<T: Real> {
  id: usize,
  data: Tensor<T>,
  grad: Option<Tensor<T>>,
  op: Option<Op<T>>,
  previous: Vec<Rc<Self>>,
  trainable: bool,
}

impl<T: Real> Node<T> {
  fn reset_gradient(&self, filler: T) {
    if let Some(grad) = &self.grad {
      grad.refill(filler);
    }
  }

  fn backward(&self) {
    if let (Some(op), Some(grad)) = (&self.op, &self.grad) {
      let lhs = &self.previous[0];
      let changes = match op {
        Op::Unary(op) => vec![op.derive(&lhs.data, grad)],
        Op::Binary(op) => {
          let rhs = &self.previous[1];
          let (l, r) = op.derive(&lhs.data, &rhs.data, grad);
          vec![l, r]
        },
      };
      for (change, prev) in changes.iter().zip(self.previous.iter()) {
        if let Some(grad) = &prev.grad {
          grad.add_assign(change);
        }
      }
    }
  }
}


/// Variables track the computational operations used to create them and allow
/// for computing their gradient with respect to all input variables involved.
///
/// They get created by calling [tracked](Tensor::tracked) or
/// [trained](Tensor::trained) on any differentiable [Tensor] type.
///
/// Variables dereference to their underlying [Tensor] automatically for
/// non-differentiable operations. Differentiable operations, on the other hand,
/// will always return another Variable.

#[derive(Debug, Clone)]
pub struct Variable<T: Real> {
  node: Rc<Node<T>>,
}

impl<T: Real> std::ops::Deref for Variable<T> {
  type Target = Tensor<T>;

  fn deref(&self) -> &Self::Target {
    &self.node.data
  }
}

impl<T: Real> PartialEq for Variable<T> {
  fn eq(&self, rhs: &Self) -> bool {
    self.node.data == rhs.node.data
  }
}

impl<T: Real> Variable<T> {
  pub(crate) fn from_tensor(tensor: Tensor<T>, trainable: bool) -> Self {
    Self {
      node: Rc::new(Node {
        id: make_id(),
        grad: trainable.then(|| Tensor::zeros(&tensor.shape().dims) ),
        data: tensor,
        op: None,
        previous: vec![],
        trainable,
      }),
    }
  }

  fn operation(op: Op<T>, data: Tensor<T>, grad: bool, previous: Vec<Rc<Node<T>>>) -> Self {
    Self {
      node: Rc::new(Node {
        id: make_id(),
        grad: grad.then(|| Tensor::zeros(&data.shape().dims) ),
        data,
        op: Some(op),
        previous,
        trainable: false,
      }),
    }
  }

  pub fn id(&self) -> usize {
    self.node.id
  }

  pub fn tensor(&self) -> &Tensor<T> {
    &self.node.data
  }

  pub fn grad(&self) -> Option<&Tensor<T>> {
    self.node.grad.as_ref()
  }

  pub fn unary_op(&self, op: impl UnaryOp<T> + 'static) -> Self {
    let data = op.run(&self.node.data);
    Self::operation(
      Op::Unary(Box::new(op)),
      data,
      self.grad().is_some(),
      vec![self.node.clone()],
    )
  }

  pub fn binary_op(&self, op: impl BinaryOp<T> + 'static, rhs: &Self) -> Self {
    let data = op.run(&self.node.data, &rhs.node.data);
    Self::operation(
      Op::Binary(Box::new(op)),
      data,
      self.grad().is_some() || rhs.grad().is_some(),
      vec![self.node.clone(), rhs.node.clone()],
    )
  }

  /// Compute gradients across this Variable's entire graph.

  pub fn backward(&self) {
    if self.grad().is_none() { panic!("Cannot compute gradients for constant {self}") }
    self.node.reset_gradient(T::one());
    for node in self.history().iter().rev() {
      node.backward();
    }
  }

  /// List all trainable parameters in this Variable's graph.

  pub fn parameters(&self) -> Vec<Self> {
    self.history()
      .into_iter()
      .filter(|node| node.trainable )
      .map(|node| Self { node } )
      .collect()
  }

  /// Set gradients to zero for this Variable's entire graph.

  pub fn reset(&self) {
    for node in self.history() {
      node.reset_gradient(T::zero());
    }
  }

  fn history(&self) -> Vec<Rc<Node<T>>> {
    let mut history = vec![];
    Self::history_recurse(&self.node, &mut history, &mut HashSet::new());
    history
  }

  fn history_recurse(node: &Rc<Node<T>>, history: &mut Vec<Rc<Node<T>>>, visited: &mut HashSet<usize>) {
    if visited.contains(&node.id) { return }
    visited.insert(node.id);
    for prev in &node.previous {
      Self::history_recurse(prev, history, visited);
    }
    history.push(node.clone());
  }

  /// Compute a function's gradient with respect to a generated
  /// input numerically and compare it to the automatically derived
  /// solution.
  ///
  /// Returns the mean absolute difference between both gradients.

  pub fn check_gradients<F>(shape: &[usize], rng: &mut impl Rng, generator: F) -> T
  where
    F: Fn(&Self) -> Self
  {
    let eps = T::from(1e-4).unwrap();
    let two = T::from(2.0).unwrap();
    let input = Tensor::randn(shape, rng);
    let var = input.trained();
    // Compute gradient using auto diff
    let output = generator(&var).sum();
    output.backward();
    let grad = var.grad().unwrap().detach();
    // Compute gradient numerically for every element of the input
    let len = input.size();
    let num_grad: Vec<T> = (0..len).map(|i| {
      let epst = Tensor::hot_encode(i, len).reshape(shape).scale(eps);
      let prev = generator(&input.sub(&epst).tracked()).sum();
      let next = generator(&input.add(&epst).tracked()).sum();
      (next.item() - prev.item()) / (two * eps)
    }).collect();
    let num_grad = Tensor::new(&grad.shape().dims, num_grad);
    grad.sub(&num_grad).vectorize(|a| a.abs() ).mean().item()
  }

  /// Number of trainable scalars in this Variable's graph.

  pub fn num_parameters(&self) -> usize {
    self.parameters().iter().map(|param| param.size() ).sum()
  }
}

impl<T: Real> std::fmt::Display for Variable<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let title = if self.node.trainable { "Trainable" } else if self.node.grad.is_some() {
      "Computed"
    } else {
      "Tracked"
    };
    write!(f, "{title} {}", self.shape())
  }
}

use std::rc::Rc;
use std::cell::{ Ref, RefCell };
use std::ops::Range;
use std::cmp::Ordering;

use rand::Rng;
use itertools::Itertools;

mod cops;
mod lops;
pub(crate) mod nn;

use crate::{
  internal::*,
  shape::Shape,
  variable::Variable,
  scalar::{ Inner, Numeric, Real },
  ops::BaseOps,
};


/// Multidimensional array.
///
/// Tensors may contain any type that satisfies [Inner], but
/// additional methods are available for [Numeric] and [Real]
/// inner types.
///
/// Cloning a tensor is cheap and shares its storage. Slicing with
/// [range](Tensor::range) yields a view into the same storage as well.
///
/// [Real] tensor types can be wrapped in a [Variable] by
/// calling [tracked](Tensor::tracked) or [trained](Tensor::trained).

#[derive(Debug, Clone)]
pub struct Tensor<T: Inner> {
  shape: Shape,
  data: Rc<RefCell<Vec<T>>>,
}

impl<T: Inner> PartialEq for Tensor<T> {
  fn eq(&self, rhs: &Self) -> bool {
    if self.shape.dims != rhs.shape.dims { return false }
    let data_l = self.data.borrow();
    let data_r = rhs.data.borrow();
    self.shape.iter().zip(rhs.shape.iter()).all(|(i, j)| data_l[i] == data_r[j] )
  }
}

impl<T: Inner> Tensor<T> {
  pub fn from_shape(shape: Shape, data: Vec<T>) -> Self {
    assert_eq!(shape.size(), data.len(),
      "{} doesn't match data length {}", shape, data.len());
    Self { shape, data: Rc::new(RefCell::new(data)) }
  }

  pub fn new(shape: &[usize], data: Vec<T>) -> Self {
    Self::from_shape(Shape::new(shape), data)
  }

  pub fn vec(vec: &[T]) -> Self {
    Self::new(&[vec.len()], vec.to_vec())
  }

  pub fn fill(shape: &[usize], filler: T) -> Self {
    Self::new(shape, vec![filler; shape.iter().product()])
  }

  pub fn init(shape: &[usize], mut cb: impl FnMut() -> T) -> Self {
    let size: usize = shape.iter().product();
    Self::new(shape, (0..size).map(|_| cb() ).collect())
  }

  pub fn raw(&self) -> Ref<Vec<T>> {
    self.data.borrow()
  }

  /// Copy elements out in row-major order.

  pub fn to_vec(&self) -> Vec<T> {
    self.param_iter().collect()
  }

  /// Borrow the elements as a row-major slice, compacting the tensor first if needed.

  pub fn with_slice<O>(&self, cb: impl FnOnce(&[T]) -> O) -> O {
    let this = self.contiguous();
    let offset = this.shape.offset;
    let data = this.data.borrow();
    cb(&data[offset..offset + this.size()])
  }

  pub fn size(&self) -> usize {
    self.shape.size()
  }

  pub fn rank(&self) -> usize {
    self.shape.rank()
  }

  pub fn shared_with(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.data, &other.data)
  }

  /// Overwrite this tensor's elements in place with those of `other`.
  ///
  /// All tensors sharing storage with this one observe the change.

  pub fn assign(&self, other: &Self) {
    assert_eq!(self.shape.dims, other.shape.dims,
      "Could not assign {} tensor to {} tensor", other.shape, self.shape);
    // Avoid clashing borrow when tensors share storage
    let other = if self.shared_with(other) { other.detach() } else { other.clone() };
    let mut data = self.data.borrow_mut();
    let other_data = other.data.borrow();
    for (i, j) in self.shape.iter().zip(other.shape.iter()) {
      data[i] = other_data[j];
    }
  }

  pub fn refill(&self, filler: T) {
    let mut data = self.data.borrow_mut();
    for i in self.shape.iter() {
      data[i] = filler;
    }
  }

  pub fn contiguous(&self) -> Self {
    if self.shape.contiguous() {
      self.clone()
    } else {
      self.detach()
    }
  }

  pub fn detach(&self) -> Self {
    self.vectorize(|a| a )
  }

  pub fn zip<O,F>(&self, rhs: &Self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: Fn((T, T)) -> O,
  {
    assert_eq!(self.shape.dims, rhs.shape.dims,
      "Cannot zip {} & {} tensors", self.shape, rhs.shape);
    let data: Vec<O> = self.param_iter()
      .zip(rhs.param_iter())
      .map(cb)
      .collect();
    Tensor::new(&self.shape.dims, data)
  }

  pub fn vectorize<O,F>(&self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: FnMut(T) -> O,
  {
    let data = self.param_iter().map(cb).collect();
    Tensor::new(&self.shape.dims, data)
  }

  /// Map every row along the last dimension to a single value.

  pub fn collapse<O,F>(&self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: Fn(&[T]) -> O,
  {
    let width = self.shape[-1];
    let data = self.with_slice(|values| {
      values.chunks(width).map(cb).collect()
    });
    Tensor::new(&self.shape.dims[..self.rank() - 1], data)
  }

  /// Map every row along the last dimension to a row of equal length.

  pub fn collapse_only<F>(&self, cb: F) -> Self
  where
    F: Fn(&[T]) -> Vec<T>,
  {
    let width = self.shape[-1];
    let data = self.with_slice(|values| {
      values.chunks(width).flat_map(cb).collect()
    });
    Tensor::new(&self.shape.dims, data)
  }

  pub fn param_iter(&self) -> TensorIterator<T> {
    TensorIterator::new(self)
  }

  /// Zero-copy slice. Ranges apply to leading dimensions, in order.

  pub fn range(&self, ranges: &[Range<isize>]) -> Self {
    let shape = self.shape.range(ranges);
    let data = self.data.clone();
    Self { shape, data }
  }

  /// Rows `start..end` of the outermost dimension.

  pub fn rows(&self, rows: Range<usize>) -> Self {
    self.range(&[rows.start as isize .. rows.end as isize])
  }

  pub fn item(&self) -> T {
    assert!(self.size() == 1,
      "Can't extract item from non-scalar {}", self.shape);
    self.raw()[self.shape.offset]
  }

  pub fn view(&self, dims: &[usize]) -> Self {
    let shape = self.shape.view(dims);
    let data = self.data.clone();
    Self { shape, data }
  }
}

impl<T: Numeric> Tensor<T> {
  pub fn ones(shape: &[usize]) -> Self {
    Self::fill(shape, T::one())
  }

  pub fn zeros(shape: &[usize]) -> Self {
    Self::fill(shape, T::zero())
  }

  pub fn scalar(item: T) -> Self {
    Self::new(&[], vec![item])
  }

  pub fn arrange(shape: &[usize], start: T, step: T) -> Self {
    Self::new(shape, (0..shape.iter().product::<usize>())
      .map(|i| T::from(i).unwrap() * step + start )
      .collect())
  }

  pub fn hot_encode(idx: usize, size: usize) -> Self {
    let mut a = vec![T::zero(); size];
    a[idx] = T::one();
    Self::new(&[size], a)
  }

  pub fn add(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a + b )
  }

  pub fn sub(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a - b )
  }

  pub fn scale(&self, factor: T) -> Self {
    self.vectorize(|a| a * factor )
  }

  /// Accumulate `other` into this tensor's storage in place.

  pub fn add_assign(&self, other: &Self) {
    assert_eq!(self.shape.dims, other.shape.dims,
      "Could not accumulate {} tensor into {} tensor", other.shape, self.shape);
    let other = if self.shared_with(other) { other.detach() } else { other.clone() };
    let mut data = self.data.borrow_mut();
    let other_data = other.data.borrow();
    for (i, j) in self.shape.iter().zip(other.shape.iter()) {
      data[i] += other_data[j];
    }
  }

  /// Collapse the last dimension using the index of its greatest value.
  /// Ties resolve to the lowest index.

  pub fn argmax(&self) -> Tensor<usize> {
    self.collapse(|values| {
      values.iter()
        .position_max_by(|a, b| {
          a.partial_cmp(b)
            .unwrap_or(Ordering::Equal)
            .then(Ordering::Greater)
        })
        .unwrap_or(0)
    })
  }
}

impl<T: Real> Tensor<T> {
  pub fn randn(shape: &[usize], rng: &mut impl Rng) -> Self {
    let len = shape.iter().product();
    let mut data = vec![T::zero(); len];
    for i in 0..(len as f64 / 2.0).ceil() as usize {
      let j = i * 2;
      let (r1, r2): (T, T) = randn(rng);
      data[j] = r1;
      data[(j + 1) % len] = r2;
    }
    Self::new(shape, data)
  }

  /// Normal samples with the given standard deviation,
  /// redrawn whenever they fall beyond two standard deviations.

  pub fn truncated_normal(shape: &[usize], stddev: T, rng: &mut impl Rng) -> Self {
    Self::init(shape, || truncated_randn::<T>(rng) * stddev )
  }

  /// Mask of zeros and ones, where ones appear with the given probability.

  pub fn bernoulli(shape: &[usize], probability: T, rng: &mut impl Rng) -> Self {
    Self::init(shape, || if rng.gen_range(T::zero(), T::one()) < probability {
      T::one()
    } else {
      T::zero()
    })
  }

  /// Normalized exponentials along the last dimension.

  pub fn softmax(&self) -> Self {
    self.collapse_only(|logits| {
      let max = logits.iter().fold(logits[0], |acc, &a| acc.max(a) );
      let exp: Vec<T> = logits.iter().map(|&a| (a - max).exp() ).collect();
      let sum: T = exp.iter().copied().sum();
      exp.into_iter().map(|a| a / sum ).collect()
    })
  }

  pub fn trained(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), true)
  }

  pub fn tracked(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), false)
  }
}

impl<T: Inner> BaseOps<T> for Tensor<T> {
  fn shape(&self) -> &Shape {
    &self.shape
  }

  fn reshape(&self, dims: &[usize]) -> Self {
    self.contiguous().view(dims)
  }
}


pub struct TensorIterator<'a, T: Inner> {
  data: Ref<'a, Vec<T>>,
  shape_iter: Box<dyn Iterator<Item=usize> + 'a>,
}

impl<'a, T: Inner> TensorIterator<'a, T> {
  fn new(tensor: &'a Tensor<T>) -> Self {
    Self {
      data: tensor.data.borrow(),
      shape_iter: tensor.shape.iter(),
    }
  }
}

impl<T: Inner> Iterator for TensorIterator<'_, T> {
  type Item = T;

  fn next(&mut self) -> Option<Self::Item> {
    self.shape_iter.next().map(|i| self.data[i] )
  }
}

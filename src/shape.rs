use std::ops::Range;

use crate::internal::*;


/// The shape of a [Tensor](crate::Tensor).
///
/// Shapes describe a strided window into flat storage, which allows
/// minibatches to be sliced out of a dataset without copying.

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
  pub dims: Vec<usize>,
  pub(crate) strides: Vec<isize>,
  pub(crate) offset: usize,
}

impl Shape {
  pub fn new(dims: &[usize]) -> Self {
    let strides = Self::make_strides(dims);
    Self {
      dims: dims.to_vec(),
      strides,
      offset: 0,
    }
  }

  fn make_strides(dims: &[usize]) -> Vec<isize> {
    if dims.len() == 0 { return vec![] }
    let mut strides = vec![0; dims.len()];
    strides[dims.len() - 1] = 1;
    for i in (1..dims.len()).rev() {
      strides[i - 1] = dims[i] as isize * strides[i];
    }
    strides
  }

  pub fn size(&self) -> usize {
    self.dims.iter().product()
  }

  pub fn rank(&self) -> usize {
    self.dims.len()
  }

  pub fn contiguous(&self) -> bool {
    self.strides == Self::make_strides(&self.dims)
  }

  /// Iterate over storage indices in row-major order.

  pub fn iter(&self) -> Box<dyn Iterator<Item=usize> + '_> {
    if self.contiguous() {
      Box::new(self.offset..self.offset + self.size())
    } else {
      Box::new(ShapeIterator::new(self))
    }
  }

  /// Reinterpret contiguous storage with new dimensions.
  /// A single zero in `dims` acts as a placeholder that absorbs the remaining size.

  pub fn view(&self, dims: &[usize]) -> Self {
    assert!(self.contiguous(), "Cannot view non-contiguous {}", self);
    let dims: Vec<usize> = dims.iter().enumerate().map(|(i, &n)| if n == 0 {
      let product: usize =
        dims[0..i].iter()
        .chain(dims[i + 1..dims.len()].iter())
        .product();
      self.size() / product
    } else {
      n
    }).collect();
    assert_eq!(dims.iter().product::<usize>(), self.size(),
      "Cannot view {} as {:?}", self, dims);
    let strides = Self::make_strides(&dims);
    Self { dims, strides, offset: self.offset }
  }

  pub fn range(&self, ranges: &[Range<isize>]) -> Self {
    let mut offset = 0;
    let mut dims = self.dims.clone();
    for (d, range) in ranges.iter().enumerate() {
      let dim = self.dims[d];
      let start = negative_index(range.start, dim, true);
      let end = negative_index(range.end, dim, true);
      assert!(start <= end && end <= dim,
        "Range {:?} out of bounds for dimension {} of {}", range, d, self);
      offset += self.strides[d] * start as isize;
      dims[d] = end - start
    }
    Self { dims, strides: self.strides.clone(), offset: (self.offset as isize + offset) as usize }
  }
}

impl std::ops::Index<isize> for Shape {
  type Output = usize;

  fn index<'a>(&'a self, i: isize) -> &'a usize {
    let idx = negative_index(i, self.rank(), false);
    &self.dims[idx]
  }
}

impl std::fmt::Display for Shape {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Shape{:?}", self.dims)
  }
}


/// Iterate through a [Shape]'s indices.

pub struct ShapeIterator<'a> {
  shape: &'a Shape,
  counter: Vec<usize>,
  idx: isize,
  finished: bool,
}

impl<'a> ShapeIterator<'a> {
  fn new(shape: &'a Shape) -> Self {
    Self {
      counter: vec![0; shape.rank()],
      idx: shape.offset as isize,
      finished: shape.size() == 0,
      shape,
    }
  }
}

impl<'a> Iterator for ShapeIterator<'a> {
  type Item = usize;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished { return None }
    let out = self.idx as usize;
    let len = self.counter.len();
    if len == 0 { self.finished = true }
    // Walk backward through dimensions
    for cd in (0..len).rev() {
      // Increment counter on full turn of right hand dimension
      if cd == len - 1 || self.counter[cd + 1] == 0 {
        let count = &mut self.counter[cd];
        // Full turn?
        if *count == self.shape.dims[cd] - 1 {
          if cd == 0 { self.finished = true; break }
          *count = 0;
          let backstride = (self.shape.dims[cd] as isize - 1) * self.shape.strides[cd];
          self.idx -= backstride;
        } else {
          *count += 1;
          self.idx += self.shape.strides[cd];
        }
      } else {
        break
      }
    }
    Some(out)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strides() {
    let shape = Shape::new(&[3,2,2]);
    assert_eq!(shape.strides, vec![4,2,1]);

    let shape = Shape::new(&[64,28,28,1]);
    assert_eq!(shape.strides, vec![784,28,1,1]);
  }

  #[test]
  fn range() {
    let shape = Shape::new(&[4,4,4]).range(&[1..3, 1..3, 1..3]);
    assert_eq!(shape.dims, vec![2,2,2]);
    assert_eq!(shape.offset, 21);
    let indices: Vec<_> = shape.iter().collect();
    assert_eq!(indices, vec![21, 22, 25, 26, 37, 38, 41, 42]);
  }

  #[test]
  fn batch_range_stays_contiguous() {
    let shape = Shape::new(&[10,28,28,1]).range(&[3..5]);
    assert!(shape.contiguous());
    assert_eq!(shape.offset, 3 * 784);
    assert_eq!(shape.dims, vec![2,28,28,1]);
  }

  #[test]
  fn negative_range() {
    // -1 addresses the end of a dimension
    let shape = Shape::new(&[150,10]).range(&[-65..-1]);
    assert_eq!(shape.dims, vec![64,10]);
    assert_eq!(shape.offset, 86 * 10);
  }

  #[test]
  fn view() {
    let shape = Shape::new(&[8,2,2,3]).view(&[8,0]);
    assert_eq!(shape.dims, vec![8,12]);
    assert_eq!(shape.strides, vec![12,1]);
  }

  #[test]
  fn scalar() {
    let shape = Shape::new(&[]);
    assert_eq!(shape.size(), 1);
    assert_eq!(shape.iter().collect::<Vec<_>>(), vec![0]);
  }
}

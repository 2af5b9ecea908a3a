//! Convolution, pooling and loss kernels over row-major NHWC buffers.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
  scalar::{ Inner, Real },
  ops::Padding,
};


/// Spatial bookkeeping for a window sweeping over a batch of images.

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Geometry {
  pub batch: usize,
  pub height: usize,
  pub width: usize,
  pub channels: usize,
  pub window: (usize, usize),
  pub stride: usize,
  pub out_height: usize,
  pub out_width: usize,
  pad_top: usize,
  pad_left: usize,
}

impl Geometry {
  pub fn new(dims: &[usize], window: (usize, usize), stride: usize, padding: Padding) -> Self {
    assert_eq!(dims.len(), 4, "Expected [batch, height, width, channels] input, got {:?}", dims);
    assert!(stride > 0, "Stride must be positive");
    let (height, width) = (dims[1], dims[2]);
    Self {
      batch: dims[0],
      height,
      width,
      channels: dims[3],
      window,
      stride,
      out_height: padding.output_size(height, window.0, stride),
      out_width: padding.output_size(width, window.1, stride),
      pad_top: padding.leading(height, window.0, stride),
      pad_left: padding.leading(width, window.1, stride),
    }
  }

  pub fn image_size(&self) -> usize {
    self.height * self.width * self.channels
  }

  pub fn positions(&self) -> usize {
    self.out_height * self.out_width
  }

  /// Length of one unrolled window.

  pub fn patch_size(&self) -> usize {
    self.window.0 * self.window.1 * self.channels
  }

  pub fn output_dims(&self, channels: usize) -> Vec<usize> {
    vec![self.batch, self.out_height, self.out_width, channels]
  }

  /// Input coordinates covered by the window at output position `(oy, ox)`,
  /// paired with the window offset `(ky, kx)`. Border positions are skipped.

  fn taps(&self, oy: usize, ox: usize) -> impl Iterator<Item = ((usize, usize), (usize, usize))> + '_ {
    let top = (oy * self.stride) as isize - self.pad_top as isize;
    let left = (ox * self.stride) as isize - self.pad_left as isize;
    (0..self.window.0).flat_map(move |ky| {
      (0..self.window.1).filter_map(move |kx| {
        let iy = top + ky as isize;
        let ix = left + kx as isize;
        let inside = iy >= 0 && ix >= 0 && (iy as usize) < self.height && (ix as usize) < self.width;
        inside.then(|| ((iy as usize, ix as usize), (ky, kx)) )
      })
    })
  }
}


/// Run `cb` on consecutive chunks of `out`, one per image.

fn per_image<T: Inner, F>(out: &mut [T], chunk: usize, cb: F)
where
  F: Fn(usize, &mut [T]) + Send + Sync,
{
  if chunk == 0 { return }

  #[cfg(feature = "rayon")]
  out.par_chunks_mut(chunk).enumerate().for_each(|(n, image)| cb(n, image) );

  #[cfg(not(feature = "rayon"))]
  out.chunks_mut(chunk).enumerate().for_each(|(n, image)| cb(n, image) );
}


/// Unroll every window into a row of a `[batch * positions, patch_size]` matrix.

pub(crate) fn im2col<T: Real>(input: &[T], geo: &Geometry) -> Vec<T> {
  let patch = geo.patch_size();
  let c = geo.channels;
  let mut cols = vec![T::zero(); geo.batch * geo.positions() * patch];
  per_image(&mut cols, geo.positions() * patch, |n, rows| {
    let image = &input[n * geo.image_size()..(n + 1) * geo.image_size()];
    for oy in 0..geo.out_height {
      for ox in 0..geo.out_width {
        let row = &mut rows[(oy * geo.out_width + ox) * patch..][..patch];
        for ((iy, ix), (ky, kx)) in geo.taps(oy, ox) {
          let src = (iy * geo.width + ix) * c;
          let dst = (ky * geo.window.1 + kx) * c;
          row[dst..dst + c].copy_from_slice(&image[src..src + c]);
        }
      }
    }
  });
  cols
}


/// Fold unrolled windows back onto images, summing overlapping contributions.

pub(crate) fn col2im<T: Real>(cols: &[T], geo: &Geometry) -> Vec<T> {
  let patch = geo.patch_size();
  let c = geo.channels;
  let mut images = vec![T::zero(); geo.batch * geo.image_size()];
  per_image(&mut images, geo.image_size(), |n, image| {
    let rows = &cols[n * geo.positions() * patch..(n + 1) * geo.positions() * patch];
    for oy in 0..geo.out_height {
      for ox in 0..geo.out_width {
        let row = &rows[(oy * geo.out_width + ox) * patch..][..patch];
        for ((iy, ix), (ky, kx)) in geo.taps(oy, ox) {
          let dst = (iy * geo.width + ix) * c;
          let src = (ky * geo.window.1 + kx) * c;
          for (a, &b) in image[dst..dst + c].iter_mut().zip(&row[src..src + c]) {
            *a += b;
          }
        }
      }
    }
  });
  images
}


pub(crate) fn conv2d<T: Real>(input: &[T], kernel: &[T], geo: &Geometry, out_channels: usize) -> Vec<T> {
  let rows = geo.batch * geo.positions();
  let patch = geo.patch_size();
  let cols = im2col(input, geo);
  let mut out = vec![T::zero(); rows * out_channels];
  T::gemm(
    rows, patch, out_channels,
    &cols, (patch as isize, 1),
    kernel, (out_channels as isize, 1),
    T::zero(),
    &mut out,
  );
  out
}


/// Gradients of a convolution with respect to its input and its kernel.

pub(crate) fn conv2d_backward<T: Real>(
  input: &[T],
  kernel: &[T],
  grad: &[T],
  geo: &Geometry,
  out_channels: usize,
) -> (Vec<T>, Vec<T>) {
  let rows = geo.batch * geo.positions();
  let patch = geo.patch_size();
  let cols = im2col(input, geo);

  let mut grad_kernel = vec![T::zero(); patch * out_channels];
  T::gemm(
    patch, rows, out_channels,
    &cols, (1, patch as isize),
    grad, (out_channels as isize, 1),
    T::zero(),
    &mut grad_kernel,
  );

  let mut grad_cols = vec![T::zero(); rows * patch];
  T::gemm(
    rows, out_channels, patch,
    grad, (out_channels as isize, 1),
    kernel, (1, out_channels as isize),
    T::zero(),
    &mut grad_cols,
  );

  (col2im(&grad_cols, geo), grad_kernel)
}


/// Index into `image` of the first maximum within the window at `(oy, ox)` for channel `ch`.

fn window_argmax<T: Real>(image: &[T], geo: &Geometry, oy: usize, ox: usize, ch: usize) -> usize {
  let mut best: Option<(usize, T)> = None;
  for ((iy, ix), _) in geo.taps(oy, ox) {
    let idx = (iy * geo.width + ix) * geo.channels + ch;
    let value = image[idx];
    if best.map_or(true, |(_, max)| value > max ) {
      best = Some((idx, value));
    }
  }
  best.expect("Pooling window doesn't overlap the image").0
}


pub(crate) fn max_pool2d<T: Real>(input: &[T], geo: &Geometry) -> Vec<T> {
  let c = geo.channels;
  let mut out = vec![T::zero(); geo.batch * geo.positions() * c];
  per_image(&mut out, geo.positions() * c, |n, pooled| {
    let image = &input[n * geo.image_size()..(n + 1) * geo.image_size()];
    for oy in 0..geo.out_height {
      for ox in 0..geo.out_width {
        for ch in 0..c {
          pooled[(oy * geo.out_width + ox) * c + ch] = image[window_argmax(image, geo, oy, ox, ch)];
        }
      }
    }
  });
  out
}


/// Route each pooled gradient back to the position that won its window.

pub(crate) fn max_pool2d_backward<T: Real>(input: &[T], grad: &[T], geo: &Geometry) -> Vec<T> {
  let c = geo.channels;
  let mut grad_input = vec![T::zero(); geo.batch * geo.image_size()];
  per_image(&mut grad_input, geo.image_size(), |n, image_grad| {
    let image = &input[n * geo.image_size()..(n + 1) * geo.image_size()];
    let pooled = &grad[n * geo.positions() * c..(n + 1) * geo.positions() * c];
    for oy in 0..geo.out_height {
      for ox in 0..geo.out_width {
        for ch in 0..c {
          image_grad[window_argmax(image, geo, oy, ox, ch)] += pooled[(oy * geo.out_width + ox) * c + ch];
        }
      }
    }
  });
  grad_input
}


fn log_softmax_parts<T: Real>(logits: &[T]) -> (T, T) {
  let max = logits.iter().fold(logits[0], |acc, &a| acc.max(a) );
  let sum: T = logits.iter().map(|&a| (a - max).exp() ).sum();
  (max, sum)
}


/// Per-row `logsumexp(z) - z[label]` for a `[labels.len(), classes]` logit matrix.

pub(crate) fn softmax_cross_entropy<T: Real>(logits: &[T], labels: &[usize], classes: usize) -> Vec<T> {
  assert_eq!(logits.len(), labels.len() * classes,
    "{} labels don't match logits of {} classes", labels.len(), classes);
  logits.chunks(classes)
    .zip(labels)
    .map(|(row, &label)| {
      assert!(label < classes, "Label {label} out of range for {classes} classes");
      let (max, sum) = log_softmax_parts(row);
      sum.ln() + max - row[label]
    })
    .collect()
}


pub(crate) fn softmax_cross_entropy_backward<T: Real>(
  logits: &[T],
  labels: &[usize],
  grad: &[T],
  classes: usize,
) -> Vec<T> {
  logits.chunks(classes)
    .zip(labels)
    .zip(grad)
    .flat_map(|((row, &label), &g)| {
      let (max, sum) = log_softmax_parts(row);
      row.iter().enumerate().map(move |(i, &a)| {
        let hot = if i == label { T::one() } else { T::zero() };
        ((a - max).exp() / sum - hot) * g
      })
    })
    .collect()
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn network_geometry() {
    let conv1 = Geometry::new(&[64, 28, 28, 1], (7, 7), 1, Padding::Same);
    assert_eq!((conv1.out_height, conv1.out_width), (28, 28));
    let pool1 = Geometry::new(&[64, 28, 28, 64], (3, 3), 2, Padding::Valid);
    assert_eq!((pool1.out_height, pool1.out_width), (13, 13));
    let pool2 = Geometry::new(&[64, 13, 13, 256], (3, 3), 2, Padding::Valid);
    assert_eq!((pool2.out_height, pool2.out_width), (6, 6));
    let pool5 = Geometry::new(&[64, 6, 6, 512], (3, 3), 2, Padding::Valid);
    assert_eq!((pool5.out_height, pool5.out_width), (2, 2));
  }

  #[test]
  fn same_convolution_of_ones() {
    // 3x3 box filter over a 3x3 image of ones counts in-bounds neighbours
    let geo = Geometry::new(&[1, 3, 3, 1], (3, 3), 1, Padding::Same);
    let out = conv2d(&[1.0f64; 9], &[1.0; 9], &geo, 1);
    assert_eq!(out, vec![
      4.0, 6.0, 4.0,
      6.0, 9.0, 6.0,
      4.0, 6.0, 4.0,
    ]);
  }

  #[test]
  fn valid_convolution_channels() {
    // Two input channels, two filters picking one channel each
    let geo = Geometry::new(&[1, 2, 2, 2], (2, 2), 1, Padding::Valid);
    let input = [1.0f64, 10.0, 2.0, 20.0, 3.0, 30.0, 4.0, 40.0];
    let mut kernel = vec![0.0; 2 * 2 * 2 * 2];
    for tap in 0..4 {
      kernel[(tap * 2) * 2] = 1.0;
      kernel[(tap * 2 + 1) * 2 + 1] = 1.0;
    }
    assert_eq!(conv2d(&input, &kernel, &geo, 2), vec![10.0, 100.0]);
  }

  #[test]
  fn col2im_inverts_disjoint_windows() {
    let geo = Geometry::new(&[2, 4, 4, 1], (2, 2), 2, Padding::Valid);
    let input: Vec<f64> = (0..32).map(|i| i as f64 ).collect();
    assert_eq!(col2im(&im2col(&input, &geo), &geo), input);
  }

  #[test]
  fn pooling() {
    let geo = Geometry::new(&[1, 3, 3, 1], (2, 2), 1, Padding::Valid);
    let input = [1.0f32, 5.0, 2.0, 3.0, 4.0, 9.0, 0.0, 8.0, 7.0];
    assert_eq!(max_pool2d(&input, &geo), vec![5.0, 9.0, 8.0, 9.0]);
    let grad = max_pool2d_backward(&input, &[1.0, 1.0, 1.0, 1.0], &geo);
    assert_eq!(grad, vec![0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 1.0, 0.0]);
  }

  #[test]
  fn pooling_ties_pick_first() {
    let geo = Geometry::new(&[1, 2, 2, 1], (2, 2), 2, Padding::Valid);
    let grad = max_pool2d_backward(&[3.0f64, 3.0, 3.0, 3.0], &[1.0], &geo);
    assert_eq!(grad, vec![1.0, 0.0, 0.0, 0.0]);
  }

  #[test]
  fn cross_entropy() {
    let logits = [0.0f64, 0.0, 0.0, 0.0, 10.0, 0.0];
    let loss = softmax_cross_entropy(&logits, &[2, 1], 3);
    approx::assert_relative_eq!(loss[0], 3.0f64.ln(), epsilon = 1e-12);
    assert!(loss[1] < 1e-4);

    let grad = softmax_cross_entropy_backward(&logits, &[2, 1], &[1.0, 1.0], 3);
    approx::assert_relative_eq!(grad[0], 1.0 / 3.0, epsilon = 1e-12);
    approx::assert_relative_eq!(grad[2], 1.0 / 3.0 - 1.0, epsilon = 1e-12);
    assert!(grad[3..].iter().map(|g| g.abs() ).sum::<f64>() < 1e-3);
  }
}

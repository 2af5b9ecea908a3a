//! Labeled image sets, either synthetic or decoded from gzipped MNIST IDX files.

use std::fs::File;
use std::io::{ BufReader, Read };
use std::path::{ Path, PathBuf };

use flate2::read::GzDecoder;
use log::info;

use crate::{
  tensor::Tensor,
  ops::BaseOps,
  error::{ Error, Result },
};


const IMAGE_FILE_MAGIC: u32 = 2051;
const LABEL_FILE_MAGIC: u32 = 2049;

const PIXEL_DEPTH: f32 = 255.0;

pub const TRAIN_IMAGES: &str = "train-images-idx3-ubyte.gz";
pub const TRAIN_LABELS: &str = "train-labels-idx1-ubyte.gz";
pub const TEST_IMAGES: &str = "t10k-images-idx3-ubyte.gz";
pub const TEST_LABELS: &str = "t10k-labels-idx1-ubyte.gz";


/// Images of shape `[n, height, width, channels]` with one label per image.

#[derive(Debug, Clone)]
pub struct Dataset {
  pub images: Tensor<f32>,
  pub labels: Vec<usize>,
}

impl Dataset {
  pub fn new(images: Tensor<f32>, labels: Vec<usize>) -> Self {
    assert_eq!(images.shape()[0], labels.len(),
      "{} images don't match {} labels", images.shape()[0], labels.len());
    Self { images, labels }
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  /// Zero-copy view of examples `start..end`.

  pub fn slice(&self, start: usize, end: usize) -> (Tensor<f32>, &[usize]) {
    (self.images.rows(start..end), &self.labels[start..end])
  }

  /// Split off the first `n` examples.

  fn split_at(&self, n: usize) -> (Self, Self) {
    let (head_images, head_labels) = self.slice(0, n);
    let (tail_images, tail_labels) = self.slice(n, self.len());
    (
      Self::new(head_images, head_labels.to_vec()),
      Self::new(tail_images, tail_labels.to_vec()),
    )
  }
}


/// The three disjoint sets a training run works with.

#[derive(Debug, Clone)]
pub struct Splits {
  pub train: Dataset,
  pub validation: Dataset,
  pub test: Dataset,
}


/// Source of training, validation and test data.

pub trait Provider {
  fn load(&self) -> Result<Splits>;
}


/// Synthetic images whose label is the parity of their index
/// and whose pixels all equal `label - 0.5`.

pub fn fake_data(num_images: usize, image_size: usize, num_channels: usize) -> Dataset {
  let labels: Vec<usize> = (0..num_images).map(|i| i % 2 ).collect();
  let pixels = image_size * image_size * num_channels;
  let data = labels.iter()
    .flat_map(|&label| std::iter::repeat(label as f32 - 0.5).take(pixels) )
    .collect();
  let images = Tensor::new(&[num_images, image_size, image_size, num_channels], data);
  Dataset::new(images, labels)
}


fn read_u32(reader: &mut impl Read, path: &Path) -> Result<u32> {
  let mut buf = [0u8; 4];
  reader.read_exact(&mut buf).map_err(|source| io_error(path, source) )?;
  Ok(u32::from_be_bytes(buf))
}

fn io_error(path: &Path, source: std::io::Error) -> Error {
  Error::Io { path: path.to_path_buf(), source }
}

/// Open a gzipped IDX file, check its magic number and
/// return a reader positioned after the item count.

fn open_idx(path: &Path, expected_magic: u32, requested: usize) -> Result<impl Read> {
  info!("Extracting {}", path.display());
  let file = File::open(path).map_err(|source| io_error(path, source) )?;
  let mut reader = BufReader::new(GzDecoder::new(file));
  let magic = read_u32(&mut reader, path)?;
  if magic != expected_magic {
    return Err(Error::InvalidMagic { path: path.to_path_buf(), expected: expected_magic, found: magic })
  }
  let available = read_u32(&mut reader, path)? as usize;
  if available < requested {
    return Err(Error::InsufficientData { requested, available })
  }
  Ok(reader)
}

/// Decode `num_images` single channel images, rescaling pixel values from `[0, 255]` to `[-0.5, 0.5]`.

pub fn extract_images(path: &Path, num_images: usize, image_size: usize) -> Result<Tensor<f32>> {
  let mut reader = open_idx(path, IMAGE_FILE_MAGIC, num_images)?;
  let _rows = read_u32(&mut reader, path)?;
  let _cols = read_u32(&mut reader, path)?;
  let mut buf = vec![0u8; num_images * image_size * image_size];
  reader.read_exact(&mut buf).map_err(|source| io_error(path, source) )?;
  let data = buf.into_iter()
    .map(|pixel| (pixel as f32 - PIXEL_DEPTH / 2.0) / PIXEL_DEPTH )
    .collect();
  Ok(Tensor::new(&[num_images, image_size, image_size, 1], data))
}

/// Decode `count` labels, each of which must be a class index below `num_labels`.

pub fn extract_labels(path: &Path, count: usize, num_labels: usize) -> Result<Vec<usize>> {
  let mut reader = open_idx(path, LABEL_FILE_MAGIC, count)?;
  let mut buf = vec![0u8; count];
  reader.read_exact(&mut buf).map_err(|source| io_error(path, source) )?;
  buf.into_iter().enumerate().map(|(index, label)| {
    let label = label as usize;
    if label < num_labels {
      Ok(label)
    } else {
      Err(Error::InvalidLabel { path: path.to_path_buf(), index, label, num_labels })
    }
  }).collect()
}


/// Synthetic data for self-tests.

#[derive(Debug, Clone)]
pub struct FakeProvider {
  pub train_size: usize,
  pub eval_size: usize,
  pub image_size: usize,
  pub num_channels: usize,
}

impl FakeProvider {
  pub fn new(eval_size: usize) -> Self {
    Self { train_size: 256, eval_size, image_size: 28, num_channels: 1 }
  }
}

impl Provider for FakeProvider {
  fn load(&self) -> Result<Splits> {
    info!("Running self-test.");
    Ok(Splits {
      train: fake_data(self.train_size, self.image_size, self.num_channels),
      validation: fake_data(self.eval_size, self.image_size, self.num_channels),
      test: fake_data(self.eval_size, self.image_size, self.num_channels),
    })
  }
}


/// MNIST read from the four gzipped IDX files in `dir`.
/// The first `validation_size` training examples are held out for validation.

#[derive(Debug, Clone)]
pub struct MnistProvider {
  pub dir: PathBuf,
  pub train_size: usize,
  pub test_size: usize,
  pub validation_size: usize,
  pub image_size: usize,
  pub num_labels: usize,
}

impl MnistProvider {
  pub fn new(dir: impl Into<PathBuf>, validation_size: usize) -> Self {
    Self {
      dir: dir.into(),
      train_size: 60000,
      test_size: 10000,
      validation_size,
      image_size: 28,
      num_labels: 10,
    }
  }
}

impl Provider for MnistProvider {
  fn load(&self) -> Result<Splits> {
    let train_images = extract_images(&self.dir.join(TRAIN_IMAGES), self.train_size, self.image_size)?;
    let train_labels = extract_labels(&self.dir.join(TRAIN_LABELS), self.train_size, self.num_labels)?;
    let test_images = extract_images(&self.dir.join(TEST_IMAGES), self.test_size, self.image_size)?;
    let test_labels = extract_labels(&self.dir.join(TEST_LABELS), self.test_size, self.num_labels)?;

    if self.validation_size > self.train_size {
      return Err(Error::InsufficientData { requested: self.validation_size, available: self.train_size })
    }
    let (validation, train) = Dataset::new(train_images, train_labels).split_at(self.validation_size);

    Ok(Splits {
      train,
      validation,
      test: Dataset::new(test_images, test_labels),
    })
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use flate2::{ write::GzEncoder, Compression };

  fn write_idx(path: &Path, header: &[u32], body: &[u8]) {
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    for value in header {
      encoder.write_all(&value.to_be_bytes()).unwrap();
    }
    encoder.write_all(body).unwrap();
    encoder.finish().unwrap();
  }

  fn write_mnist(dir: &Path, train: usize, test: usize) {
    let pixels = |n: usize| (0..n * 784).map(|i| (i % 256) as u8 ).collect::<Vec<_>>();
    let labels = |n: usize| (0..n).map(|i| (i % 10) as u8 ).collect::<Vec<_>>();
    write_idx(&dir.join(TRAIN_IMAGES), &[2051, train as u32, 28, 28], &pixels(train));
    write_idx(&dir.join(TRAIN_LABELS), &[2049, train as u32], &labels(train));
    write_idx(&dir.join(TEST_IMAGES), &[2051, test as u32, 28, 28], &pixels(test));
    write_idx(&dir.join(TEST_LABELS), &[2049, test as u32], &labels(test));
  }

  #[test]
  fn fake_data_labels_and_pixels() {
    let data = fake_data(7, 28, 1);
    assert_eq!(data.images.shape().dims, vec![7,28,28,1]);
    for (i, &label) in data.labels.iter().enumerate() {
      assert_eq!(label, i % 2);
      let (image, _) = data.slice(i, i + 1);
      assert!(image.param_iter().all(|p| p == label as f32 - 0.5 ));
    }
  }

  #[test]
  fn pixel_scaling() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("images.gz");
    let mut body = vec![0u8; 784];
    body[1] = 255;
    write_idx(&path, &[2051, 1, 28, 28], &body);
    let images = extract_images(&path, 1, 28).unwrap();
    let raw = images.to_vec();
    assert_eq!(raw[0], -0.5);
    assert_eq!(raw[1], 0.5);
  }

  #[test]
  fn invalid_magic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.gz");
    write_idx(&path, &[2051, 3], &[1, 2, 3]);
    assert!(matches!(extract_labels(&path, 3, 10),
      Err(Error::InvalidMagic { expected: 2049, found: 2051, .. })));
  }

  #[test]
  fn too_few_items() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.gz");
    write_idx(&path, &[2049, 3], &[1, 2, 3]);
    assert!(matches!(extract_labels(&path, 5, 10),
      Err(Error::InsufficientData { requested: 5, available: 3 })));
  }

  #[test]
  fn out_of_range_label() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.gz");
    write_idx(&path, &[2049, 4], &[3, 9, 10, 1]);
    assert!(matches!(extract_labels(&path, 4, 10),
      Err(Error::InvalidLabel { index: 2, label: 10, num_labels: 10, .. })));
    assert_eq!(extract_labels(&path, 2, 10).unwrap(), vec![3, 9]);
  }

  #[test]
  fn missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(extract_labels(&dir.path().join("nope.gz"), 1, 10), Err(Error::Io { .. })));
  }

  #[test]
  fn mnist_validation_split() {
    let dir = tempfile::tempdir().unwrap();
    write_mnist(dir.path(), 30, 12);
    let provider = MnistProvider {
      train_size: 30,
      test_size: 12,
      ..MnistProvider::new(dir.path(), 10)
    };
    let splits = provider.load().unwrap();
    assert_eq!(splits.validation.len(), 10);
    assert_eq!(splits.train.len(), 20);
    assert_eq!(splits.test.len(), 12);
    assert_eq!(splits.train.labels[0], 0);
    assert_eq!(splits.train.images.shape().dims, vec![20,28,28,1]);
    // Train starts right after the held out examples
    let (first, _) = splits.train.slice(0, 1);
    assert_eq!(first.to_vec()[0], ((10 * 784 % 256) as f32 - 127.5) / 255.0);
  }

  #[test]
  fn fake_provider_sizes() {
    let splits = FakeProvider::new(64).load().unwrap();
    assert_eq!(splits.train.len(), 256);
    assert_eq!(splits.validation.len(), 64);
    assert_eq!(splits.test.len(), 64);
  }
}

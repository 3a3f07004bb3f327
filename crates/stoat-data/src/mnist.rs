// MNIST loader — IDX file format parser
//
// Reads the standard MNIST files into a labeled dataset:
//   - train-images-idx3-ubyte / train-labels-idx1-ubyte
//   - t10k-images-idx3-ubyte  / t10k-labels-idx1-ubyte
//
// IDX format (all values big-endian):
//   images: magic(2051) | count(u32) | rows(u32) | cols(u32) | pixel_data(u8...)
//   labels: magic(2049) | count(u32) | label_data(u8...)
//
// Pixels come out scaled to [0, 1] with shape [n, rows, cols, 1]; labels
// become 10-wide one-hot rows.

use std::fs;
use std::path::Path;

use ndarray::{Array2, ArrayD, IxDyn};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bail;
use crate::dataset::ConditionalDataset;
use crate::error::{Error, Result};

const CLASSES: usize = 10;

/// Which split of MNIST to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MnistSplit {
    Train,
    Test,
}

impl MnistSplit {
    fn file_names(self) -> (&'static str, &'static str) {
        match self {
            MnistSplit::Train => ("train-images-idx3-ubyte", "train-labels-idx1-ubyte"),
            MnistSplit::Test => ("t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte"),
        }
    }

    fn dataset_name(self) -> &'static str {
        match self {
            MnistSplit::Train => "mnist-train",
            MnistSplit::Test => "mnist-test",
        }
    }
}

/// Load one MNIST split from a directory holding the standard files.
pub fn load(dir: impl AsRef<Path>, split: MnistSplit) -> Result<ConditionalDataset> {
    let dir = dir.as_ref();
    let (img_name, lbl_name) = split.file_names();
    let img_bytes = fs::read(dir.join(img_name))
        .map_err(|e| Error::msg(format!("cannot read {}: {e}", dir.join(img_name).display())))?;
    let lbl_bytes = fs::read(dir.join(lbl_name))
        .map_err(|e| Error::msg(format!("cannot read {}: {e}", dir.join(lbl_name).display())))?;
    from_raw(&img_bytes, &lbl_bytes, split)
}

/// Build the dataset from raw IDX bytes (useful for embedded/testing).
pub fn from_raw(
    image_bytes: &[u8],
    label_bytes: &[u8],
    split: MnistSplit,
) -> Result<ConditionalDataset> {
    let (pixels, count, rows, cols) = parse_idx3_images(image_bytes)?;
    let labels = parse_idx1_labels(label_bytes)?;
    if count != labels.len() {
        return Err(Error::CountMismatch {
            images: count,
            labels: labels.len(),
        });
    }

    let data: Vec<f32> = pixels.iter().map(|&p| p as f32 / 255.0).collect();
    let images = ArrayD::from_shape_vec(IxDyn(&[count, rows, cols, 1]), data)
        .map_err(|e| Error::msg(e.to_string()))?;

    let mut attrs = Array2::zeros((count, CLASSES));
    for (i, &label) in labels.iter().enumerate() {
        attrs[[i, label as usize]] = 1.0;
    }

    ConditionalDataset::new(split.dataset_name(), images, attrs, attr_names())
}

/// A small synthetic MNIST-like dataset for offline tests and demos.
///
/// Generates `n` random 28x28 images with random one-hot labels, all drawn
/// from `seed` so fixtures are reproducible.
pub fn synthetic(n: usize, seed: u64) -> ConditionalDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let images = ArrayD::random_using(IxDyn(&[n, 28, 28, 1]), Uniform::new(0.0, 1.0), &mut rng);
    let mut attrs = Array2::zeros((n, CLASSES));
    for i in 0..n {
        attrs[[i, rng.gen_range(0..CLASSES)]] = 1.0;
    }
    match ConditionalDataset::new("mnist-synthetic", images, attrs, attr_names()) {
        Ok(ds) => ds,
        // n images always match n label rows.
        Err(_) => unreachable!("synthetic arrays are aligned by construction"),
    }
}

fn attr_names() -> Vec<String> {
    (0..CLASSES).map(|d| d.to_string()).collect()
}

/// Parse an IDX3 file (images): magic=2051, count, rows, cols, data.
fn parse_idx3_images(data: &[u8]) -> Result<(Vec<u8>, usize, usize, usize)> {
    if data.len() < 16 {
        bail!("IDX3 file too short: {} bytes", data.len());
    }
    let magic = read_u32_be(data, 0);
    if magic != 2051 {
        bail!("IDX3 invalid magic: expected 2051, got {magic}");
    }
    let count = read_u32_be(data, 4) as usize;
    let rows = read_u32_be(data, 8) as usize;
    let cols = read_u32_be(data, 12) as usize;

    let expected_len = match count
        .checked_mul(rows)
        .and_then(|v| v.checked_mul(cols))
        .and_then(|v| v.checked_add(16))
    {
        Some(len) => len,
        None => bail!("IDX3 header dimensions overflow: {count} x {rows} x {cols}"),
    };
    if data.len() < expected_len {
        bail!(
            "IDX3 truncated: expected {expected_len} bytes, got {}",
            data.len()
        );
    }
    Ok((data[16..expected_len].to_vec(), count, rows, cols))
}

/// Parse an IDX1 file (labels): magic=2049, count, data.
fn parse_idx1_labels(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 8 {
        bail!("IDX1 file too short: {} bytes", data.len());
    }
    let magic = read_u32_be(data, 0);
    if magic != 2049 {
        bail!("IDX1 invalid magic: expected 2049, got {magic}");
    }
    let count = read_u32_be(data, 4) as usize;
    let expected_len = 8 + count;
    if data.len() < expected_len {
        bail!(
            "IDX1 truncated: expected {expected_len} bytes, got {}",
            data.len()
        );
    }
    Ok(data[8..expected_len].to_vec())
}

/// Read a big-endian u32 from `data` at byte offset `off`.
fn read_u32_be(data: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

// Builder helpers

/// Build IDX3 image bytes from raw image data (useful for tests).
pub fn build_idx3_bytes(images: &[&[u8]], rows: u32, cols: u32) -> Vec<u8> {
    let count = images.len() as u32;
    let mut buf = Vec::new();
    buf.extend_from_slice(&2051u32.to_be_bytes());
    buf.extend_from_slice(&count.to_be_bytes());
    buf.extend_from_slice(&rows.to_be_bytes());
    buf.extend_from_slice(&cols.to_be_bytes());
    for img in images {
        buf.extend_from_slice(img);
    }
    buf
}

/// Build IDX1 label bytes (useful for tests).
pub fn build_idx1_bytes(labels: &[u8]) -> Vec<u8> {
    let count = labels.len() as u32;
    let mut buf = Vec::new();
    buf.extend_from_slice(&2049u32.to_be_bytes());
    buf.extend_from_slice(&count.to_be_bytes());
    buf.extend_from_slice(labels);
    buf
}

// Dataset / ConditionalDataset — in-memory minibatch generators

use ndarray::{Array2, ArrayD, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::batch::{permutation, placeholder_labels, take_images, take_labels, Batch};
use crate::error::{Error, Result};

/// Seed for the scoped RNG behind [`Dataset::fixed_batch`].
///
/// The fixed batch must come out identical across calls and across training
/// runs, so it is drawn from a dedicated child generator instead of the
/// dataset's own RNG.
pub(crate) const FIXED_BATCH_SEED: u64 = 14;

/// Argmax of a label row, for reporting class indices alongside fixed batches.
pub(crate) fn argmax(row: ArrayView1<'_, f32>) -> usize {
    let mut best = 0;
    for (i, v) in row.iter().enumerate() {
        if v.total_cmp(&row[best]) == std::cmp::Ordering::Greater {
            best = i;
        }
    }
    best
}

/// An unlabeled in-memory dataset of fixed-shape sample tensors.
///
/// Samples live in one dense array with axis 0 as the sample axis and are
/// immutable after construction.  Each dataset owns its RNG so shuffling
/// never perturbs (and is never perturbed by) randomness elsewhere in the
/// process.
pub struct Dataset {
    name: String,
    images: ArrayD<f32>,
    rng: StdRng,
}

impl Dataset {
    /// Wrap a dense sample array, `[n, ...sample_shape]`.
    pub fn new(name: impl Into<String>, images: ArrayD<f32>) -> Self {
        Self {
            name: name.into(),
            images,
            rng: StdRng::from_entropy(),
        }
    }

    /// Seed the dataset's RNG for reproducible shuffling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Human-readable dataset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.images.len_of(Axis(0))
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full array shape, `[n, ...sample_shape]`.
    pub fn shape(&self) -> &[usize] {
        self.images.shape()
    }

    /// The raw sample array.
    pub fn images(&self) -> &ArrayD<f32> {
        &self.images
    }

    /// A deterministic batch of `n` samples for side-by-side progress plots.
    ///
    /// Indices are drawn without replacement from a child RNG seeded with
    /// [`FIXED_BATCH_SEED`]; the dataset's own RNG is left untouched, so two
    /// calls return the same samples no matter what was drawn in between.
    /// Labels are reported as zeros (there is no label array here).
    pub fn fixed_batch(&self, n: usize) -> (ArrayD<f32>, Vec<usize>) {
        let indices = fixed_indices(self.len(), n);
        (take_images(&self.images, &indices), vec![0; indices.len()])
    }

    /// One shuffled pass over the dataset in batches of `batch_size`.
    ///
    /// A single full-dataset permutation is drawn up front; the tail
    /// remainder shorter than `batch_size` is dropped, not padded.  The
    /// iterator is finite and non-restartable — call again for a new pass.
    /// A `batch_size` of 0 yields no batches.
    pub fn batches(&mut self, batch_size: usize) -> Batches<'_> {
        let perm = permutation(&mut self.rng, self.images.len_of(Axis(0)));
        Batches {
            images: &self.images,
            attrs: None,
            perm,
            batch_size,
            pos: 0,
            cursor: 0,
        }
    }
}

/// A labeled in-memory dataset: samples plus one attribute row per sample.
///
/// Attribute rows are one-hot or multi-hot vectors; `attr_names` names each
/// column.  Invariant: `images.len_of(Axis(0)) == attrs.nrows()`, checked at
/// construction.
#[derive(Debug)]
pub struct ConditionalDataset {
    name: String,
    images: ArrayD<f32>,
    attrs: Array2<f32>,
    attr_names: Vec<String>,
    rng: StdRng,
}

impl ConditionalDataset {
    /// Wrap a sample array and its aligned label matrix.
    pub fn new(
        name: impl Into<String>,
        images: ArrayD<f32>,
        attrs: Array2<f32>,
        attr_names: Vec<String>,
    ) -> Result<Self> {
        if images.len_of(Axis(0)) != attrs.nrows() {
            return Err(Error::CountMismatch {
                images: images.len_of(Axis(0)),
                labels: attrs.nrows(),
            });
        }
        Ok(Self {
            name: name.into(),
            images,
            attrs,
            attr_names,
            rng: StdRng::from_entropy(),
        })
    }

    /// Seed the dataset's RNG for reproducible shuffling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.images.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full array shape, `[n, ...sample_shape]`.
    pub fn shape(&self) -> &[usize] {
        self.images.shape()
    }

    pub fn images(&self) -> &ArrayD<f32> {
        &self.images
    }

    /// The label matrix, one row per sample.
    pub fn attrs(&self) -> &Array2<f32> {
        &self.attrs
    }

    /// Names of the label columns.
    pub fn attr_names(&self) -> &[String] {
        &self.attr_names
    }

    /// Width of each label row.
    pub fn attr_width(&self) -> usize {
        self.attrs.ncols()
    }

    /// A deterministic batch of `n` samples plus argmax class indices.
    ///
    /// Same seed-isolation contract as [`Dataset::fixed_batch`].
    pub fn fixed_batch(&self, n: usize) -> (ArrayD<f32>, Vec<usize>) {
        let indices = fixed_indices(self.len(), n);
        let labels = indices
            .iter()
            .map(|&i| argmax(self.attrs.row(i)))
            .collect();
        (take_images(&self.images, &indices), labels)
    }

    /// One shuffled pass in batches of `batch_size`, yielding real label rows.
    pub fn batches(&mut self, batch_size: usize) -> Batches<'_> {
        let perm = permutation(&mut self.rng, self.images.len_of(Axis(0)));
        Batches {
            images: &self.images,
            attrs: Some(&self.attrs),
            perm,
            batch_size,
            pos: 0,
            cursor: 0,
        }
    }
}

/// Draw `n` distinct indices from a scoped, fixed-seed RNG.
pub(crate) fn fixed_indices(len: usize, n: usize) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(FIXED_BATCH_SEED);
    let mut perm = permutation(&mut rng, len);
    perm.truncate(n.min(len));
    perm
}

/// Iterator over one epoch of shuffled minibatches.
///
/// Yields full batches only; the permuted tail shorter than `batch_size`
/// is skipped.
pub struct Batches<'a> {
    images: &'a ArrayD<f32>,
    attrs: Option<&'a Array2<f32>>,
    perm: Vec<usize>,
    batch_size: usize,
    pos: usize,
    cursor: usize,
}

impl Iterator for Batches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.batch_size == 0 || self.pos + self.batch_size > self.perm.len() {
            return None;
        }
        let indices = &self.perm[self.pos..self.pos + self.batch_size];
        self.pos += self.batch_size;
        self.cursor += self.batch_size;

        let labels = match self.attrs {
            Some(attrs) => take_labels(attrs, indices),
            None => placeholder_labels(self.batch_size),
        };
        Some(Batch {
            images: take_images(self.images, indices),
            labels,
            cursor: self.cursor,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.batch_size == 0 {
            return (0, Some(0));
        }
        let left = (self.perm.len() - self.pos) / self.batch_size;
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn argmax_picks_first_max() {
        let row = ndarray::arr1(&[0.0f32, 1.0, 1.0, 0.0]);
        assert_eq!(argmax(row.view()), 1);
    }

    #[test]
    fn conditional_rejects_count_mismatch() {
        let images = ArrayD::zeros(IxDyn(&[3, 2, 2]));
        let attrs = Array2::zeros((4, 2));
        let err = ConditionalDataset::new("bad", images, attrs, vec![]).unwrap_err();
        assert!(matches!(err, Error::CountMismatch { images: 3, labels: 4 }));
    }
}

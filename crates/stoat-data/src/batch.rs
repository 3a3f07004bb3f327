// Batch — the uniform minibatch record all generators produce

use ndarray::{Array2, ArrayD, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

/// One minibatch as handed to the training loop.
///
/// `labels` holds one row per sample: real attribute vectors for conditional
/// datasets, a zero-filled placeholder column for unlabeled ones.  `cursor`
/// is the cumulative number of samples yielded so far in the current pass,
/// so the trainer can report progress without counting batches itself.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Stacked sample tensors, `[batch, ...sample_shape]`.
    pub images: ArrayD<f32>,
    /// One label row per sample.
    pub labels: Array2<f32>,
    /// Cumulative samples yielded in this pass, including this batch.
    pub cursor: usize,
}

/// Draw a full permutation of `0..n`.
pub(crate) fn permutation(rng: &mut impl Rng, n: usize) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..n).collect();
    perm.shuffle(rng);
    perm
}

/// Gather sample rows along axis 0.
pub(crate) fn take_images(images: &ArrayD<f32>, indices: &[usize]) -> ArrayD<f32> {
    images.select(Axis(0), indices)
}

/// Gather label rows.
pub(crate) fn take_labels(labels: &Array2<f32>, indices: &[usize]) -> Array2<f32> {
    labels.select(Axis(0), indices)
}

/// Zero-filled label placeholder for unlabeled batches.
pub(crate) fn placeholder_labels(batch_size: usize) -> Array2<f32> {
    Array2::zeros((batch_size, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn permutation_covers_all_indices() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut perm = permutation(&mut rng, 100);
        perm.sort_unstable();
        assert_eq!(perm, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn take_images_gathers_rows() {
        let images = ndarray::Array::from_shape_fn(ndarray::IxDyn(&[4, 2]), |ix| {
            (ix[0] * 10 + ix[1]) as f32
        });
        let picked = take_images(&images, &[2, 0]);
        assert_eq!(picked.shape(), &[2, 2]);
        assert_eq!(picked[[0, 0]], 20.0);
        assert_eq!(picked[[1, 1]], 1.0);
    }
}

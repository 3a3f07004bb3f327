// TimeCorrelatedDataset — frame-window sampling over temporal sequences
//
// Carves fixed-length input/target frame windows out of variable-length
// video clips, concatenating each window's frames along the channel axis so
// frame-stacking models see a single [h, w, window*c] tensor per sample.

use ndarray::{s, Array3, Array4, Array5, ArrayView3, ArrayView4, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::bail;
use crate::error::{Error, Result};

/// Variable-length frame sequences with random window pairing.
///
/// Each sequence is a `[t, h, w, c]` array; `t` may vary per sequence but
/// spatial and channel dims must agree across the dataset.
#[derive(Debug)]
pub struct TimeCorrelatedDataset {
    name: String,
    sequences: Vec<Array4<f32>>,
    window: usize,
    /// Shared per-frame dims: (h, w, c).
    frame_dims: (usize, usize, usize),
    rng: StdRng,
}

impl TimeCorrelatedDataset {
    /// Wrap a collection of frame sequences with the given window length.
    pub fn new(
        name: impl Into<String>,
        sequences: Vec<Array4<f32>>,
        window: usize,
    ) -> Result<Self> {
        if window == 0 {
            bail!("temporal window length must be at least 1");
        }
        let first = match sequences.first() {
            Some(s) => s.shape().to_vec(),
            None => bail!("temporal dataset needs at least one sequence"),
        };
        let frame_dims = (first[1], first[2], first[3]);
        for (i, seq) in sequences.iter().enumerate() {
            let sh = seq.shape();
            if (sh[1], sh[2], sh[3]) != frame_dims {
                bail!(
                    "sequence {} frame dims {:?} differ from {:?}",
                    i,
                    &sh[1..],
                    frame_dims
                );
            }
        }
        Ok(Self {
            name: name.into(),
            sequences,
            window,
            frame_dims,
            rng: StdRng::from_entropy(),
        })
    }

    /// Seed the dataset's RNG for reproducible window offsets.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of sequences.
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Frames per window.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Model-facing shape: `[n, h, w, c * window]`.
    pub fn shape(&self) -> Vec<usize> {
        let (h, w, c) = self.frame_dims;
        vec![self.sequences.len(), h, w, c * self.window]
    }

    /// Input/target window pairs for the selected sequences.
    ///
    /// For each sequence a start offset is drawn uniformly from
    /// `[0, t - 2*window)` (offset 0 when the sequence is exactly two windows
    /// long); frames `[start, start+window)` become the input and the next
    /// `window` frames the prediction target, each concatenated over
    /// channels.  Returns `[batch, h, w, window*c]` input and target arrays.
    pub fn pairs(&mut self, indices: &[usize]) -> Result<(Array4<f32>, Array4<f32>)> {
        let needed = 2 * self.window;
        let mut picks = Vec::with_capacity(indices.len());
        for &i in indices {
            let frames = self.sequences[i].len_of(Axis(0));
            if frames < needed {
                return Err(Error::SequenceTooShort {
                    index: i,
                    frames,
                    needed,
                });
            }
            let max_start = frames - needed;
            let start = if max_start == 0 {
                0
            } else {
                self.rng.gen_range(0..max_start)
            };
            picks.push((i, start));
        }

        // Window assembly is per-sequence independent; offsets were drawn
        // sequentially above so results stay reproducible under a seed.
        let windows: Vec<(Array3<f32>, Array3<f32>)> = picks
            .par_iter()
            .map(|&(i, start)| {
                let seq = &self.sequences[i];
                let w = self.window;
                let input = concat_over_channels(seq.slice(s![start..start + w, .., .., ..]))?;
                let target =
                    concat_over_channels(seq.slice(s![start + w..start + 2 * w, .., .., ..]))?;
                Ok((input, target))
            })
            .collect::<Result<_>>()?;

        let inputs: Vec<ArrayView3<'_, f32>> = windows.iter().map(|(a, _)| a.view()).collect();
        let targets: Vec<ArrayView3<'_, f32>> = windows.iter().map(|(_, b)| b.view()).collect();
        let inputs = ndarray::stack(Axis(0), &inputs).map_err(|e| Error::msg(e.to_string()))?;
        let targets = ndarray::stack(Axis(0), &targets).map_err(|e| Error::msg(e.to_string()))?;
        Ok((inputs, targets))
    }

    /// Window pairs for `n` sequences drawn at random (with replacement).
    pub fn random_pairs(&mut self, n: usize) -> Result<(Array4<f32>, Array4<f32>)> {
        let len = self.sequences.len();
        let indices: Vec<usize> = (0..n).map(|_| self.rng.gen_range(0..len)).collect();
        self.pairs(&indices)
    }

    /// Concatenate a `[window, h, w, c]` clip over channels to `[h, w, window*c]`.
    pub fn concatenate(&self, clip: ArrayView4<'_, f32>) -> Result<Array3<f32>> {
        concat_over_channels(clip)
    }

    /// Exact inverse of [`concatenate`](Self::concatenate): split a
    /// `[h, w, window*c]` window back into `[window, h, w, c]` frames.
    pub fn unconcatenate(&self, window: ArrayView3<'_, f32>) -> Result<Array4<f32>> {
        let channels = window.len_of(Axis(2));
        if channels % self.window != 0 {
            bail!(
                "window has {} channels, not divisible into {} frames",
                channels,
                self.window
            );
        }
        let c = channels / self.window;
        let frames: Vec<_> = (0..self.window)
            .map(|f| window.slice(s![.., .., f * c..(f + 1) * c]))
            .collect();
        ndarray::stack(Axis(0), &frames).map_err(|e| Error::msg(e.to_string()))
    }

    /// Batch form of [`unconcatenate`](Self::unconcatenate): split a
    /// `[batch, h, w, window*c]` array back into `[batch, window, h, w, c]`
    /// frames.
    pub fn unconcatenate_batch(&self, windows: ArrayView4<'_, f32>) -> Result<Array5<f32>> {
        let frames: Vec<Array4<f32>> = (0..windows.len_of(Axis(0)))
            .map(|i| self.unconcatenate(windows.index_axis(Axis(0), i)))
            .collect::<Result<_>>()?;
        let views: Vec<_> = frames.iter().map(|f| f.view()).collect();
        ndarray::stack(Axis(0), &views).map_err(|e| Error::msg(e.to_string()))
    }
}

/// Frames of a clip laid out as channel-major blocks in frame order.
fn concat_over_channels(clip: ArrayView4<'_, f32>) -> Result<Array3<f32>> {
    let frames: Vec<_> = (0..clip.len_of(Axis(0)))
        .map(|f| clip.index_axis(Axis(0), f))
        .collect();
    ndarray::concatenate(Axis(2), &frames).map_err(|e| Error::msg(e.to_string()))
}

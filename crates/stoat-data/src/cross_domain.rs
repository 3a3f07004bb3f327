// CrossDomainDatasets — label-matched pair/triplet sampling across two datasets
//
// Couples an "anchor" dataset with a "mirror" dataset that shares its label
// vocabulary, and serves samples from the mirror keyed by label equality:
// positives (same label as the anchor sample), negatives (different label),
// and full (anchor, positive, negative) triplets.  Per-class index pools are
// built once up front so the per-batch cost is a handful of table lookups.

use std::collections::HashMap;

use ndarray::{Array2, ArrayD, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::bail;
use crate::batch::{permutation, take_images, take_labels};
use crate::dataset::ConditionalDataset;
use crate::error::{Error, Polarity, Result};

/// Configuration for [`CrossDomainDatasets`].
#[derive(Debug, Clone)]
pub struct CrossDomainConfig {
    /// Pool permutations are rebuilt once the cumulative draw counter
    /// exceeds `reshuffle_factor * mirror_len`.  A bias-reduction knob,
    /// not a correctness requirement.
    pub reshuffle_factor: usize,
    /// Optional seed for the sampler's RNG.
    pub seed: Option<u64>,
}

impl Default for CrossDomainConfig {
    fn default() -> Self {
        Self {
            reshuffle_factor: 2,
            seed: None,
        }
    }
}

impl CrossDomainConfig {
    pub fn reshuffle_factor(mut self, f: usize) -> Self {
        self.reshuffle_factor = f;
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = Some(s);
        self
    }
}

/// An (anchor, positive, negative) triplet batch with all three label sets.
#[derive(Debug, Clone)]
pub struct TripletBatch {
    pub anchor: ArrayD<f32>,
    pub positive: ArrayD<f32>,
    pub negative: ArrayD<f32>,
    pub anchor_labels: Array2<f32>,
    pub positive_labels: Array2<f32>,
    pub negative_labels: Array2<f32>,
}

/// An anchor batch paired with same- or different-label mirror samples.
#[derive(Debug, Clone)]
pub struct PairBatch {
    pub anchor: ArrayD<f32>,
    pub paired: ArrayD<f32>,
    pub anchor_labels: Array2<f32>,
    pub paired_labels: Array2<f32>,
}

/// An anchor batch paired with mirror samples ignoring labels, plus the
/// indices both sides were drawn at.
#[derive(Debug, Clone)]
pub struct UnlabeledPairBatch {
    pub anchor: ArrayD<f32>,
    pub mirror: ArrayD<f32>,
    pub anchor_indices: Vec<usize>,
    pub mirror_indices: Vec<usize>,
}

/// Two label-aligned datasets with label-equality pair/triplet sampling.
///
/// Label vectors are mapped once to integer class ids (index into the set of
/// distinct anchor labels, keyed by exact bit patterns) so float vectors are
/// never used as map keys during sampling.  Each class owns a positive and a
/// negative pool of mirror indices; each pool walks its own cached
/// permutation through a private cursor, so every pool entry is visited
/// before any entry repeats within one permutation cycle.
#[derive(Debug)]
pub struct CrossDomainDatasets {
    name: String,
    anchor: ConditionalDataset,
    mirror: ConditionalDataset,
    /// Distinct anchor label vectors, one row per class, in first-seen order.
    uniq_y: Array2<f32>,
    /// Class id of each anchor sample, precomputed at construction.
    anchor_class: Vec<usize>,
    pools_p: Vec<Vec<usize>>,
    pools_n: Vec<Vec<usize>>,
    perms_p: Vec<Vec<usize>>,
    perms_n: Vec<Vec<usize>>,
    /// Per-pool cursors into the cached permutations, one per class.
    cursors_p: Vec<usize>,
    cursors_n: Vec<usize>,
    /// Total draws since the last reshuffle.
    draws: usize,
    /// Draw count past which pool permutations are rebuilt.
    reshuffle_at: usize,
    /// Persistent shuffle of the mirror for unlabeled pairing.
    mirror_perm: Vec<usize>,
    mirror_cursor: usize,
    rng: StdRng,
}

/// Bit-exact key for a label row.
fn label_key(row: ArrayView1<'_, f32>) -> Vec<u32> {
    row.iter().map(|v| v.to_bits()).collect()
}

impl CrossDomainDatasets {
    /// Couple `anchor` and `mirror`, which must agree on label width.
    pub fn new(
        name: impl Into<String>,
        anchor: ConditionalDataset,
        mirror: ConditionalDataset,
        config: CrossDomainConfig,
    ) -> Result<Self> {
        if anchor.attr_width() != mirror.attr_width() {
            return Err(Error::LabelWidthMismatch {
                anchor: anchor.attr_width(),
                mirror: mirror.attr_width(),
            });
        }
        if mirror.is_empty() {
            bail!("cross-domain mirror dataset is empty");
        }

        let mut rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        // Distinct anchor labels -> class ids, then classify every anchor row.
        let mut class_by_key: HashMap<Vec<u32>, usize> = HashMap::new();
        let mut uniq_rows: Vec<usize> = Vec::new();
        let mut anchor_class = Vec::with_capacity(anchor.len());
        for (i, row) in anchor.attrs().rows().into_iter().enumerate() {
            let key = label_key(row);
            let next_id = class_by_key.len();
            let id = *class_by_key.entry(key).or_insert(next_id);
            if id == uniq_rows.len() {
                uniq_rows.push(i);
            }
            anchor_class.push(id);
        }
        let uniq_y = anchor.attrs().select(Axis(0), &uniq_rows);
        let n_classes = uniq_rows.len();

        // Partition the mirror into per-class positive/negative pools.
        let mut pools_p = vec![Vec::new(); n_classes];
        let mut pools_n = vec![Vec::new(); n_classes];
        for (j, row) in mirror.attrs().rows().into_iter().enumerate() {
            let class = class_by_key.get(&label_key(row)).copied();
            for c in 0..n_classes {
                if class == Some(c) {
                    pools_p[c].push(j);
                } else {
                    pools_n[c].push(j);
                }
            }
        }

        let perms_p = pools_p
            .iter()
            .map(|p| permutation(&mut rng, p.len()))
            .collect();
        let perms_n = pools_n
            .iter()
            .map(|p| permutation(&mut rng, p.len()))
            .collect();
        let mirror_perm = permutation(&mut rng, mirror.len());
        let reshuffle_at = config.reshuffle_factor * mirror.len();

        Ok(Self {
            name: name.into(),
            anchor,
            mirror,
            uniq_y,
            anchor_class,
            pools_p,
            pools_n,
            perms_p,
            perms_n,
            cursors_p: vec![0; n_classes],
            cursors_n: vec![0; n_classes],
            draws: 0,
            reshuffle_at,
            mirror_perm,
            mirror_cursor: 0,
            rng,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of anchor samples.
    pub fn len(&self) -> usize {
        self.anchor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchor.is_empty()
    }

    /// Number of mirror samples.
    pub fn mirror_len(&self) -> usize {
        self.mirror.len()
    }

    /// Anchor array shape (the model-facing sample shape).
    pub fn shape(&self) -> &[usize] {
        self.anchor.shape()
    }

    pub fn attr_names(&self) -> &[String] {
        self.anchor.attr_names()
    }

    /// Number of distinct anchor label vectors.
    pub fn class_count(&self) -> usize {
        self.uniq_y.nrows()
    }

    /// Distinct anchor label vectors, one row per class.
    pub fn classes(&self) -> &Array2<f32> {
        &self.uniq_y
    }

    pub fn anchor(&self) -> &ConditionalDataset {
        &self.anchor
    }

    pub fn mirror(&self) -> &ConditionalDataset {
        &self.mirror
    }

    /// Mutable anchor access, e.g. to drive its batch generator.
    pub fn anchor_mut(&mut self) -> &mut ConditionalDataset {
        &mut self.anchor
    }

    /// Anchor samples at `indices` paired with mirror samples ignoring labels.
    ///
    /// Mirror indices come from `mirror_override` when given, otherwise from
    /// the persistent mirror permutation cursor (see
    /// [`next_mirror_indices`](Self::next_mirror_indices)).
    pub fn paired_unlabeled(
        &mut self,
        indices: &[usize],
        mirror_override: Option<&[usize]>,
    ) -> UnlabeledPairBatch {
        let mirror_indices = match mirror_override {
            Some(m) => m.to_vec(),
            None => self.next_mirror_indices(indices.len()),
        };
        UnlabeledPairBatch {
            anchor: take_images(self.anchor.images(), indices),
            mirror: take_images(self.mirror.images(), &mirror_indices),
            anchor_indices: indices.to_vec(),
            mirror_indices,
        }
    }

    /// For each anchor index, one same-label and one different-label mirror
    /// sample, plus all three label sets.
    pub fn triplets(&mut self, indices: &[usize]) -> Result<TripletBatch> {
        let mut p_idx = Vec::with_capacity(indices.len());
        let mut n_idx = Vec::with_capacity(indices.len());
        for &i in indices {
            let class = self.anchor_class[i];
            p_idx.push(self.draw(Polarity::Positive, class)?);
            n_idx.push(self.draw(Polarity::Negative, class)?);
        }
        self.maybe_reshuffle();

        Ok(TripletBatch {
            anchor: take_images(self.anchor.images(), indices),
            positive: take_images(self.mirror.images(), &p_idx),
            negative: take_images(self.mirror.images(), &n_idx),
            anchor_labels: take_labels(self.anchor.attrs(), indices),
            positive_labels: take_labels(self.mirror.attrs(), &p_idx),
            negative_labels: take_labels(self.mirror.attrs(), &n_idx),
        })
    }

    /// Anchor samples paired with same-label mirror samples.
    pub fn positive_pairs(&mut self, indices: &[usize]) -> Result<PairBatch> {
        self.polar_pairs(indices, Polarity::Positive)
    }

    /// Anchor samples paired with different-label mirror samples.
    pub fn negative_pairs(&mut self, indices: &[usize]) -> Result<PairBatch> {
        self.polar_pairs(indices, Polarity::Negative)
    }

    fn polar_pairs(&mut self, indices: &[usize], polarity: Polarity) -> Result<PairBatch> {
        let mut m_idx = Vec::with_capacity(indices.len());
        for &i in indices {
            let class = self.anchor_class[i];
            m_idx.push(self.draw(polarity, class)?);
        }
        self.maybe_reshuffle();

        Ok(PairBatch {
            anchor: take_images(self.anchor.images(), indices),
            paired: take_images(self.mirror.images(), &m_idx),
            anchor_labels: take_labels(self.anchor.attrs(), indices),
            paired_labels: take_labels(self.mirror.attrs(), &m_idx),
        })
    }

    /// The next `count` indices from the persistent mirror permutation.
    ///
    /// When the cursor runs off the end of the current permutation, the tail
    /// is taken, a fresh permutation is drawn, and the batch is completed
    /// from its head — so every call returns exactly `count` indices, and
    /// across `mirror_len` cumulative draws every mirror index appears
    /// exactly once.
    pub fn next_mirror_indices(&mut self, count: usize) -> Vec<usize> {
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            if self.mirror_cursor >= self.mirror_perm.len() {
                self.mirror_perm = permutation(&mut self.rng, self.mirror.len());
                self.mirror_cursor = 0;
            }
            let available = self.mirror_perm.len() - self.mirror_cursor;
            let take = (count - out.len()).min(available);
            out.extend_from_slice(
                &self.mirror_perm[self.mirror_cursor..self.mirror_cursor + take],
            );
            self.mirror_cursor += take;
        }
        out
    }

    /// Draw the next mirror index of the given polarity for `class`.
    ///
    /// Each pool advances its own cursor, so interleaved draws from other
    /// pools never skip entries of this one.
    fn draw(&mut self, polarity: Polarity, class: usize) -> Result<usize> {
        let (pool, perm, cursor) = match polarity {
            Polarity::Positive => (
                &self.pools_p[class],
                &self.perms_p[class],
                &mut self.cursors_p[class],
            ),
            Polarity::Negative => (
                &self.pools_n[class],
                &self.perms_n[class],
                &mut self.cursors_n[class],
            ),
        };
        if pool.is_empty() {
            return Err(Error::EmptyPool { polarity, class });
        }
        let idx = pool[perm[*cursor % perm.len()]];
        *cursor += 1;
        self.draws += 1;
        Ok(idx)
    }

    /// Rebuild all pool permutations once enough draws have accumulated.
    ///
    /// Keeps long runs from cycling the same pool orderings forever; the
    /// counter resets so the reshuffle recurs periodically.
    fn maybe_reshuffle(&mut self) {
        if self.draws <= self.reshuffle_at {
            return;
        }
        debug!(draws = self.draws, "reshuffling cross-domain pool permutations");
        self.perms_p = self
            .pools_p
            .iter()
            .map(|p| permutation(&mut self.rng, p.len()))
            .collect();
        self.perms_n = self
            .pools_n
            .iter()
            .map(|p| permutation(&mut self.rng, p.len()))
            .collect();
        for cursor in self.cursors_p.iter_mut().chain(self.cursors_n.iter_mut()) {
            *cursor = 0;
        }
        self.draws = 0;
    }
}

// Tests for stoat-data: datasets, generators, cross-domain sampling

use ndarray::{arr2, Array2, ArrayD, IxDyn};

use stoat_data::cross_domain::{CrossDomainConfig, CrossDomainDatasets};
use stoat_data::dataset::{ConditionalDataset, Dataset};
use stoat_data::error::{Error, Polarity};

// Helpers

/// Images shaped [n, 1] where sample i holds the value `base + i`, so a
/// gathered batch reveals which indices it was drawn from.
fn tagged_images(n: usize, base: f32) -> ArrayD<f32> {
    ArrayD::from_shape_fn(IxDyn(&[n, 1]), |ix| base + ix[0] as f32)
}

fn conditional(base: f32, attrs: Array2<f32>) -> ConditionalDataset {
    let n = attrs.nrows();
    ConditionalDataset::new(
        "toy",
        tagged_images(n, base),
        attrs,
        vec!["a".into(), "b".into()],
    )
    .unwrap()
}

/// Index a tagged batch row back to its source position.
fn tag_of(images: &ArrayD<f32>, row: usize, base: f32) -> usize {
    (images[[row, 0]] - base) as usize
}

// Dataset / ConditionalDataset

#[test]
fn fixed_batch_is_isolated_from_other_draws() {
    let mut ds = Dataset::new("toy", tagged_images(20, 0.0)).with_seed(11);
    let (first, labels) = ds.fixed_batch(8);
    assert_eq!(labels, vec![0; 8]);

    // Unrelated draws in between must not disturb the fixed batch.
    let consumed: usize = ds.batches(3).count();
    assert_eq!(consumed, 6);

    let (second, _) = ds.fixed_batch(8);
    assert_eq!(first, second);
}

#[test]
fn conditional_fixed_batch_reports_argmax_classes() {
    let ds = conditional(0.0, arr2(&[[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]]));
    let (images, classes) = ds.fixed_batch(4);
    assert_eq!(images.shape(), &[4, 1]);
    for (row, &class) in classes.iter().enumerate() {
        let idx = tag_of(&images, row, 0.0);
        let expected = if idx % 2 == 0 { 0 } else { 1 };
        assert_eq!(class, expected);
    }
}

#[test]
fn generator_drops_short_tail_and_tracks_cursor() {
    let mut ds = Dataset::new("toy", tagged_images(10, 0.0)).with_seed(2);
    let batches: Vec<_> = ds.batches(3).collect();
    assert_eq!(batches.len(), 3); // 10 / 3, tail of 1 dropped
    for (i, batch) in batches.iter().enumerate() {
        assert_eq!(batch.images.shape()[0], 3);
        assert_eq!(batch.cursor, (i + 1) * 3);
    }
}

#[test]
fn generator_visits_each_sample_once_per_pass() {
    let mut ds = Dataset::new("toy", tagged_images(10, 0.0)).with_seed(3);
    let mut seen: Vec<usize> = Vec::new();
    for batch in ds.batches(2) {
        for row in 0..2 {
            seen.push(tag_of(&batch.images, row, 0.0));
        }
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..10).collect::<Vec<_>>());
}

#[test]
fn zero_batch_size_yields_no_batches() {
    let mut ds = Dataset::new("toy", tagged_images(6, 0.0)).with_seed(9);
    assert_eq!(ds.batches(0).count(), 0);
    let batches: Vec<_> = ds.batches(0).collect();
    assert!(batches.is_empty());
}

#[test]
fn unconditional_generator_yields_placeholder_labels() {
    let mut ds = Dataset::new("toy", tagged_images(4, 0.0)).with_seed(4);
    let batch = ds.batches(2).next().unwrap();
    assert_eq!(batch.labels.shape(), &[2, 1]);
    assert!(batch.labels.iter().all(|&v| v == 0.0));
}

#[test]
fn conditional_generator_yields_real_labels() {
    let mut ds = conditional(0.0, arr2(&[[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]]));
    for batch in ds.batches(2) {
        for row in 0..2 {
            let idx = tag_of(&batch.images, row, 0.0);
            let expected = if idx % 2 == 0 { [1.0, 0.0] } else { [0.0, 1.0] };
            assert_eq!(batch.labels.row(row).to_vec(), expected);
        }
    }
}

// CrossDomainDatasets

const ANCHOR_BASE: f32 = 0.0;
const MIRROR_BASE: f32 = 100.0;

/// The worked example: anchor labels [[1,0],[1,0],[0,1],[0,1]], mirror
/// labels [[1,0],[0,1],[1,0],[0,1]].
fn example_pair(seed: u64) -> CrossDomainDatasets {
    let anchor = conditional(
        ANCHOR_BASE,
        arr2(&[[1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 1.0]]),
    );
    let mirror = conditional(
        MIRROR_BASE,
        arr2(&[[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]]),
    );
    CrossDomainDatasets::new(
        "example",
        anchor,
        mirror,
        CrossDomainConfig::default().seed(seed),
    )
    .unwrap()
}

#[test]
fn triplets_for_anchor_zero_pick_from_correct_pools() {
    let mut cd = example_pair(17);
    let batch = cd.triplets(&[0]).unwrap();
    let p = tag_of(&batch.positive, 0, MIRROR_BASE);
    let n = tag_of(&batch.negative, 0, MIRROR_BASE);
    // Anchor 0 has label [1,0]: positives are mirror {0,2}, negatives {1,3}.
    assert!(p == 0 || p == 2, "positive index {p} not in {{0,2}}");
    assert!(n == 1 || n == 3, "negative index {n} not in {{1,3}}");
}

#[test]
fn triplet_labels_match_and_differ_across_reshuffles() {
    let mut cd = example_pair(23);
    // Enough passes to cross the periodic reshuffle threshold several times.
    for _ in 0..16 {
        let batch = cd.triplets(&[0, 1, 2, 3]).unwrap();
        for row in 0..4 {
            assert_eq!(
                batch.anchor_labels.row(row),
                batch.positive_labels.row(row),
                "positive label must equal anchor label"
            );
            assert_ne!(
                batch.anchor_labels.row(row),
                batch.negative_labels.row(row),
                "negative label must differ from anchor label"
            );
        }
    }
}

#[test]
fn triplet_positive_draws_cover_the_whole_pool() {
    // One anchor class; two positives and one negative in the mirror.  The
    // interleaved negative draws inside triplets() must not make the
    // positive pool skip entries of its permutation.
    let anchor = conditional(ANCHOR_BASE, arr2(&[[1.0, 0.0]]));
    let mirror = conditional(
        MIRROR_BASE,
        arr2(&[[1.0, 0.0], [1.0, 0.0], [0.0, 1.0]]),
    );
    let mut cd = CrossDomainDatasets::new(
        "cover",
        anchor,
        mirror,
        CrossDomainConfig::default().reshuffle_factor(1000).seed(13),
    )
    .unwrap();

    let mut positives = Vec::new();
    for _ in 0..10 {
        let batch = cd.triplets(&[0]).unwrap();
        positives.push(tag_of(&batch.positive, 0, MIRROR_BASE));
    }
    // Every cycle of two draws visits both pool entries.
    let mut first_cycle: Vec<usize> = positives[..2].to_vec();
    first_cycle.sort_unstable();
    assert_eq!(first_cycle, vec![0, 1]);
    assert_eq!(positives[..2], positives[2..4]);
}

#[test]
fn positive_pool_is_cycled_without_repeats() {
    // One class only; three positives in the mirror.  A high reshuffle
    // factor keeps one permutation live across the draws under test.
    let anchor = conditional(ANCHOR_BASE, arr2(&[[1.0, 0.0]]));
    let mirror = conditional(MIRROR_BASE, arr2(&[[1.0, 0.0], [1.0, 0.0], [1.0, 0.0]]));
    let mut cd = CrossDomainDatasets::new(
        "cycle",
        anchor,
        mirror,
        CrossDomainConfig::default().reshuffle_factor(100).seed(5),
    )
    .unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let batch = cd.positive_pairs(&[0]).unwrap();
        seen.push(tag_of(&batch.paired, 0, MIRROR_BASE));
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2], "each positive drawn once per cycle");
}

#[test]
fn empty_positive_pool_fails_fast() {
    // Anchor label [1,1] never occurs in the mirror.
    let anchor = conditional(ANCHOR_BASE, arr2(&[[1.0, 1.0]]));
    let mirror = conditional(MIRROR_BASE, arr2(&[[1.0, 0.0], [0.0, 1.0]]));
    let mut cd =
        CrossDomainDatasets::new("x", anchor, mirror, CrossDomainConfig::default().seed(1))
            .unwrap();
    let err = cd.triplets(&[0]).unwrap_err();
    assert!(matches!(
        err,
        Error::EmptyPool {
            polarity: Polarity::Positive,
            ..
        }
    ));
    // The negative pool still works for the same anchor.
    assert!(cd.negative_pairs(&[0]).is_ok());
}

#[test]
fn mirror_cursor_visits_every_index_before_repeating() {
    let anchor = conditional(ANCHOR_BASE, arr2(&[[1.0, 0.0]]));
    let mirror = conditional(MIRROR_BASE, Array2::from_shape_fn((10, 2), |(_, c)| c as f32));
    let mut cd =
        CrossDomainDatasets::new("wrap", anchor, mirror, CrossDomainConfig::default().seed(8))
            .unwrap();

    // 4 calls of 3 = 12 draws; the first 10 must be a full permutation.
    let mut drawn = Vec::new();
    for _ in 0..4 {
        let idx = cd.next_mirror_indices(3);
        assert_eq!(idx.len(), 3, "every call returns exactly `count` indices");
        drawn.extend(idx);
    }
    let mut first_cycle: Vec<usize> = drawn[..10].to_vec();
    first_cycle.sort_unstable();
    assert_eq!(first_cycle, (0..10).collect::<Vec<_>>());
}

#[test]
fn mirror_cursor_serves_requests_larger_than_the_mirror() {
    let anchor = conditional(ANCHOR_BASE, arr2(&[[1.0, 0.0]]));
    let mirror = conditional(MIRROR_BASE, Array2::from_shape_fn((4, 2), |(_, c)| c as f32));
    let mut cd =
        CrossDomainDatasets::new("big", anchor, mirror, CrossDomainConfig::default().seed(8))
            .unwrap();

    let idx = cd.next_mirror_indices(11);
    assert_eq!(idx.len(), 11);
    let mut first_cycle: Vec<usize> = idx[..4].to_vec();
    first_cycle.sort_unstable();
    assert_eq!(first_cycle, vec![0, 1, 2, 3]);
}

#[test]
fn paired_unlabeled_honours_caller_indices() {
    let mut cd = example_pair(31);
    let batch = cd.paired_unlabeled(&[0, 2], Some(&[3, 1]));
    assert_eq!(batch.anchor_indices, vec![0, 2]);
    assert_eq!(batch.mirror_indices, vec![3, 1]);
    assert_eq!(tag_of(&batch.anchor, 0, ANCHOR_BASE), 0);
    assert_eq!(tag_of(&batch.anchor, 1, ANCHOR_BASE), 2);
    assert_eq!(tag_of(&batch.mirror, 0, MIRROR_BASE), 3);
    assert_eq!(tag_of(&batch.mirror, 1, MIRROR_BASE), 1);
}

#[test]
fn paired_unlabeled_draws_from_mirror_cursor_by_default() {
    let mut cd = example_pair(37);
    let a = cd.paired_unlabeled(&[0, 1], None);
    let b = cd.paired_unlabeled(&[2, 3], None);
    assert_eq!(a.mirror_indices.len(), 2);
    assert_eq!(b.mirror_indices.len(), 2);
    // Four draws over a four-sample mirror: one full cycle, no repeats.
    let mut all: Vec<usize> = a
        .mirror_indices
        .iter()
        .chain(b.mirror_indices.iter())
        .copied()
        .collect();
    all.sort_unstable();
    assert_eq!(all, vec![0, 1, 2, 3]);
}

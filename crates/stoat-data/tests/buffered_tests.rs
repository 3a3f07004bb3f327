// Tests for BufferedDataset: shard epochs, swap semantics, deferred errors

use std::fs::{self, File};
use std::path::Path;

use ndarray::Array3;
use ndarray_npy::WriteNpyExt;

use stoat_data::buffered::BufferedDataset;
use stoat_data::error::Error;

/// Write a shard of `n` [2, 2] samples where sample i holds `base + i`.
fn write_shard(dir: &Path, name: &str, base: f32, n: usize) {
    let arr = Array3::from_shape_fn((n, 2, 2), |(i, _, _)| base + i as f32);
    let file = File::create(dir.join(name)).unwrap();
    arr.write_npy(file).unwrap();
}

#[test]
fn epoch_visits_every_shard_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    for shard in 0..3 {
        write_shard(
            dir.path(),
            &format!("shard_{shard:03}.npy"),
            shard as f32 * 100.0,
            4,
        );
    }

    let mut ds = BufferedDataset::open(dir.path()).unwrap().with_seed(7);
    assert_eq!(ds.shard_count(), 3);
    assert_eq!(ds.len(), 12);
    assert_eq!(ds.shape(), vec![12, 2, 2]);

    let mut seen: Vec<u32> = Vec::new();
    let mut last_cursor = 0;
    for batch in ds.batches(2) {
        let batch = batch.unwrap();
        assert_eq!(batch.images.shape(), &[2, 2, 2]);
        for row in 0..2 {
            seen.push(batch.images[[row, 0, 0]] as u32);
        }
        last_cursor = batch.cursor;
    }

    // 3 shards x 4 samples / batch 2 = 6 batches, each sample exactly once.
    assert_eq!(last_cursor, 12);
    seen.sort_unstable();
    let expected: Vec<u32> = (0..3)
        .flat_map(|shard| (0..4).map(move |i| shard * 100 + i))
        .collect();
    assert_eq!(seen, expected);

    // The epoch ended on the wraparound, back at shard 0.
    assert_eq!(ds.current_shard(), 0);
}

#[test]
fn single_shard_epoch_terminates_after_one_pass() {
    let dir = tempfile::tempdir().unwrap();
    write_shard(dir.path(), "only.npy", 0.0, 4);

    let mut ds = BufferedDataset::open(dir.path()).unwrap().with_seed(1);
    let batches: Vec<_> = ds.batches(2).collect();
    assert_eq!(batches.len(), 2);
}

#[test]
fn short_shard_tail_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    write_shard(dir.path(), "a.npy", 0.0, 5);
    write_shard(dir.path(), "b.npy", 100.0, 5);

    let mut ds = BufferedDataset::open(dir.path()).unwrap().with_seed(2);
    let count = ds.batches(2).filter(|b| b.is_ok()).count();
    // Each 5-sample shard yields two full batches of 2; the tails are dropped.
    assert_eq!(count, 4);
}

#[test]
fn corrupt_shard_error_surfaces_at_the_swap() {
    let dir = tempfile::tempdir().unwrap();
    write_shard(dir.path(), "shard_000.npy", 0.0, 4);
    fs::write(dir.path().join("shard_001.npy"), b"not an npy file").unwrap();
    write_shard(dir.path(), "shard_002.npy", 200.0, 4);

    // Shard 0 loads synchronously, so construction succeeds; the corrupt
    // shard is only hit when the background load is joined.
    let mut ds = BufferedDataset::open(dir.path()).unwrap().with_seed(3);

    let items: Vec<_> = ds.batches(2).collect();
    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok());
    assert!(items[1].is_ok());
    match items[2].as_ref().unwrap_err() {
        Error::ShardLoad { path, .. } => assert!(path.contains("shard_001")),
        other => panic!("expected ShardLoad, got {other:?}"),
    }
}

#[test]
fn zero_batch_size_yields_no_batches() {
    let dir = tempfile::tempdir().unwrap();
    write_shard(dir.path(), "only.npy", 0.0, 4);

    let mut ds = BufferedDataset::open(dir.path()).unwrap();
    assert_eq!(ds.batches(0).count(), 0);
}

#[test]
fn missing_shards_are_rejected_at_open() {
    let dir = tempfile::tempdir().unwrap();
    let err = BufferedDataset::open(dir.path()).unwrap_err();
    assert!(matches!(err, Error::NoShards(_)));
}

#[test]
fn fixed_batch_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    write_shard(dir.path(), "only.npy", 0.0, 8);

    let ds = BufferedDataset::open(dir.path()).unwrap();
    let first = ds.fixed_batch(4);
    let second = ds.fixed_batch(4);
    assert_eq!(first.shape(), &[4, 2, 2]);
    assert_eq!(first, second);
}

#[test]
fn swap_reports_wraparound() {
    let dir = tempfile::tempdir().unwrap();
    write_shard(dir.path(), "a.npy", 0.0, 2);
    write_shard(dir.path(), "b.npy", 100.0, 2);

    let mut ds = BufferedDataset::open(dir.path()).unwrap();
    assert!(!ds.swap().unwrap()); // 0 -> 1
    assert_eq!(ds.current_shard(), 1);
    assert!(ds.fixed_batch(1)[[0, 0, 0]] >= 100.0);
    assert!(ds.swap().unwrap()); // 1 -> 0: full pass
    assert_eq!(ds.current_shard(), 0);
}

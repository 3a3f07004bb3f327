// BufferedDataset — double-buffered out-of-core shard loader
//
// Presents a directory of .npy shard files as one large sample array.  One
// shard is held in memory as the active buffer while a background worker
// loads the next; `swap()` joins the worker, promotes its buffer, and kicks
// off the following load.  The consumer therefore overlaps disk I/O with
// whatever it does between batches (typically a training step).

use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::thread;

use ndarray::{ArrayD, Axis};
use ndarray_npy::ReadNpyExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::bail;
use crate::batch::{permutation, placeholder_labels, take_images, Batch};
use crate::dataset::fixed_indices;
use crate::error::{Error, Result};

/// Read one shard file into memory.
fn load_shard(path: &Path) -> Result<ArrayD<f32>> {
    let file = File::open(path).map_err(|e| Error::ShardLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    ArrayD::<f32>::read_npy(file).map_err(|e| Error::ShardLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// A single-slot handle to one in-flight background shard load.
///
/// Two states: pending (worker running) and ready (joined).  Ownership of
/// the loaded buffer transfers to the caller exactly once, through
/// [`wait`](Self::wait); load failures are captured on the worker and
/// re-raised here, at the synchronization point.
#[derive(Debug)]
struct ShardPrefetch {
    path: PathBuf,
    handle: thread::JoinHandle<Result<ArrayD<f32>>>,
}

impl ShardPrefetch {
    fn spawn(path: PathBuf) -> Self {
        let worker_path = path.clone();
        let handle = thread::spawn(move || load_shard(&worker_path));
        Self { path, handle }
    }

    /// Block until the load finishes and take the buffer.
    fn wait(self) -> Result<ArrayD<f32>> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(Error::ShardLoad {
                path: self.path.display().to_string(),
                reason: "background loader panicked".into(),
            }),
        }
    }
}

/// An out-of-core sample array backed by `.npy` shards, loaded two-ahead.
///
/// Construction loads shard 0 synchronously and immediately starts a
/// background load of shard 1.  The active buffer is never touched while a
/// load is in flight; the only blocking point is [`swap`](Self::swap).
#[derive(Debug)]
pub struct BufferedDataset {
    name: String,
    shard_paths: Vec<PathBuf>,
    active: ArrayD<f32>,
    prefetch: Option<ShardPrefetch>,
    current_shard: usize,
    rng: StdRng,
}

impl BufferedDataset {
    /// Open a shard directory.
    ///
    /// Shards are all `*.npy` files directly under `dir`, ordered by file
    /// name — name shards with zero-padded indices (`shard_000.npy`, ...) so
    /// lexicographic order matches shard order.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|e| Error::ShardLoad {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut shard_paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("npy"))
            .collect();
        shard_paths.sort();
        if shard_paths.is_empty() {
            return Err(Error::NoShards(dir.display().to_string()));
        }

        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("buffered")
            .to_string();

        let active = load_shard(&shard_paths[0])?;
        let next = 1 % shard_paths.len();
        let prefetch = Some(ShardPrefetch::spawn(shard_paths[next].clone()));
        debug!(
            name = %name,
            shards = shard_paths.len(),
            "opened shard directory, loading shard {next} in background"
        );

        Ok(Self {
            name,
            shard_paths,
            active,
            prefetch,
            current_shard: 0,
            rng: StdRng::from_entropy(),
        })
    }

    /// Seed the dataset's RNG for reproducible per-shard shuffling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of shard files.
    pub fn shard_count(&self) -> usize {
        self.shard_paths.len()
    }

    /// Index of the shard currently held as the active buffer.
    pub fn current_shard(&self) -> usize {
        self.current_shard
    }

    /// Samples in the active buffer.
    pub fn active_len(&self) -> usize {
        self.active.len_of(Axis(0))
    }

    /// Estimated total samples, assuming equally sized shards.
    pub fn len(&self) -> usize {
        self.active_len() * self.shard_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Estimated full array shape, `[len, ...sample_shape]`.
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = vec![self.len()];
        shape.extend_from_slice(&self.active.shape()[1..]);
        shape
    }

    /// Promote the background buffer to active and start the next load.
    ///
    /// Blocks until the in-flight load completes; a load failure captured on
    /// the worker is returned here.  Returns whether the shard index wrapped
    /// to 0, i.e. a full pass over all shards completed.
    pub fn swap(&mut self) -> Result<bool> {
        let prefetch = match self.prefetch.take() {
            Some(p) => p,
            None => bail!("buffered dataset has no shard load in flight"),
        };
        self.active = prefetch.wait()?;
        self.current_shard = (self.current_shard + 1) % self.shard_paths.len();
        let next = (self.current_shard + 1) % self.shard_paths.len();
        self.prefetch = Some(ShardPrefetch::spawn(self.shard_paths[next].clone()));
        debug!(
            active = self.current_shard,
            loading = next,
            "swapped shard buffers"
        );
        Ok(self.current_shard == 0)
    }

    /// A deterministic batch of `n` samples from the active buffer.
    ///
    /// Same seed-isolation contract as [`Dataset::fixed_batch`]
    /// (drawn from a scoped fixed-seed RNG).
    ///
    /// [`Dataset::fixed_batch`]: crate::dataset::Dataset::fixed_batch
    pub fn fixed_batch(&self, n: usize) -> ArrayD<f32> {
        let indices = fixed_indices(self.active_len(), n);
        take_images(&self.active, &indices)
    }

    /// One full multi-shard epoch in batches of `batch_size`.
    ///
    /// Batches come from the active buffer with the usual shuffle/drop-tail
    /// policy; when a buffer is exhausted the iterator swaps and continues,
    /// terminating once the shard index wraps to 0.  Deferred shard-load
    /// errors surface as `Err` items.  A `batch_size` of 0 yields no batches.
    pub fn batches(&mut self, batch_size: usize) -> ShardBatches<'_> {
        let perm = permutation(&mut self.rng, self.active.len_of(Axis(0)));
        ShardBatches {
            dataset: self,
            perm,
            batch_size,
            pos: 0,
            cursor: 0,
            done: false,
        }
    }
}

/// Iterator over one multi-shard epoch of a [`BufferedDataset`].
pub struct ShardBatches<'a> {
    dataset: &'a mut BufferedDataset,
    perm: Vec<usize>,
    batch_size: usize,
    pos: usize,
    cursor: usize,
    done: bool,
}

impl Iterator for ShardBatches<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done || self.batch_size == 0 {
                return None;
            }
            if self.pos + self.batch_size <= self.perm.len() {
                let indices = &self.perm[self.pos..self.pos + self.batch_size];
                self.pos += self.batch_size;
                self.cursor += self.batch_size;
                return Some(Ok(Batch {
                    images: take_images(&self.dataset.active, indices),
                    labels: placeholder_labels(self.batch_size),
                    cursor: self.cursor,
                }));
            }
            // Active buffer exhausted: bring in the next shard.
            match self.dataset.swap() {
                Ok(true) => {
                    self.done = true;
                    return None;
                }
                Ok(false) => {
                    self.perm = permutation(
                        &mut self.dataset.rng,
                        self.dataset.active.len_of(Axis(0)),
                    );
                    self.pos = 0;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

// Dataset factory — name-based construction against a data root directory

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array4;
use ndarray_npy::ReadNpyExt;
use tracing::info;

use crate::buffered::BufferedDataset;
use crate::cross_domain::{CrossDomainConfig, CrossDomainDatasets};
use crate::dataset::ConditionalDataset;
use crate::error::{Error, Result};
use crate::mnist::{self, MnistSplit};
use crate::temporal::TimeCorrelatedDataset;

/// Frames per window for the moving-MNIST temporal dataset.
const MOVING_MNIST_WINDOW: usize = 4;

/// Any dataset the factory can hand out, behind the uniform
/// `name`/`len`/`shape` surface.
#[derive(Debug)]
pub enum LoadedDataset {
    Conditional(ConditionalDataset),
    CrossDomain(CrossDomainDatasets),
    Temporal(TimeCorrelatedDataset),
    Buffered(BufferedDataset),
}

impl LoadedDataset {
    pub fn name(&self) -> &str {
        match self {
            LoadedDataset::Conditional(d) => d.name(),
            LoadedDataset::CrossDomain(d) => d.name(),
            LoadedDataset::Temporal(d) => d.name(),
            LoadedDataset::Buffered(d) => d.name(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LoadedDataset::Conditional(d) => d.len(),
            LoadedDataset::CrossDomain(d) => d.len(),
            LoadedDataset::Temporal(d) => d.len(),
            LoadedDataset::Buffered(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            LoadedDataset::Conditional(d) => d.shape().to_vec(),
            LoadedDataset::CrossDomain(d) => d.shape().to_vec(),
            LoadedDataset::Temporal(d) => d.shape(),
            LoadedDataset::Buffered(d) => d.shape(),
        }
    }
}

/// Construct a dataset by name from subdirectories of `root`.
///
/// Recognized names:
/// - `mnist` / `mnist-test` — labeled MNIST split from `root/mnist/`
/// - `mnist-cross` — cross-domain pairing of the train (anchor) and test
///   (mirror) splits
/// - `moving-mnist` — temporal clips from `root/moving-mnist/*.npy`
/// - `lsun-bedroom` — buffered shards from `root/lsun-bedroom/`
///
/// Anything else fails with [`Error::UnknownDataset`].
pub fn load_dataset(name: &str, root: impl AsRef<Path>) -> Result<LoadedDataset> {
    let root = root.as_ref();
    let dataset = match name {
        "mnist" => {
            LoadedDataset::Conditional(mnist::load(root.join("mnist"), MnistSplit::Train)?)
        }
        "mnist-test" => {
            LoadedDataset::Conditional(mnist::load(root.join("mnist"), MnistSplit::Test)?)
        }
        "mnist-cross" => {
            let anchor = mnist::load(root.join("mnist"), MnistSplit::Train)?;
            let mirror = mnist::load(root.join("mnist"), MnistSplit::Test)?;
            LoadedDataset::CrossDomain(CrossDomainDatasets::new(
                name,
                anchor,
                mirror,
                CrossDomainConfig::default(),
            )?)
        }
        "moving-mnist" => {
            let clips = load_clips(&root.join("moving-mnist"))?;
            LoadedDataset::Temporal(TimeCorrelatedDataset::new(
                name,
                clips,
                MOVING_MNIST_WINDOW,
            )?)
        }
        "lsun-bedroom" => LoadedDataset::Buffered(BufferedDataset::open(root.join("lsun-bedroom"))?),
        _ => return Err(Error::UnknownDataset(name.to_string())),
    };
    info!(
        name = dataset.name(),
        len = dataset.len(),
        "loaded dataset"
    );
    Ok(dataset)
}

/// Read every `.npy` clip (`[t, h, w, c]`) under `dir`, in file-name order.
fn load_clips(dir: &Path) -> Result<Vec<Array4<f32>>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| Error::msg(format!("cannot read {}: {e}", dir.display())))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("npy"))
        .collect();
    paths.sort();

    let mut clips = Vec::with_capacity(paths.len());
    for path in &paths {
        let file = fs::File::open(path)
            .map_err(|e| Error::msg(format!("cannot open {}: {e}", path.display())))?;
        let clip = Array4::<f32>::read_npy(file)
            .map_err(|e| Error::msg(format!("cannot parse {}: {e}", path.display())))?;
        clips.push(clip);
    }
    Ok(clips)
}

//! # stoat-data
//!
//! Datasets and minibatch sampling for the Stoat GAN research harness.
//!
//! This crate provides:
//! - [`Dataset`] / [`ConditionalDataset`] — in-memory minibatch generators
//!   over dense sample arrays, optionally labeled
//! - [`CrossDomainDatasets`] — label-matched positive/negative/triplet
//!   sampling across an anchor and a mirror dataset
//! - [`BufferedDataset`] — double-buffered out-of-core streaming over `.npy`
//!   shard files, loaded one-ahead on a background worker
//! - [`TimeCorrelatedDataset`] — input/target frame-window sampling over
//!   temporal sequences, channel-concatenated
//! - [`load_dataset`] — name-based dataset factory
//!
//! All generators produce the same [`Batch`] record — `(images, labels,
//! cursor)` — so the training loop drives every dataset kind through one
//! contract.  Each dataset owns an explicit RNG handle; nothing touches
//! process-global randomness.

pub mod batch;
pub mod buffered;
pub mod cross_domain;
pub mod dataset;
pub mod error;
pub mod factory;
pub mod mnist;
pub mod temporal;

pub use batch::Batch;
pub use buffered::{BufferedDataset, ShardBatches};
pub use cross_domain::{
    CrossDomainConfig, CrossDomainDatasets, PairBatch, TripletBatch, UnlabeledPairBatch,
};
pub use dataset::{Batches, ConditionalDataset, Dataset};
pub use error::{Error, Polarity, Result};
pub use factory::{load_dataset, LoadedDataset};
pub use temporal::TimeCorrelatedDataset;

/// All errors that can occur within the dataset layer.
///
/// This enum captures every failure mode: malformed construction arguments,
/// exhausted sampling pools, sequences too short to window, shard files that
/// fail to load in the background, and unknown names at the factory boundary.
/// Using a single error type across the crate simplifies error propagation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Sample array and label array disagree on length.
    #[error("count mismatch: {images} images vs {labels} label rows")]
    CountMismatch { images: usize, labels: usize },

    /// Anchor and mirror datasets carry label vectors of different widths.
    #[error("label width mismatch: anchor has {anchor} attributes, mirror has {mirror}")]
    LabelWidthMismatch { anchor: usize, mirror: usize },

    /// A class has no candidates of the requested polarity in the mirror.
    #[error("empty {polarity} pool for class {class}")]
    EmptyPool { polarity: Polarity, class: usize },

    /// A temporal sequence is too short to carve two frame windows from.
    #[error("sequence {index} too short: {frames} frames, need at least {needed}")]
    SequenceTooShort {
        index: usize,
        frames: usize,
        needed: usize,
    },

    /// A shard file failed to load on the background worker.
    ///
    /// Captured there and re-raised at the next `swap()` call.
    #[error("failed to load shard {path}: {reason}")]
    ShardLoad { path: String, reason: String },

    /// No shard files were found in the given directory.
    #[error("no .npy shard files found in {0}")]
    NoShards(String),

    /// Unrecognized dataset name at the factory boundary.
    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

/// Which side of a labelled pairing a pool serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Mirror samples whose label equals the anchor's.
    Positive,
    /// Mirror samples whose label differs from the anchor's.
    Negative,
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarity::Positive => write!(f, "positive"),
            Polarity::Negative => write!(f, "negative"),
        }
    }
}

/// Convenience Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}

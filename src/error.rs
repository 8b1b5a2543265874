//! Error taxonomy for extraction, normalization, scoring and startup.
//!
//! Only [`ScoringError`] is recovered from inside the pipeline (it degrades the
//! verdict); everything else surfaces to the caller as "cannot score this input"
//! or, for [`StartupError`], stops the service before it accepts work.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// The input is not a parseable PE container (bad magic, truncated headers).
#[derive(Error, Debug)]
#[error("not a valid PE image: {reason}")]
pub struct FormatError {
    pub reason: String,
}

impl FormatError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Parse-time fault that is not a format problem.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("i/o error reading executable: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed executable structure: {0}")]
    Malformed(#[source] goblin::error::Error),
    #[error("executable is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
}

/// Either failure mode of structural extraction. Neither yields a vector.
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Tabular input whose columns cannot be aligned to the trained schema.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("expected {expected} feature columns, found {found}; missing: {}", missing.join(", "))]
pub struct SchemaMismatchError {
    pub missing: Vec<String>,
    pub expected: usize,
    pub found: usize,
}

/// A model failed to evaluate a vector.
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("vector has {actual} values, model expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("onnx runtime: {0}")]
    Runtime(#[from] ort::OrtError),
    #[error("model output '{0}' not produced")]
    MissingOutput(String),
    #[error("classifier returned {actual} probabilities for {expected} classes")]
    DistributionMismatch { expected: usize, actual: usize },
    #[error("classifier returned an empty probability distribution")]
    EmptyDistribution,
    #[error("model produced non-finite output")]
    NonFinite,
    #[error("tensor shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// A required artifact is missing or unusable. Fatal.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("required model artifact not found: {}", .0.display())]
    MissingArtifact(PathBuf),
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decoding {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid artifact: {0}")]
    Invalid(String),
    #[error("onnx runtime: {0}")]
    Runtime(#[from] ort::OrtError),
    #[error("worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl StartupError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::MissingArtifact(path.to_path_buf());
        }
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Per-request failure: no verdict could be produced for this input.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("cannot extract features: {0}")]
    Format(#[from] FormatError),
    #[error("cannot extract features: {0}")]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatchError),
    #[error("unreadable csv input: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv input has no data rows")]
    EmptyTable,
    #[error("unsupported input type: {}", .0.display())]
    Unsupported(PathBuf),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FeatureError> for InputError {
    fn from(e: FeatureError) -> Self {
        match e {
            FeatureError::Format(f) => InputError::Format(f),
            FeatureError::Extraction(x) => InputError::Extraction(x),
        }
    }
}

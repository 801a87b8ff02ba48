use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline step at which a shape or column check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transform,
    Classify,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transform => "transform",
            Self::Classify => "classify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error(
        "schema mismatch: missing {missing:?}, unexpected {unexpected:?}, duplicated {duplicated:?}"
    )]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
        duplicated: Vec<String>,
    },

    #[error("attribute '{attribute}' has non-finite value {value}")]
    InvalidValue { attribute: String, value: f64 },

    #[error("attribute '{attribute}' = {value} is outside {min}..={max}")]
    OutOfRange {
        attribute: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("attribute '{attribute}' = {value} is not a valid {kind} value")]
    InvalidKind {
        attribute: String,
        value: f64,
        kind: &'static str,
    },

    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("{stage}: artifact expects {expected} columns, got {actual}")]
    DimensionMismatch {
        stage: Stage,
        expected: usize,
        actual: usize,
    },

    #[error("{stage}: column {position} is '{actual}', artifact was fit on '{expected}'")]
    ColumnMismatch {
        stage: Stage,
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("invalid probability distribution: {0}")]
    InvalidDistribution(String),

    #[error("classifier predicted class {label} but the highest probability is class {argmax}")]
    InconsistentPrediction { label: u32, argmax: u32 },

    #[error("unknown class id {0}")]
    UnknownClass(u32),

    #[error("failed to load artifact {path}: {reason}")]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl PredictError {
    pub fn artifact_load(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::ArtifactLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures caused by an artifact fit on a different schema
    /// than the one in use.
    pub fn is_artifact_skew(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. } | Self::ColumnMismatch { .. } | Self::UnknownClass(_)
        )
    }
}

pub type Result<T, E = PredictError> = std::result::Result<T, E>;

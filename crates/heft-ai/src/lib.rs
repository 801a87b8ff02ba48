//! Inference layer: fitted artifacts, the single-record pipeline, and batch scoring.

pub mod artifacts;
pub mod batch;
pub mod classifier;
pub mod frame;
pub mod pipeline;
pub mod transformer;

#[cfg(feature = "onnx")]
mod onnx;

pub use artifacts::{ArtifactConfig, ArtifactStore, Artifacts, load_classifier, load_transformer};
pub use batch::{results_schema, results_to_batch, score_batch};
pub use classifier::{Classifier, ClassifierArtifact, LogisticRegression, RandomForest};
#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;
pub use pipeline::{Predictor, predict};
pub use transformer::{MinMaxScaler, StandardScaler, Transformer, TransformerArtifact};

//! Loading fitted artifacts from disk and sharing them across requests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use heft_core::{PredictError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::{Classifier, ClassifierArtifact};
use crate::transformer::{Transformer, TransformerArtifact};

/// Where the fitted artifacts live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub transformer: PathBuf,
    pub classifier: PathBuf,
}

impl ArtifactConfig {
    pub fn new(transformer: impl Into<PathBuf>, classifier: impl Into<PathBuf>) -> Self {
        Self {
            transformer: transformer.into(),
            classifier: classifier.into(),
        }
    }
}

/// A loaded transformer and classifier pair. Immutable once built.
pub struct Artifacts {
    pub transformer: Box<dyn Transformer>,
    pub classifier: Box<dyn Classifier>,
}

impl Artifacts {
    pub fn new(transformer: Box<dyn Transformer>, classifier: Box<dyn Classifier>) -> Self {
        Self {
            transformer,
            classifier,
        }
    }

    pub fn load(config: &ArtifactConfig) -> Result<Self> {
        let transformer = load_transformer(&config.transformer)?;
        let classifier = load_classifier(&config.classifier)?;
        Ok(Self::new(transformer, classifier))
    }
}

/// Load a transformer artifact. Only `.json` is supported.
pub fn load_transformer(path: &Path) -> Result<Box<dyn Transformer>> {
    match extension(path).as_deref() {
        Some("json") => {
            let artifact: TransformerArtifact = read_json(path)?;
            let transformer = artifact
                .into_transformer()
                .map_err(|e| PredictError::artifact_load(path, e))?;
            info!(
                path = %path.display(),
                n_features = transformer.n_features(),
                "loaded transformer"
            );
            Ok(transformer)
        }
        _ => Err(PredictError::artifact_load(
            path,
            "unsupported transformer format (expected .json)",
        )),
    }
}

/// Load a classifier artifact: `.json`, or `.onnx` with the `onnx` feature.
pub fn load_classifier(path: &Path) -> Result<Box<dyn Classifier>> {
    let classifier: Box<dyn Classifier> = match extension(path).as_deref() {
        Some("json") => {
            let artifact: ClassifierArtifact = read_json(path)?;
            artifact
                .into_classifier()
                .map_err(|e| PredictError::artifact_load(path, e))?
        }
        #[cfg(feature = "onnx")]
        Some("onnx") => Box::new(crate::onnx::OnnxClassifier::load(path)?),
        _ => {
            return Err(PredictError::artifact_load(
                path,
                "unsupported classifier format",
            ));
        }
    };
    info!(
        path = %path.display(),
        n_features = classifier.n_features(),
        n_classes = classifier.classes().len(),
        "loaded classifier"
    );
    Ok(classifier)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(PredictError::artifact_load(path, "file not found"));
    }
    let text = std::fs::read_to_string(path).map_err(|e| PredictError::artifact_load(path, e))?;
    serde_json::from_str(&text).map_err(|e| PredictError::artifact_load(path, e))
}

/// Process-wide artifact cache with once-only initialization.
///
/// The first caller of [`get`](Self::get) loads the artifacts while holding
/// the init lock; concurrent callers wait on that lock and then read the
/// cached value. A failed load leaves the cache empty so a later call can
/// retry.
pub struct ArtifactStore {
    config: ArtifactConfig,
    loaded: OnceLock<Arc<Artifacts>>,
    init: Mutex<()>,
    loads: AtomicUsize,
}

impl ArtifactStore {
    pub fn new(config: ArtifactConfig) -> Self {
        Self {
            config,
            loaded: OnceLock::new(),
            init: Mutex::new(()),
            loads: AtomicUsize::new(0),
        }
    }

    /// Build a store and load immediately.
    pub fn eager(config: ArtifactConfig) -> Result<Self> {
        let store = Self::new(config);
        store.get()?;
        Ok(store)
    }

    pub fn get(&self) -> Result<Arc<Artifacts>> {
        if let Some(artifacts) = self.loaded.get() {
            return Ok(Arc::clone(artifacts));
        }

        let _guard = self.init.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(artifacts) = self.loaded.get() {
            return Ok(Arc::clone(artifacts));
        }

        let artifacts = Arc::new(Artifacts::load(&self.config)?);
        self.loads.fetch_add(1, Ordering::Relaxed);
        let _ = self.loaded.set(Arc::clone(&artifacts));
        Ok(artifacts)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Number of successful loads (0 or 1).
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

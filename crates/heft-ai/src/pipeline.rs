//! Inference pipeline: transform, project, classify, package.

use std::sync::Arc;

use heft_core::{
    FeatureSchema, FullRecord, ObesityCategory, ObesityInput, PredictError, PredictionResult,
    RawInput, Result, Stage,
};
use tracing::{debug, warn};

use crate::artifacts::{ArtifactStore, Artifacts};
use crate::classifier::{Classifier, argmax};
use crate::frame;
use crate::transformer::Transformer;

/// Slack allowed on each probability and on their sum before renormalizing.
const PROBABILITY_TOLERANCE: f64 = 1e-4;

/// Run one full record through the fitted artifacts.
///
/// The transformer sees the whole schema; only then is the classifier's
/// subset selected. Label and distribution come from the same projected row.
pub fn predict<S: AsRef<str>>(
    record: &FullRecord,
    transformer: &dyn Transformer,
    selected: &[S],
    classifier: &dyn Classifier,
) -> Result<PredictionResult> {
    let batch = record.to_batch()?;
    let transformed = transformer.transform(&batch)?;
    if transformed.num_rows() != 1 {
        return Err(PredictError::Inference(format!(
            "transformer returned {} rows for 1",
            transformed.num_rows()
        )));
    }

    let projected = frame::project(&transformed, selected)?;
    frame::check_columns(
        Stage::Classify,
        &projected,
        classifier.n_features(),
        classifier.feature_names(),
    )?;

    let label = single(classifier.predict(&projected)?, "labels")?;
    let proba = single(classifier.predict_proba(&projected)?, "probability rows")?;
    let result = package(label, &proba, classifier.classes())?;

    debug!(
        category = %result.category,
        confidence = result.confidence(),
        "prediction"
    );
    Ok(result)
}

fn single<T>(mut rows: Vec<T>, what: &str) -> Result<T> {
    match rows.len() {
        1 => Ok(rows.remove(0)),
        n => Err(PredictError::Inference(format!(
            "classifier returned {n} {what} for 1 row"
        ))),
    }
}

/// Map a classifier's output onto the category label map.
fn package(label: u32, proba: &[f64], classes: &[u32]) -> Result<PredictionResult> {
    if proba.len() != classes.len() || classes.len() != ObesityCategory::COUNT {
        return Err(PredictError::InvalidDistribution(format!(
            "{} probabilities for {} classes, expected {}",
            proba.len(),
            classes.len(),
            ObesityCategory::COUNT
        )));
    }

    let mut probabilities = [0.0; ObesityCategory::COUNT];
    let mut seen = [false; ObesityCategory::COUNT];
    for (&class, &p) in classes.iter().zip(proba) {
        let idx = ObesityCategory::from_class_id(class)?.class_id() as usize;
        if std::mem::replace(&mut seen[idx], true) {
            return Err(PredictError::InvalidDistribution(format!(
                "class {class} appears twice"
            )));
        }
        if !p.is_finite() || !(-PROBABILITY_TOLERANCE..=1.0 + PROBABILITY_TOLERANCE).contains(&p)
        {
            return Err(PredictError::InvalidDistribution(format!(
                "class {class} has probability {p}"
            )));
        }
        probabilities[idx] = p.clamp(0.0, 1.0);
    }

    let total: f64 = probabilities.iter().sum();
    if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(PredictError::InvalidDistribution(format!(
            "probabilities sum to {total}"
        )));
    }
    if (total - 1.0).abs() > 1e-9 {
        warn!(total, "renormalizing probability distribution");
    }
    for p in &mut probabilities {
        *p /= total;
    }

    let category = ObesityCategory::from_class_id(label)?;
    let best = argmax(&probabilities).unwrap_or(0);
    if probabilities[best] - probabilities[label as usize] > 1e-9 {
        return Err(PredictError::InconsistentPrediction {
            label,
            argmax: best as u32,
        });
    }

    Ok(PredictionResult {
        category,
        probabilities,
    })
}

/// Shared artifacts bound to the schema they were fit against.
#[derive(Clone)]
pub struct Predictor {
    artifacts: Arc<Artifacts>,
    schema: FeatureSchema,
}

impl Predictor {
    /// Bind artifacts to the built-in obesity schema.
    pub fn new(artifacts: Arc<Artifacts>) -> Result<Self> {
        Self::with_schema(artifacts, FeatureSchema::obesity().clone())
    }

    /// Bind artifacts to `schema`, failing fast on width disagreement.
    pub fn with_schema(artifacts: Arc<Artifacts>, schema: FeatureSchema) -> Result<Self> {
        let transformer_width = artifacts.transformer.n_features();
        if transformer_width != schema.len() {
            return Err(PredictError::DimensionMismatch {
                stage: Stage::Transform,
                expected: transformer_width,
                actual: schema.len(),
            });
        }
        let classifier_width = artifacts.classifier.n_features();
        if classifier_width != schema.selected().len() {
            return Err(PredictError::DimensionMismatch {
                stage: Stage::Classify,
                expected: classifier_width,
                actual: schema.selected().len(),
            });
        }
        Ok(Self { artifacts, schema })
    }

    pub fn from_store(store: &ArtifactStore) -> Result<Self> {
        Self::new(store.get()?)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Reconcile `raw` against the schema and predict.
    pub fn predict_raw(&self, raw: &RawInput) -> Result<PredictionResult> {
        let record = self.schema.reconcile(raw)?;
        self.predict_record(&record)
    }

    pub fn predict_input(&self, input: ObesityInput) -> Result<PredictionResult> {
        self.predict_raw(&RawInput::from(input))
    }

    pub fn predict_record(&self, record: &FullRecord) -> Result<PredictionResult> {
        predict(
            record,
            self.artifacts.transformer.as_ref(),
            self.schema.selected(),
            self.artifacts.classifier.as_ref(),
        )
    }
}

//! Fitted numeric transformers (feature scalers).
//!
//! A transformer is column-order-sensitive: it applies per-column statistics
//! by position, so it refuses batches whose width, or recorded column names,
//! differ from what it was fit on.

use arrow::record_batch::RecordBatch;
use heft_core::{Result, Stage};
use serde::Deserialize;

use crate::frame;

/// A fitted scaler applied to full-schema batches.
pub trait Transformer: Send + Sync {
    /// Number of columns the transformer was fit on.
    fn n_features(&self) -> usize;

    /// Column names recorded at fit time, if the artifact kept them.
    fn feature_names(&self) -> Option<&[String]>;

    /// Scale every row of `batch`. Output keeps the input's column names.
    fn transform(&self, batch: &RecordBatch) -> Result<RecordBatch>;
}

/// Standardization: `(x - mean) / scale`.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
}

impl StandardScaler {
    fn validate(&self) -> Result<(), String> {
        check_lengths(
            &[("mean", self.mean.len()), ("scale", self.scale.len())],
            self.feature_names.as_deref(),
        )?;
        check_finite("mean", &self.mean)?;
        check_finite("scale", &self.scale)
    }

    // Zero-variance columns were fit with scale 0; leave them unscaled.
    fn scale_at(&self, j: usize) -> f64 {
        if self.scale[j] == 0.0 { 1.0 } else { self.scale[j] }
    }
}

impl Transformer for StandardScaler {
    fn n_features(&self) -> usize {
        self.mean.len()
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn transform(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        frame::check_columns(Stage::Transform, batch, self.n_features(), self.feature_names())?;
        frame::map_columns(batch, |j, x| (x - self.mean[j]) / self.scale_at(j))
    }
}

/// Min-max scaling in its fitted affine form: `x * scale + min`.
#[derive(Debug, Clone, Deserialize)]
pub struct MinMaxScaler {
    pub scale: Vec<f64>,
    pub min: Vec<f64>,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
}

impl MinMaxScaler {
    fn validate(&self) -> Result<(), String> {
        check_lengths(
            &[("scale", self.scale.len()), ("min", self.min.len())],
            self.feature_names.as_deref(),
        )?;
        check_finite("scale", &self.scale)?;
        check_finite("min", &self.min)
    }
}

impl Transformer for MinMaxScaler {
    fn n_features(&self) -> usize {
        self.scale.len()
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn transform(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        frame::check_columns(Stage::Transform, batch, self.n_features(), self.feature_names())?;
        frame::map_columns(batch, |j, x| x * self.scale[j] + self.min[j])
    }
}

/// On-disk transformer artifact, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformerArtifact {
    Standard(StandardScaler),
    MinMax(MinMaxScaler),
}

impl TransformerArtifact {
    /// Validate and convert into a shareable transformer.
    pub fn into_transformer(self) -> Result<Box<dyn Transformer>, String> {
        Ok(match self {
            Self::Standard(s) => {
                s.validate()?;
                Box::new(s)
            }
            Self::MinMax(s) => {
                s.validate()?;
                Box::new(s)
            }
        })
    }
}

fn check_lengths(arrays: &[(&str, usize)], names: Option<&[String]>) -> Result<(), String> {
    let (first, n) = arrays[0];
    if n == 0 {
        return Err(format!("'{first}' is empty"));
    }
    for &(field, len) in &arrays[1..] {
        if len != n {
            return Err(format!("'{field}' has {len} entries, '{first}' has {n}"));
        }
    }
    if let Some(names) = names
        && names.len() != n
    {
        return Err(format!(
            "'feature_names' has {} entries, '{first}' has {n}",
            names.len()
        ));
    }
    Ok(())
}

fn check_finite(field: &str, values: &[f64]) -> Result<(), String> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(format!("'{field}[{i}]' is not finite")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heft_core::{FeatureSchema, ObesityInput, PredictError, RawInput};

    fn scaler() -> StandardScaler {
        StandardScaler {
            mean: vec![1.0, 10.0],
            scale: vec![2.0, 0.0],
            feature_names: None,
        }
    }

    fn two_column_batch(a: f64, b: f64) -> RecordBatch {
        let record = heft_core::reconcile(
            &RawInput::new().with("a", a).with("b", b),
            &["a", "b"],
            &Default::default(),
        )
        .unwrap();
        record.to_batch().unwrap()
    }

    #[test]
    fn standard_scaler_centres_and_scales() {
        let out = scaler().transform(&two_column_batch(5.0, 12.0)).unwrap();
        let row = &frame::batch_rows(&out).unwrap()[0];
        assert_eq!(row, &vec![2.0, 2.0]); // zero scale leaves column unscaled
        assert_eq!(out.schema().field(1).name(), "b");
    }

    #[test]
    fn min_max_scaler_applies_affine_form() {
        let s = MinMaxScaler {
            scale: vec![0.5, 0.1],
            min: vec![-0.5, 0.0],
            feature_names: None,
        };
        let out = s.transform(&two_column_batch(3.0, 5.0)).unwrap();
        let row = &frame::batch_rows(&out).unwrap()[0];
        assert!((row[0] - 1.0).abs() < 1e-12);
        assert!((row[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn wrong_width_is_dimension_mismatch() {
        let full = FeatureSchema::obesity()
            .reconcile(&RawInput::from(ObesityInput::default()))
            .unwrap();
        let err = scaler().transform(&full.to_batch().unwrap()).unwrap_err();
        assert!(matches!(
            err,
            PredictError::DimensionMismatch {
                stage: Stage::Transform,
                expected: 2,
                actual: 16
            }
        ));
    }

    #[test]
    fn recorded_names_must_match_by_position() {
        let mut s = scaler();
        s.feature_names = Some(vec!["b".into(), "a".into()]);
        let err = s.transform(&two_column_batch(1.0, 2.0)).unwrap_err();
        assert!(matches!(err, PredictError::ColumnMismatch { position: 0, .. }));
    }

    #[test]
    fn artifact_json_is_tagged_by_kind() {
        let json = r#"{"kind":"min_max","scale":[1.0],"min":[0.0],"feature_names":["x"]}"#;
        let artifact: TransformerArtifact = serde_json::from_str(json).unwrap();
        let t = artifact.into_transformer().unwrap();
        assert_eq!(t.n_features(), 1);
        assert_eq!(t.feature_names().unwrap(), ["x"]);
    }

    #[test]
    fn artifact_rejects_length_disagreement() {
        let json = r#"{"kind":"standard","mean":[0.0,1.0],"scale":[1.0]}"#;
        let artifact: TransformerArtifact = serde_json::from_str(json).unwrap();
        let err = artifact.into_transformer().err().unwrap();
        assert!(err.contains("'scale' has 1 entries"), "{err}");
    }

    #[test]
    fn artifact_rejects_empty_parameters() {
        let json = r#"{"kind":"standard","mean":[],"scale":[]}"#;
        let artifact: TransformerArtifact = serde_json::from_str(json).unwrap();
        assert!(artifact.into_transformer().is_err());
    }
}
